/*!
 * # Order Notifications
 *
 * Fan-out of a placed order to the configured channels. Each channel is a
 * [`Notifier`]; every attempt is independent and best-effort. A failed or
 * slow channel is recorded as `delivered = false` and never affects its
 * siblings or the HTTP status of the order request.
 */

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Order;

pub mod dispatcher;
pub mod email;
pub mod message;
pub mod sms;
pub mod whatsapp;

pub use dispatcher::NotificationDispatcher;
pub use email::ResendEmailNotifier;
pub use sms::TextBeltSmsNotifier;
pub use whatsapp::CallMeBotWhatsAppNotifier;

/// A delivery mechanism paired with its recipient
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString,
)]
pub enum Channel {
    #[strum(serialize = "buyerSMS")]
    BuyerSms,
    #[strum(serialize = "sellerSMS")]
    SellerSms,
    #[strum(serialize = "buyerWhatsApp")]
    BuyerWhatsApp,
    #[strum(serialize = "sellerWhatsApp")]
    SellerWhatsApp,
    #[strum(serialize = "sellerEmail")]
    SellerEmail,
}

/// Who a message is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The phone number on the order itself
    Buyer,
    /// The configured seller number
    Seller(String),
}

impl Recipient {
    /// Digits-only phone number for this recipient of `order`
    pub fn phone(&self, order: &Order) -> String {
        match self {
            Recipient::Buyer => message::normalize_phone(&order.buyer.phone),
            Recipient::Seller(phone) => message::normalize_phone(phone),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Recipient::Buyer => "buyer",
            Recipient::Seller(_) => "seller",
        }
    }
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} rejected the message: {reason}")]
    Rejected {
        provider: &'static str,
        reason: String,
    },

    #[error("No usable {0} phone number")]
    MissingRecipient(&'static str),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    /// Sends the order over this channel once. No retries.
    async fn deliver(&self, order: &Order) -> Result<(), NotificationError>;
}

/// Result of one channel attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub delivered: bool,
}

/// Runs one bounded attempt and folds any failure into `delivered = false`.
pub async fn attempt(
    notifier: &dyn Notifier,
    order: &Order,
    timeout: Duration,
) -> NotificationOutcome {
    let channel = notifier.channel();
    let result = match tokio::time::timeout(timeout, notifier.deliver(order)).await {
        Ok(result) => result,
        Err(_) => Err(NotificationError::Timeout(timeout)),
    };

    let delivered = match result {
        Ok(()) => {
            info!(channel = %channel, order_id = %order.order_id, "Notification delivered");
            true
        }
        Err(err) => {
            warn!(
                channel = %channel,
                order_id = %order.order_id,
                error = %err,
                "Notification failed"
            );
            false
        }
    };

    NotificationOutcome { channel, delivered }
}

/// Per-channel outcomes in configured order.
///
/// Serializes as a flat object, e.g. `{"sellerEmail": true, "buyerSMS": false}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    outcomes: Vec<NotificationOutcome>,
}

impl NotificationReport {
    pub fn new(outcomes: Vec<NotificationOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[NotificationOutcome] {
        &self.outcomes
    }

    pub fn delivered(&self, channel: Channel) -> Option<bool> {
        self.outcomes
            .iter()
            .find(|o| o.channel == channel)
            .map(|o| o.delivered)
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Serialize for NotificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.outcomes.len()))?;
        for outcome in &self.outcomes {
            map.serialize_entry(outcome.channel.as_ref(), &outcome.delivered)?;
        }
        map.end()
    }
}
