use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{message, Channel, NotificationError, Notifier, Recipient};
use crate::config::SmsProviderConfig;
use crate::models::Order;

const PROVIDER: &str = "textbelt";

#[derive(Debug, Serialize)]
struct SendSmsRequest<'a> {
    phone: &'a str,
    message: &'a str,
    key: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendSmsResponse {
    #[serde(default)]
    success: bool,
    error: Option<String>,
    text_id: Option<serde_json::Value>,
}

/// Sends a condensed order text through TextBelt.
#[derive(Clone)]
pub struct TextBeltSmsNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    recipient: Recipient,
    shop_name: String,
}

impl TextBeltSmsNotifier {
    pub fn new(
        client: reqwest::Client,
        config: &SmsProviderConfig,
        api_key: String,
        recipient: Recipient,
        shop_name: String,
    ) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            recipient,
            shop_name,
        }
    }

    fn text_for(&self, order: &Order) -> String {
        match self.recipient {
            Recipient::Buyer => message::buyer_sms(order, &self.shop_name),
            Recipient::Seller(_) => message::seller_sms(order),
        }
    }
}

#[async_trait]
impl Notifier for TextBeltSmsNotifier {
    fn channel(&self) -> Channel {
        match self.recipient {
            Recipient::Buyer => Channel::BuyerSms,
            Recipient::Seller(_) => Channel::SellerSms,
        }
    }

    #[instrument(skip_all, fields(order_id = %order.order_id, recipient = self.recipient.label()))]
    async fn deliver(&self, order: &Order) -> Result<(), NotificationError> {
        let phone = self.recipient.phone(order);
        if phone.is_empty() {
            return Err(NotificationError::MissingRecipient(self.recipient.label()));
        }
        let text = self.text_for(order);

        let response = self
            .client
            .post(&self.api_url)
            .json(&SendSmsRequest {
                phone: &phone,
                message: &text,
                key: &self.api_key,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: SendSmsResponse = serde_json::from_str(&body).unwrap_or_default();

        if parsed.success {
            debug!(text_id = ?parsed.text_id, "TextBelt accepted the message");
            Ok(())
        } else {
            Err(NotificationError::Rejected {
                provider: PROVIDER,
                reason: parsed.error.unwrap_or_else(|| format!("HTTP {}", status)),
            })
        }
    }
}
