use anyhow::{anyhow, Context};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use super::{
    attempt, CallMeBotWhatsAppNotifier, Channel, NotificationReport, Notifier, Recipient,
    ResendEmailNotifier, TextBeltSmsNotifier,
};
use crate::config::AppConfig;
use crate::models::Order;

/// Fans an order out to every configured channel.
///
/// Attempts run concurrently, each bounded by `timeout`. Outcomes come back
/// in the order the notifiers were configured.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>, timeout: Duration) -> Self {
        Self { notifiers, timeout }
    }

    /// Builds one provider notifier per enabled channel, sharing `client`.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> anyhow::Result<Self> {
        let notifications = &config.notifications;
        let seller = &config.seller;
        let channels = notifications
            .channel_list()
            .map_err(|reason| anyhow!(reason))?;

        let key = |value: &Option<String>, channel: Channel| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("no api_key configured"))
                .with_context(|| format!("cannot enable channel '{}'", channel))
        };

        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::with_capacity(channels.len());
        for channel in channels {
            let notifier: Arc<dyn Notifier> = match channel {
                Channel::SellerEmail => Arc::new(ResendEmailNotifier::new(
                    client.clone(),
                    &notifications.email,
                    key(&notifications.email.api_key, channel)?,
                    seller.clone(),
                )),
                Channel::BuyerSms | Channel::SellerSms => Arc::new(TextBeltSmsNotifier::new(
                    client.clone(),
                    &notifications.sms,
                    key(&notifications.sms.api_key, channel)?,
                    recipient_for(channel, &seller.phone),
                    seller.name.clone(),
                )),
                Channel::BuyerWhatsApp | Channel::SellerWhatsApp => {
                    Arc::new(CallMeBotWhatsAppNotifier::new(
                        client.clone(),
                        &notifications.whatsapp,
                        key(&notifications.whatsapp.api_key, channel)?,
                        recipient_for(channel, &seller.phone),
                        seller.name.clone(),
                    ))
                }
            };
            notifiers.push(notifier);
        }

        Ok(Self::new(notifiers, notifications.timeout()))
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip_all, fields(order_id = %order.order_id, channels = self.notifiers.len()))]
    pub async fn dispatch(&self, order: &Order) -> NotificationReport {
        let attempts = self
            .notifiers
            .iter()
            .map(|notifier| attempt(notifier.as_ref(), order, self.timeout));
        let report = NotificationReport::new(join_all(attempts).await);

        info!(
            delivered = report.delivered_count(),
            attempted = report.outcomes().len(),
            "Notification dispatch finished"
        );
        report
    }
}

fn recipient_for(channel: Channel, seller_phone: &str) -> Recipient {
    match channel {
        Channel::BuyerSms | Channel::BuyerWhatsApp => Recipient::Buyer,
        _ => Recipient::Seller(seller_phone.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderRequest;
    use crate::notifications::{NotificationError, NotificationOutcome};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed,
        Fail,
        Hang,
    }

    struct FakeNotifier {
        channel: Channel,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeNotifier {
        fn new(channel: Channel, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                channel,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn deliver(&self, _order: &Order) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(NotificationError::Rejected {
                    provider: "fake",
                    reason: "nope".into(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn fake(channel: Channel, behaviour: Behaviour) -> Arc<dyn Notifier> {
        FakeNotifier::new(channel, behaviour)
    }

    fn order() -> Order {
        let request: OrderRequest = serde_json::from_value(json!({
            "orderData": {
                "formData": { "fullName": "Asha", "phone": "9876543210" },
                "cartItems": [{ "name": "Coconut Oil", "price": "$10", "quantity": 2 }],
                "total": "$20"
            }
        }))
        .unwrap();
        Order::from_request(request, "$", Utc::now()).unwrap()
    }

    fn test_config() -> AppConfig {
        let mut cfg = AppConfig::new(
            "127.0.0.1".into(),
            0,
            "development".into(),
            "seller@example.com".into(),
            "7305801920".into(),
        );
        cfg.notifications.email.api_key = Some("re_test".into());
        cfg.notifications.whatsapp.api_key = Some("cmb".into());
        cfg
    }

    #[tokio::test]
    async fn failures_do_not_affect_other_channels() {
        let email = FakeNotifier::new(Channel::SellerEmail, Behaviour::Fail);
        let sms = FakeNotifier::new(Channel::BuyerSms, Behaviour::Succeed);
        let notifiers: Vec<Arc<dyn Notifier>> = vec![email.clone(), sms.clone()];
        let dispatcher = NotificationDispatcher::new(notifiers, Duration::from_secs(1));

        let report = dispatcher.dispatch(&order()).await;

        assert_eq!(
            report.outcomes(),
            &[
                NotificationOutcome {
                    channel: Channel::SellerEmail,
                    delivered: false
                },
                NotificationOutcome {
                    channel: Channel::BuyerSms,
                    delivered: true
                },
            ]
        );
        assert_eq!(email.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sms.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_channel_times_out_as_undelivered() {
        let dispatcher = NotificationDispatcher::new(
            vec![
                fake(Channel::SellerWhatsApp, Behaviour::Hang),
                fake(Channel::SellerEmail, Behaviour::Succeed),
            ],
            Duration::from_secs(10),
        );

        let report = dispatcher.dispatch(&order()).await;

        assert_eq!(report.delivered(Channel::SellerWhatsApp), Some(false));
        assert_eq!(report.delivered(Channel::SellerEmail), Some(true));
    }

    #[tokio::test]
    async fn report_follows_configured_order() {
        let dispatcher = NotificationDispatcher::new(
            vec![
                fake(Channel::SellerSms, Behaviour::Succeed),
                fake(Channel::BuyerWhatsApp, Behaviour::Fail),
                fake(Channel::SellerEmail, Behaviour::Succeed),
            ],
            Duration::from_secs(1),
        );

        let report = dispatcher.dispatch(&order()).await;
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"sellerSMS":true,"buyerWhatsApp":false,"sellerEmail":true}"#
        );
    }

    #[tokio::test]
    async fn no_channels_yields_empty_report() {
        let dispatcher = NotificationDispatcher::new(Vec::new(), Duration::from_secs(1));
        let report = dispatcher.dispatch(&order()).await;
        assert!(report.is_empty());
        assert_eq!(serde_json::to_string(&report).unwrap(), "{}");
    }

    #[test]
    fn from_config_builds_notifiers_in_configured_order() {
        let mut cfg = test_config();
        cfg.notifications.channels = "sellerWhatsApp,buyerSMS,sellerEmail".into();

        let dispatcher = NotificationDispatcher::from_config(&cfg, reqwest::Client::new()).unwrap();
        assert_eq!(
            dispatcher.channels(),
            vec![Channel::SellerWhatsApp, Channel::BuyerSms, Channel::SellerEmail]
        );
        assert_eq!(dispatcher.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn from_config_rejects_channel_without_key() {
        let mut cfg = test_config();
        cfg.notifications.whatsapp.api_key = None;
        cfg.notifications.channels = "sellerEmail,buyerWhatsApp".into();

        let err = NotificationDispatcher::from_config(&cfg, reqwest::Client::new())
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("buyerWhatsApp"));
    }
}
