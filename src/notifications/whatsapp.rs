use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{message, Channel, NotificationError, Notifier, Recipient};
use crate::config::WhatsAppProviderConfig;
use crate::models::Order;

/// Sends a WhatsApp message through the CallMeBot gateway.
///
/// CallMeBot answers with a small HTML page, so only the HTTP status decides
/// delivery.
#[derive(Clone)]
pub struct CallMeBotWhatsAppNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    recipient: Recipient,
    shop_name: String,
}

impl CallMeBotWhatsAppNotifier {
    pub fn new(
        client: reqwest::Client,
        config: &WhatsAppProviderConfig,
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
            Recipient::Buyer => message::buyer_whatsapp(order, &self.shop_name),
            Recipient::Seller(_) => message::seller_whatsapp(order),
        }
    }
}

#[async_trait]
impl Notifier for CallMeBotWhatsAppNotifier {
    fn channel(&self) -> Channel {
        match self.recipient {
            Recipient::Buyer => Channel::BuyerWhatsApp,
            Recipient::Seller(_) => Channel::SellerWhatsApp,
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
            .get(&self.api_url)
            .query(&[
                ("phone", phone.as_str()),
                ("text", text.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        debug!(status = %response.status(), "CallMeBot accepted the message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderRequest;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> Order {
        let request: OrderRequest = serde_json::from_value(json!({
            "orderData": {
                "formData": { "fullName": "Asha", "phone": "+91 98765-43210", "address": "1 Rd", "city": "Kochi" },
                "cartItems": [{ "name": "Coconut Oil", "price": "$10", "quantity": 2 }],
                "total": "$20"
            }
        }))
        .unwrap();
        Order::from_request(request, "$", Utc::now()).unwrap()
    }

    fn notifier(server: &MockServer, recipient: Recipient) -> CallMeBotWhatsAppNotifier {
        let config = WhatsAppProviderConfig {
            api_url: format!("{}/whatsapp.php", server.uri()),
            api_key: Some("cmb-key".into()),
        };
        CallMeBotWhatsAppNotifier::new(
            reqwest::Client::new(),
            &config,
            "cmb-key".into(),
            recipient,
            "Fresh&Pure Oils".into(),
        )
    }

    #[tokio::test]
    async fn sends_encoded_query_to_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/whatsapp.php"))
            .and(query_param("phone", "919876543210"))
            .and(query_param("apikey", "cmb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Message queued"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = notifier(&server, Recipient::Buyer);
        assert_eq!(notifier.channel(), Channel::BuyerWhatsApp);
        notifier.deliver(&order()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let text = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "text")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(text.contains("Shipping to: 1 Rd, Kochi"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = notifier(&server, Recipient::Seller("7305801920".into()))
            .deliver(&order())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Transport(_)));
    }
}
