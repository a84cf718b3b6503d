use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{message, Channel, NotificationError, Notifier};
use crate::config::{EmailProviderConfig, SellerConfig};
use crate::models::Order;

const PROVIDER: &str = "resend";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

#[derive(Debug, Default, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
    message: Option<String>,
}

/// Sends the order e-mail to the seller through the Resend API.
#[derive(Clone)]
pub struct ResendEmailNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    seller: SellerConfig,
}

impl ResendEmailNotifier {
    pub fn new(
        client: reqwest::Client,
        config: &EmailProviderConfig,
        api_key: String,
        seller: SellerConfig,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/emails", config.api_url.trim_end_matches('/')),
            api_key,
            from: config.from.clone(),
            seller,
        }
    }
}

#[async_trait]
impl Notifier for ResendEmailNotifier {
    fn channel(&self) -> Channel {
        Channel::SellerEmail
    }

    #[instrument(skip_all, fields(order_id = %order.order_id))]
    async fn deliver(&self, order: &Order) -> Result<(), NotificationError> {
        let body = SendEmailRequest {
            from: &self.from,
            to: [&self.seller.email],
            subject: message::seller_email_subject(order),
            html: message::seller_email_html(order, &self.seller),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: SendEmailResponse = serde_json::from_str(&text).unwrap_or_default();

        match parsed.id {
            Some(id) if status.is_success() => {
                debug!(email_id = %id, "Resend accepted the order e-mail");
                Ok(())
            }
            _ => Err(NotificationError::Rejected {
                provider: PROVIDER,
                reason: parsed
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderRequest;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> Order {
        let request: OrderRequest = serde_json::from_value(json!({
            "orderData": {
                "formData": { "fullName": "Asha", "email": "a@x.com", "phone": "9876543210" },
                "cartItems": [{ "name": "Coconut Oil", "price": "$10", "quantity": 2 }],
                "total": "$20"
            }
        }))
        .unwrap();
        Order::from_request(request, "$", Utc::now()).unwrap()
    }

    fn notifier(server: &MockServer) -> ResendEmailNotifier {
        let config = EmailProviderConfig {
            api_url: server.uri(),
            ..EmailProviderConfig::default()
        };
        let seller = SellerConfig {
            name: "Fresh&Pure Oils".into(),
            email: "seller@example.com".into(),
            phone: "7305801920".into(),
            phone_country_code: "91".into(),
        };
        ResendEmailNotifier::new(reqwest::Client::new(), &config, "re_test".into(), seller)
    }

    #[tokio::test]
    async fn posts_order_email_to_seller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "to": ["seller@example.com"],
                "subject": "NEW ORDER: Asha - $20"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_1" })))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).deliver(&order()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_error_is_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "name": "validation_error",
                "message": "Invalid `to` field"
            })))
            .mount(&server)
            .await;

        let err = notifier(&server).deliver(&order()).await.unwrap_err();
        match err {
            NotificationError::Rejected { provider, reason } => {
                assert_eq!(provider, "resend");
                assert_eq!(reason, "Invalid `to` field");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_status_without_id_is_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = notifier(&server).deliver(&order()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { .. }));
    }
}
