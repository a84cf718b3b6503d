#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use freshpure_api::{
    config::AppConfig, notifications::NotificationDispatcher, services::orders::OrderService,
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

pub const ALL_CHANNELS: &str = "sellerEmail,buyerSMS,sellerSMS,buyerWhatsApp,sellerWhatsApp";
pub const SELLER_PHONE: &str = "7305801920";

/// Helper harness wiring the full router to mock provider endpoints.
pub struct TestApp {
    router: Router,
    pub resend: MockServer,
    pub textbelt: MockServer,
    pub callmebot: MockServer,
}

impl TestApp {
    /// Construct the application with the given comma-separated channel list.
    pub async fn new(channels: &str) -> Self {
        let resend = MockServer::start().await;
        let textbelt = MockServer::start().await;
        let callmebot = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
            "seller@example.com".to_string(),
            SELLER_PHONE.to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.notifications.channels = channels.to_string();
        cfg.notifications.timeout_secs = 2;
        cfg.notifications.email.api_url = resend.uri();
        cfg.notifications.email.api_key = Some("re_test".to_string());
        cfg.notifications.sms.api_url = format!("{}/text", textbelt.uri());
        cfg.notifications.sms.api_key = Some("textbelt".to_string());
        cfg.notifications.whatsapp.api_url = format!("{}/whatsapp.php", callmebot.uri());
        cfg.notifications.whatsapp.api_key = Some("cmb-key".to_string());

        let dispatcher = NotificationDispatcher::from_config(&cfg, reqwest::Client::new())
            .expect("failed to build dispatcher");
        let orders = Arc::new(OrderService::new(
            Arc::new(dispatcher),
            cfg.currency_symbol.clone(),
        ));
        let router = freshpure_api::app(AppState::new(cfg, orders)).expect("failed to build app");

        Self {
            router,
            resend,
            textbelt,
            callmebot,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Send a raw, possibly malformed, JSON body.
    pub async fn request_raw(&self, method: Method, uri: &str, raw: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 response")
}

/// The checkout submission used across the tests
pub fn asha_order() -> Value {
    json!({
        "orderData": {
            "formData": {
                "fullName": "Asha",
                "email": "a@x.com",
                "phone": "9876543210",
                "address": "1 Rd",
                "city": "Kochi",
                "zipCode": "682001",
                "country": "India"
            },
            "cartItems": [{ "name": "Coconut Oil", "price": "$10", "quantity": 2 }],
            "total": "$20"
        }
    })
}
