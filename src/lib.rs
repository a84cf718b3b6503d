//! Fresh&Pure order notification service
//!
//! Accepts checkout submissions from the storefront, logs them for manual
//! fulfilment and fans them out to the seller and buyer over e-mail, SMS and
//! WhatsApp.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod models;
pub mod notifications;
pub mod services;
pub mod telemetry;

use axum::{extract::DefaultBodyLimit, Router};
use http::{HeaderValue, Method};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::services::orders::OrderService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(config: config::AppConfig, orders: Arc<OrderService>) -> Self {
        Self { config, orders }
    }
}

/// Build the CORS layer from config.
///
/// Explicit origins win; otherwise permissive CORS is used only in development
/// or when explicitly enabled.
pub fn cors_layer(cfg: &config::AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        )
    }
}

/// Full application router with the middleware stack applied.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let cfg = &state.config;
    let cors = cors_layer(cfg)?;
    let body_limit = cfg.max_body_size;
    let request_timeout = cfg.request_timeout();

    Ok(Router::<AppState>::new()
        .nest("/api", handlers::orders::order_routes())
        .nest("/health", health::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(telemetry::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state))
}
