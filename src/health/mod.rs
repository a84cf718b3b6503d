/*!
 * # Health Check Module
 *
 * `GET /health` reports that the process is up, the build version and which
 * notification channels are enabled. Providers are not probed.
 */

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::AppState;

/// Basic health status
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
}

#[derive(Serialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub channels: Vec<String>,
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthInfo> {
    Json(HealthInfo {
        status: HealthStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        channels: state
            .orders
            .dispatcher()
            .channels()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}
