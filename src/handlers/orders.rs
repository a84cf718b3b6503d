use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::{
    errors::ServiceError,
    handlers::AppState,
    models::OrderRequest,
    services::orders::OrderConfirmation,
};

/// Routes nested under `/api`
pub fn order_routes() -> Router<AppState> {
    Router::new().route(
        "/order-confirmation",
        post(place_order).fallback(method_not_allowed),
    )
}

/// Accept a checkout submission and fan it out to the notification channels
pub async fn place_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<OrderConfirmation>, ServiceError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(status = %rejection.status(), "Rejected order body");
        ServiceError::MalformedBody(rejection.body_text())
    })?;

    let confirmation = state.orders.place_order(request).await?;
    Ok(Json(confirmation))
}

/// Any method other than POST; the body is never read
pub async fn method_not_allowed() -> ServiceError {
    ServiceError::MethodNotAllowed
}
