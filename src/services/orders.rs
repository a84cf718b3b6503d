use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    errors::ServiceError,
    models::{LineItem, Order, OrderRequest},
    notifications::{message, NotificationDispatcher, NotificationReport},
};

/// Log target for the manual-processing record of every accepted order
pub const ORDER_BACKUP_TARGET: &str = "order_backup";

pub const ORDER_RECEIVED_MESSAGE: &str = "Order received! Check your messages for confirmation.";

/// 200 body for an accepted order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub success: bool,
    pub message: String,
    pub order_summary: OrderSummary,
    pub notifications: NotificationReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub customer: String,
    pub phone: String,
    pub email: String,
    pub total: String,
    pub item_count: u64,
    pub address: String,
    pub order_id: String,
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub name: String,
    pub price: String,
    pub quantity: u32,
    pub subtotal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl From<&LineItem> for ProductSummary {
    fn from(item: &LineItem) -> Self {
        Self {
            name: item.name.clone(),
            price: item.price.clone(),
            quantity: item.quantity,
            subtotal: item.subtotal_display.clone(),
            description: item.description.clone(),
            features: item.features.clone(),
        }
    }
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            customer: order.buyer.full_name.clone(),
            phone: order.buyer.phone.clone(),
            email: order.buyer.email.clone(),
            total: order.total.clone(),
            item_count: order.item_count,
            address: order.shipping_address(),
            order_id: order.order_id.to_string(),
            products: order.items.iter().map(ProductSummary::from).collect(),
        }
    }
}

/// Service for accepting storefront orders
#[derive(Clone)]
pub struct OrderService {
    dispatcher: Arc<NotificationDispatcher>,
    currency_symbol: String,
}

impl OrderService {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, currency_symbol: impl Into<String>) -> Self {
        Self {
            dispatcher,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Validates the submission, records it, and notifies every configured channel.
    ///
    /// Once the submission passes intake this always succeeds; channel failures
    /// only show up as `false` entries in the notification map.
    #[instrument(skip_all)]
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderConfirmation, ServiceError> {
        let order = Order::from_request(request, &self.currency_symbol, Utc::now())?;

        if let Some((client, computed)) = order.total_mismatch() {
            warn!(
                order_id = %order.order_id,
                client_total = %client,
                computed_total = %computed,
                "Client total does not match line items; keeping client total"
            );
        }

        log_order_for_manual_processing(&order);

        let notifications = self.dispatcher.dispatch(&order).await;

        Ok(OrderConfirmation {
            success: true,
            message: ORDER_RECEIVED_MESSAGE.to_string(),
            order_summary: OrderSummary::from(&order),
            notifications,
        })
    }
}

/// Writes the full order as one structured event so it can be fulfilled by hand
/// even when every notification channel failed.
pub fn log_order_for_manual_processing(order: &Order) {
    info!(
        target: ORDER_BACKUP_TARGET,
        order_id = %order.order_id,
        customer = %order.buyer.full_name,
        phone = %order.buyer.phone,
        email = %order.buyer.email,
        total = %order.total,
        item_count = order.item_count,
        address = %order.shipping_address(),
        products = %message::product_summary(order),
        "New order received"
    );
}
