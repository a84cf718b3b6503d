use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::errors::ServiceError;

pub const MISSING_ORDER_DATA: &str = "Missing required order data";

/// Checkout submission as posted by the storefront cart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_data: Option<OrderData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub form_data: Option<BuyerInfo>,
    pub cart_items: Option<Vec<CartItem>>,
    pub total: Option<OrderTotal>,
}

/// Buyer contact and shipping details (`formData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuyerInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub name: String,
    /// Currency-prefixed display price, e.g. "$12"
    #[serde(default)]
    pub price: String,
    pub quantity: u32,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
}

/// Client-computed total. The cart sends either a display string or a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OrderTotal {
    Display(String),
    Amount(Decimal),
}

impl OrderTotal {
    fn to_display(&self, currency_symbol: &str) -> Option<String> {
        match self {
            OrderTotal::Display(text) if text.trim().is_empty() => None,
            OrderTotal::Display(text) => Some(text.clone()),
            OrderTotal::Amount(amount) => Some(format_money(*amount, currency_symbol)),
        }
    }
}

/// Cosmetic order reference: `#` and the last eight digits of the epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().rem_euclid(100_000_000);
        OrderId(format!("#{:08}", millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub price: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub subtotal_display: String,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
}

impl LineItem {
    fn from_cart_item(item: CartItem, currency_symbol: &str) -> Self {
        let unit_price = parse_price(&item.price, currency_symbol);
        let subtotal = unit_price
            .checked_mul(Decimal::from(item.quantity))
            .unwrap_or_else(|| {
                warn!(
                    product = %item.name,
                    price = %item.price,
                    quantity = item.quantity,
                    "Line subtotal out of range; counting it as zero"
                );
                Decimal::ZERO
            });
        Self {
            subtotal_display: format_money(subtotal, currency_symbol),
            name: item.name,
            price: item.price,
            quantity: item.quantity,
            unit_price,
            subtotal,
            description: item.desc,
            features: item.features,
        }
    }
}

/// A validated order. Lives for a single request and is never stored.
#[derive(Debug, Clone)]
pub struct Order {
    pub buyer: BuyerInfo,
    pub items: Vec<LineItem>,
    /// Client-supplied total, trusted as-is
    pub total: String,
    pub item_count: u64,
    pub order_id: OrderId,
    pub placed_at: DateTime<Utc>,
    pub currency_symbol: String,
}

impl Order {
    /// Checks that `formData`, `cartItems` and `total` are present and derives
    /// line subtotals and the item count. Nothing else is validated.
    pub fn from_request(
        request: OrderRequest,
        currency_symbol: &str,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        let missing = || ServiceError::ValidationError(MISSING_ORDER_DATA.to_string());

        let data = request.order_data.ok_or_else(missing)?;
        let buyer = data.form_data.ok_or_else(missing)?;
        let cart_items = data.cart_items.ok_or_else(missing)?;
        let total = data
            .total
            .as_ref()
            .and_then(|t| t.to_display(currency_symbol))
            .ok_or_else(missing)?;

        let item_count: u64 = cart_items.iter().map(|i| u64::from(i.quantity)).sum();
        let items = cart_items
            .into_iter()
            .map(|item| LineItem::from_cart_item(item, currency_symbol))
            .collect();

        Ok(Self {
            buyer,
            items,
            total,
            item_count,
            order_id: OrderId::from_timestamp(placed_at),
            placed_at,
            currency_symbol: currency_symbol.to_string(),
        })
    }

    /// Sum of the line subtotals, saturating at `Decimal::MAX`/`Decimal::MIN`
    pub fn computed_total(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.subtotal))
    }

    /// Returns `(client, computed)` when the client total disagrees with the line items.
    pub fn total_mismatch(&self) -> Option<(Decimal, Decimal)> {
        let client = parse_price(&self.total, &self.currency_symbol);
        let computed = self.computed_total();
        (client.round_dp(2) != computed.round_dp(2)).then_some((client, computed))
    }

    pub fn shipping_address(&self) -> String {
        format!("{}, {}", self.buyer.address, self.buyer.city)
    }
}

/// Reads the amount out of a currency-prefixed price string.
///
/// Surrounding whitespace and one leading `currency_symbol` are dropped, then the
/// longest leading decimal number is read (`"$12.50/bottle"` reads as 12.50),
/// including an optional exponent (`"$1e2"` reads as 100).
/// A string with no readable number, or one out of range, yields zero.
pub fn parse_price(raw: &str, currency_symbol: &str) -> Decimal {
    let trimmed = raw.trim();
    let unprefixed = if currency_symbol.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(currency_symbol).unwrap_or(trimmed)
    }
    .trim_start();

    let mut chars = unprefixed.chars().peekable();
    let negative = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };

    let mut number = String::new();
    let mut seen_dot = false;
    while let Some(&c) = chars.peek() {
        match c {
            '0'..='9' => number.push(c),
            '.' if !seen_dot => {
                seen_dot = true;
                number.push(c);
            }
            _ => break,
        }
        chars.next();
    }

    if !number.chars().any(|c| c.is_ascii_digit()) {
        return Decimal::ZERO;
    }
    if number.starts_with('.') {
        number.insert(0, '0');
    }
    if number.ends_with('.') {
        number.pop();
    }

    let exponent = match chars.peek() {
        Some('e') | Some('E') => {
            chars.next();
            read_exponent(chars)
        }
        _ => 0,
    };

    let mantissa = match Decimal::from_str(&number) {
        Ok(value) => value,
        Err(_) => return Decimal::ZERO,
    };
    let value = scale_by_power_of_ten(mantissa, exponent).unwrap_or(Decimal::ZERO);
    if negative {
        -value
    } else {
        value
    }
}

/// Signed exponent digits after an `e`; a bare `e` contributes nothing.
fn read_exponent(chars: impl Iterator<Item = char>) -> i64 {
    let mut chars = chars.peekable();
    let sign = match chars.peek() {
        Some('-') => {
            chars.next();
            -1
        }
        Some('+') => {
            chars.next();
            1
        }
        _ => 1,
    };

    let mut exponent: i64 = 0;
    let mut seen_digit = false;
    for c in chars {
        match c.to_digit(10) {
            Some(d) => {
                seen_digit = true;
                exponent = exponent.saturating_mul(10).saturating_add(i64::from(d));
            }
            None => break,
        }
    }

    if seen_digit {
        sign * exponent
    } else {
        0
    }
}

/// `mantissa * 10^exponent`, or `None` when the result does not fit a `Decimal`.
fn scale_by_power_of_ten(mantissa: Decimal, exponent: i64) -> Option<Decimal> {
    const MAX_SHIFT: i64 = 64;
    let ten = Decimal::TEN;

    if mantissa.is_zero() {
        return Some(Decimal::ZERO);
    }
    if exponent > MAX_SHIFT {
        return None;
    }
    if exponent < -MAX_SHIFT {
        return Some(Decimal::ZERO);
    }

    let mut value = mantissa;
    if exponent >= 0 {
        for _ in 0..exponent {
            value = value.checked_mul(ten)?;
        }
    } else {
        for _ in 0..exponent.unsigned_abs() {
            value = value.checked_div(ten)?;
        }
    }
    Some(value)
}

/// `<symbol><amount>` with exactly two decimal places, halves rounded away from zero.
pub fn format_money(amount: Decimal, currency_symbol: &str) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("{}{}", currency_symbol, rounded)
}
