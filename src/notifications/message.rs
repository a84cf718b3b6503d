//! Text and HTML bodies for order notifications.

use crate::config::SellerConfig;
use crate::models::Order;

const ORDER_TIME_FORMAT: &str = "%d %b %Y, %H:%M UTC";

/// Keeps ASCII digits only.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `https://wa.me/<cc><last ten digits>`
pub fn whatsapp_link(phone: &str, country_code: &str) -> String {
    let digits = normalize_phone(phone);
    let local = &digits[digits.len().saturating_sub(10)..];
    format!("https://wa.me/{}{}", normalize_phone(country_code), local)
}

/// `Coconut Oil (2), Sesame Oil (1)`
pub fn product_summary(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| format!("{} ({})", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One `• Name (price x qty)` line per item
pub fn product_list(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| format!("• {} ({} x {})", item.name, item.price, item.quantity))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn buyer_sms(order: &Order, shop_name: &str) -> String {
    format!(
        "{shop} order confirmed!\nItems: {items}\nTotal: {total}\nOrder {id}. We'll ship soon.",
        shop = shop_name,
        items = product_summary(order),
        total = order.total,
        id = order.order_id,
    )
}

pub fn seller_sms(order: &Order) -> String {
    format!(
        "NEW ORDER {id}\n{name} ({phone})\nItems: {items}\nTotal: {total}",
        id = order.order_id,
        name = order.buyer.full_name,
        phone = order.buyer.phone,
        items = product_summary(order),
        total = order.total,
    )
}

pub fn buyer_whatsapp(order: &Order, shop_name: &str) -> String {
    format!(
        "ORDER CONFIRMED - {shop}\n\n\
         Your order:\n{list}\n\n\
         Total: {total}\n\
         Shipping to: {address}\n\n\
         Thank you for choosing {shop}! We will let you know when your order ships.",
        shop = shop_name,
        list = product_list(order),
        total = order.total,
        address = order.shipping_address(),
    )
}

pub fn seller_whatsapp(order: &Order) -> String {
    format!(
        "NEW ORDER RECEIVED\n\n\
         Customer: {name}\n\
         Phone: {phone}\n\
         Email: {email}\n\n\
         Products:\n{list}\n\n\
         Total: {total} ({count} items)\n\
         Address: {address}\n\n\
         Order time: {time}\n\
         Order ID: {id}",
        name = order.buyer.full_name,
        phone = order.buyer.phone,
        email = order.buyer.email,
        list = product_list(order),
        total = order.total,
        count = order.item_count,
        address = order.shipping_address(),
        time = order.placed_at.format(ORDER_TIME_FORMAT),
        id = order.order_id,
    )
}

pub fn seller_email_subject(order: &Order) -> String {
    format!("NEW ORDER: {} - {}", order.buyer.full_name, order.total)
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Order e-mail for the seller. Every buyer-supplied value is escaped.
pub fn seller_email_html(order: &Order, seller: &SellerConfig) -> String {
    let buyer = &order.buyer;
    let rows = order
        .items
        .iter()
        .map(|item| {
            let description = item
                .description
                .as_deref()
                .map(|d| format!("<br><small style=\"color:#6b7280\">{}</small>", escape_html(d)))
                .unwrap_or_default();
            format!(
                "<tr>\
                 <td style=\"padding:8px;border-bottom:1px solid #e5e7eb\">{name}{description}</td>\
                 <td style=\"padding:8px;border-bottom:1px solid #e5e7eb;text-align:center\">{qty}</td>\
                 <td style=\"padding:8px;border-bottom:1px solid #e5e7eb;text-align:right\">{price}</td>\
                 <td style=\"padding:8px;border-bottom:1px solid #e5e7eb;text-align:right\">{subtotal}</td>\
                 </tr>",
                name = escape_html(&item.name),
                description = description,
                qty = item.quantity,
                price = escape_html(&item.price),
                subtotal = item.subtotal_display,
            )
        })
        .collect::<String>();

    let phone_digits = normalize_phone(&buyer.phone);

    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:640px;margin:0 auto;color:#111827">
  <h2 style="background:#16a34a;color:#fff;padding:16px;margin:0">New order for {shop}</h2>
  <p style="margin:16px 0 4px">Order <strong>{order_id}</strong> placed {time}</p>
  <h3>Customer</h3>
  <p style="margin:0">{name}<br>{email}<br>{phone}</p>
  <h3>Items</h3>
  <table style="width:100%;border-collapse:collapse">
    <thead><tr>
      <th style="text-align:left;padding:8px">Product</th>
      <th style="padding:8px">Qty</th>
      <th style="text-align:right;padding:8px">Price</th>
      <th style="text-align:right;padding:8px">Subtotal</th>
    </tr></thead>
    <tbody>{rows}</tbody>
  </table>
  <p style="font-size:18px;text-align:right"><strong>Total: {total}</strong> ({count} items)</p>
  <h3>Ship to</h3>
  <p style="margin:0">{address}<br>{city} {zip}<br>{country}</p>
  <p style="margin-top:24px">
    <a href="mailto:{email}" style="background:#3b82f6;color:#fff;padding:10px 20px;text-decoration:none;border-radius:6px">Email customer</a>
    <a href="{wa_link}" style="background:#25d366;color:#fff;padding:10px 20px;text-decoration:none;border-radius:6px">WhatsApp</a>
    <a href="tel:{tel}" style="background:#10b981;color:#fff;padding:10px 20px;text-decoration:none;border-radius:6px">Call</a>
  </p>
</div>"#,
        shop = escape_html(&seller.name),
        order_id = order.order_id,
        time = order.placed_at.format(ORDER_TIME_FORMAT),
        name = escape_html(&buyer.full_name),
        email = escape_html(&buyer.email),
        phone = escape_html(&buyer.phone),
        rows = rows,
        total = escape_html(&order.total),
        count = order.item_count,
        address = escape_html(&buyer.address),
        city = escape_html(&buyer.city),
        zip = escape_html(&buyer.zip_code),
        country = escape_html(&buyer.country),
        wa_link = whatsapp_link(&buyer.phone, &seller.phone_country_code),
        tel = phone_digits,
    )
}
