pub mod order;

pub use order::{
    format_money, parse_price, BuyerInfo, CartItem, LineItem, Order, OrderData, OrderId,
    OrderRequest, OrderTotal,
};
