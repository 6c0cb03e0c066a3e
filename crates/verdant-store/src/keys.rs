//! Key encoding utilities for `RocksDB`.
//!
//! Sequential ids (`OD…`, `IT…`) are stored as their string bytes: the
//! sequence start keeps them at a fixed width, so byte order matches
//! numeric order and prefix scans return items in creation order.

use verdant_core::{ItemId, OrderId, ProductId, StockId, UserId};

/// Counter record name for the order id sequence.
pub const ORDER_SEQ: &str = "order_seq";

/// Counter record name for the order-item id sequence.
pub const ITEM_SEQ: &str = "item_seq";

/// Create an order key from an order id.
#[must_use]
pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    order_id.to_string().into_bytes()
}

/// Create an order-item key from an item id.
#[must_use]
pub fn item_key(item_id: &ItemId) -> Vec<u8> {
    item_id.to_string().into_bytes()
}

/// Create an items-by-order index key.
///
/// Format: `order_id || item_id` (both as id strings). Item ids are
/// sequential, so a prefix scan yields a given order's items in creation
/// order.
#[must_use]
pub fn items_by_order_key(order_id: &OrderId, item_id: &ItemId) -> Vec<u8> {
    let mut key = order_key(order_id);
    key.extend_from_slice(item_id.to_string().as_bytes());
    key
}

/// Create a prefix for iterating all items of an order.
#[must_use]
pub fn items_by_order_prefix(order_id: &OrderId) -> Vec<u8> {
    order_key(order_id)
}

/// Extract the item id from an items-by-order index key.
///
/// Returns `None` when the suffix does not parse; callers skip such keys.
#[must_use]
pub fn extract_item_id(key: &[u8], prefix_len: usize) -> Option<ItemId> {
    let suffix = key.get(prefix_len..)?;
    std::str::from_utf8(suffix).ok()?.parse().ok()
}

/// Create an orders-by-user index key.
///
/// Format: `user_id (16 bytes) || order_id`. Order ids are sequential, so
/// a prefix scan yields a user's orders oldest first.
#[must_use]
pub fn orders_by_user_key(user_id: &UserId, order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 12);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(order_id.to_string().as_bytes());
    key
}

/// Create a prefix for iterating all orders of a user.
#[must_use]
pub fn orders_by_user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the order id from an orders-by-user index key.
///
/// Returns `None` when the suffix does not parse; callers skip such keys.
#[must_use]
pub fn extract_order_id(key: &[u8], prefix_len: usize) -> Option<OrderId> {
    let suffix = key.get(prefix_len..)?;
    std::str::from_utf8(suffix).ok()?.parse().ok()
}

/// Create a product key from a product id.
#[must_use]
pub fn product_key(product_id: &ProductId) -> Vec<u8> {
    product_id.as_bytes().to_vec()
}

/// Create a stock key from a stock id.
#[must_use]
pub fn stock_key(stock_id: &StockId) -> Vec<u8> {
    stock_id.as_bytes().to_vec()
}

/// Create a stocks-by-product index key.
///
/// Format: `product_id (16 bytes) || stock_id (16 bytes)`.
#[must_use]
pub fn stocks_by_product_key(product_id: &ProductId, stock_id: &StockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(product_id.as_bytes());
    key.extend_from_slice(stock_id.as_bytes());
    key
}

/// Create a prefix for iterating all stock rows of a product.
#[must_use]
pub fn stocks_by_product_prefix(product_id: &ProductId) -> Vec<u8> {
    product_id.as_bytes().to_vec()
}

/// Extract the stock id from a stocks-by-product index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_stock_id(key: &[u8]) -> StockId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    StockId::from_uuid(uuid::Uuid::from_bytes(bytes))
}

/// Create an account key from a user id.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a counter key from a counter name.
#[must_use]
pub fn counter_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}
