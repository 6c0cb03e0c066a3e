//! `RocksDB` storage layer for the Verdant storefront.
//!
//! This crate provides persistent storage for orders, order items, stock
//! rows, products, and accounts using `RocksDB` with column families for
//! efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `orders`: Order headers, keyed by order id (`OD…`)
//! - `order_items`: Order items, keyed by item id (`IT…`)
//! - `items_by_order`: Index for listing an order's items
//! - `orders_by_user`: Index for listing a user's orders
//! - `products` / `stocks` / `stocks_by_product`: Catalog records
//! - `accounts`: Account profiles, keyed by `user_id`
//! - `counters`: Sequence counter records for id generation
//!
//! All order-flow mutations run inside pessimistic transactions: stock
//! deltas and id allocation take row locks, and a multi-item checkout
//! commits the order header, its items, and every stock decrement
//! atomically or not at all.
//!
//! # Example
//!
//! ```no_run
//! use verdant_store::{RocksStore, Store};
//! use verdant_core::{Product, Stock};
//!
//! let store = RocksStore::open("/tmp/verdant-db").unwrap();
//!
//! let product = Product::new("Hemp overshirt".into(), "outerwear".into(), 8900);
//! store.put_product(&product).unwrap();
//!
//! let stock = Stock::new(product.id, "M".into(), 12, 8900);
//! store.put_stock(&stock).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use verdant_core::{
    Account, Actor, CancelReport, CartLine, ItemId, Order, OrderDraft, OrderId, OrderItem,
    OrderStatus, Product, ProductId, Stock, StockId, UserId,
};

/// The storage trait defining all database operations.
///
/// This trait is the dependency bundle the order flow receives: every
/// component (id generation, stock ledger, item writer, order writer,
/// cancellation) is reached through it rather than through globals, so
/// alternative implementations can be substituted in tests.
pub trait Store: Send + Sync {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Insert or update a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_product(&self, product: &Product) -> Result<()>;

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// List catalog entries, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_products(&self, limit: usize, offset: usize) -> Result<Vec<Product>>;

    /// Insert or update a stock row.
    ///
    /// This also maintains the product index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_stock(&self, stock: &Stock) -> Result<()>;

    /// Get a stock row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_stock(&self, stock_id: &StockId) -> Result<Option<Stock>>;

    /// List all stock rows for a product (one per variant).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn stocks_by_product(&self, product_id: &ProductId) -> Result<Vec<Stock>>;

    /// Apply a signed delta to a stock row's quantity atomically.
    ///
    /// Returns the new quantity. Negative delta = consumption, positive
    /// delta = restoration. Concurrent deltas against the same row
    /// serialize under the row lock; there are no lost updates.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the stock row doesn't exist.
    /// - `StoreError::InsufficientStock` if the delta would drive the
    ///   quantity below zero.
    fn adjust_stock(&self, stock_id: &StockId, delta: i64) -> Result<i64>;

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    // =========================================================================
    // Identifier Generation
    // =========================================================================

    /// Allocate the next order id.
    ///
    /// Ids are strictly increasing across concurrent callers: the counter
    /// record is read-modify-written under its row lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the
    /// transaction exhausts its retries.
    fn allocate_order_id(&self) -> Result<OrderId>;

    /// Allocate the next order-item id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the
    /// transaction exhausts its retries.
    fn allocate_item_id(&self) -> Result<ItemId>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Create an order from a checkout draft, atomically.
    ///
    /// One transaction allocates the order id, decrements every stock row,
    /// writes the items, and writes the header: either the whole order and
    /// all its decremented stock commit, or nothing does.
    ///
    /// # Errors
    ///
    /// - `StoreError::Invalid` for an empty cart or a zero quantity.
    /// - `StoreError::NotFound` if a product or stock row doesn't exist.
    /// - `StoreError::InsufficientStock` if any line cannot be satisfied
    ///   (no partial orders are left behind).
    fn create_order(&self, user_id: UserId, draft: &OrderDraft) -> Result<Order>;

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_orders_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Order>>;

    /// List an order's items in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn items_by_order(&self, order_id: &OrderId) -> Result<Vec<OrderItem>>;

    /// Get an order item by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order_item(&self, item_id: &ItemId) -> Result<Option<OrderItem>>;

    /// Add a cart line to an existing order, or grow the matching item.
    ///
    /// If the order already has an item for the line's product, the
    /// quantities merge; otherwise a fresh item id is allocated. The item
    /// lookup, the id allocation, and the stock decrement are one unit of
    /// work: if the decrement fails, no item is created or updated.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order, product, or stock row
    ///   doesn't exist.
    /// - `StoreError::InsufficientStock` if the line cannot be satisfied.
    /// - `StoreError::Invalid` if the order is no longer amendable or the
    ///   line targets a different stock row than the existing item.
    fn add_or_update_order_item(&self, order_id: &OrderId, line: &CartLine) -> Result<OrderItem>;

    /// Advance an order (and its live items) to `Packed`, `Shipped`, or
    /// `Delivered`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order doesn't exist.
    /// - `StoreError::InvalidTransition` if the move is outside the
    ///   transition table.
    /// - `StoreError::Invalid` for targets owned by the cancel/return
    ///   operations.
    fn advance_order_status(&self, order_id: &OrderId, next: OrderStatus) -> Result<Order>;

    /// Cancel one order item: restore its stock and mark it `Cancelled`.
    ///
    /// If every item of the order ends up cancelled, the order header
    /// moves to `Cancelled` in the same transaction.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the item or its stock row doesn't
    ///   exist (the item is left untouched).
    /// - `StoreError::InvalidTransition` if the item is past the
    ///   cancellable window.
    fn cancel_order_item(&self, item_id: &ItemId, reason: &str, actor: Actor)
        -> Result<OrderItem>;

    /// Return one order item: restore its stock and mark it `Returned`.
    ///
    /// Identical to cancellation for stock purposes; the distinct terminal
    /// status feeds refund workflows downstream.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the item or its stock row doesn't
    ///   exist.
    /// - `StoreError::InvalidTransition` if the item has not shipped yet.
    fn return_order_item(&self, item_id: &ItemId, reason: &str, actor: Actor)
        -> Result<OrderItem>;

    /// Cancel every still-cancellable item of an order.
    ///
    /// Item outcomes are independent: a failure on one item (for example a
    /// deleted stock row) is recorded in the report and the sweep
    /// continues. The order header becomes `Cancelled` once every item is.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order doesn't exist;
    /// per-item failures are reported, not returned.
    fn cancel_order(&self, order_id: &OrderId, reason: &str, actor: Actor) -> Result<CancelReport>;
}
