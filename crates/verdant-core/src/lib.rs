//! Core types for the Verdant storefront order service.
//!
//! This crate provides the foundational types used throughout the platform:
//!
//! - **Identifiers**: `OrderId`, `ItemId`, `ProductId`, `StockId`, `UserId`
//! - **Orders**: `Order`, `OrderItem`, `OrderDraft`, `CancelReport`
//! - **Catalog**: `Product`, `Stock`
//! - **Status**: `OrderStatus`, `ItemStatus`, `Actor`
//! - **Accounts**: `Account`
//!
//! # Money
//!
//! All monetary amounts are integer cents (`i64`) to avoid floating point
//! precision issues. A line's subtotal is `unit_price_cents * quantity`.
//!
//! # Order identifiers
//!
//! Order and order-item ids are sequential, human-readable strings
//! (`OD1000000001`, `IT1000000001`). The sequence starts at
//! [`ids::SEQUENCE_START`], which keeps every id at the same width for the
//! realistic lifetime of a store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod ids;
pub mod order;
pub mod product;
pub mod status;

pub use account::Account;
pub use error::OrderError;
pub use ids::{
    max_sequence, IdError, ItemId, OrderId, ProductId, StockId, UserId, ITEM_ID_PREFIX,
    ORDER_ID_PREFIX, SEQUENCE_START,
};
pub use order::{
    Address, CancelReport, CartLine, DeliveryMethod, ItemFailure, Order, OrderDraft, OrderItem,
};
pub use product::{Product, Stock};
pub use status::{Actor, ItemStatus, OrderStatus};
