//! Order and order-item types.
//!
//! An [`Order`] is a customer's purchase record; it exclusively owns its
//! [`OrderItem`]s (one per distinct product). The header keeps a denormalised
//! `products` map (product id to quantity) so listing pages never need the
//! item rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::OrderError;
use crate::ids::{ItemId, OrderId, ProductId, StockId, UserId};
use crate::status::{Actor, ItemStatus, OrderStatus};

/// A postal address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street address, first line.
    pub line1: String,

    /// Street address, second line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,

    /// City or locality.
    pub city: String,

    /// Postal or ZIP code.
    pub postal_code: String,

    /// ISO country code.
    pub country: String,
}

/// How the order is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Standard carrier delivery.
    Standard,

    /// Express carrier delivery.
    Express,

    /// Customer pickup at a store.
    Pickup,
}

/// One line of a checkout cart.
///
/// The caller chooses which of the product's stock rows the line consumes;
/// the store never picks a variant on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product being purchased.
    pub product_id: ProductId,

    /// The stock row (variant) the quantity is drawn from.
    pub stock_id: StockId,

    /// Units purchased. Must be greater than zero.
    pub quantity: u32,
}

/// A checkout payload: the cart snapshot plus delivery details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Cart lines. Lines repeating a product are merged at checkout.
    pub lines: Vec<CartLine>,

    /// ISO currency code for the order total.
    pub currency: String,

    /// Delivery address.
    pub address: Address,

    /// Delivery method.
    pub delivery: DeliveryMethod,
}

impl OrderDraft {
    /// Validate the draft and merge lines that repeat a product.
    ///
    /// Lines for the same product must target the same stock row; the
    /// order flow keeps one item per product, and an item restores stock
    /// to a single row when cancelled.
    ///
    /// # Errors
    ///
    /// - [`OrderError::EmptyCart`] when there are no lines.
    /// - [`OrderError::InvalidQuantity`] when a line has quantity zero.
    /// - [`OrderError::ConflictingStockRow`] when two lines for one
    ///   product name different stock rows.
    pub fn merged_lines(&self) -> Result<Vec<CartLine>, OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut merged: BTreeMap<ProductId, CartLine> = BTreeMap::new();
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id.to_string(),
                });
            }
            match merged.entry(line.product_id) {
                Entry::Vacant(slot) => {
                    slot.insert(*line);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    if existing.stock_id != line.stock_id {
                        return Err(OrderError::ConflictingStockRow {
                            product_id: line.product_id.to_string(),
                        });
                    }
                    existing.quantity += line.quantity;
                }
            }
        }

        Ok(merged.into_values().collect())
    }
}

/// A customer's purchase record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Sequential order id.
    pub id: OrderId,

    /// The customer who placed the order.
    pub user_id: UserId,

    /// Product id to purchased quantity, denormalised from the items.
    pub products: BTreeMap<ProductId, u32>,

    /// Order total in cents.
    pub total_cents: i64,

    /// ISO currency code.
    pub currency: String,

    /// Lifecycle state.
    pub status: OrderStatus,

    /// Delivery address captured at checkout.
    pub address: Address,

    /// Delivery method.
    pub delivery: DeliveryMethod,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,

    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create an empty order header in the `New` state.
    #[must_use]
    pub fn new(
        id: OrderId,
        user_id: UserId,
        currency: String,
        address: Address,
        delivery: DeliveryMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            products: BTreeMap::new(),
            total_cents: 0,
            currency,
            status: OrderStatus::New,
            address,
            delivery,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a purchased line on the header.
    pub fn add_line(&mut self, product_id: ProductId, quantity: u32, subtotal_cents: i64) {
        *self.products.entry(product_id).or_insert(0) += quantity;
        self.total_cents += subtotal_cents;
        self.updated_at = Utc::now();
    }

    /// Move the order to `next`, validating against the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] for transitions outside
    /// the table.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        self.status = self.status.transition_to(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// One product line within an order, with its own lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Sequential item id.
    pub id: ItemId,

    /// The owning order.
    pub order_id: OrderId,

    /// The purchased product.
    pub product_id: ProductId,

    /// The stock row the quantity was drawn from (and is restored to).
    pub stock_id: StockId,

    /// Units purchased.
    pub quantity: u32,

    /// Unit price in cents at purchase time.
    pub unit_price_cents: i64,

    /// `unit_price_cents * quantity`.
    pub subtotal_cents: i64,

    /// Lifecycle state.
    pub status: ItemStatus,

    /// Why the item reached a terminal state, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    /// Who moved the item to its current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_actor: Option<Actor>,

    /// When the item was created.
    pub created_at: DateTime<Utc>,

    /// When the item was last updated.
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Create a new item in the `Placed` state.
    #[must_use]
    pub fn new(
        id: ItemId,
        order_id: OrderId,
        product_id: ProductId,
        stock_id: StockId,
        quantity: u32,
        unit_price_cents: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_id,
            product_id,
            stock_id,
            quantity,
            unit_price_cents,
            subtotal_cents: i64::from(quantity) * unit_price_cents,
            status: ItemStatus::Placed,
            status_reason: None,
            status_actor: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold additional units into the item, keeping the subtotal in step.
    pub fn merge_quantity(&mut self, extra: u32) {
        self.quantity += extra;
        self.subtotal_cents = i64::from(self.quantity) * self.unit_price_cents;
        self.updated_at = Utc::now();
    }

    /// Move the item to `next`, recording reason and actor.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] for transitions outside
    /// the table.
    pub fn transition(
        &mut self,
        next: ItemStatus,
        reason: Option<String>,
        actor: Option<Actor>,
    ) -> Result<(), OrderError> {
        self.status = self.status.transition_to(next)?;
        self.status_reason = reason;
        self.status_actor = actor;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Per-item outcome report for a whole-order cancellation.
///
/// Item outcomes are independent: one item failing to restore its stock
/// does not abort cancellation of the remaining items, it only shows up
/// in `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReport {
    /// The order the report describes.
    pub order_id: OrderId,

    /// Items cancelled and their stock restored.
    pub cancelled: Vec<ItemId>,

    /// Items skipped because they were no longer cancellable.
    pub skipped: Vec<ItemId>,

    /// Items whose cancellation failed, with the reason.
    pub failed: Vec<ItemFailure>,

    /// The order header's status after the sweep.
    pub order_status: OrderStatus,
}

impl CancelReport {
    /// Check whether any item failed to cancel.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// A single failed item inside a [`CancelReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The item that failed.
    pub item_id: ItemId,

    /// Human-readable failure reason.
    pub reason: String,
}
