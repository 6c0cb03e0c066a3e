//! Request and response types for the verdant client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One cart line of a checkout or amendment.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineInput {
    /// Product id.
    pub product_id: String,
    /// Stock row (variant) the quantity is drawn from.
    pub stock_id: String,
    /// Units to purchase.
    pub quantity: u32,
}

/// Delivery address for a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct AddressInput {
    /// Street address, first line.
    pub line1: String,
    /// Street address, second line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City or locality.
    pub city: String,
    /// Postal or ZIP code.
    pub postal_code: String,
    /// ISO country code.
    pub country: String,
}

/// Checkout request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Cart lines.
    pub lines: Vec<CartLineInput>,
    /// ISO currency code; the service default applies when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Delivery address.
    pub address: AddressInput,
    /// Delivery method ("standard", "express", "pickup").
    pub delivery: String,
}

/// Order response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    /// Order id.
    pub id: String,
    /// Lifecycle status.
    pub status: String,
    /// Product id to purchased quantity.
    pub products: BTreeMap<String, u32>,
    /// Order total in cents.
    pub total_cents: i64,
    /// Order total formatted for display.
    pub total_formatted: String,
    /// ISO currency code.
    pub currency: String,
    /// When the order was placed.
    pub created_at: String,
}

/// Order list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersResponse {
    /// Orders (newest first).
    pub orders: Vec<OrderResponse>,
    /// Whether there are more orders.
    pub has_more: bool,
}

/// Order item response.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    /// Item id.
    pub id: String,
    /// Owning order id.
    pub order_id: String,
    /// Product id.
    pub product_id: String,
    /// Stock row the quantity was drawn from.
    pub stock_id: String,
    /// Units purchased.
    pub quantity: u32,
    /// Unit price in cents at purchase time.
    pub unit_price_cents: i64,
    /// Line subtotal in cents.
    pub subtotal_cents: i64,
    /// Lifecycle status.
    pub status: String,
    /// Why the item reached a terminal state, if it did.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Who moved the item to its current state.
    #[serde(default)]
    pub status_actor: Option<String>,
}

/// Whole-order cancellation report.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelReportResponse {
    /// The order the report describes.
    pub order_id: String,
    /// The order header's status after the sweep.
    pub order_status: String,
    /// Items cancelled and their stock restored.
    pub cancelled: Vec<String>,
    /// Items skipped because they were no longer cancellable.
    pub skipped: Vec<String>,
    /// Items whose cancellation failed, with the reason.
    pub failed: Vec<FailedItem>,
}

/// A single failed item inside a cancellation report.
#[derive(Debug, Clone, Deserialize)]
pub struct FailedItem {
    /// The item that failed.
    pub item_id: String,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Product response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductResponse {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Long description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Category slug.
    pub category: String,
    /// Listed price in cents.
    pub price_cents: i64,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Product list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListProductsResponse {
    /// Products, sorted by name.
    pub products: Vec<ProductResponse>,
    /// Whether there are more products.
    pub has_more: bool,
}

/// Stock row response.
#[derive(Debug, Clone, Deserialize)]
pub struct StockResponse {
    /// Stock row id.
    pub id: String,
    /// Owning product id.
    pub product_id: String,
    /// Variant label.
    pub label: String,
    /// Units on hand.
    pub quantity: i64,
    /// Variant price in cents.
    pub price_cents: i64,
}

/// Create product request (back-office).
#[derive(Debug, Clone, Serialize)]
pub struct CreateProductRequest {
    /// Display name.
    pub name: String,
    /// Long description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category slug.
    pub category: String,
    /// Listed price in cents.
    pub price_cents: i64,
    /// Image URLs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Create stock request (back-office).
#[derive(Debug, Clone, Serialize)]
pub struct CreateStockRequest {
    /// Variant label.
    pub label: String,
    /// Initial units on hand.
    pub quantity: i64,
    /// Variant price in cents; defaults to the product's listed price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
}

/// Account profile response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    /// The user id.
    pub user_id: String,
    /// Contact email.
    pub email: String,
    /// Display name, if set.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Account update request.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateAccountRequest {
    /// Contact email.
    pub email: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Default delivery address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_address: Option<AddressInput>,
}

/// Error body returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// The error payload.
    pub error: ApiErrorBody,
}

/// Inner error payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details, if any.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
