//! Order handlers: checkout, history, amendment, cancellation, return,
//! and fulfilment status progression.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use verdant_core::{
    Actor, Address, CancelReport, CartLine, DeliveryMethod, ItemId, Order, OrderDraft, OrderId,
    OrderItem, OrderStatus,
};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Checkout request: the cart snapshot plus delivery details.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Cart lines.
    pub lines: Vec<CartLine>,
    /// ISO currency code; the service default applies when omitted.
    #[serde(default)]
    pub currency: Option<String>,
    /// Delivery address.
    pub address: Address,
    /// Delivery method.
    pub delivery: DeliveryMethod,
}

/// Order response.
#[derive(Debug, Serialize)]
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
    /// Delivery method.
    pub delivery: DeliveryMethod,
    /// Delivery address.
    pub address: Address,
    /// When the order was placed.
    pub created_at: String,
    /// When the order was last updated.
    pub updated_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status.to_string(),
            products: order
                .products
                .iter()
                .map(|(id, quantity)| (id.to_string(), *quantity))
                .collect(),
            total_cents: order.total_cents,
            total_formatted: format!(
                "{:.2} {}",
                order.total_cents as f64 / 100.0,
                order.currency
            ),
            currency: order.currency.clone(),
            delivery: order.delivery,
            address: order.address.clone(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

/// Order item response.
#[derive(Debug, Serialize)]
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Who moved the item to its current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_actor: Option<String>,
    /// When the item was created.
    pub created_at: String,
}

impl From<&OrderItem> for ItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id.to_string(),
            order_id: item.order_id.to_string(),
            product_id: item.product_id.to_string(),
            stock_id: item.stock_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            subtotal_cents: item.subtotal_cents,
            status: item.status.to_string(),
            status_reason: item.status_reason.clone(),
            status_actor: item.status_actor.map(|a| a.to_string()),
            created_at: item.created_at.to_rfc3339(),
        }
    }
}

/// Checkout: create an order from the cart snapshot.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    if body.lines.is_empty() {
        return Err(ApiError::BadRequest("Cart is empty".into()));
    }

    let draft = OrderDraft {
        lines: body.lines,
        currency: body
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        address: body.address,
        delivery: body.delivery,
    };

    let order = state.store.create_order(auth.user_id, &draft)?;

    tracing::info!(
        user_id = %auth.user_id,
        order_id = %order.id,
        total_cents = order.total_cents,
        "Checkout completed"
    );

    Ok(Json(OrderResponse::from(&order)))
}

/// Order list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Maximum number of orders to return (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Order list response.
#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    /// Orders (newest first).
    pub orders: Vec<OrderResponse>,
    /// Whether there are more orders.
    pub has_more: bool,
}

/// List the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let orders = state
        .store
        .list_orders_by_user(&auth.user_id, limit + 1, query.offset)?;

    let has_more = orders.len() > limit;
    let orders: Vec<_> = orders.iter().take(limit).map(OrderResponse::from).collect();

    Ok(Json(ListOrdersResponse { orders, has_more }))
}

/// Get one of the caller's orders.
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = load_owned_order(&state, &order_id, &auth)?;
    Ok(Json(OrderResponse::from(&order)))
}

/// List an order's items.
pub async fn list_order_items(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    load_owned_order(&state, &order_id, &auth)?;

    let items = state.store.items_by_order(&order_id)?;
    Ok(Json(items.iter().map(ItemResponse::from).collect()))
}

/// Add a cart line to an order, or grow the matching item.
pub async fn add_order_item(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(line): Json<CartLine>,
) -> Result<Json<ItemResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    load_owned_order(&state, &order_id, &auth)?;

    let item = state.store.add_or_update_order_item(&order_id, &line)?;

    tracing::info!(
        order_id = %order_id,
        item_id = %item.id,
        quantity = item.quantity,
        "Order line added"
    );

    Ok(Json(ItemResponse::from(&item)))
}

/// Cancellation/return request body.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Why the order or item is being cancelled or returned.
    pub reason: String,
}

/// Whole-order cancellation report response.
#[derive(Debug, Serialize)]
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
    pub failed: Vec<FailedItemResponse>,
}

/// A single failed item in a cancellation report.
#[derive(Debug, Serialize)]
pub struct FailedItemResponse {
    /// The item that failed.
    pub item_id: String,
    /// Human-readable failure reason.
    pub reason: String,
}

impl From<&CancelReport> for CancelReportResponse {
    fn from(report: &CancelReport) -> Self {
        Self {
            order_id: report.order_id.to_string(),
            order_status: report.order_status.to_string(),
            cancelled: report.cancelled.iter().map(ToString::to_string).collect(),
            skipped: report.skipped.iter().map(ToString::to_string).collect(),
            failed: report
                .failed
                .iter()
                .map(|f| FailedItemResponse {
                    item_id: f.item_id.to_string(),
                    reason: f.reason.clone(),
                })
                .collect(),
        }
    }
}

/// Cancel a whole order, item by item.
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    admin: Option<AdminAuth>,
    auth: Option<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<CancelReportResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let actor = order_actor(&state, &order_id, admin.is_some(), auth.as_ref())?;

    let report = state.store.cancel_order(&order_id, &body.reason, actor)?;

    if report.has_failures() {
        tracing::warn!(
            order_id = %order_id,
            failed = report.failed.len(),
            "Order cancellation completed with failures"
        );
    } else {
        tracing::info!(
            order_id = %order_id,
            cancelled = report.cancelled.len(),
            skipped = report.skipped.len(),
            "Order cancellation completed"
        );
    }

    Ok(Json(CancelReportResponse::from(&report)))
}

/// Status progression request (pack/ship/deliver).
#[derive(Debug, Deserialize)]
pub struct AdvanceOrderRequest {
    /// Target status. Unrecognized values are rejected outright.
    pub status: OrderStatus,
}

/// Advance an order through pack/ship/deliver (back-office only).
pub async fn advance_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<AdvanceOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.store.advance_order_status(&order_id, body.status)?;

    tracing::info!(order_id = %order_id, status = %order.status, "Order status advanced");

    Ok(Json(OrderResponse::from(&order)))
}

/// Cancel one order item: restore its stock and mark it cancelled.
pub async fn cancel_item(
    State(state): State<Arc<AppState>>,
    admin: Option<AdminAuth>,
    auth: Option<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let actor = item_actor(&state, &item_id, admin.is_some(), auth.as_ref())?;

    let item = state
        .store
        .cancel_order_item(&item_id, &body.reason, actor)?;

    tracing::info!(item_id = %item_id, actor = %actor, "Order item cancelled");

    Ok(Json(ItemResponse::from(&item)))
}

/// Return one order item after delivery.
pub async fn return_item(
    State(state): State<Arc<AppState>>,
    admin: Option<AdminAuth>,
    auth: Option<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let actor = item_actor(&state, &item_id, admin.is_some(), auth.as_ref())?;

    let item = state
        .store
        .return_order_item(&item_id, &body.reason, actor)?;

    tracing::info!(item_id = %item_id, actor = %actor, "Order item returned");

    Ok(Json(ItemResponse::from(&item)))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid order id".into()))
}

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid order item id".into()))
}

/// Load an order and verify the caller owns it.
///
/// A foreign order reads as not-found so the endpoint doesn't leak which
/// ids exist.
fn load_owned_order(
    state: &AppState,
    order_id: &OrderId,
    auth: &AuthUser,
) -> Result<Order, ApiError> {
    let order = state
        .store
        .get_order(order_id)?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {order_id}")))?;

    if order.user_id != auth.user_id {
        return Err(ApiError::NotFound(format!("order not found: {order_id}")));
    }
    Ok(order)
}

/// Resolve the acting party for an order-level mutation.
fn order_actor(
    state: &AppState,
    order_id: &OrderId,
    is_admin: bool,
    auth: Option<&AuthUser>,
) -> Result<Actor, ApiError> {
    if is_admin {
        return Ok(Actor::Admin);
    }
    let auth = auth.ok_or(ApiError::Unauthorized)?;
    load_owned_order(state, order_id, auth)?;
    Ok(Actor::User)
}

/// Resolve the acting party for an item-level mutation.
fn item_actor(
    state: &AppState,
    item_id: &ItemId,
    is_admin: bool,
    auth: Option<&AuthUser>,
) -> Result<Actor, ApiError> {
    if is_admin {
        return Ok(Actor::Admin);
    }
    let auth = auth.ok_or(ApiError::Unauthorized)?;

    let item = state
        .store
        .get_order_item(item_id)?
        .ok_or_else(|| ApiError::NotFound(format!("order item not found: {item_id}")))?;
    let order = state
        .store
        .get_order(&item.order_id)?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {}", item.order_id)))?;

    if order.user_id != auth.user_id {
        return Err(ApiError::NotFound(format!(
            "order item not found: {item_id}"
        )));
    }
    Ok(Actor::User)
}
