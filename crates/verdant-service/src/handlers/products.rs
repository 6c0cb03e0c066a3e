//! Catalog handlers: products and stock rows.
//!
//! Reads are public (the storefront browses without signing in); writes
//! require the admin API key.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use verdant_core::{Product, ProductId, Stock, StockId};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Product response.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Long description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category slug.
    pub category: String,
    /// Listed price in cents.
    pub price_cents: i64,
    /// Listed price formatted for display.
    pub price_formatted: String,
    /// Image URLs.
    pub images: Vec<String>,
    /// When the product was created.
    pub created_at: String,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            price_cents: product.price_cents,
            price_formatted: format!("{:.2}", product.price_cents as f64 / 100.0),
            images: product.images.clone(),
            created_at: product.created_at.to_rfc3339(),
        }
    }
}

/// Stock row response.
#[derive(Debug, Serialize)]
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
    /// When the row was last updated.
    pub updated_at: String,
}

impl From<&Stock> for StockResponse {
    fn from(stock: &Stock) -> Self {
        Self {
            id: stock.id.to_string(),
            product_id: stock.product_id.to_string(),
            label: stock.label.clone(),
            quantity: stock.quantity,
            price_cents: stock.price_cents,
            updated_at: stock.updated_at.to_rfc3339(),
        }
    }
}

/// Product list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    /// Maximum number of products to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Product list response.
#[derive(Debug, Serialize)]
pub struct ListProductsResponse {
    /// Products, sorted by name.
    pub products: Vec<ProductResponse>,
    /// Whether there are more products.
    pub has_more: bool,
}

/// List catalog entries.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ListProductsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let products = state.store.list_products(limit + 1, query.offset)?;

    let has_more = products.len() > limit;
    let products: Vec<_> = products
        .iter()
        .take(limit)
        .map(ProductResponse::from)
        .collect();

    Ok(Json(ListProductsResponse { products, has_more }))
}

/// Get one catalog entry.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .store
        .get_product(&product_id)?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;

    Ok(Json(ProductResponse::from(&product)))
}

/// List a product's stock rows (one per variant).
pub async fn list_product_stocks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StockResponse>>, ApiError> {
    let product_id = parse_product_id(&id)?;
    if state.store.get_product(&product_id)?.is_none() {
        return Err(ApiError::NotFound(format!(
            "product not found: {product_id}"
        )));
    }

    let stocks = state.store.stocks_by_product(&product_id)?;
    Ok(Json(stocks.iter().map(StockResponse::from).collect()))
}

/// Create product request.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    /// Display name.
    pub name: String,
    /// Long description.
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

/// Create a catalog entry (back-office only).
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(body): Json<CreateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Product name is required".into()));
    }
    if body.price_cents <= 0 {
        return Err(ApiError::BadRequest("Price must be positive".into()));
    }

    let mut product = Product::new(body.name, body.category, body.price_cents);
    if let Some(description) = body.description {
        product = product.with_description(description);
    }
    if !body.images.is_empty() {
        product = product.with_images(body.images);
    }

    state.store.put_product(&product)?;

    tracing::info!(product_id = %product.id, name = %product.name, "Product created");

    Ok(Json(ProductResponse::from(&product)))
}

/// Create stock request.
#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    /// Variant label (e.g. "M", "38").
    pub label: String,
    /// Initial units on hand.
    pub quantity: i64,
    /// Variant price in cents; defaults to the product's listed price.
    #[serde(default)]
    pub price_cents: Option<i64>,
}

/// Create a stock row for a product (back-office only).
pub async fn create_stock(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<CreateStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .store
        .get_product(&product_id)?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;

    if body.quantity < 0 {
        return Err(ApiError::BadRequest("Quantity cannot be negative".into()));
    }

    let stock = Stock::new(
        product_id,
        body.label,
        body.quantity,
        body.price_cents.unwrap_or(product.price_cents),
    );
    state.store.put_stock(&stock)?;

    tracing::info!(
        product_id = %product_id,
        stock_id = %stock.id,
        quantity = stock.quantity,
        "Stock row created"
    );

    Ok(Json(StockResponse::from(&stock)))
}

/// Stock adjustment request.
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Signed delta: negative consumes, positive restores or restocks.
    pub delta: i64,
}

/// Apply a signed delta to a stock row (back-office only).
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<AdjustStockRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stock_id = parse_stock_id(&id)?;
    let quantity = state.store.adjust_stock(&stock_id, body.delta)?;

    tracing::info!(
        stock_id = %stock_id,
        delta = body.delta,
        quantity,
        "Stock adjusted"
    );

    Ok(Json(serde_json::json!({
        "stock_id": stock_id.to_string(),
        "quantity": quantity
    })))
}

fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid product id".into()))
}

fn parse_stock_id(raw: &str) -> Result<StockId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid stock id".into()))
}
