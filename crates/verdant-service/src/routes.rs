//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{account, health, orders, products};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for order endpoints.
/// Checkout and cancellation contend on stock row locks, so they are
/// bounded separately from catalog reads.
const ORDER_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Orders (bearer auth; admin key for status progression)
/// - `POST /v1/orders` - Checkout
/// - `GET  /v1/orders` - List the caller's orders (newest first)
/// - `GET  /v1/orders/{id}` - Get one order
/// - `GET  /v1/orders/{id}/items` - List an order's items
/// - `POST /v1/orders/{id}/items` - Add or grow a line on an order
/// - `POST /v1/orders/{id}/cancel` - Cancel the whole order
/// - `POST /v1/orders/{id}/status` - Advance pack/ship/deliver
///
/// ## Items (bearer auth or admin key)
/// - `POST /v1/items/{id}/cancel` - Cancel one item
/// - `POST /v1/items/{id}/return` - Return one item
///
/// ## Catalog (public reads, admin key writes)
/// - `GET  /v1/products`, `GET /v1/products/{id}`
/// - `GET  /v1/products/{id}/stocks`
/// - `POST /v1/products`, `POST /v1/products/{id}/stocks`
/// - `POST /v1/stocks/{id}/adjust`
///
/// ## Account (bearer auth)
/// - `GET /v1/account`, `PUT /v1/account`
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Order routes get their own concurrency bound: every request in this
    // group takes row locks in the store.
    let order_routes = Router::new()
        .route("/", get(orders::list_orders).post(orders::create_order))
        .route("/:id", get(orders::get_order))
        .route(
            "/:id/items",
            get(orders::list_order_items).post(orders::add_order_item),
        )
        .route("/:id/cancel", post(orders::cancel_order))
        .route("/:id/status", post(orders::advance_order))
        .layer(ConcurrencyLimitLayer::new(ORDER_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Catalog
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/:id", get(products::get_product))
        .route(
            "/products/:id/stocks",
            get(products::list_product_stocks).post(products::create_stock),
        )
        .route("/stocks/:id/adjust", post(products::adjust_stock))
        // Items
        .route("/items/:id/cancel", post(orders::cancel_item))
        .route("/items/:id/return", post(orders::return_item))
        // Account
        .route(
            "/account",
            get(account::get_account).put(account::update_account),
        )
        // Order routes (with their own concurrency limit)
        .nest("/orders", order_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
