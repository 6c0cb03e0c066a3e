//! Verdant storefront HTTP API service.
//!
//! This crate provides the HTTP API for the Verdant storefront, including:
//!
//! - Checkout (order creation) and order history
//! - Order amendment, cancellation, return, and status progression
//! - Product catalog and stock management
//! - Account profiles
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **Bearer tokens** - For customer requests (storefront pages)
//! 2. **Admin API key** - For back-office requests (catalog, fulfilment)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Read-only handlers stay async for consistency

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
