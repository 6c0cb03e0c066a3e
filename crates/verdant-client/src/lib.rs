//! Client SDK for the Verdant storefront API.
//!
//! This crate provides a typed `reqwest`-based client for the verdant
//! service: checkout, order history, cancellation/return, catalog
//! browsing, and account profiles.
//!
//! # Example
//!
//! ```no_run
//! use verdant_client::{VerdantClient, CartLineInput, CreateOrderRequest, AddressInput};
//!
//! # async fn example() -> Result<(), verdant_client::ClientError> {
//! let client = VerdantClient::new("http://localhost:8080")
//!     .with_bearer_token("test-token:6f2b9a4e-1c3d-4f5a-9b8c-7d6e5f4a3b2c");
//!
//! let order = client
//!     .create_order(CreateOrderRequest {
//!         lines: vec![CartLineInput {
//!             product_id: "2f9d…".into(),
//!             stock_id: "8a1c…".into(),
//!             quantity: 2,
//!         }],
//!         currency: None,
//!         address: AddressInput {
//!             line1: "1 Loom Lane".into(),
//!             line2: None,
//!             city: "Amsterdam".into(),
//!             postal_code: "1011AB".into(),
//!             country: "NL".into(),
//!         },
//!         delivery: "standard".into(),
//!     })
//!     .await?;
//! println!("placed order {}", order.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientOptions, VerdantClient};
pub use error::ClientError;
pub use types::{
    AccountResponse, AddressInput, CancelReportResponse, CartLineInput, CreateOrderRequest,
    CreateProductRequest, CreateStockRequest, FailedItem, ItemResponse, ListOrdersResponse,
    ListProductsResponse, OrderResponse, ProductResponse, StockResponse, UpdateAccountRequest,
};
