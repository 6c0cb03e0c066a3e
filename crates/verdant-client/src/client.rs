//! Verdant HTTP client implementation.

use reqwest::{Client, Method};
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    AccountResponse, ApiErrorResponse, CancelReportResponse, CartLineInput, CreateOrderRequest,
    CreateProductRequest, CreateStockRequest, ItemResponse, ListOrdersResponse,
    ListProductsResponse, OrderResponse, ProductResponse, StockResponse, UpdateAccountRequest,
};

/// Options for building a [`VerdantClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

/// Verdant API client.
///
/// Provides methods for checkout, order management, catalog browsing,
/// and account profiles.
#[derive(Debug, Clone)]
pub struct VerdantClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    admin_api_key: Option<String>,
}

impl VerdantClient {
    /// Create a new verdant client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the verdant service (e.g., `"http://verdant:8080"`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new verdant client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn with_options(base_url: impl Into<String>, options: ClientOptions) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
            admin_api_key: None,
        }
    }

    /// Attach a customer bearer token to every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Attach the back-office API key to every request.
    #[must_use]
    pub fn with_admin_key(mut self, api_key: impl Into<String>) -> Self {
        self.admin_api_key = Some(api_key.into());
        self
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Checkout: create an order from a cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientStock`] when a line cannot be
    /// satisfied, or another error if the request fails.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        let response = self
            .request(Method::POST, "/v1/orders")
            .json(&request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the order doesn't exist.
    pub async fn get_order(&self, order_id: &str) -> Result<OrderResponse, ClientError> {
        let response = self
            .request(Method::GET, &format!("/v1/orders/{order_id}"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// List the caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_orders(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<ListOrdersResponse, ClientError> {
        let response = self
            .request(
                Method::GET,
                &format!("/v1/orders?limit={limit}&offset={offset}"),
            )
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// List an order's items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the order doesn't exist.
    pub async fn list_order_items(
        &self,
        order_id: &str,
    ) -> Result<Vec<ItemResponse>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/v1/orders/{order_id}/items"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Add a cart line to an order, or grow the matching item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the line cannot be
    /// satisfied.
    pub async fn add_order_item(
        &self,
        order_id: &str,
        line: CartLineInput,
    ) -> Result<ItemResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/orders/{order_id}/items"))
            .json(&line)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Cancel a whole order, item by item.
    ///
    /// The report carries per-item outcomes; inspect `failed` for items
    /// whose stock could not be restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the order doesn't exist.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        reason: &str,
    ) -> Result<CancelReportResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/orders/{order_id}/cancel"))
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Advance an order through pack/ship/deliver (requires admin key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the transition is
    /// rejected.
    pub async fn advance_order(
        &self,
        order_id: &str,
        status: &str,
    ) -> Result<OrderResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/orders/{order_id}/status"))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Cancel one order item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the item is past its
    /// cancellable window.
    pub async fn cancel_item(
        &self,
        item_id: &str,
        reason: &str,
    ) -> Result<ItemResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/items/{item_id}/cancel"))
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Return one order item after delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the item has not shipped.
    pub async fn return_item(
        &self,
        item_id: &str,
        reason: &str,
    ) -> Result<ItemResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/items/{item_id}/return"))
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List catalog entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_products(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<ListProductsResponse, ClientError> {
        let response = self
            .request(
                Method::GET,
                &format!("/v1/products?limit={limit}&offset={offset}"),
            )
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Get one catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product doesn't
    /// exist.
    pub async fn get_product(&self, product_id: &str) -> Result<ProductResponse, ClientError> {
        let response = self
            .request(Method::GET, &format!("/v1/products/{product_id}"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// List a product's stock rows (one per variant).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product doesn't
    /// exist.
    pub async fn product_stocks(
        &self,
        product_id: &str,
    ) -> Result<Vec<StockResponse>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/v1/products/{product_id}/stocks"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Create a catalog entry (requires admin key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ClientError> {
        let response = self
            .request(Method::POST, "/v1/products")
            .json(&request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Create a stock row for a product (requires admin key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_stock(
        &self,
        product_id: &str,
        request: CreateStockRequest,
    ) -> Result<StockResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/products/{product_id}/stocks"))
            .json(&request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Apply a signed delta to a stock row (requires admin key).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientStock`] when the delta would
    /// drive the quantity below zero.
    pub async fn adjust_stock(
        &self,
        stock_id: &str,
        delta: i64,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/stocks/{stock_id}/adjust"))
            .json(&serde_json::json!({ "delta": delta }))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Get the caller's account profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no profile exists yet.
    pub async fn get_account(&self) -> Result<AccountResponse, ClientError> {
        let response = self.request(Method::GET, "/v1/account").send().await?;
        self.handle_response(response).await
    }

    /// Create or update the caller's account profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_account(
        &self,
        request: UpdateAccountRequest,
    ) -> Result<AccountResponse, ClientError> {
        let response = self
            .request(Method::PUT, "/v1/account")
            .json(&request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Build a request with the configured credentials attached.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(api_key) = &self.admin_api_key {
            request = request.header("x-api-key", api_key);
        }
        request
    }

    /// Decode a response, mapping error bodies onto [`ClientError`].
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        tracing::debug!(status = %status, body = %text, "API request failed");

        let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(&text) else {
            return Err(ClientError::Api {
                code: "unknown".into(),
                message: text,
                status: status.as_u16(),
            });
        };

        let body = parsed.error;
        match body.code.as_str() {
            "insufficient_stock" => {
                let details = body.details.unwrap_or_default();
                Err(ClientError::InsufficientStock {
                    stock_id: details["stock_id"].as_str().unwrap_or_default().to_string(),
                    available: details["available"].as_i64().unwrap_or_default(),
                    requested: details["requested"].as_i64().unwrap_or_default(),
                })
            }
            "not_found" => Err(ClientError::NotFound(body.message)),
            "unauthorized" => Err(ClientError::Unauthorized),
            _ => Err(ClientError::Api {
                code: body.code,
                message: body.message,
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AddressInput;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checkout_request() -> CreateOrderRequest {
        CreateOrderRequest {
            lines: vec![CartLineInput {
                product_id: "2f9d0c1e-5b6a-4d3c-8e7f-1a2b3c4d5e6f".into(),
                stock_id: "8a1c2b3d-4e5f-4a6b-9c8d-7e6f5a4b3c2d".into(),
                quantity: 2,
            }],
            currency: None,
            address: AddressInput {
                line1: "1 Loom Lane".into(),
                line2: None,
                city: "Amsterdam".into(),
                postal_code: "1011AB".into(),
                country: "NL".into(),
            },
            delivery: "standard".into(),
        }
    }

    #[tokio::test]
    async fn create_order_decodes_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "OD1000000001",
                "status": "new",
                "products": { "2f9d0c1e-5b6a-4d3c-8e7f-1a2b3c4d5e6f": 2 },
                "total_cents": 17800,
                "total_formatted": "178.00 EUR",
                "currency": "EUR",
                "created_at": "2026-08-07T12:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = VerdantClient::new(server.uri()).with_bearer_token("test-token:abc");
        let order = client.create_order(checkout_request()).await.unwrap();

        assert_eq!(order.id, "OD1000000001");
        assert_eq!(order.status, "new");
        assert_eq!(order.total_cents, 17800);
    }

    #[tokio::test]
    async fn insufficient_stock_maps_to_dedicated_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {
                    "code": "insufficient_stock",
                    "message": "insufficient stock",
                    "details": {
                        "stock_id": "8a1c2b3d-4e5f-4a6b-9c8d-7e6f5a4b3c2d",
                        "available": 1,
                        "requested": 2
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = VerdantClient::new(server.uri()).with_bearer_token("test-token:abc");
        let result = client.create_order(checkout_request()).await;

        assert!(matches!(
            result,
            Err(ClientError::InsufficientStock {
                available: 1,
                requested: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn not_found_maps_to_dedicated_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/OD1000009999"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "not_found",
                    "message": "order not found: OD1000009999"
                }
            })))
            .mount(&server)
            .await;

        let client = VerdantClient::new(server.uri()).with_bearer_token("test-token:abc");
        let result = client.get_order("OD1000009999").await;

        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn unparseable_error_body_falls_back_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/products"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = VerdantClient::new(server.uri());
        let result = client.list_products(10, 0).await;

        assert!(matches!(
            result,
            Err(ClientError::Api { status: 500, .. })
        ));
    }
}
