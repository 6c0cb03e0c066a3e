//! Common test utilities for verdant-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use verdant_core::UserId;
use verdant_service::{create_router, AppState, ServiceConfig};
use verdant_store::{RocksStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user id for authenticated requests.
    pub test_user_id: UserId,
    /// The admin API key for back-office requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
        let store: Arc<dyn Store> = Arc::new(store);

        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_audience: "verdant".into(),
            admin_api_key: Some(admin_api_key.clone()),
            default_currency: "EUR".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::new(store, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            admin_api_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }

    /// Create a product through the admin API and return its id.
    pub async fn seed_product(&self, name: &str, price_cents: i64) -> String {
        let response = self
            .server
            .post("/v1/products")
            .add_header("x-api-key", self.admin_api_key.clone())
            .json(&json!({
                "name": name,
                "category": "outerwear",
                "price_cents": price_cents
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a stock row through the admin API and return its id.
    pub async fn seed_stock(&self, product_id: &str, quantity: i64) -> String {
        let response = self
            .server
            .post(&format!("/v1/products/{product_id}/stocks"))
            .add_header("x-api-key", self.admin_api_key.clone())
            .json(&json!({
                "label": "M",
                "quantity": quantity
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["id"].as_str().unwrap().to_string()
    }

    /// Fetch the current quantity of a product's only stock row.
    pub async fn stock_quantity(&self, product_id: &str, stock_id: &str) -> i64 {
        let response = self
            .server
            .get(&format!("/v1/products/{product_id}/stocks"))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body.as_array()
            .unwrap()
            .iter()
            .find(|s| s["id"] == stock_id)
            .expect("stock row not found")["quantity"]
            .as_i64()
            .unwrap()
    }

    /// Default checkout address body.
    pub fn address() -> serde_json::Value {
        json!({
            "line1": "1 Loom Lane",
            "city": "Amsterdam",
            "postal_code": "1011AB",
            "country": "NL"
        })
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
