//! Application state.

use std::sync::Arc;

use verdant_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
///
/// The store is a trait object so handlers only ever see the injected
/// dependency bundle, never a concrete backend; tests substitute their
/// own.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.admin_api_key.is_none() {
            tracing::warn!("Admin API key not configured - back-office endpoints are disabled");
        }

        Self { store, config }
    }
}
