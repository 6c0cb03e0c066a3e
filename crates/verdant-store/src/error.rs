//! Error types for Verdant storage.

use verdant_core::OrderError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record ("order", "product", "stock", …).
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A stock decrement would drive the quantity below zero.
    #[error("insufficient stock for {stock_id}: available={available}, requested={requested}")]
    InsufficientStock {
        /// The stock row that could not satisfy the decrement.
        stock_id: String,
        /// Units on hand.
        available: i64,
        /// Units requested.
        requested: i64,
    },

    /// A status change outside the transition table was requested.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// A transaction lost its row locks and exhausted its retries.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The request was rejected before touching the database.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl From<OrderError> for StoreError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::Invalid(other.to_string()),
        }
    }
}
