//! Client error types.

/// Errors that can occur when using the verdant client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient stock for a checkout or amendment.
    #[error("insufficient stock for {stock_id}: available={available}, requested={requested}")]
    InsufficientStock {
        /// The stock row that could not satisfy the request.
        stock_id: String,
        /// Units on hand.
        available: i64,
        /// Units requested.
        requested: i64,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
