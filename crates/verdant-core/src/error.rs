//! Domain error types for the order flow.

/// Errors produced while validating or mutating orders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// A checkout was attempted with no cart lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line carried a zero quantity.
    #[error("invalid quantity for product {product_id}")]
    InvalidQuantity {
        /// The product with the offending line.
        product_id: String,
    },

    /// A status change outside the transition table was requested.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// A cart line targets a different stock row than the existing item
    /// for the same product.
    #[error("conflicting stock row for product {product_id}")]
    ConflictingStockRow {
        /// The product whose lines disagree.
        product_id: String,
    },
}
