//! Order and order-item lifecycle states.
//!
//! States form a closed enumeration with an explicit transition table.
//! Anything outside the table is rejected instead of being normalised into
//! a default, so a mistyped status can never silently park an order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::OrderError;

/// Lifecycle state of an order header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, not yet packed.
    New,

    /// All items packed, awaiting shipment.
    Packed,

    /// Handed to the carrier.
    Shipped,

    /// Delivered to the customer.
    Delivered,

    /// Every item was cancelled and its stock restored.
    Cancelled,
}

impl OrderStatus {
    /// Check whether this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Packed | Self::Cancelled)
                | (Self::Packed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Validate a transition, returning the error the caller propagates.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] when the transition is not
    /// in the table.
    pub fn transition_to(self, next: Self) -> Result<Self, OrderError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Check whether this is a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Status name as stored on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a single order item.
///
/// Items have their own lifecycle distinct from the parent order so that a
/// single line can be cancelled or returned without touching its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Item placed with the order.
    Placed,

    /// Item packed.
    Packed,

    /// Item shipped.
    Shipped,

    /// Item delivered.
    Delivered,

    /// Item cancelled before shipment; stock restored.
    Cancelled,

    /// Item returned after delivery; stock restored.
    Returned,
}

impl ItemStatus {
    /// Check whether this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Placed, Self::Packed | Self::Cancelled)
                | (Self::Packed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered | Self::Returned)
                | (Self::Delivered, Self::Returned)
        )
    }

    /// Validate a transition, returning the error the caller propagates.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] when the transition is not
    /// in the table.
    pub fn transition_to(self, next: Self) -> Result<Self, OrderError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Check whether the item can still be cancelled (stock restored).
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Placed | Self::Packed)
    }

    /// Check whether the item can be returned (stock restored).
    #[must_use]
    pub const fn is_returnable(self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }

    /// Check whether this is a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// Status name as stored on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who triggered a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The customer who owns the order.
    User,

    /// A store operator.
    Admin,

    /// An automated process.
    System,
}

impl Actor {
    /// Actor name as stored on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
