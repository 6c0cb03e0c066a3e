//! Storefront account profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::order::Address;

/// A customer's account profile.
///
/// Identity (and email verification) lives with the external identity
/// provider; this record only carries what the account pages render and
/// what checkout prefills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The user id from the identity provider.
    pub user_id: UserId,

    /// Contact email.
    pub email: String,

    /// Display name shown on account pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Default delivery address prefilled at checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address: Option<Address>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account profile.
    #[must_use]
    pub fn new(user_id: UserId, email: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email,
            display_name: None,
            default_address: None,
            created_at: now,
            updated_at: now,
        }
    }
}
