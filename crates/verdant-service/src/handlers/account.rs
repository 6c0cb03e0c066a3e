//! Account profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use verdant_core::{Account, Address};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// The user id from the identity provider.
    pub user_id: String,
    /// Contact email.
    pub email: String,
    /// Display name, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Default delivery address, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_address: Option<Address>,
    /// When the account was created.
    pub created_at: String,
    /// When the account was last updated.
    pub updated_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.user_id.to_string(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            default_address: account.default_address.clone(),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// Get the caller's account profile.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Account update request.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    /// Contact email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Default delivery address prefilled at checkout.
    #[serde(default)]
    pub default_address: Option<Address>,
}

/// Create or update the caller's account profile.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    if !body.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }

    let mut account = state
        .store
        .get_account(&auth.user_id)?
        .unwrap_or_else(|| Account::new(auth.user_id, body.email.clone()));

    account.email = body.email;
    account.display_name = body.display_name;
    account.default_address = body.default_address;
    account.updated_at = chrono::Utc::now();

    state.store.put_account(&account)?;

    tracing::info!(user_id = %auth.user_id, "Account profile updated");

    Ok(Json(AccountResponse::from(&account)))
}
