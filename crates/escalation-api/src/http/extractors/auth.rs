//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and looked up in the `api_keys` table. Each key
//! belongs to a user; the user's role decides what the request may do.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use escalation_types::error::{RbacError, UserError};
use escalation_types::rbac::SUPER_ADMIN;
use escalation_types::user::{CreateUserRequest, User};

use crate::http::error::AppError;
use crate::state::AppState;

/// Email of the account created on first `serve` when no key exists yet.
pub const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@escalation.local";

/// The authenticated caller. Extracting this validates the API key and
/// loads an active, non-deleted account.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(parts)?;

        let user_id = state
            .api_keys
            .resolve(&api_key)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?
            .ok_or_else(|| {
                AppError::Unauthorized(
                    "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
                )
            })?;

        let user = state.user_service.active_user(user_id).await.map_err(|e| match e {
            UserError::NotFound | UserError::Inactive => {
                AppError::Unauthorized("API key owner is inactive or deleted".to_string())
            }
            other => AppError::User(other),
        })?;

        Ok(CurrentUser { user })
    }
}

impl CurrentUser {
    /// Fail with 403 unless the caller's role holds every permission in `required`.
    pub async fn require(&self, state: &AppState, required: &[&str]) -> Result<(), AppError> {
        state
            .rbac_service
            .authorize(self.user.role_id, required)
            .await
            .map_err(|e| match e {
                RbacError::Forbidden(missing) => AppError::Forbidden(format!(
                    "Missing required permission(s): {}",
                    missing.join(", ")
                )),
                other => AppError::Rbac(other),
            })
    }

    /// Whether the caller's role holds `permission`, directly or inherited.
    pub async fn has(&self, state: &AppState, permission: &str) -> Result<bool, AppError> {
        match state.rbac_service.authorize(self.user.role_id, &[permission]).await {
            Ok(()) => Ok(true),
            Err(RbacError::Forbidden(_)) => Ok(false),
            Err(e) => Err(AppError::Rbac(e)),
        }
    }
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <key>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Make sure the server can be reached: when no API key exists, create a
/// super admin account (if needed) and a key for it.
///
/// Returns the plaintext key when one was generated; it is shown once.
pub async fn ensure_api_key(state: &AppState) -> anyhow::Result<Option<String>> {
    if state.api_keys.any_exists().await? {
        return Ok(None);
    }

    let admin = match state.user_service.get_by_email(BOOTSTRAP_ADMIN_EMAIL).await {
        Ok(user) => user,
        Err(UserError::NotFound) => {
            state
                .user_service
                .create_user(
                    None,
                    CreateUserRequest {
                        email: BOOTSTRAP_ADMIN_EMAIL.to_string(),
                        firstname: "League".to_string(),
                        lastname: "Admin".to_string(),
                        role: Some(SUPER_ADMIN.to_string()),
                    },
                )
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    let (record, plaintext) = state.api_keys.create(admin.id, "default").await?;
    tracing::info!(key_id = %record.id, user_id = %admin.id, "generated bootstrap api key");
    Ok(Some(plaintext))
}
