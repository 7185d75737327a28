//! Developer API key issuance handler.

use crate::errors::GateError;
use crate::models::AuthenticatedIdentity;
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use crate::routes::AppState;
use crate::services::api_key_service;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use common::secret::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const KEY_WARNING: &str = "Store this key securely. It will not be shown again.";

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub expires_in_days: Option<i64>,
}

/// Response carrying the only copy of the plaintext key.
#[derive(Serialize)]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub key: String,
    pub role: String,
    pub rate_limit_tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub warning: &'static str,
}

/// Handle API key creation
///
/// POST /api/v1/dev/api-keys
///
/// Requires a developer token. Returns 201 with the plaintext key.
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), GateError> {
    let AuthenticatedIdentity::Developer(claims) = identity else {
        return Err(GateError::WrongCredentialType);
    };

    // The token may outlive the account
    let developer = state
        .developers
        .find_by_id(claims.developer_id()?)
        .await?
        .filter(|developer| developer.is_active)
        .ok_or_else(|| {
            tracing::debug!(target: "gate.api_keys", "Developer account missing or inactive");
            GateError::InvalidCredential("The access token is invalid or expired".to_string())
        })?;

    let result = api_key_service::issue_api_key(
        state.api_keys.as_ref(),
        &developer,
        &payload.name,
        payload.expires_in_days,
        state.bcrypt_cost,
    )
    .await;

    let issued = match result {
        Ok(issued) => issued,
        Err(e) => {
            let category = ErrorCategory::from(&e);
            record_error("issue_api_key", category.as_str(), e.status_code());
            return Err(e);
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            id: issued.record.id,
            name: issued.record.name,
            prefix: issued.record.prefix,
            key: issued.key.expose_secret().to_string(),
            role: issued.record.role,
            rate_limit_tier: issued.record.rate_limit_tier,
            expires_at: issued.record.expires_at,
            warning: KEY_WARNING,
        }),
    ))
}
