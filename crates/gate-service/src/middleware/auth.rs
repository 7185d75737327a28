//! Authentication middleware for protected routes.
//!
//! Provides three middleware functions:
//! - `require_admin` - Admin token with the `admin` role
//! - `require_developer` - Developer token
//! - `require_api_key` - Bearer API key
//!
//! Each one verifies the `Authorization: Bearer` credential and inserts an
//! [`AuthenticatedIdentity`] into request extensions for downstream handlers.

use crate::errors::GateError;
use crate::models::{ApiKeyPrincipal, AuthenticatedIdentity, Role};
use crate::observability::metrics::record_credential_validation;
use crate::observability::ErrorCategory;
use crate::repositories::ApiKeyStore;
use crate::services::api_key_service;
use crate::tokens::{AdminTokenCodec, DeveloperTokenCodec};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use common::bearer::parse_bearer;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub admin_codec: Arc<AdminTokenCodec>,
    pub developer_codec: Arc<DeveloperTokenCodec>,
    pub api_keys: Arc<dyn ApiKeyStore>,
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, GateError> {
    let header = match headers.get(header::AUTHORIZATION) {
        None => None,
        Some(value) => Some(std::str::from_utf8(value.as_bytes()).map_err(|_| {
            tracing::debug!(
                target: "gate.middleware.auth",
                "Authorization header is not valid UTF-8"
            );
            GateError::MalformedCredential
        })?),
    };

    parse_bearer(header).map_err(|e| {
        tracing::debug!(target: "gate.middleware.auth", reason = %e, "No bearer credential");
        GateError::MissingCredential
    })
}

fn observe<T>(credential: &str, result: Result<T, GateError>) -> Result<T, GateError> {
    match &result {
        Ok(_) => record_credential_validation(credential, "success", None),
        Err(e) => {
            let category = ErrorCategory::from(e);
            record_credential_validation(credential, "error", Some(category.as_str()));
        }
    }
    result
}

/// Authentication middleware for admin tokens.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or invalid
/// - 403 Forbidden for a developer token or a non-admin role
/// - Continues with [`AuthenticatedIdentity::Admin`] in extensions otherwise
#[instrument(skip_all, name = "gate.middleware.require_admin")]
pub async fn require_admin(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    let claims = observe(
        "admin_token",
        extract_bearer_token(req.headers()).and_then(|token| {
            let claims = state.admin_codec.validate(token)?;
            if Role::parse(&claims.role) != Role::Admin {
                tracing::debug!(target: "gate.middleware.auth", "Admin token lacks admin role");
                return Err(GateError::InsufficientRole {
                    required: Role::Admin.to_string(),
                });
            }
            Ok(claims)
        }),
    )?;

    req.extensions_mut()
        .insert(AuthenticatedIdentity::Admin(claims));

    Ok(next.run(req).await)
}

/// Authentication middleware for developer tokens.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or invalid
/// - 403 Forbidden for an admin token
/// - Continues with [`AuthenticatedIdentity::Developer`] in extensions otherwise
#[instrument(skip_all, name = "gate.middleware.require_developer")]
pub async fn require_developer(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    let claims = observe(
        "developer_token",
        extract_bearer_token(req.headers()).and_then(|token| state.developer_codec.validate(token)),
    )?;

    req.extensions_mut()
        .insert(AuthenticatedIdentity::Developer(claims));

    Ok(next.run(req).await)
}

/// Authentication middleware for bearer API keys.
///
/// # Response
///
/// - 401 Unauthorized if the key is missing, unknown, inactive, expired or wrong
/// - Continues with [`AuthenticatedIdentity::ApiKey`] in extensions otherwise
#[instrument(skip_all, name = "gate.middleware.require_api_key")]
pub async fn require_api_key(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    let record = api_key_service::validate_api_key(
        state.api_keys.as_ref(),
        req.headers().get(header::AUTHORIZATION),
    )
    .await?;

    let principal = ApiKeyPrincipal::from(&record);
    req.extensions_mut()
        .insert(AuthenticatedIdentity::ApiKey(principal));

    Ok(next.run(req).await)
}
