//! Current identity handlers.
//!
//! Each route group's authentication middleware inserts an
//! [`AuthenticatedIdentity`]; these handlers echo the verified identity back.

use crate::errors::GateError;
use crate::models::{ApiKeyPrincipal, AuthenticatedIdentity};
use axum::Json;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

/// Response for `/api/v1/admin/me`.
#[derive(Debug, Clone, Serialize)]
pub struct AdminMeResponse {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Response for `/api/v1/dev/me`.
#[derive(Debug, Clone, Serialize)]
pub struct DeveloperMeResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub exp: i64,
}

/// Handler for GET /api/v1/admin/me
#[instrument(skip_all, name = "gate.handlers.admin_me")]
pub async fn get_admin_me(
    identity: AuthenticatedIdentity,
) -> Result<Json<AdminMeResponse>, GateError> {
    let AuthenticatedIdentity::Admin(claims) = identity else {
        return Err(GateError::WrongCredentialType);
    };

    Ok(Json(AdminMeResponse {
        sub: claims.sub,
        role: claims.role,
        iat: claims.iat,
        exp: claims.exp,
    }))
}

/// Handler for GET /api/v1/dev/me
#[instrument(skip_all, name = "gate.handlers.developer_me")]
pub async fn get_developer_me(
    identity: AuthenticatedIdentity,
) -> Result<Json<DeveloperMeResponse>, GateError> {
    let AuthenticatedIdentity::Developer(claims) = identity else {
        return Err(GateError::WrongCredentialType);
    };

    Ok(Json(DeveloperMeResponse {
        id: claims.developer_id()?,
        email: claims.email,
        name: claims.name,
        exp: claims.exp,
    }))
}

fn api_key_principal(identity: AuthenticatedIdentity) -> Result<Json<ApiKeyPrincipal>, GateError> {
    match identity {
        AuthenticatedIdentity::ApiKey(principal) => Ok(Json(principal)),
        _ => Err(GateError::WrongCredentialType),
    }
}

/// Handler for GET /api/v1/agent/me
#[instrument(skip_all, name = "gate.handlers.agent_me")]
pub async fn get_agent_me(
    identity: AuthenticatedIdentity,
) -> Result<Json<ApiKeyPrincipal>, GateError> {
    api_key_principal(identity)
}

/// Handler for GET /api/v1/federation/me
#[instrument(skip_all, name = "gate.handlers.federation_me")]
pub async fn get_federation_me(
    identity: AuthenticatedIdentity,
) -> Result<Json<ApiKeyPrincipal>, GateError> {
    api_key_principal(identity)
}
