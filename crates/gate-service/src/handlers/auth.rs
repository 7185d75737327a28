//! Login handlers.
//!
//! Both endpoints sit behind the login admission tier.

use crate::errors::GateError;
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use crate::routes::AppState;
use crate::services::login_service;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Serialize)]
pub struct AdminUserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AdminUserView,
}

#[derive(Debug, Deserialize)]
pub struct DeveloperLoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Serialize)]
pub struct DeveloperView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeveloperLoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub developer: DeveloperView,
}

/// Handle admin login
///
/// POST /api/v1/admin/login
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, GateError> {
    let result = login_service::admin_login(
        state.admin_users.as_ref(),
        &state.admin_codec,
        &payload.username,
        payload.password.expose_secret(),
    )
    .await;

    let login = match result {
        Ok(login) => login,
        Err(e) => {
            let category = ErrorCategory::from(&e);
            record_error("admin_login", category.as_str(), e.status_code());
            return Err(e);
        }
    };

    Ok(Json(AdminLoginResponse {
        token: login.token.token,
        expires_at: login.token.expires_at,
        user: AdminUserView {
            id: login.user.id,
            username: login.user.username,
            email: login.user.email,
            role: login.user.role,
        },
    }))
}

/// Handle developer login
///
/// POST /api/v1/dev/login
pub async fn developer_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeveloperLoginRequest>,
) -> Result<Json<DeveloperLoginResponse>, GateError> {
    let result = login_service::developer_login(
        state.developers.as_ref(),
        &state.developer_codec,
        &payload.email,
        payload.password.expose_secret(),
    )
    .await;

    let login = match result {
        Ok(login) => login,
        Err(e) => {
            let category = ErrorCategory::from(&e);
            record_error("developer_login", category.as_str(), e.status_code());
            return Err(e);
        }
    };

    Ok(Json(DeveloperLoginResponse {
        token: login.token.token,
        expires_at: login.token.expires_at,
        developer: DeveloperView {
            id: login.developer.id,
            email: login.developer.email,
            name: login.developer.name,
        },
    }))
}
