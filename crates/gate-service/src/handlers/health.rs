//! Health check handlers.
//!
//! - `/healthz`: Liveness check, returns OK while the process runs
//! - `/readyz`: Readiness check, pings the API key store
//!
//! Both are exempt from admission control.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

/// Liveness handler. Does not check dependencies.
pub async fn healthz() -> &'static str {
    "OK"
}

/// Readiness handler.
///
/// Returns 200 when the datastore answers, 503 otherwise. The failure reason
/// is only logged.
#[tracing::instrument(skip_all, name = "gate.health.readiness")]
pub async fn readyz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.api_keys.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready".to_string(),
                database: Some("healthy".to_string()),
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "gate.health", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready".to_string(),
                    database: Some("unhealthy".to_string()),
                }),
            )
        }
    }
}
