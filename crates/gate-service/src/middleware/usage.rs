//! API key usage accounting.
//!
//! Runs inside `require_api_key` and records the outcome of each
//! API-key-authenticated request after the handler completes. Never changes
//! the response.

use crate::models::AuthenticatedIdentity;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_api_key_request;
use axum::{extract::Request, middleware::Next, response::Response};

pub async fn api_key_usage_middleware(req: Request, next: Next) -> Response {
    let key_id = match req.extensions().get::<AuthenticatedIdentity>() {
        Some(AuthenticatedIdentity::ApiKey(principal)) => Some(principal.id),
        _ => None,
    };

    let response = next.run(req).await;

    if let Some(key_id) = key_id {
        let outcome = if response.status().as_u16() >= 400 {
            "error"
        } else {
            "success"
        };
        record_api_key_request(outcome);
        tracing::debug!(
            target: "gate.usage",
            key_id = %hash_for_correlation(&key_id.to_string()),
            status = response.status().as_u16(),
            outcome,
            "API key request served"
        );
    }

    response
}
