//! Admission middleware.
//!
//! Resolves the client identity for each request and asks the shared
//! [`AdmissionController`] for a token in the route group's tier. Health check paths
//! bypass admission entirely.

use crate::admission::client_identity::{client_key, IpCidr};
use crate::admission::{AdmissionController, AdmissionDecision, Tier};
use crate::errors::GateError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Paths that are never rate limited.
pub const EXEMPT_PATHS: [&str; 2] = ["/healthz", "/readyz"];

/// State for one route group's admission layer.
#[derive(Clone)]
pub struct AdmissionState {
    pub controller: Arc<AdmissionController>,
    pub tier: Tier,
    pub trusted_proxies: Arc<Vec<IpCidr>>,
}

/// Admission middleware.
///
/// # Response
///
/// - 429 Too Many Requests with `Retry-After` when the client's bucket is empty
/// - Otherwise continues to the next layer
pub async fn admission_middleware(
    State(state): State<Arc<AdmissionState>>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    if EXEMPT_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(peer, req.headers(), &state.trusted_proxies);

    match state.controller.check(state.tier, &key) {
        AdmissionDecision::Rejected {
            retry_after_seconds,
        } => Err(GateError::AdmissionRejected {
            retry_after_seconds,
        }),
        AdmissionDecision::Admitted | AdmissionDecision::Unlimited => Ok(next.run(req).await),
    }
}
