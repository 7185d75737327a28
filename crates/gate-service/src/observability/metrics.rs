//! Metrics definitions for Gatehouse
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `tier`: 5 values (public, agent, admin, login, federation)
//! - `action`: 3 values (admitted, rejected, unlimited)
//! - `credential`: 3 values (admin_token, developer_token, api_key)
//! - `status`: 2 values (success, error)
//! - `error_category`: 5 values (see `ErrorCategory`)
//! - `endpoint`: known paths, everything else is `/other`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Coarse bcrypt buckets (50ms minimum) so the histogram is not a timing oracle
        .set_buckets_for_metric(
            Matcher::Prefix("gate_bcrypt".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set bcrypt buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gate_db_query".to_string()),
            &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/rejected/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        429 => "rejected",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/healthz" => "/healthz",
        "/readyz" => "/readyz",
        "/metrics" => "/metrics",
        "/api/v1/admin/login" => "/api/v1/admin/login",
        "/api/v1/admin/me" => "/api/v1/admin/me",
        "/api/v1/dev/login" => "/api/v1/dev/login",
        "/api/v1/dev/me" => "/api/v1/dev/me",
        "/api/v1/dev/api-keys" => "/api/v1/dev/api-keys",
        "/api/v1/agent/me" => "/api/v1/agent/me",
        "/api/v1/federation/me" => "/api/v1/federation/me",
        _ => "/other",
    }
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Record an admission decision
///
/// Metric: `gate_admission_decisions_total`
/// Labels: `tier`, `action` (admitted, rejected, unlimited)
pub fn record_admission_decision(tier: &str, action: &str) {
    counter!("gate_admission_decisions_total",
        "tier" => tier.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

/// Update the live bucket count
///
/// Metric: `gate_limiter_buckets`
pub fn set_limiter_buckets(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("gate_limiter_buckets").set(count as f64);
}

/// Record buckets removed by an idle sweep
///
/// Metric: `gate_limiter_evictions_total`
pub fn record_limiter_evictions(count: usize) {
    counter!("gate_limiter_evictions_total").increment(count as u64);
}

// ============================================================================
// Credential Metrics
// ============================================================================

/// Record a credential validation result
///
/// Metric: `gate_credential_validations_total`
/// Labels: `credential`, `status`, `error_category`
pub fn record_credential_validation(credential: &str, status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("gate_credential_validations_total",
        "credential" => credential.to_string(),
        "status" => status.to_string(),
        "error_category" => category.to_string()
    )
    .increment(1);
}

/// Record a login attempt
///
/// Metric: `gate_logins_total`
/// Labels: `account` (admin, developer), `status`
pub fn record_login(account: &str, status: &str) {
    counter!("gate_logins_total",
        "account" => account.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record bcrypt operation duration
///
/// Metric: `gate_bcrypt_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("gate_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Record a request served under API key authentication
///
/// Metric: `gate_api_key_requests_total`
/// Labels: `outcome` (success, error)
pub fn record_api_key_request(outcome: &str) {
    counter!("gate_api_key_requests_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a repository query
///
/// Metric: `gate_db_query_duration_seconds`, `gate_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("gate_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gate_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `gate_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("gate_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}
