//! Middleware for Gatehouse.
//!
//! # Components
//!
//! - `admission` - Per-tier admission control keyed by client identity
//! - `auth` - Admin token, developer token and API key authentication
//! - `http_metrics` - HTTP request metrics middleware
//! - `usage` - Best-effort API key usage accounting

pub mod admission;
pub mod auth;
pub mod http_metrics;
pub mod usage;

pub use admission::{admission_middleware, AdmissionState};
pub use auth::{require_admin, require_api_key, require_developer, AuthState};
pub use http_metrics::http_metrics_middleware;
pub use usage::api_key_usage_middleware;
