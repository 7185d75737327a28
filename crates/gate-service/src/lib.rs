//! Gatehouse Service Library
//!
//! Admission control and credential verification for the Gatehouse API edge.
//! Every inbound request passes the admission controller (per-tier token
//! buckets keyed by a spoof-resistant client identity) before one of the
//! credential verifiers (admin token, developer token, bearer API key) runs.
//!
//! # Modules
//!
//! - `admission` - Token-bucket limiter, idle sweep task, client identity
//! - `config` - Service configuration
//! - `crypto` - Key derivation, API key and password hashing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Admission, authentication and metrics middleware
//! - `models` - Data models
//! - `observability` - Metrics and log correlation helpers
//! - `repositories` - Database access layer
//! - `routes` - Router assembly and application state
//! - `services` - Business logic layer
//! - `tokens` - Admin and developer token codecs

pub mod admission;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tokens;
