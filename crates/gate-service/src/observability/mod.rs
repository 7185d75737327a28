//! Observability module for Gatehouse
//!
//! # Privacy by Default
//!
//! All credential-touching functions use `#[instrument(skip_all)]` and
//! explicit safe field allow-listing. Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (tiers, enums, outcome labels)
//! - **HASHED**: Must be SHA-256 hashed for correlation (key prefixes, key ids, subjects)
//! - **NEVER**: Must never appear in logs (raw API keys, tokens, passwords, secrets)

pub mod metrics;

use crate::errors::GateError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// This is NOT a protection for secrets; it is a one-way hash for
/// correlating log entries without storing identifiers in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    // First 4 bytes = 8 hex chars
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential absent or not parseable
    Missing,
    /// Credential present but rejected (bad signature/hash, unknown, inactive, expired)
    Invalid,
    /// Valid signature or hash, wrong token type or role
    Authorization,
    /// Admission controller rejection
    Admission,
    /// Internal errors (datastore, crypto, system)
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Missing => "missing",
            ErrorCategory::Invalid => "invalid",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Admission => "admission",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&GateError> for ErrorCategory {
    fn from(err: &GateError) -> Self {
        match err {
            GateError::MissingCredential | GateError::MalformedCredential => ErrorCategory::Missing,
            GateError::InvalidCredential(_) | GateError::BadRequest(_) => ErrorCategory::Invalid,
            GateError::WrongCredentialType
            | GateError::InsufficientRole { .. }
            | GateError::KeyLimitReached => ErrorCategory::Authorization,
            GateError::AdmissionRejected { .. } => ErrorCategory::Admission,
            GateError::Dependency(_)
            | GateError::InvalidMasterSecret
            | GateError::Crypto(_)
            | GateError::Internal => ErrorCategory::Internal,
        }
    }
}
