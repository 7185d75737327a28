//! Signed token codecs.
//!
//! Admin and developer tokens are HS256 JWTs signed with independent keys
//! derived from the master secret. Each token also carries an explicit
//! `type` discriminator, checked after the signature, so a token can only be
//! accepted by the codec that issued it even if the two keys were ever
//! confused.

pub mod admin;
pub mod developer;

pub use admin::{AdminClaims, AdminTokenCodec, ADMIN_TOKEN_TYPE};
pub use developer::{DeveloperClaims, DeveloperTokenCodec, DEVELOPER_TOKEN_TYPE};

use crate::crypto::DerivedKey;
use crate::errors::GateError;
use chrono::{DateTime, Utc};
use common::jwt::{check_token_size, validate_iat_at};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Generic reason used for every signature or claim failure.
const INVALID_TOKEN: &str = "The access token is invalid or expired";

/// A freshly signed token and its expiry.
#[derive(Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Claims every Gatehouse token carries, read before the typed claims.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    token_type: Option<String>,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Compute `(iat, exp)` for a token issued at `now`.
pub(crate) fn issue_window(
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(i64, DateTime<Utc>), GateError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|_| GateError::Crypto("Token lifetime out of range".to_string()))?;
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| GateError::Crypto("Token expiry out of range".to_string()))?;
    Ok((now.timestamp(), expires_at))
}

/// Sign claims with HS256.
pub(crate) fn sign<C: Serialize>(claims: &C, key: &DerivedKey) -> Result<String, GateError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    let encoding_key = EncodingKey::from_secret(key.expose_secret());
    encode(&header, claims, &encoding_key)
        .map_err(|e| GateError::Crypto(format!("JWT signing operation failed: {}", e)))
}

/// Verify a token and decode its claims.
///
/// Checks, in order: blank token, size limit, HMAC signature and algorithm,
/// expiry against `now`, `iat` skew, issuer, and finally the `type`
/// discriminator. Only the discriminator check yields `WrongCredentialType`.
pub(crate) fn verify<C: DeserializeOwned>(
    token: &str,
    key: &DerivedKey,
    expected_type: &str,
    issuer: &str,
    clock_skew: Duration,
    now: i64,
) -> Result<C, GateError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(GateError::MissingCredential);
    }

    check_token_size(token)
        .map_err(|_| GateError::InvalidCredential(INVALID_TOKEN.to_string()))?;

    // Expiry is checked below against the caller-supplied `now`
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;

    let decoding_key = DecodingKey::from_secret(key.expose_secret());
    let data = decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "gate.tokens", error = %e, "Token verification failed");
        GateError::InvalidCredential(INVALID_TOKEN.to_string())
    })?;

    let envelope: Envelope = serde_json::from_value(data.claims.clone()).map_err(|e| {
        tracing::debug!(target: "gate.tokens", error = %e, "Token is missing required claims");
        GateError::InvalidCredential(INVALID_TOKEN.to_string())
    })?;

    if envelope.exp < now {
        tracing::debug!(
            target: "gate.tokens",
            exp = envelope.exp,
            now = now,
            "Token rejected: expired"
        );
        return Err(GateError::InvalidCredential(INVALID_TOKEN.to_string()));
    }

    validate_iat_at(envelope.iat, clock_skew, now)
        .map_err(|_| GateError::InvalidCredential(INVALID_TOKEN.to_string()))?;

    if envelope.iss != issuer {
        tracing::debug!(target: "gate.tokens", "Token rejected: issuer mismatch");
        return Err(GateError::InvalidCredential(INVALID_TOKEN.to_string()));
    }

    if envelope.token_type.as_deref() != Some(expected_type) {
        tracing::warn!(
            target: "gate.tokens",
            expected = expected_type,
            presented = envelope.token_type.as_deref().unwrap_or("none"),
            "Token rejected: wrong token type"
        );
        return Err(GateError::WrongCredentialType);
    }

    serde_json::from_value(data.claims).map_err(|e| {
        tracing::debug!(target: "gate.tokens", error = %e, "Token claims are malformed");
        GateError::InvalidCredential(INVALID_TOKEN.to_string())
    })
}
