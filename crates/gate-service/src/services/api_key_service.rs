//! API key verification and issuance.

use crate::crypto::{self, API_KEY_PREFIX_LEN};
use crate::errors::GateError;
use crate::models::{ApiKeyRecord, Developer, HashVersion, NewApiKey, Role};
use crate::observability::metrics::record_credential_validation;
use crate::observability::{hash_for_correlation, ErrorCategory};
use crate::repositories::ApiKeyStore;
use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use common::bearer::parse_bearer;
use common::secret::{ExposeSecret, SecretString};
use tracing::instrument;

/// Rate-limit tier assigned to keys issued through the developer portal.
pub const DEVELOPER_KEY_TIER: &str = "agent";

const INVALID_KEY: &str = "The API key is invalid or expired";

/// Resolve an `Authorization` header to a verified API key record.
///
/// The header must be `Bearer <key>`. The first eight characters of the key
/// select a candidate record; the full key is then checked against the
/// record's hash using the algorithm its hash version names. On success the
/// key's last-used time is updated on a best-effort basis.
///
/// # Errors
///
/// - `MissingCredential`: no header, or not a bearer credential
/// - `MalformedCredential`: header is not valid UTF-8
/// - `InvalidCredential`: short key, unknown prefix, store failure, inactive,
///   expired, unknown hash version, or hash mismatch
#[instrument(skip_all, name = "gate.api_keys.validate")]
pub async fn validate_api_key(
    store: &dyn ApiKeyStore,
    authorization: Option<&HeaderValue>,
) -> Result<ApiKeyRecord, GateError> {
    let result = verify(store, authorization).await;

    match &result {
        Ok(_) => record_credential_validation("api_key", "success", None),
        Err(e) => {
            let category = ErrorCategory::from(e);
            record_credential_validation("api_key", "error", Some(category.as_str()));
        }
    }

    result
}

async fn verify(
    store: &dyn ApiKeyStore,
    authorization: Option<&HeaderValue>,
) -> Result<ApiKeyRecord, GateError> {
    let header = match authorization {
        None => None,
        Some(value) => Some(std::str::from_utf8(value.as_bytes()).map_err(|_| {
            tracing::debug!(target: "gate.api_keys", "Authorization header is not valid UTF-8");
            GateError::MalformedCredential
        })?),
    };

    let key = parse_bearer(header).map_err(|e| {
        tracing::debug!(target: "gate.api_keys", reason = %e, "No bearer credential");
        GateError::MissingCredential
    })?;

    let Some(prefix) = crypto::api_key_prefix(key) else {
        tracing::debug!(
            target: "gate.api_keys",
            min_length = API_KEY_PREFIX_LEN,
            "API key shorter than lookup prefix"
        );
        return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
    };
    let prefix_hash = hash_for_correlation(prefix);

    let record = match store.lookup_by_prefix(prefix).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!(
                target: "gate.api_keys",
                prefix = %prefix_hash,
                "Unknown API key prefix"
            );
            return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
        }
        Err(e) => {
            // Surfaced as an invalid key so callers cannot learn store health
            tracing::warn!(
                target: "gate.api_keys",
                prefix = %prefix_hash,
                error = %e,
                "API key lookup failed"
            );
            return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
        }
    };

    check_record(&record, Utc::now(), &prefix_hash)?;

    let Some(version) = HashVersion::from_stored(record.hash_version) else {
        tracing::warn!(
            target: "gate.api_keys",
            prefix = %prefix_hash,
            hash_version = record.hash_version,
            "API key has unknown hash version"
        );
        return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
    };

    if !crypto::verify_api_key(key, &record.key_hash, version) {
        tracing::debug!(target: "gate.api_keys", prefix = %prefix_hash, "API key hash mismatch");
        return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
    }

    if let Err(e) = store.update_last_used(record.id).await {
        tracing::warn!(
            target: "gate.api_keys",
            key_id = %hash_for_correlation(&record.id.to_string()),
            error = %e,
            "Failed to record API key last use"
        );
    }

    tracing::debug!(
        target: "gate.api_keys",
        key_id = %hash_for_correlation(&record.id.to_string()),
        hash_version = record.hash_version,
        "API key verified"
    );

    Ok(record)
}

/// Reject inactive records and records whose expiry is strictly before `now`.
fn check_record(
    record: &ApiKeyRecord,
    now: DateTime<Utc>,
    prefix_hash: &str,
) -> Result<(), GateError> {
    if !record.is_active {
        tracing::debug!(target: "gate.api_keys", prefix = %prefix_hash, "API key is inactive");
        return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
    }

    if let Some(expires_at) = record.expires_at {
        if expires_at < now {
            tracing::debug!(target: "gate.api_keys", prefix = %prefix_hash, "API key has expired");
            return Err(GateError::InvalidCredential(INVALID_KEY.to_string()));
        }
    }

    Ok(())
}

/// A newly issued key. `key` is the only copy of the plaintext.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub record: ApiKeyRecord,
    pub key: SecretString,
}

/// Issue a new API key for `developer`.
///
/// The key is 32 random bytes in URL-safe base64. Only its bcrypt hash is
/// stored. A positive `expires_in_days` sets an expiry; zero or negative
/// values issue a non-expiring key.
///
/// # Errors
///
/// - `BadRequest`: blank name or an expiry that overflows
/// - `KeyLimitReached`: the developer already holds `max_keys` active keys
/// - `Crypto` / `Dependency`: key generation, hashing or storage failed
#[instrument(skip_all, name = "gate.api_keys.issue")]
pub async fn issue_api_key(
    store: &dyn ApiKeyStore,
    developer: &Developer,
    name: &str,
    expires_in_days: Option<i64>,
    bcrypt_cost: u32,
) -> Result<IssuedApiKey, GateError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GateError::BadRequest("Name is required".to_string()));
    }

    let expires_at = match expires_in_days {
        Some(days) if days > 0 => Some(
            chrono::Duration::try_days(days)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| GateError::BadRequest("expires_in_days is too large".to_string()))?,
        ),
        _ => None,
    };

    let key = crypto::generate_api_key()?;
    let prefix = crypto::api_key_prefix(key.expose_secret())
        .ok_or(GateError::Internal)?
        .to_string();
    let key_hash = crypto::hash_api_key(key.expose_secret(), bcrypt_cost)?;

    let new_key = NewApiKey {
        prefix,
        key_hash,
        hash_version: HashVersion::Bcrypt,
        name: name.to_string(),
        role: Role::Agent,
        rate_limit_tier: DEVELOPER_KEY_TIER.to_string(),
        expires_at,
        developer_id: Some(developer.id),
    };

    let record = store
        .create_with_limit(new_key, i64::from(developer.max_keys))
        .await?
        .ok_or_else(|| {
            tracing::info!(
                target: "gate.api_keys",
                developer = %hash_for_correlation(&developer.id.to_string()),
                max_keys = developer.max_keys,
                "API key limit reached"
            );
            GateError::KeyLimitReached
        })?;

    tracing::info!(
        target: "gate.api_keys",
        key_id = %hash_for_correlation(&record.id.to_string()),
        developer = %hash_for_correlation(&developer.id.to_string()),
        "API key issued"
    );

    Ok(IssuedApiKey { record, key })
}
