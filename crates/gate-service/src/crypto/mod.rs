use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::GateError;
use crate::models::HashVersion;
use crate::observability::metrics::record_bcrypt_duration;
use base64::{engine::general_purpose, Engine as _};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use ring::{
    hkdf,
    rand::{SecureRandom, SystemRandom},
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tracing::instrument;

/// Length of every derived key in bytes (HMAC-SHA256 key size).
pub const DERIVED_KEY_LEN: usize = 32;

/// HKDF `info` label for the admin token signing key.
pub const ADMIN_JWT_PURPOSE: &str = "gatehouse-admin-jwt-v1";

/// HKDF `info` label for the developer token signing key.
pub const DEVELOPER_JWT_PURPOSE: &str = "gatehouse-developer-jwt-v1";

/// Number of leading key characters stored in clear for lookup.
pub const API_KEY_PREFIX_LEN: usize = 8;

/// Number of random bytes in a freshly issued API key.
pub const API_KEY_RANDOM_BYTES: usize = 32;

/// bcrypt hash verified when an account does not exist, so the unknown-account
/// path costs the same as a wrong password.
pub const DUMMY_BCRYPT_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

// ============================================================================
// Key Derivation
// ============================================================================

/// 32-byte key derived from the master secret for a single purpose.
///
/// Debug output is redacted. The key material is zeroized on drop.
pub struct DerivedKey {
    bytes: SecretBox<[u8; DERIVED_KEY_LEN]>,
}

impl DerivedKey {
    pub fn expose_secret(&self) -> &[u8; DERIVED_KEY_LEN] {
        self.bytes.expose_secret()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

struct DerivedKeyLen;

impl hkdf::KeyType for DerivedKeyLen {
    fn len(&self) -> usize {
        DERIVED_KEY_LEN
    }
}

/// Derive a purpose-bound key from the master secret with HKDF-SHA256.
///
/// No salt is used; the purpose string is the `info` label, so keys derived for
/// different purposes from the same secret are independent.
///
/// # Errors
///
/// Returns `GateError::InvalidMasterSecret` if the secret is empty and
/// `GateError::Crypto` if expansion fails.
#[instrument(skip_all, fields(purpose = %purpose))]
pub fn derive_key(master_secret: &[u8], purpose: &str) -> Result<DerivedKey, GateError> {
    if master_secret.is_empty() {
        tracing::error!(target: "gate.crypto", "Refusing to derive key from empty master secret");
        return Err(GateError::InvalidMasterSecret);
    }

    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
    let prk = salt.extract(master_secret);
    let info = [purpose.as_bytes()];
    let okm = prk
        .expand(&info, DerivedKeyLen)
        .map_err(|_| GateError::Crypto("HKDF expand failed".to_string()))?;

    let mut bytes = [0u8; DERIVED_KEY_LEN];
    okm.fill(&mut bytes)
        .map_err(|_| GateError::Crypto("HKDF fill failed".to_string()))?;

    Ok(DerivedKey {
        bytes: SecretBox::new(Box::new(bytes)),
    })
}

/// Derive the admin token signing key.
pub fn derive_admin_jwt_key(master_secret: &[u8]) -> Result<DerivedKey, GateError> {
    derive_key(master_secret, ADMIN_JWT_PURPOSE)
}

/// Derive the developer token signing key.
pub fn derive_developer_jwt_key(master_secret: &[u8]) -> Result<DerivedKey, GateError> {
    derive_key(master_secret, DEVELOPER_JWT_PURPOSE)
}

// ============================================================================
// API Key Hashing
// ============================================================================

/// Hash an API key with bcrypt (hash version 2).
///
/// # Errors
///
/// Returns `GateError::Crypto` if the cost is outside 10-14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_api_key(key: &str, cost: u32) -> Result<String, GateError> {
    hash_with_bcrypt(key, cost)
}

/// Hash an API key with the legacy scheme (hash version 1): hex SHA-256.
///
/// Only used to verify keys issued before bcrypt; never for new keys.
pub fn hash_api_key_legacy(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a presented API key against a stored hash of the given version.
///
/// The legacy comparison runs in constant time. A malformed bcrypt hash is a
/// mismatch, not an error.
#[instrument(skip_all)]
pub fn verify_api_key(key: &str, stored_hash: &str, version: HashVersion) -> bool {
    match version {
        HashVersion::LegacySha256 => {
            let candidate = hash_api_key_legacy(key);
            constant_time_eq(candidate.as_bytes(), stored_hash.as_bytes())
        }
        HashVersion::Bcrypt => {
            let start = Instant::now();
            let result = bcrypt::verify(key, stored_hash);
            record_bcrypt_duration("verify", start.elapsed());
            match result {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::debug!(
                        target: "gate.crypto",
                        error = %e,
                        "Stored bcrypt hash is malformed"
                    );
                    false
                }
            }
        }
    }
}

/// Compare two byte strings in time independent of where they first differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, GateError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| GateError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a new API key (32 random bytes, URL-safe base64).
///
/// Returns a `SecretString`; the caller hands it to the client exactly once.
#[instrument(skip_all)]
pub fn generate_api_key() -> Result<SecretString, GateError> {
    let bytes = generate_random_bytes(API_KEY_RANDOM_BYTES)?;
    Ok(SecretString::from(general_purpose::URL_SAFE.encode(bytes)))
}

/// Lookup prefix of a key: its first [`API_KEY_PREFIX_LEN`] characters.
///
/// Returns `None` for keys that are too short.
pub fn api_key_prefix(key: &str) -> Option<&str> {
    match key.char_indices().nth(API_KEY_PREFIX_LEN) {
        Some((end, _)) => key.get(..end),
        None if key.chars().count() == API_KEY_PREFIX_LEN => Some(key),
        None => None,
    }
}

// ============================================================================
// Passwords
// ============================================================================

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `GateError::Crypto` if the cost is outside 10-14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, GateError> {
    hash_with_bcrypt(password, cost)
}

/// Verify a password against a bcrypt hash.
///
/// # Errors
///
/// Returns `GateError::Crypto` if the stored hash is malformed.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, GateError> {
    let start = Instant::now();
    let result = bcrypt::verify(password, hash)
        .map_err(|e| GateError::Crypto(format!("Password verification failed: {}", e)));
    record_bcrypt_duration("verify", start.elapsed());
    result
}

fn hash_with_bcrypt(secret: &str, cost: u32) -> Result<String, GateError> {
    // Validate cost even though config already did; this is reachable directly.
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(GateError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    let start = Instant::now();
    let result = bcrypt::hash(secret, cost)
        .map_err(|e| GateError::Crypto(format!("bcrypt hashing failed: {}", e)));
    record_bcrypt_duration("hash", start.elapsed());
    result
}
