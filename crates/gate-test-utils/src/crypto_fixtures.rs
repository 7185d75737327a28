//! Deterministic cryptographic fixtures for testing
//!
//! Every fixture is derived from one fixed master secret, so tokens signed in
//! one test validate against codecs built in another.

use chrono::{DateTime, Utc};
use gate_service::config::MIN_BCRYPT_COST;
use gate_service::crypto::{self, DerivedKey};
use gate_service::models::{ApiKeyRecord, HashVersion};
use gate_service::tokens::{AdminTokenCodec, DeveloperTokenCodec};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Issuer used by every test codec.
pub const TEST_ISSUER: &str = "gatehouse-test";

/// Token lifetime used by every test codec.
pub const TEST_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Clock skew tolerance used by every test codec.
pub const TEST_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

impl From<gate_service::errors::GateError> for FixtureError {
    fn from(err: gate_service::errors::GateError) -> Self {
        FixtureError::Crypto(err.to_string())
    }
}

/// Deterministic 32-byte master secret.
pub fn test_master_secret() -> Vec<u8> {
    (0u8..32).collect()
}

/// Admin token signing key derived from [`test_master_secret`].
pub fn test_admin_key() -> Result<DerivedKey, FixtureError> {
    Ok(crypto::derive_admin_jwt_key(&test_master_secret())?)
}

/// Developer token signing key derived from [`test_master_secret`].
pub fn test_developer_key() -> Result<DerivedKey, FixtureError> {
    Ok(crypto::derive_developer_jwt_key(&test_master_secret())?)
}

pub fn test_admin_codec() -> Result<AdminTokenCodec, FixtureError> {
    Ok(AdminTokenCodec::new(
        test_admin_key()?,
        TEST_ISSUER.to_string(),
        TEST_TOKEN_TTL,
        TEST_CLOCK_SKEW,
    ))
}

pub fn test_developer_codec() -> Result<DeveloperTokenCodec, FixtureError> {
    Ok(DeveloperTokenCodec::new(
        test_developer_key()?,
        TEST_ISSUER.to_string(),
        TEST_TOKEN_TTL,
        TEST_CLOCK_SKEW,
    ))
}

/// Builder for stored API key records.
///
/// # Example
/// ```rust,ignore
/// let record = TestApiKey::new(TEST_API_KEY_LEGACY)
///     .hash_version(HashVersion::LegacySha256)
///     .inactive()
///     .build()?;
/// ```
pub struct TestApiKey {
    key: String,
    id: Uuid,
    hash_version: HashVersion,
    role: String,
    rate_limit_tier: String,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    developer_id: Option<Uuid>,
}

impl TestApiKey {
    /// Record for `key`, bcrypt-hashed, active, non-expiring.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            id: Uuid::new_v4(),
            hash_version: HashVersion::Bcrypt,
            role: "agent".to_string(),
            rate_limit_tier: "agent".to_string(),
            is_active: true,
            expires_at: None,
            developer_id: None,
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn hash_version(mut self, version: HashVersion) -> Self {
        self.hash_version = version;
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn owned_by(mut self, developer_id: Uuid) -> Self {
        self.developer_id = Some(developer_id);
        self
    }

    /// Hash the key and build the record.
    pub fn build(self) -> Result<ApiKeyRecord, FixtureError> {
        let prefix = crypto::api_key_prefix(&self.key)
            .ok_or_else(|| FixtureError::Crypto("API key shorter than prefix".to_string()))?
            .to_string();

        let key_hash = match self.hash_version {
            HashVersion::LegacySha256 => crypto::hash_api_key_legacy(&self.key),
            HashVersion::Bcrypt => crypto::hash_api_key(&self.key, MIN_BCRYPT_COST)?,
        };

        Ok(ApiKeyRecord {
            id: self.id,
            prefix,
            key_hash,
            hash_version: self.hash_version.as_stored(),
            name: "test-key".to_string(),
            role: self.role,
            rate_limit_tier: self.rate_limit_tier,
            is_active: self.is_active,
            expires_at: self.expires_at,
            developer_id: self.developer_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ids::TEST_API_KEY_LEGACY;

    #[test]
    fn test_master_secret_is_deterministic() {
        assert_eq!(test_master_secret(), test_master_secret());
        assert_eq!(test_master_secret().len(), 32);
    }

    #[test]
    fn test_codecs_share_keys_across_calls() {
        let token = test_admin_codec()
            .unwrap()
            .generate("root", "admin")
            .unwrap()
            .token;
        assert!(test_admin_codec().unwrap().validate(&token).is_ok());
    }

    #[test]
    fn test_api_key_builder_legacy() {
        let record = TestApiKey::new(TEST_API_KEY_LEGACY)
            .hash_version(HashVersion::LegacySha256)
            .build()
            .unwrap();
        assert_eq!(record.hash_version, 1);
        assert_eq!(record.key_hash.len(), 64);
        assert!(TEST_API_KEY_LEGACY.starts_with(&record.prefix));
    }

    #[test]
    fn test_api_key_builder_rejects_short_key() {
        assert!(TestApiKey::new("short").build().is_err());
    }
}
