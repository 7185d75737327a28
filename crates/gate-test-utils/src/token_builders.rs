//! Builder patterns for test tokens
//!
//! The codecs only mint well-formed tokens. These builders produce arbitrary
//! claim sets (missing discriminator, foreign issuer, expired, future `iat`)
//! signed with any derived key, for exercising the rejection paths.

use crate::crypto_fixtures::{FixtureError, TEST_ISSUER};
use chrono::Utc;
use gate_service::crypto::DerivedKey;
use gate_service::tokens::{ADMIN_TOKEN_TYPE, DEVELOPER_TOKEN_TYPE};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Builder for test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::admin("root")
///     .without_type()
///     .expires_in(-60)
///     .sign(&test_admin_key()?)?;
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Admin claims for `subject` with role `admin`, valid for one hour.
    pub fn admin(subject: &str) -> Self {
        Self::base(subject)
            .with_claim("role", json!("admin"))
            .with_type(ADMIN_TOKEN_TYPE)
    }

    /// Developer claims for `developer_id`, valid for one hour.
    pub fn developer(developer_id: Uuid) -> Self {
        Self::base(&developer_id.to_string())
            .with_claim("email", json!("dev@example.com"))
            .with_claim("name", json!("Test Developer"))
            .with_type(DEVELOPER_TOKEN_TYPE)
    }

    fn base(subject: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(subject));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));
        Self { claims }
    }

    /// Set or replace an arbitrary claim.
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Set the `type` discriminator.
    pub fn with_type(self, token_type: &str) -> Self {
        self.with_claim("type", json!(token_type))
    }

    /// Remove the `type` discriminator.
    pub fn without_type(mut self) -> Self {
        self.claims.remove("type");
        self
    }

    pub fn with_role(self, role: &str) -> Self {
        self.with_claim("role", json!(role))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set expiration in seconds from now (negative for an expired token).
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!(Utc::now().timestamp() + seconds))
    }

    /// Set issued-at in seconds from now (positive for a future `iat`).
    pub fn issued_in(self, seconds: i64) -> Self {
        self.with_claim("iat", json!(Utc::now().timestamp() + seconds))
    }

    /// The claims as a JSON value.
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign the claims with HS256 under `key`.
    pub fn sign(self, key: &DerivedKey) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        encode(
            &header,
            &Value::Object(self.claims),
            &EncodingKey::from_secret(key.expose_secret()),
        )
        .map_err(|e| FixtureError::Crypto(format!("Failed to sign test token: {}", e)))
    }
}
