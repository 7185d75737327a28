use crate::crypto::DerivedKey;
use crate::errors::GateError;
use crate::tokens::{issue_window, sign, verify, IssuedToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Discriminator carried in the `type` claim of developer tokens.
pub const DEVELOPER_TOKEN_TYPE: &str = "developer";

/// Developer portal token claims.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeveloperClaims {
    /// Developer id
    pub sub: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl DeveloperClaims {
    /// Parse the subject back into a developer id.
    pub fn developer_id(&self) -> Result<Uuid, GateError> {
        Uuid::parse_str(&self.sub).map_err(|_| {
            GateError::InvalidCredential("The access token is invalid or expired".to_string())
        })
    }
}

impl fmt::Debug for DeveloperClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeveloperClaims")
            .field("sub", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// Issues and validates developer tokens.
pub struct DeveloperTokenCodec {
    key: DerivedKey,
    issuer: String,
    ttl: Duration,
    clock_skew: Duration,
}

impl DeveloperTokenCodec {
    pub fn new(key: DerivedKey, issuer: String, ttl: Duration, clock_skew: Duration) -> Self {
        Self {
            key,
            issuer,
            ttl,
            clock_skew,
        }
    }

    /// Sign a new developer token.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a nil id or empty email, `Crypto` if signing fails.
    #[instrument(skip_all)]
    pub fn generate(
        &self,
        developer_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<IssuedToken, GateError> {
        self.generate_at(developer_id, email, name, Utc::now())
    }

    pub fn generate_at(
        &self,
        developer_id: Uuid,
        email: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, GateError> {
        if developer_id.is_nil() {
            return Err(GateError::BadRequest("developer id is required".to_string()));
        }
        if email.trim().is_empty() {
            return Err(GateError::BadRequest("email is required".to_string()));
        }

        let (iat, expires_at) = issue_window(now, self.ttl)?;
        let claims = DeveloperClaims {
            sub: developer_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            token_type: DEVELOPER_TOKEN_TYPE.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp: expires_at.timestamp(),
        };

        let token = sign(&claims, &self.key)?;
        tracing::debug!(target: "gate.tokens", token_type = DEVELOPER_TOKEN_TYPE, "Issued token");

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a developer token against the current time.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for a blank token, `WrongCredentialType` for a
    /// token of another class, `InvalidCredential` otherwise.
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<DeveloperClaims, GateError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    pub fn validate_at(&self, token: &str, now: i64) -> Result<DeveloperClaims, GateError> {
        verify(
            token,
            &self.key,
            DEVELOPER_TOKEN_TYPE,
            &self.issuer,
            self.clock_skew,
            now,
        )
    }
}

impl fmt::Debug for DeveloperTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeveloperTokenCodec")
            .field("key", &self.key)
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}
