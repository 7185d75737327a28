use crate::crypto::DerivedKey;
use crate::errors::GateError;
use crate::tokens::{issue_window, sign, verify, IssuedToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Discriminator carried in the `type` claim of admin tokens.
pub const ADMIN_TOKEN_TYPE: &str = "admin";

/// Admin token claims.
///
/// `role` is the account role at issuance; the codec does not check it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl fmt::Debug for AdminClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClaims")
            .field("sub", &"[REDACTED]")
            .field("role", &self.role)
            .field("token_type", &self.token_type)
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// Issues and validates admin tokens.
pub struct AdminTokenCodec {
    key: DerivedKey,
    issuer: String,
    ttl: Duration,
    clock_skew: Duration,
}

impl AdminTokenCodec {
    pub fn new(key: DerivedKey, issuer: String, ttl: Duration, clock_skew: Duration) -> Self {
        Self {
            key,
            issuer,
            ttl,
            clock_skew,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a new admin token for `subject` carrying `role`.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an empty subject or role, `Crypto` if signing fails.
    #[instrument(skip_all)]
    pub fn generate(&self, subject: &str, role: &str) -> Result<IssuedToken, GateError> {
        self.generate_at(subject, role, Utc::now())
    }

    /// Sign a token as if issued at `now`.
    pub fn generate_at(
        &self,
        subject: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, GateError> {
        if subject.trim().is_empty() {
            return Err(GateError::BadRequest("subject is required".to_string()));
        }
        if role.trim().is_empty() {
            return Err(GateError::BadRequest("role is required".to_string()));
        }

        let (iat, expires_at) = issue_window(now, self.ttl)?;
        let claims = AdminClaims {
            sub: subject.to_string(),
            role: role.to_string(),
            token_type: ADMIN_TOKEN_TYPE.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp: expires_at.timestamp(),
        };

        let token = sign(&claims, &self.key)?;
        tracing::debug!(target: "gate.tokens", token_type = ADMIN_TOKEN_TYPE, "Issued token");

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate an admin token against the current time.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for a blank token, `WrongCredentialType` for a
    /// token of another class, `InvalidCredential` otherwise.
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<AdminClaims, GateError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate an admin token against an explicit unix timestamp.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<AdminClaims, GateError> {
        verify(
            token,
            &self.key,
            ADMIN_TOKEN_TYPE,
            &self.issuer,
            self.clock_skew,
            now,
        )
    }
}

impl fmt::Debug for AdminTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminTokenCodec")
            .field("key", &self.key)
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}
