use crate::errors::GateError;
use crate::tokens::{AdminClaims, DeveloperClaims};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

/// Account role.
///
/// Stored as free text. Unknown or blank values normalize to `Viewer`, the
/// least privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    Agent,
}

impl Role {
    /// Normalize a stored role string (case-insensitive, whitespace-trimmed).
    pub fn parse(role: &str) -> Role {
        match role.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "editor" => Role::Editor,
            "agent" => Role::Agent,
            _ => Role::Viewer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` normalizes to any of `allowed`. An empty allow-list grants nothing.
pub fn has_role(role: &str, allowed: &[Role]) -> bool {
    let current = Role::parse(role);
    allowed.contains(&current)
}

// ============================================================================
// API Keys
// ============================================================================

/// Hash algorithm an API key was stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashVersion {
    /// Hex SHA-256, retained only for keys issued before bcrypt.
    LegacySha256,
    /// bcrypt, used for every key issued now.
    Bcrypt,
}

impl HashVersion {
    /// Map the stored integer. Unknown versions are `None`.
    pub fn from_stored(version: i16) -> Option<HashVersion> {
        match version {
            1 => Some(HashVersion::LegacySha256),
            2 => Some(HashVersion::Bcrypt),
            _ => None,
        }
    }

    pub fn as_stored(&self) -> i16 {
        match self {
            HashVersion::LegacySha256 => 1,
            HashVersion::Bcrypt => 2,
        }
    }
}

/// API key record (maps to api_keys table).
///
/// `key_hash` is redacted in Debug output.
#[derive(Clone, FromRow)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub prefix: String,
    pub key_hash: String,
    pub hash_version: i16,
    pub name: String,
    pub role: String,
    pub rate_limit_tier: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub developer_id: Option<Uuid>,
}

impl fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("key_hash", &"[REDACTED]")
            .field("hash_version", &self.hash_version)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("rate_limit_tier", &self.rate_limit_tier)
            .field("is_active", &self.is_active)
            .field("expires_at", &self.expires_at)
            .field("developer_id", &self.developer_id)
            .finish()
    }
}

/// Parameters for inserting a new API key.
#[derive(Clone)]
pub struct NewApiKey {
    pub prefix: String,
    pub key_hash: String,
    pub hash_version: HashVersion,
    pub name: String,
    pub role: Role,
    pub rate_limit_tier: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub developer_id: Option<Uuid>,
}

/// Verified API key as seen by downstream handlers (no hash material).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyPrincipal {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub rate_limit_tier: String,
    pub developer_id: Option<Uuid>,
}

impl From<&ApiKeyRecord> for ApiKeyPrincipal {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            role: Role::parse(&record.role),
            rate_limit_tier: record.rate_limit_tier.clone(),
            developer_id: record.developer_id,
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Admin user (maps to admin_users table)
#[derive(Clone, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AdminUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminUser")
            .field("id", &self.id)
            .field("username", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Developer account (maps to developers table)
#[derive(Clone, FromRow)]
pub struct Developer {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub max_keys: i32,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Developer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Developer")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("max_keys", &self.max_keys)
            .field("is_active", &self.is_active)
            .finish()
    }
}

// ============================================================================
// Authenticated identity
// ============================================================================

/// Identity established by one of the authentication middlewares.
///
/// Inserted into request extensions and extracted by handlers as an axum
/// extractor.
#[derive(Debug, Clone)]
pub enum AuthenticatedIdentity {
    Admin(AdminClaims),
    Developer(DeveloperClaims),
    ApiKey(ApiKeyPrincipal),
}

impl AuthenticatedIdentity {
    /// Bounded label for metrics and logs.
    pub fn credential_kind(&self) -> &'static str {
        match self {
            AuthenticatedIdentity::Admin(_) => "admin_token",
            AuthenticatedIdentity::Developer(_) => "developer_token",
            AuthenticatedIdentity::ApiKey(_) => "api_key",
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or_else(|| {
                tracing::debug!(
                    target: "gate.middleware.auth",
                    "No authenticated identity on request"
                );
                GateError::MissingCredential
            })
    }
}

// ============================================================================
// Response bodies
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}
