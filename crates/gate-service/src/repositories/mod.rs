//! Repository layer for Gatehouse.
//!
//! Credential verification only depends on the store traits defined here.
//! The Postgres implementations use runtime-checked sqlx queries; the
//! [`mock`] module provides in-memory stores for tests.

pub mod admin_users;
pub mod api_keys;
pub mod developers;
pub mod mock;

pub use admin_users::PgAdminUserStore;
pub use api_keys::PgApiKeyStore;
pub use developers::PgDeveloperStore;

use crate::errors::GateError;
use crate::models::{AdminUser, ApiKeyRecord, Developer, NewApiKey};
use async_trait::async_trait;
use uuid::Uuid;

/// API key storage.
///
/// Lookups are by the 8-character prefix only; the store never sees a full key.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find the key record with this prefix.
    async fn lookup_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, GateError>;

    /// Record that the key was just used.
    async fn update_last_used(&self, id: Uuid) -> Result<(), GateError>;

    /// Insert a key unless its developer already holds `max_keys` active keys.
    ///
    /// Returns `None` when the limit is reached. The count and insert are atomic.
    async fn create_with_limit(
        &self,
        new_key: NewApiKey,
        max_keys: i64,
    ) -> Result<Option<ApiKeyRecord>, GateError>;

    /// Readiness check against the backing store.
    async fn ping(&self) -> Result<(), GateError>;
}

/// Admin account storage.
#[async_trait]
pub trait AdminUserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, GateError>;

    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError>;
}

/// Developer account storage.
#[async_trait]
pub trait DeveloperStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Developer>, GateError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Developer>, GateError>;

    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError>;
}
