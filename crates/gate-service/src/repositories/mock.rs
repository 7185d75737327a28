//! In-memory stores for testing.
//!
//! Each store can be switched into a failing mode to exercise dependency
//! failures, and counts calls so tests can assert on side effects.

use super::{AdminUserStore, ApiKeyStore, DeveloperStore};
use crate::errors::GateError;
use crate::models::{AdminUser, ApiKeyRecord, Developer, NewApiKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`ApiKeyStore`].
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    records: Mutex<Vec<ApiKeyRecord>>,
    last_used: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    lookup_count: AtomicUsize,
    update_count: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a single record.
    pub fn with_record(record: ApiKeyRecord) -> Self {
        let store = Self::default();
        store.insert(record);
        store
    }

    pub fn insert(&self, record: ApiKeyRecord) {
        lock(&self.records).push(record);
    }

    pub fn records(&self) -> Vec<ApiKeyRecord> {
        lock(&self.records).clone()
    }

    /// Make lookups (and pings) fail with a dependency error.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Make `update_last_used` fail with a dependency error.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    pub fn last_used(&self, id: Uuid) -> Option<DateTime<Utc>> {
        lock(&self.last_used).get(&id).copied()
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn lookup_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, GateError> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock lookup failure".to_string()));
        }

        Ok(lock(&self.records)
            .iter()
            .find(|record| record.prefix == prefix)
            .cloned())
    }

    async fn update_last_used(&self, id: Uuid) -> Result<(), GateError> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock update failure".to_string()));
        }

        lock(&self.last_used).insert(id, Utc::now());
        Ok(())
    }

    async fn create_with_limit(
        &self,
        new_key: NewApiKey,
        max_keys: i64,
    ) -> Result<Option<ApiKeyRecord>, GateError> {
        let mut records = lock(&self.records);

        if let Some(developer_id) = new_key.developer_id {
            let active = records
                .iter()
                .filter(|r| r.developer_id == Some(developer_id) && r.is_active)
                .count();
            if i64::try_from(active).unwrap_or(i64::MAX) >= max_keys {
                return Ok(None);
            }
        }

        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            prefix: new_key.prefix,
            key_hash: new_key.key_hash,
            hash_version: new_key.hash_version.as_stored(),
            name: new_key.name,
            role: new_key.role.as_str().to_string(),
            rate_limit_tier: new_key.rate_limit_tier,
            is_active: true,
            expires_at: new_key.expires_at,
            developer_id: new_key.developer_id,
        };
        records.push(record.clone());
        Ok(Some(record))
    }

    async fn ping(&self) -> Result<(), GateError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock ping failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory [`AdminUserStore`].
#[derive(Debug, Default)]
pub struct InMemoryAdminUserStore {
    users: Mutex<Vec<AdminUser>>,
    last_login_updates: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryAdminUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: AdminUser) {
        lock(&self.users).push(user);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn last_login_updates(&self) -> usize {
        self.last_login_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminUserStore for InMemoryAdminUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, GateError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock lookup failure".to_string()));
        }
        Ok(lock(&self.users)
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError> {
        self.last_login_updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock update failure".to_string()));
        }
        if let Some(user) = lock(&self.users).iter_mut().find(|user| user.id == id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// In-memory [`DeveloperStore`].
#[derive(Debug, Default)]
pub struct InMemoryDeveloperStore {
    developers: Mutex<Vec<Developer>>,
    last_login_updates: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryDeveloperStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, developer: Developer) {
        lock(&self.developers).push(developer);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn last_login_updates(&self) -> usize {
        self.last_login_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeveloperStore for InMemoryDeveloperStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Developer>, GateError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock lookup failure".to_string()));
        }
        let email = email.trim();
        Ok(lock(&self.developers)
            .iter()
            .find(|developer| developer.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Developer>, GateError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock lookup failure".to_string()));
        }
        Ok(lock(&self.developers)
            .iter()
            .find(|developer| developer.id == id)
            .cloned())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError> {
        self.last_login_updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(GateError::Dependency("mock update failure".to_string()));
        }
        if let Some(developer) = lock(&self.developers).iter_mut().find(|d| d.id == id) {
            developer.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}
