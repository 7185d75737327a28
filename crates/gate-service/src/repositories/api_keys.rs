//! API keys repository.
//!
//! # Security
//!
//! - Lookups are by prefix only; the full key never reaches the database
//! - All queries use parameterized statements
//! - Key creation counts and inserts in one statement so concurrent requests
//!   cannot exceed a developer's key limit

use crate::errors::GateError;
use crate::models::{ApiKeyRecord, NewApiKey};
use crate::observability::metrics;
use crate::repositories::ApiKeyStore;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Postgres-backed [`ApiKeyStore`].
#[derive(Debug, Clone)]
pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    #[instrument(skip_all, name = "gate.repo.lookup_api_key")]
    async fn lookup_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, GateError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, ApiKeyRecord>(
            r#"
            SELECT id, prefix, key_hash, hash_version, name, role, rate_limit_tier,
                   is_active, expires_at, developer_id
            FROM api_keys
            WHERE prefix = $1
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("lookup_api_key", "error", start.elapsed());
            GateError::from(e)
        })?;

        metrics::record_db_query("lookup_api_key", "success", start.elapsed());
        Ok(record)
    }

    #[instrument(skip_all, name = "gate.repo.update_api_key_last_used")]
    async fn update_last_used(&self, id: Uuid) -> Result<(), GateError> {
        let start = Instant::now();

        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("update_api_key_last_used", "error", start.elapsed());
                GateError::from(e)
            })?;

        metrics::record_db_query("update_api_key_last_used", "success", start.elapsed());
        Ok(())
    }

    #[instrument(skip_all, name = "gate.repo.create_api_key")]
    async fn create_with_limit(
        &self,
        new_key: NewApiKey,
        max_keys: i64,
    ) -> Result<Option<ApiKeyRecord>, GateError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, ApiKeyRecord>(
            r#"
            WITH current_count AS (
                SELECT COUNT(*) AS cnt
                FROM api_keys
                WHERE developer_id = $8 AND is_active = true
            )
            INSERT INTO api_keys (
                prefix, key_hash, hash_version, name, role, rate_limit_tier,
                expires_at, developer_id, is_active
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, true
            FROM current_count
            WHERE current_count.cnt < $9
            RETURNING id, prefix, key_hash, hash_version, name, role, rate_limit_tier,
                      is_active, expires_at, developer_id
            "#,
        )
        .bind(&new_key.prefix) // $1
        .bind(&new_key.key_hash) // $2
        .bind(new_key.hash_version.as_stored()) // $3
        .bind(&new_key.name) // $4
        .bind(new_key.role.as_str()) // $5
        .bind(&new_key.rate_limit_tier) // $6
        .bind(new_key.expires_at) // $7
        .bind(new_key.developer_id) // $8
        .bind(max_keys) // $9
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_api_key", "error", start.elapsed());
            GateError::from(e)
        })?;

        metrics::record_db_query("create_api_key", "success", start.elapsed());
        Ok(record)
    }

    #[instrument(skip_all, name = "gate.repo.ping")]
    async fn ping(&self) -> Result<(), GateError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
