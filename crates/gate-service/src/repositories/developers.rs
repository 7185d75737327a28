//! Developers repository.

use crate::errors::GateError;
use crate::models::Developer;
use crate::observability::metrics;
use crate::repositories::DeveloperStore;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Postgres-backed [`DeveloperStore`].
#[derive(Debug, Clone)]
pub struct PgDeveloperStore {
    pool: PgPool,
}

impl PgDeveloperStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeveloperStore for PgDeveloperStore {
    #[instrument(skip_all, name = "gate.repo.find_developer_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<Developer>, GateError> {
        let start = Instant::now();

        // Emails are matched case-insensitively
        let developer = sqlx::query_as::<_, Developer>(
            r#"
            SELECT id, email, name, password_hash, max_keys, is_active, last_login_at
            FROM developers
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_developer_by_email", "error", start.elapsed());
            GateError::from(e)
        })?;

        metrics::record_db_query("find_developer_by_email", "success", start.elapsed());
        Ok(developer)
    }

    #[instrument(skip_all, name = "gate.repo.find_developer_by_id")]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Developer>, GateError> {
        let start = Instant::now();

        let developer = sqlx::query_as::<_, Developer>(
            r#"
            SELECT id, email, name, password_hash, max_keys, is_active, last_login_at
            FROM developers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_developer_by_id", "error", start.elapsed());
            GateError::from(e)
        })?;

        metrics::record_db_query("find_developer_by_id", "success", start.elapsed());
        Ok(developer)
    }

    #[instrument(skip_all, name = "gate.repo.update_developer_last_login")]
    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError> {
        sqlx::query("UPDATE developers SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
