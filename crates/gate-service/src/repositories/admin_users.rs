//! Admin users repository.

use crate::errors::GateError;
use crate::models::AdminUser;
use crate::observability::metrics;
use crate::repositories::AdminUserStore;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Postgres-backed [`AdminUserStore`].
#[derive(Debug, Clone)]
pub struct PgAdminUserStore {
    pool: PgPool,
}

impl PgAdminUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminUserStore for PgAdminUserStore {
    #[instrument(skip_all, name = "gate.repo.find_admin_user")]
    async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, GateError> {
        let start = Instant::now();

        let user = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, last_login_at
            FROM admin_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_admin_user", "error", start.elapsed());
            GateError::from(e)
        })?;

        metrics::record_db_query("find_admin_user", "success", start.elapsed());
        Ok(user)
    }

    #[instrument(skip_all, name = "gate.repo.update_admin_last_login")]
    async fn update_last_login(&self, id: Uuid) -> Result<(), GateError> {
        sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
