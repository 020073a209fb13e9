//! Database repository for department webhook settings and delivery status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::webhooks::{DepartmentWebhookRow, DepartmentWebhookUpsertDBRequest};
use crate::types::DepartmentId;
use crate::webhooks::settings::TenantWebhookConfig;
use crate::webhooks::store::WebhookStore;

/// Repository for `department_webhooks`.
pub struct DepartmentWebhooks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> DepartmentWebhooks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self, department_id: DepartmentId) -> Result<Option<DepartmentWebhookRow>> {
        let row = sqlx::query_as::<_, DepartmentWebhookRow>("SELECT * FROM department_webhooks WHERE department_id = $1")
            .bind(department_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row)
    }

    /// Insert or replace the administrative fields. Status columns are left alone.
    #[instrument(skip(self, request), fields(department_id = request.department_id, enabled = request.enabled), err)]
    pub async fn upsert_settings(&mut self, request: &DepartmentWebhookUpsertDBRequest) -> Result<DepartmentWebhookRow> {
        let row = sqlx::query_as::<_, DepartmentWebhookRow>(
            r#"
            INSERT INTO department_webhooks (department_id, enabled, endpoint_url, secret, event_toggles)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (department_id) DO UPDATE
            SET
                enabled = EXCLUDED.enabled,
                endpoint_url = EXCLUDED.endpoint_url,
                secret = EXCLUDED.secret,
                event_toggles = EXCLUDED.event_toggles,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(request.department_id)
        .bind(request.enabled)
        .bind(&request.endpoint_url)
        .bind(&request.secret)
        .bind(Json(&request.event_toggles))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// Returns whether a row was updated.
    #[instrument(skip(self), err)]
    pub async fn record_success(&mut self, department_id: DepartmentId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE department_webhooks
            SET last_success_at = $2, updated_at = NOW()
            WHERE department_id = $1
            "#,
        )
        .bind(department_id)
        .bind(at)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row was updated.
    #[instrument(skip(self, message), err)]
    pub async fn record_error(&mut self, department_id: DepartmentId, message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE department_webhooks
            SET last_error = $2, updated_at = NOW()
            WHERE department_id = $1
            "#,
        )
        .bind(department_id)
        .bind(message)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// [`WebhookStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn get(&self, department_id: DepartmentId) -> Result<Option<TenantWebhookConfig>> {
        let mut conn = self.pool.acquire().await?;
        let row = DepartmentWebhooks::new(&mut conn).get(department_id).await?;
        Ok(row.map(TenantWebhookConfig::from))
    }

    async fn save(&self, config: &TenantWebhookConfig) -> Result<TenantWebhookConfig> {
        let mut conn = self.pool.acquire().await?;
        let request = DepartmentWebhookUpsertDBRequest::from(config);
        let row = DepartmentWebhooks::new(&mut conn).upsert_settings(&request).await?;
        Ok(row.into())
    }

    async fn record_success(&self, department_id: DepartmentId, at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        DepartmentWebhooks::new(&mut conn).record_success(department_id, at).await?;
        Ok(())
    }

    async fn record_error(&self, department_id: DepartmentId, message: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        DepartmentWebhooks::new(&mut conn).record_error(department_id, message).await?;
        Ok(())
    }
}
