//! Persistence seam for department webhook configuration and delivery status.
//!
//! [`WebhookStore`] is implemented by [`PgWebhookStore`](crate::db::handlers::PgWebhookStore)
//! in production and by [`InMemoryWebhookStore`] for local runs and tests. [`StatusTracker`]
//! sits on top and is the only thing the dispatch pipeline writes through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error};

use crate::db::errors::Result;
use crate::types::DepartmentId;
use crate::webhooks::settings::TenantWebhookConfig;

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Configuration for a department, or `None` if it never configured webhooks.
    async fn get(&self, department_id: DepartmentId) -> Result<Option<TenantWebhookConfig>>;

    /// Persist the administrative fields (enabled, URL, secret, toggles).
    ///
    /// Status fields on `config` are ignored; they are owned by the status tracker.
    async fn save(&self, config: &TenantWebhookConfig) -> Result<TenantWebhookConfig>;

    /// Set `last_success_at`. Leaves `last_error` untouched.
    async fn record_success(&self, department_id: DepartmentId, at: DateTime<Utc>) -> Result<()>;

    /// Set `last_error`. Leaves `last_success_at` untouched.
    async fn record_error(&self, department_id: DepartmentId, message: &str) -> Result<()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryWebhookStore {
    configs: DashMap<DepartmentId, TenantWebhookConfig>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn get(&self, department_id: DepartmentId) -> Result<Option<TenantWebhookConfig>> {
        Ok(self.configs.get(&department_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, config: &TenantWebhookConfig) -> Result<TenantWebhookConfig> {
        let mut entry = self
            .configs
            .entry(config.department_id)
            .or_insert_with(|| TenantWebhookConfig::new(config.department_id));

        entry.enabled = config.enabled;
        entry.endpoint_url = config.endpoint_url.clone();
        entry.secret = config.secret.clone();
        entry.event_toggles = config.event_toggles.clone();

        Ok(entry.clone())
    }

    async fn record_success(&self, department_id: DepartmentId, at: DateTime<Utc>) -> Result<()> {
        if let Some(mut entry) = self.configs.get_mut(&department_id) {
            entry.last_success_at = Some(at);
        }
        Ok(())
    }

    async fn record_error(&self, department_id: DepartmentId, message: &str) -> Result<()> {
        if let Some(mut entry) = self.configs.get_mut(&department_id) {
            entry.last_error = Some(message.to_string());
        }
        Ok(())
    }
}

/// Writes delivery results back to the department configuration.
///
/// Storage failures are logged and swallowed: a status write must never fail a delivery.
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn WebhookStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn WebhookStore>) -> Self {
        Self { store }
    }

    pub async fn record_success(&self, department_id: DepartmentId, at: DateTime<Utc>) {
        match self.store.record_success(department_id, at).await {
            Ok(()) => debug!(department_id, %at, "Recorded webhook success"),
            Err(e) => error!(department_id, error = %e, "Failed to record webhook success"),
        }
    }

    pub async fn record_error(&self, department_id: DepartmentId, message: &str) {
        match self.store.record_error(department_id, message).await {
            Ok(()) => debug!(department_id, message, "Recorded webhook error"),
            Err(e) => error!(department_id, error = %e, "Failed to record webhook error"),
        }
    }
}
