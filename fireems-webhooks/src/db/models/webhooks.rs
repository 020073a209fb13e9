//! Database models for department webhook settings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use tracing::warn;
use url::Url;

use crate::types::DepartmentId;
use crate::webhooks::settings::TenantWebhookConfig;
use crate::webhooks::signing::WebhookSecret;

/// A `department_webhooks` row.
#[derive(Debug, Clone, FromRow)]
pub struct DepartmentWebhookRow {
    pub department_id: DepartmentId,
    pub enabled: bool,
    pub endpoint_url: Option<String>,
    pub secret: Option<Vec<u8>>,
    pub event_toggles: Json<BTreeMap<String, bool>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Administrative fields written by an upsert.
#[derive(Debug, Clone)]
pub struct DepartmentWebhookUpsertDBRequest {
    pub department_id: DepartmentId,
    pub enabled: bool,
    pub endpoint_url: Option<String>,
    pub secret: Option<Vec<u8>>,
    pub event_toggles: BTreeMap<String, bool>,
}

impl From<&TenantWebhookConfig> for DepartmentWebhookUpsertDBRequest {
    fn from(config: &TenantWebhookConfig) -> Self {
        Self {
            department_id: config.department_id,
            enabled: config.enabled,
            endpoint_url: config.endpoint_url.as_ref().map(Url::to_string),
            secret: config.secret.as_ref().map(|s| s.as_bytes().to_vec()),
            event_toggles: config.event_toggles.clone(),
        }
    }
}

impl From<DepartmentWebhookRow> for TenantWebhookConfig {
    fn from(row: DepartmentWebhookRow) -> Self {
        // Stored URLs were validated on the way in; an unparsable one is treated as unset
        let endpoint_url = row.endpoint_url.as_deref().and_then(|raw| match raw.parse::<Url>() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(department_id = row.department_id, error = %e, "Ignoring unparsable stored webhook URL");
                None
            }
        });

        Self {
            department_id: row.department_id,
            enabled: row.enabled,
            endpoint_url,
            secret: row.secret.map(WebhookSecret::from),
            event_toggles: row.event_toggles.0,
            last_success_at: row.last_success_at,
            last_error: row.last_error,
        }
    }
}
