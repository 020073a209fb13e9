//! API request and response models for department webhook endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DepartmentId, ResourceId};
use crate::webhooks::{DeliveryOutcome, TenantWebhookConfig};

/// Settings and last delivery status. Never carries the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettingsResponse {
    pub department_id: DepartmentId,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub has_secret: bool,
    pub event_toggles: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&TenantWebhookConfig> for WebhookSettingsResponse {
    fn from(config: &TenantWebhookConfig) -> Self {
        Self {
            department_id: config.department_id,
            enabled: config.enabled,
            endpoint_url: config.endpoint_url.as_ref().map(|u| u.to_string()),
            has_secret: config.secret.as_ref().is_some_and(|s| !s.is_empty()),
            event_toggles: config.event_toggles.clone(),
            last_success_at: config.last_success_at,
            last_error: config.last_error.clone(),
        }
    }
}

/// Response to a settings update. `secret` is only present when the update generated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookUpdateResponse {
    #[serde(flatten)]
    pub settings: WebhookSettingsResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSecretResponse {
    pub department_id: DepartmentId,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTestResponse {
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl WebhookTestResponse {
    pub fn from_outcome(outcome: DeliveryOutcome, duration_ms: u64) -> Self {
        Self {
            success: outcome.success,
            attempts: outcome.attempts,
            status_code: outcome.last_http_status,
            error: outcome.last_error,
            duration_ms,
        }
    }
}

/// A committed business change, reported by an out-of-process service.
#[derive(Debug, Clone, Deserialize)]
pub struct EventNotification {
    /// e.g. `created`
    pub action: String,
    /// e.g. `incident`
    pub resource_type: String,
    pub resource_id: ResourceId,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentPathParams {
    pub department_id: DepartmentId,
}
