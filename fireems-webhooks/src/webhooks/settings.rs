//! Per-department webhook configuration.
//!
//! [`TenantWebhookConfig`] is read by every dispatch and changed by two writers: the
//! administrative interface (through [`TenantWebhookConfig::apply`] and
//! [`TenantWebhookConfig::rotate_secret`]) and the status tracker (`last_success_at` /
//! `last_error` only).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::types::DepartmentId;
use crate::webhooks::error::WebhookError;
use crate::webhooks::signing::WebhookSecret;

#[derive(Debug, Clone, PartialEq)]
pub struct TenantWebhookConfig {
    pub department_id: DepartmentId,
    pub enabled: bool,
    pub endpoint_url: Option<Url>,
    pub secret: Option<WebhookSecret>,
    /// Event type -> opted in. Missing keys mean "not subscribed".
    pub event_toggles: BTreeMap<String, bool>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Partial update from the administrative interface.
///
/// `endpoint_url: Some(None)` clears the URL; toggles are merged key by key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSettingsUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, with = "double_option")]
    pub endpoint_url: Option<Option<String>>,
    #[serde(default)]
    pub event_toggles: Option<BTreeMap<String, bool>>,
}

/// What changed as a result of [`TenantWebhookConfig::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// A secret was generated because webhooks were enabled without one.
    pub generated_secret: bool,
}

impl TenantWebhookConfig {
    /// A fresh, disabled configuration for a department.
    pub fn new(department_id: DepartmentId) -> Self {
        Self {
            department_id,
            enabled: false,
            endpoint_url: None,
            secret: None,
            event_toggles: BTreeMap::new(),
            last_success_at: None,
            last_error: None,
        }
    }

    /// Whether the department opted in to this event type.
    pub fn is_event_enabled(&self, event_type: &str) -> bool {
        self.event_toggles.get(event_type).copied().unwrap_or(false)
    }

    /// The endpoint to deliver to, or the configuration error explaining why there is none.
    pub fn endpoint(&self) -> Result<&Url, WebhookError> {
        self.endpoint_url.as_ref().ok_or(WebhookError::MissingEndpoint {
            department_id: self.department_id,
        })
    }

    /// Apply an administrative update, keeping the enabled invariant intact.
    ///
    /// Either the whole update is applied or nothing is. Enabling without a secret generates
    /// one; enabling without a valid endpoint URL is rejected.
    pub fn apply(&mut self, update: WebhookSettingsUpdate) -> Result<AppliedChanges, WebhookError> {
        let mut next = self.clone();
        let mut changes = AppliedChanges::default();

        if let Some(url) = update.endpoint_url {
            next.endpoint_url = url.as_deref().map(parse_endpoint).transpose()?;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        if let Some(toggles) = update.event_toggles {
            next.event_toggles.extend(toggles);
        }

        if next.enabled {
            if next.endpoint_url.is_none() {
                return Err(WebhookError::MissingEndpoint {
                    department_id: self.department_id,
                });
            }
            if next.secret.as_ref().is_none_or(WebhookSecret::is_empty) {
                next.secret = Some(WebhookSecret::generate());
                changes.generated_secret = true;
            }
        }

        *self = next;
        Ok(changes)
    }

    /// Replace the signing secret with a freshly generated one.
    pub fn rotate_secret(&mut self) -> &WebhookSecret {
        self.secret.insert(WebhookSecret::generate())
    }
}

/// Validate an endpoint URL: absolute, `http` or `https`, with a host.
pub fn parse_endpoint(raw: &str) -> Result<Url, WebhookError> {
    let url = Url::parse(raw.trim()).map_err(|e| WebhookError::InvalidEndpoint(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WebhookError::InvalidEndpoint(format!(
            "{raw}: scheme must be http or https"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(WebhookError::InvalidEndpoint(format!("{raw}: missing host")));
    }

    Ok(url)
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
