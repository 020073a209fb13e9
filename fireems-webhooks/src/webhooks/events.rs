//! Event envelope construction.
//!
//! An [`EventEnvelope`] is the payload a department endpoint receives. It is built once per
//! qualifying business event, timestamped at build time, and never changes afterwards: retries
//! resend the exact same bytes under the exact same signature.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{DepartmentId, ResourceId};
use crate::webhooks::error::WebhookError;
use crate::webhooks::signing;

/// Event type used for manual "test webhook" deliveries.
pub const TEST_EVENT_TYPE: &str = "webhook.test";

/// Compose an event type of the form `<resource>.<action>`, e.g. `incident.created`.
pub fn event_type(resource_type: &str, action: &str) -> String {
    format!("{resource_type}.{action}")
}

/// Immutable webhook event payload.
///
/// Serializes to `{event, timestamp, resource_type, resource_id, department_id, data}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "event")]
    event_type: String,
    timestamp: String,
    resource_type: String,
    resource_id: ResourceId,
    department_id: DepartmentId,
    data: Map<String, Value>,
}

impl EventEnvelope {
    /// Build an envelope, capturing the current UTC time.
    ///
    /// `data` must serialize to a JSON object (`null` becomes `{}`). Anything else is a
    /// [`WebhookError::Serialization`].
    pub fn build<T>(
        event_type: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<ResourceId>,
        department_id: DepartmentId,
        data: &T,
    ) -> Result<Self, WebhookError>
    where
        T: Serialize + ?Sized,
    {
        Self::build_at(event_type, resource_type, resource_id, department_id, data, Utc::now())
    }

    pub(crate) fn build_at<T>(
        event_type: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<ResourceId>,
        department_id: DepartmentId,
        data: &T,
        at: DateTime<Utc>,
    ) -> Result<Self, WebhookError>
    where
        T: Serialize + ?Sized,
    {
        let data = match serde_json::to_value(data)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(WebhookError::Serialization(format!(
                    "event data must be a JSON object, got {}",
                    json_kind(&other)
                )));
            }
        };

        Ok(Self {
            event_type: event_type.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            department_id,
            data,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// RFC 3339 UTC timestamp, e.g. `2025-06-01T12:00:00.000000Z`.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn department_id(&self) -> DepartmentId {
        self.department_id
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The exact request body sent to the endpoint and fed to the MAC.
    pub fn canonical_json(&self) -> Result<String, WebhookError> {
        let value = serde_json::to_value(self)?;
        Ok(signing::canonical_json(&value))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
