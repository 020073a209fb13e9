//! Error taxonomy for the webhook pipeline.
//!
//! | Variant | Handling |
//! |---|---|
//! | [`Disabled`](WebhookError::Disabled), [`NotSubscribed`](WebhookError::NotSubscribed), [`MissingEndpoint`](WebhookError::MissingEndpoint), [`InvalidEndpoint`](WebhookError::InvalidEndpoint) | configuration: skipped silently, no network call |
//! | [`Serialization`](WebhookError::Serialization) | fatal for the event, logged, never retried |
//! | [`Signing`](WebhookError::Signing) | fatal for the delivery, logged and recorded |
//! | [`Network`](WebhookError::Network), [`Http`](WebhookError::Http) | single attempt failed, retryable |
//! | [`DeliveryExhausted`](WebhookError::DeliveryExhausted) | terminal, recorded as the department's last error |
//!
//! None of these ever propagate back to the business operation that raised the event.

use thiserror::Error;

use crate::types::DepartmentId;
use crate::webhooks::delivery::DeliveryOutcome;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhooks are disabled for department {department_id}")]
    Disabled { department_id: DepartmentId },

    #[error("department {department_id} is not subscribed to {event}")]
    NotSubscribed { department_id: DepartmentId, event: String },

    #[error("department {department_id} has no webhook endpoint configured")]
    MissingEndpoint { department_id: DepartmentId },

    #[error("invalid webhook endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("failed to serialize event payload: {0}")]
    Serialization(String),

    #[error("cannot sign webhook payload: {0}")]
    Signing(String),

    #[error("webhook request failed: {0}")]
    Network(String),

    #[error("webhook endpoint responded with HTTP {status}")]
    Http { status: u16 },

    #[error("webhook delivery failed after {}: {}", .0.attempts_label(), .0.failure_reason())]
    DeliveryExhausted(DeliveryOutcome),
}

impl WebhookError {
    /// Disabled or incomplete tenant configuration. These are expected states, not failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WebhookError::Disabled { .. }
                | WebhookError::NotSubscribed { .. }
                | WebhookError::MissingEndpoint { .. }
                | WebhookError::InvalidEndpoint(_)
        )
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Network(_) | WebhookError::Http { .. })
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::Serialization(err.to_string())
    }
}
