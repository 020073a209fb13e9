//! Event gating based on department configuration.

use crate::webhooks::error::WebhookError;
use crate::webhooks::events::EventEnvelope;
use crate::webhooks::settings::TenantWebhookConfig;

/// Whether `envelope` should be delivered at all for this department.
///
/// Runs before any secret access or signing: a department that has not opted in never
/// costs a MAC computation.
pub fn should_deliver(config: &TenantWebhookConfig, envelope: &EventEnvelope) -> bool {
    check(config, envelope).is_ok()
}

/// Like [`should_deliver`], but says why an event is held back.
pub fn check(config: &TenantWebhookConfig, envelope: &EventEnvelope) -> Result<(), WebhookError> {
    if !config.enabled {
        return Err(WebhookError::Disabled {
            department_id: config.department_id,
        });
    }
    if !config.is_event_enabled(envelope.event_type()) {
        return Err(WebhookError::NotSubscribed {
            department_id: config.department_id,
            event: envelope.event_type().to_string(),
        });
    }
    Ok(())
}
