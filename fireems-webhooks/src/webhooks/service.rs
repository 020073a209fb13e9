//! Entry point used by business operations and the administrative interface.
//!
//! Created once at startup and cloned into whatever raises events. [`WebhookNotifier::notify`]
//! is the only call business code makes: it builds the envelope on the caller's task, hands it
//! to the dispatcher and returns. Nothing the webhook pipeline does can fail the caller.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::config::WebhookConfig;
use crate::types::ResourceId;
use crate::webhooks::delivery::{DeliveryClient, DeliveryOutcome, DeliveryPolicy};
use crate::webhooks::dispatcher::{self, WebhookDispatcher};
use crate::webhooks::error::WebhookError;
use crate::webhooks::events::{self, EventEnvelope, TEST_EVENT_TYPE};
use crate::webhooks::settings::TenantWebhookConfig;
use crate::webhooks::store::{StatusTracker, WebhookStore};

#[derive(Clone)]
pub struct WebhookNotifier {
    dispatcher: WebhookDispatcher,
    client: DeliveryClient,
    tracker: StatusTracker,
    policy: DeliveryPolicy,
}

impl WebhookNotifier {
    /// Build the delivery client and start the worker pool. Workers stop when `shutdown` fires.
    pub fn new(config: &WebhookConfig, store: Arc<dyn WebhookStore>, shutdown: CancellationToken) -> Result<Self, WebhookError> {
        let client = DeliveryClient::new(&config.user_agent)?;
        Ok(Self::with_client(config, client, store, shutdown))
    }

    pub fn with_client(
        config: &WebhookConfig,
        client: DeliveryClient,
        store: Arc<dyn WebhookStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let tracker = StatusTracker::new(store);
        let dispatcher = WebhookDispatcher::spawn(config, client.clone(), tracker.clone(), shutdown);

        Self {
            dispatcher,
            client,
            tracker,
            policy: DeliveryPolicy::from(config),
        }
    }

    /// Raise `<resource_type>.<action>` for a department. Returns immediately.
    ///
    /// Call after the triggering change has been committed. Delivery, filtering included,
    /// happens on the worker pool; serialization failures are logged here and the event is
    /// discarded.
    pub fn notify<T>(
        &self,
        config: &TenantWebhookConfig,
        action: &str,
        resource_type: &str,
        resource_id: impl Into<ResourceId>,
        data: &T,
    ) where
        T: Serialize + ?Sized,
    {
        let event_type = events::event_type(resource_type, action);

        let envelope = match EventEnvelope::build(&event_type, resource_type, resource_id, config.department_id, data) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    department_id = config.department_id,
                    event = %event_type,
                    error = %e,
                    "Failed to build webhook event, discarding"
                );
                return;
            }
        };

        if self.dispatcher.dispatch(config, envelope) {
            debug!(department_id = config.department_id, event = %event_type, "Webhook event queued");
        }
    }

    /// Send a `webhook.test` event right now, with exactly one attempt.
    ///
    /// Ignores the enabled flag and event toggles so an administrator can check an endpoint
    /// before switching it on. The result is recorded like any other delivery and returned.
    #[instrument(skip_all, fields(department_id = config.department_id))]
    pub async fn send_test(&self, config: &TenantWebhookConfig) -> Result<DeliveryOutcome, WebhookError> {
        let envelope = EventEnvelope::build(
            TEST_EVENT_TYPE,
            "webhook",
            config.department_id,
            config.department_id,
            &json!({ "message": "Test delivery from FireEMS" }),
        )?;

        let policy = self.policy.single_attempt();
        let result = dispatcher::sign_and_deliver(&self.client, config, &envelope, &policy).await;
        dispatcher::record_result(&self.tracker, config.department_id, &result).await;

        result
    }

    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.dispatcher
    }
}
