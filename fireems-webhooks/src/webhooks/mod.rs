//! Outbound webhook notifications for department events.
//!
//! - [`events`]: envelope construction (`<resource>.<action>`, UTC timestamp, data)
//! - [`filter`]: per-department enabled flag and event toggles
//! - [`signing`]: HMAC-SHA256 over the canonical JSON body, secret generation
//! - [`delivery`]: HTTP POST with per-attempt timeout and fixed-delay retries
//! - [`dispatcher`]: bounded queue and worker pool; callers never wait on delivery
//! - [`store`]: settings persistence seam and the status tracker
//! - [`settings`]: per-department configuration and administrative updates
//! - [`service`]: [`WebhookNotifier`], the handle business code calls
//!
//! Delivery is best effort and at most once per event: there is no durable queue, so events
//! in flight during a crash or restart are lost.

pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod filter;
pub mod service;
pub mod settings;
pub mod signing;
pub mod store;

pub use delivery::{DeliveryClient, DeliveryOutcome, DeliveryPolicy, EVENT_HEADER, SIGNATURE_HEADER};
pub use dispatcher::{DispatchStats, WebhookDispatcher};
pub use error::WebhookError;
pub use events::EventEnvelope;
pub use service::WebhookNotifier;
pub use settings::{TenantWebhookConfig, WebhookSettingsUpdate};
pub use signing::WebhookSecret;
pub use store::{InMemoryWebhookStore, StatusTracker, WebhookStore};
