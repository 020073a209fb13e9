//! HTTP delivery with bounded, fixed-delay retries.
//!
//! ```text
//! deliver()
//!   for attempt in 1..=max(max_retries, 1):
//!     POST url  (own timeout)
//!       2xx            -> Ok(outcome)
//!       non-2xx / I/O  -> remember status/error
//!     sleep(retry_delay)   // not after the last attempt
//!   Err(DeliveryExhausted(outcome))
//! ```
//!
//! The delay is constant between attempts; there is no backoff or jitter.

use std::error::Error as _;
use std::time::Duration;

use metrics::counter;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::WebhookConfig;
use crate::webhooks::error::WebhookError;
use crate::webhooks::events::EventEnvelope;

/// Header carrying the hex HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-FireEMS-Signature";
/// Header carrying the event type, so receivers can route without parsing the body.
pub const EVENT_HEADER: &str = "X-FireEMS-Event";

/// Retry policy for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Timeout applied to each individual attempt
    pub timeout: Duration,
    /// Total number of attempts (not additional retries). Zero is treated as one.
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
}

impl DeliveryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Same timeout, exactly one attempt. Used for manual test deliveries.
    pub fn single_attempt(self) -> Self {
        Self { max_retries: 1, ..self }
    }
}

impl From<&WebhookConfig> for DeliveryPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        }
    }
}

/// Result of a delivery chain. Ephemeral: handed to the status tracker, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub attempts: u32,
    pub success: bool,
    pub last_http_status: Option<u16>,
    pub last_error: Option<String>,
}

impl DeliveryOutcome {
    pub(crate) fn attempts_label(&self) -> String {
        if self.attempts == 1 {
            "1 attempt".to_string()
        } else {
            format!("{} attempts", self.attempts)
        }
    }

    pub(crate) fn failure_reason(&self) -> String {
        match (&self.last_error, self.last_http_status) {
            (Some(error), _) => error.clone(),
            (None, Some(status)) => format!("HTTP {status}"),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Sends signed envelopes to department endpoints.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
}

impl DeliveryClient {
    pub fn new(user_agent: &str) -> Result<Self, WebhookError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| WebhookError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }

    /// POST the envelope to `url`, retrying per `policy`.
    ///
    /// Returns the outcome on the first 2xx response, or
    /// [`WebhookError::DeliveryExhausted`] once every attempt failed.
    #[instrument(
        skip_all,
        fields(department_id = envelope.department_id(), event = %envelope.event_type(), url = %url)
    )]
    pub async fn deliver(
        &self,
        url: &Url,
        envelope: &EventEnvelope,
        signature: &str,
        policy: &DeliveryPolicy,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let body = envelope.canonical_json()?;
        let max_attempts = policy.max_attempts();
        let mut outcome = DeliveryOutcome::default();

        for attempt in 1..=max_attempts {
            outcome.attempts = attempt;
            counter!("fireems_webhook_delivery_attempts_total").increment(1);

            match self
                .send_once(url, &body, envelope.event_type(), signature, policy.timeout)
                .await
            {
                Ok(status) => {
                    outcome.success = true;
                    outcome.last_http_status = Some(status);
                    debug!(attempt, status, "Webhook delivered");
                    return Ok(outcome);
                }
                Err(e) => {
                    outcome.last_http_status = match e {
                        WebhookError::Http { status } => Some(status),
                        _ => None,
                    };
                    outcome.last_error = Some(e.to_string());
                    warn!(attempt, max_attempts, error = %e, "Webhook attempt failed");
                    if !e.is_retryable() {
                        break;
                    }
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }

        Err(WebhookError::DeliveryExhausted(outcome))
    }

    async fn send_once(
        &self,
        url: &Url,
        body: &str,
        event_type: &str,
        signature: &str,
        timeout: Duration,
    ) -> Result<u16, WebhookError> {
        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event_type)
            .timeout(timeout)
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WebhookError::Network(format!("request timed out after {timeout:?}"))
                } else {
                    WebhookError::Network(error_chain(&e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(WebhookError::Http { status: status.as_u16() })
        }
    }
}

/// reqwest's Display stops at "error sending request"; the useful part is in the sources.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
