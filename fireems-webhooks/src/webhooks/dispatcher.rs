//! Fire-and-forget webhook dispatch on a bounded worker pool.
//!
//! ```text
//! dispatcher.dispatch(config, envelope)      // caller's task, never blocks
//!   └─ job_tx.try_send(job) ──────────────────────────┐
//!        full   → drop + warn                         │
//!                                                     ▼
//!   run_workers (spawned task):
//!     ├─ recv from job_rx
//!     ├─ acquire semaphore permit (caps in-flight deliveries)
//!     └─ spawn pipeline:
//!          ├─ filter::check()               // disabled / not opted in → skip
//!          ├─ config.endpoint()             // no URL → skip
//!          ├─ signing::sign()               // no secret → record error
//!          ├─ client.deliver()              // fixed-delay retries
//!          └─ tracker.record_success() / record_error()
//! ```
//!
//! Jobs carry a snapshot of the department configuration taken when the event was raised.
//! On shutdown queued jobs are abandoned; in-flight ones run to completion on the runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use metrics::counter;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::WebhookConfig;
use crate::types::DepartmentId;
use crate::webhooks::delivery::{DeliveryClient, DeliveryOutcome, DeliveryPolicy};
use crate::webhooks::error::WebhookError;
use crate::webhooks::events::EventEnvelope;
use crate::webhooks::filter;
use crate::webhooks::settings::TenantWebhookConfig;
use crate::webhooks::signing;
use crate::webhooks::store::StatusTracker;

/// One queued delivery.
#[derive(Debug)]
struct DispatchJob {
    config: TenantWebhookConfig,
    envelope: EventEnvelope,
}

/// Counters describing the worker pool. Cheap to read from any thread.
#[derive(Debug, Default)]
pub struct DispatchStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchStats {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest number of jobs that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Jobs that finished, whether delivered, skipped or failed.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Events rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a DispatchStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.0.processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a worker needs to take a job from envelope to recorded status.
struct Pipeline {
    client: DeliveryClient,
    tracker: StatusTracker,
    policy: DeliveryPolicy,
}

impl Pipeline {
    async fn process(&self, job: DispatchJob) {
        let DispatchJob { config, envelope } = job;
        let department_id = config.department_id;

        let result = match filter::check(&config, &envelope) {
            Ok(()) => sign_and_deliver(&self.client, &config, &envelope, &self.policy).await,
            Err(e) => Err(e),
        };
        record_result(&self.tracker, department_id, &result).await;
    }
}

/// Resolve the endpoint, sign, and deliver. Shared by queued dispatch and test deliveries.
pub(crate) async fn sign_and_deliver(
    client: &DeliveryClient,
    config: &TenantWebhookConfig,
    envelope: &EventEnvelope,
    policy: &DeliveryPolicy,
) -> Result<DeliveryOutcome, WebhookError> {
    let url = config.endpoint()?;
    let secret = config.secret.as_ref().map(|s| s.as_bytes()).unwrap_or_default();
    let signature = signing::sign(envelope, secret)?;

    client.deliver(url, envelope, &signature, policy).await
}

/// Write the outcome of [`sign_and_deliver`] to the status tracker.
///
/// Configuration errors are expected states and leave the status untouched.
pub(crate) async fn record_result(
    tracker: &StatusTracker,
    department_id: DepartmentId,
    result: &Result<DeliveryOutcome, WebhookError>,
) {
    match result {
        Ok(outcome) => {
            debug!(department_id, attempts = outcome.attempts, "Webhook delivered");
            counter!("fireems_webhook_deliveries_total", "outcome" => "delivered").increment(1);
            tracker.record_success(department_id, Utc::now()).await;
        }
        Err(e) if e.is_configuration() => {
            debug!(department_id, reason = %e, "Webhook not configured, skipping");
            counter!("fireems_webhook_deliveries_total", "outcome" => "skipped").increment(1);
        }
        Err(e) => {
            match e {
                WebhookError::DeliveryExhausted(_) => warn!(department_id, error = %e, "Webhook delivery failed"),
                _ => error!(department_id, error = %e, "Webhook delivery aborted"),
            }
            counter!("fireems_webhook_deliveries_total", "outcome" => "failed").increment(1);
            tracker.record_error(department_id, &e.to_string()).await;
        }
    }
}

/// Handle to the worker pool. Clones share the same queue.
#[derive(Clone)]
pub struct WebhookDispatcher {
    job_tx: mpsc::Sender<DispatchJob>,
    stats: Arc<DispatchStats>,
}

impl WebhookDispatcher {
    /// Create the queue and spawn the worker task.
    pub fn spawn(
        config: &WebhookConfig,
        client: DeliveryClient,
        tracker: StatusTracker,
        shutdown: CancellationToken,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(DispatchStats::default());

        let pipeline = Arc::new(Pipeline {
            client,
            tracker,
            policy: DeliveryPolicy::from(config),
        });

        tokio::spawn(run_workers(
            job_rx,
            pipeline,
            config.max_concurrent_sends.max(1),
            stats.clone(),
            shutdown,
        ));

        Self { job_tx, stats }
    }

    /// Queue an event for delivery and return immediately.
    ///
    /// Returns `false` if the event was dropped because the queue is full or the workers have
    /// shut down. Never waits.
    pub fn dispatch(&self, config: &TenantWebhookConfig, envelope: EventEnvelope) -> bool {
        let department_id = config.department_id;
        let job = DispatchJob {
            config: config.clone(),
            envelope,
        };

        match self.job_tx.try_send(job) {
            Ok(()) => {
                counter!("fireems_webhook_events_queued_total").increment(1);
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                counter!("fireems_webhook_events_dropped_total").increment(1);
                warn!(
                    department_id,
                    event = job.envelope.event_type(),
                    "Webhook queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                counter!("fireems_webhook_events_dropped_total").increment(1);
                warn!(
                    department_id,
                    event = job.envelope.event_type(),
                    "Webhook workers stopped, dropping event"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Whether the worker task has exited.
    pub fn is_closed(&self) -> bool {
        self.job_tx.is_closed()
    }
}

/// Long-lived task that pulls jobs off the queue and runs each on its own task, at most
/// `max_concurrent_sends` at a time.
async fn run_workers(
    mut rx: mpsc::Receiver<DispatchJob>,
    pipeline: Arc<Pipeline>,
    max_concurrent_sends: usize,
    stats: Arc<DispatchStats>,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent_sends));

    loop {
        let job = tokio::select! {
            job = rx.recv() => {
                match job {
                    Some(j) => j,
                    None => {
                        debug!("Webhook queue closed, shutting down workers");
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!("Webhook workers received shutdown signal");
                break;
            }
        };

        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => {
                match permit {
                    Ok(p) => p,
                    Err(_) => {
                        warn!("Webhook worker semaphore closed");
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!("Webhook workers received shutdown signal while waiting for a slot");
                break;
            }
        };

        let pipeline = pipeline.clone();
        let stats = stats.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let _in_flight = stats.enter();
            pipeline.process(job).await;
        });
    }

    debug!("Webhook worker task exited");
}
