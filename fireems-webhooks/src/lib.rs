//! # fireems-webhooks: signed event notifications for FireEMS departments
//!
//! When something changes in FireEMS (an incident is created, an apparatus changes status, a
//! user is removed) departments that opted in receive a signed HTTP POST describing the change.
//! This crate builds those events, decides who gets them, signs them, and delivers them on a
//! bounded worker pool so the operation that raised the event never waits on a third-party
//! endpoint.
//!
//! ## Overview
//!
//! Each department owns one webhook configuration: an enabled flag, an endpoint URL, a shared
//! secret, and a set of per-event toggles (`incident.created`, `apparatus.updated`, ...). A
//! business operation calls [`WebhookNotifier::notify`] after its change is committed. The call
//! builds an [`EventEnvelope`](webhooks::EventEnvelope), queues it and returns. A worker then
//!
//! 1. drops the event if the department is disabled or has not opted in to that event type,
//! 2. signs the canonical JSON body with HMAC-SHA256 (`X-FireEMS-Signature`),
//! 3. POSTs it with a per-attempt timeout, retrying a fixed number of times with a fixed delay,
//! 4. records the last success time or last error on the department's configuration.
//!
//! Delivery is best effort: there is no durable outbox, and a full queue drops new events rather
//! than slowing down the caller.
//!
//! ## Architecture
//!
//! The library is usable on its own ([`webhooks`]), and also ships as a small Axum service that
//! exposes the administrative operations and an event intake endpoint for out-of-process callers
//! ([`api`]). Settings live in PostgreSQL ([`db`]) or, without a database, in memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use fireems_webhooks::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = fireems_webhooks::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     fireems_webhooks::telemetry::init_telemetry(config.enable_otel_export, config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Raising an event from library code:
//!
//! ```ignore
//! // after the incident row is committed
//! notifier.notify(&department_config, "created", "incident", incident.id, &incident);
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test;

use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, warn};

use crate::api::handlers::{healthz, webhooks as webhook_handlers};
use crate::db::handlers::PgWebhookStore;
use crate::webhooks::{InMemoryWebhookStore, WebhookStore};

pub use config::Config;
pub use types::{DepartmentId, ResourceId};
pub use webhooks::WebhookNotifier;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .notifier(notifier)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn WebhookStore>,
    pub notifier: WebhookNotifier,
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder on first use and return its handle.
///
/// Must run before counters are touched, otherwise they go to the no-op recorder.
pub fn get_or_install_prometheus_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(e) = metrics::set_global_recorder(recorder) {
                warn!("Failed to install Prometheus recorder, metrics will be empty: {}", e);
            }
            handle
        })
        .clone()
}

/// Build the HTTP router with request tracing, plus `/internal/metrics` when metrics are enabled.
pub fn build_router(state: AppState) -> Router {
    let enable_metrics = state.config.enable_metrics;

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/departments/{department_id}/webhook",
            get(webhook_handlers::get_webhook).patch(webhook_handlers::update_webhook),
        )
        .route("/departments/{department_id}/webhook/secret", post(webhook_handlers::rotate_secret))
        .route("/departments/{department_id}/webhook/test", post(webhook_handlers::test_webhook))
        .route("/departments/{department_id}/events", post(webhook_handlers::publish_event))
        .with_state(state);

    if enable_metrics {
        let metric_handle = get_or_install_prometheus_handle();
        router = router.route("/internal/metrics", get(move || async move { metric_handle.render() }));
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Create a new application instance, connecting to and migrating the database if one is
    /// configured.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting webhook service with configuration: {:#?}", config);

        let (store, pool): (Arc<dyn WebhookStore>, Option<PgPool>) = match &config.database {
            Some(database) => {
                let pool = db::connect(database).await?;
                migrator().run(&pool).await?;
                info!("Database migrations applied");
                (Arc::new(PgWebhookStore::new(pool.clone())), Some(pool))
            }
            None => {
                warn!("No database configured; webhook settings are kept in memory and lost on restart");
                (Arc::new(InMemoryWebhookStore::new()), None)
            }
        };

        Self::new_with_store(config, store, pool)
    }

    /// Create an application around an existing store.
    pub fn new_with_store(config: Config, store: Arc<dyn WebhookStore>, pool: Option<PgPool>) -> anyhow::Result<Self> {
        let shutdown_token = CancellationToken::new();
        let notifier = WebhookNotifier::new(&config.webhooks, store.clone(), shutdown_token.clone())?;

        let state = AppState::builder()
            .config(config.clone())
            .store(store)
            .notifier(notifier)
            .build();

        Ok(Self {
            router: build_router(state),
            config,
            pool,
            shutdown_token,
        })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Webhook service listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Stop the delivery workers; queued events are abandoned
        info!("Stopping webhook workers...");
        self.shutdown_token.cancel();

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
