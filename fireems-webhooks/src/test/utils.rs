use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::Application;
use crate::config::{Config, WebhookConfig};
use crate::db::errors::Result;
use crate::types::DepartmentId;
use crate::webhooks::signing::WebhookSecret;
use crate::webhooks::{InMemoryWebhookStore, TenantWebhookConfig, WebhookNotifier, WebhookStore};

/// Fast retry settings so failure paths finish in milliseconds.
pub fn test_webhook_config() -> WebhookConfig {
    WebhookConfig {
        timeout: Duration::from_secs(2),
        max_retries: 3,
        retry_delay: Duration::from_millis(10),
        max_concurrent_sends: 4,
        queue_capacity: 64,
        user_agent: "fireems-webhooks-test".to_string(),
    }
}

pub fn create_test_config() -> Config {
    Config {
        webhooks: test_webhook_config(),
        ..Default::default()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryWebhookStore>,
}

/// Full HTTP app over an in-memory store.
pub fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryWebhookStore::new());
    let app = Application::new_with_store(create_test_config(), store.clone(), None).expect("Failed to build test app");

    TestApp {
        server: app.into_test_server(),
        store,
    }
}

/// An enabled department subscribed to `incident.created`, signing with `abc123`.
pub fn enabled_department(department_id: DepartmentId, url: &str) -> TenantWebhookConfig {
    let mut config = TenantWebhookConfig::new(department_id);
    config.enabled = true;
    config.endpoint_url = Some(url.parse().expect("test URL should parse"));
    config.secret = Some(WebhookSecret::from("abc123"));
    config.event_toggles.insert("incident.created".to_string(), true);
    config
}

/// Poll `check` until it returns true, panicking after five seconds.
pub async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 5s");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Store that counts status writes, for asserting the tracker is called exactly once.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryWebhookStore,
    successes: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookStore for RecordingStore {
    async fn get(&self, department_id: DepartmentId) -> Result<Option<TenantWebhookConfig>> {
        self.inner.get(department_id).await
    }

    async fn save(&self, config: &TenantWebhookConfig) -> Result<TenantWebhookConfig> {
        self.inner.save(config).await
    }

    async fn record_success(&self, department_id: DepartmentId, at: DateTime<Utc>) -> Result<()> {
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_success(department_id, at).await
    }

    async fn record_error(&self, department_id: DepartmentId, message: &str) -> Result<()> {
        self.errors.lock().unwrap().push(message.to_string());
        self.inner.record_error(department_id, message).await
    }
}

/// Notifier wired to a [`RecordingStore`].
pub fn create_test_notifier(config: &WebhookConfig) -> (WebhookNotifier, Arc<RecordingStore>, CancellationToken) {
    let store = Arc::new(RecordingStore::default());
    let shutdown = CancellationToken::new();
    let notifier = WebhookNotifier::new(config, store.clone(), shutdown.clone()).expect("Failed to build notifier");
    (notifier, store, shutdown)
}
