pub mod utils;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::sync::Arc;

use axum::http::StatusCode;

use crate::Application;
use crate::config::{Config, WebhookConfig};
use crate::webhooks::signing;
use crate::webhooks::{DeliveryOutcome, InMemoryWebhookStore, WebhookError, WebhookStore};
use utils::{create_test_app, create_test_config, create_test_notifier, enabled_department, test_webhook_config, wait_for};

/// An enabled department subscribed to the event gets exactly one signed POST.
#[test_log::test(tokio::test)]
async fn test_e2e_subscribed_event_is_delivered_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(header("x-fireems-event", "incident.created"))
        .and(body_string_contains(r#""resource_id":42"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let department = enabled_department(7, &format!("{}/hook", server.uri()));

    notifier.notify(&department, "created", "incident", 42, &json!({"id": 42}));

    let recorded = store.clone();
    wait_for(|| {
        let done = recorded.successes() == 1;
        async move { done }
    })
    .await;

    // The receiver can verify the body with the shared secret
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let signature = requests[0].headers.get("x-fireems-signature").unwrap().to_str().unwrap();
    assert_eq!(signature, signing::sign_payload(&body, b"abc123").unwrap());

    let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payload["event"], "incident.created");
    assert_eq!(payload["resource_type"], "incident");
    assert_eq!(payload["department_id"], 7);
    assert_eq!(payload["data"], json!({"id": 42}));
    assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));

    assert!(store.errors().is_empty());
    shutdown.cancel();
}

/// Two failures then a success, within the attempt budget.
#[test_log::test(tokio::test)]
async fn test_e2e_retries_then_records_single_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let department = enabled_department(7, &server.uri());

    notifier.notify(&department, "created", "incident", 42, &json!({"id": 42}));

    let recorded = store.clone();
    wait_for(|| {
        let done = recorded.successes() == 1;
        async move { done }
    })
    .await;

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(store.errors().is_empty());
    shutdown.cancel();
}

/// Unreachable endpoint: every attempt fails and the error is recorded once.
#[test_log::test(tokio::test)]
async fn test_e2e_unreachable_endpoint_records_single_error() {
    let config = WebhookConfig {
        max_retries: 2,
        ..test_webhook_config()
    };
    let (notifier, store, shutdown) = create_test_notifier(&config);
    let department = enabled_department(7, "http://127.0.0.1:1/hook");

    notifier.notify(&department, "created", "incident", 42, &json!({"id": 42}));

    let recorded = store.clone();
    wait_for(|| {
        let done = !recorded.errors().is_empty();
        async move { done }
    })
    .await;

    // Give a stray second write the chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;

    let errors = store.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("after 2 attempts"), "{}", errors[0]);
    assert_eq!(store.successes(), 0);
    shutdown.cancel();
}

/// Disabled department: no request and no status write.
#[test_log::test(tokio::test)]
async fn test_e2e_disabled_department_is_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let mut department = enabled_department(7, &server.uri());
    department.enabled = false;

    notifier.notify(&department, "created", "incident", 42, &json!({"id": 42}));

    let dispatcher = notifier.dispatcher().clone();
    wait_for(|| {
        let done = dispatcher.stats().processed() == 1;
        async move { done }
    })
    .await;

    assert_eq!(store.successes(), 0);
    assert!(store.errors().is_empty());
    shutdown.cancel();
}

/// Toggled-off events are treated like a disabled department.
#[test_log::test(tokio::test)]
async fn test_e2e_toggled_off_event_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let mut department = enabled_department(7, &server.uri());
    department.event_toggles.insert("incident.updated".to_string(), false);

    notifier.notify(&department, "updated", "incident", 42, &json!({"id": 42}));
    notifier.notify(&department, "closed", "incident", 42, &json!({"id": 42}));

    let dispatcher = notifier.dispatcher().clone();
    wait_for(|| {
        let done = dispatcher.stats().processed() == 2;
        async move { done }
    })
    .await;

    assert_eq!(store.successes(), 0);
    assert!(store.errors().is_empty());
    shutdown.cancel();
}

/// Bad event data is discarded on the caller's side without reaching the queue.
#[test_log::test(tokio::test)]
async fn test_e2e_unserializable_data_is_discarded() {
    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let department = enabled_department(7, "http://127.0.0.1:1/hook");

    notifier.notify(&department, "created", "incident", 42, &json!(["not", "an", "object"]));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(notifier.dispatcher().stats().processed(), 0);
    assert_eq!(store.successes(), 0);
    assert!(store.errors().is_empty());
    shutdown.cancel();
}

/// Manual test deliveries never retry, whatever the configured policy.
#[test_log::test(tokio::test)]
async fn test_e2e_test_delivery_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-fireems-event", "webhook.test"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = WebhookConfig {
        max_retries: 5,
        ..test_webhook_config()
    };
    let (notifier, store, shutdown) = create_test_notifier(&config);
    // Disabled and not subscribed to anything: test deliveries ignore both
    let mut department = enabled_department(7, &server.uri());
    department.enabled = false;
    department.event_toggles.clear();

    let err = notifier.send_test(&department).await.unwrap_err();

    let WebhookError::DeliveryExhausted(outcome) = err else {
        panic!("expected exhausted delivery");
    };
    assert_eq!(
        outcome,
        DeliveryOutcome {
            attempts: 1,
            success: false,
            last_http_status: Some(500),
            last_error: Some("webhook endpoint responded with HTTP 500".to_string()),
        }
    );
    assert_eq!(store.errors().len(), 1);
    shutdown.cancel();
}

#[test_log::test(tokio::test)]
async fn test_e2e_test_delivery_success_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (notifier, store, shutdown) = create_test_notifier(&test_webhook_config());
    let department = enabled_department(7, &server.uri());

    let outcome = notifier.send_test(&department).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.last_http_status, Some(202));
    assert_eq!(store.successes(), 1);
    shutdown.cancel();
}

#[test_log::test(tokio::test)]
async fn test_metrics_endpoint_reports_deliveries() {
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hook)
        .await;

    let app = create_test_app();
    app.server
        .patch("/departments/7/webhook")
        .json(&json!({
            "enabled": true,
            "endpoint_url": hook.uri(),
            "event_toggles": {"incident.created": true}
        }))
        .await
        .assert_status_ok();

    app.server
        .post("/departments/7/events")
        .json(&json!({"action": "created", "resource_type": "incident", "resource_id": 42, "data": {}}))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let store = app.store.clone();
    wait_for(|| {
        let store = store.clone();
        async move { store.get(7).await.unwrap().unwrap().last_success_at.is_some() }
    })
    .await;

    let response = app.server.get("/internal/metrics").await;
    response.assert_status_ok();
    let metrics = response.text();
    assert!(metrics.contains("fireems_webhook_events_queued_total"), "{metrics}");
    assert!(metrics.contains("fireems_webhook_delivery_attempts_total"), "{metrics}");
    assert!(metrics.contains(r#"fireems_webhook_deliveries_total{outcome="delivered"}"#), "{metrics}");
}

#[test_log::test(tokio::test)]
async fn test_metrics_endpoint_absent_when_disabled() {
    let config = Config {
        enable_metrics: false,
        ..create_test_config()
    };
    let server = Application::new_with_store(config, Arc::new(InMemoryWebhookStore::new()), None)
        .expect("Failed to build test app")
        .into_test_server();

    let response = server.get("/internal/metrics").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
