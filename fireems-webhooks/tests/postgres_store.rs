//! PostgreSQL-backed store tests.
//!
//! Run with `DATABASE_URL=postgres://... cargo test --features integration`.

#![cfg(feature = "integration")]

use chrono::{TimeZone, Utc};
use fireems_webhooks::db::errors::DbError;
use fireems_webhooks::db::handlers::{DepartmentWebhooks, PgWebhookStore};
use fireems_webhooks::db::models::webhooks::DepartmentWebhookUpsertDBRequest;
use fireems_webhooks::webhooks::{TenantWebhookConfig, WebhookSecret, WebhookSettingsUpdate, WebhookStore};
use sqlx::PgPool;

fn enabled_update(url: &str) -> WebhookSettingsUpdate {
    WebhookSettingsUpdate {
        enabled: Some(true),
        endpoint_url: Some(Some(url.to_string())),
        event_toggles: Some([("incident.created".to_string(), true)].into()),
    }
}

#[sqlx::test]
async fn test_save_and_get_round_trip(pool: PgPool) {
    let store = PgWebhookStore::new(pool);
    assert!(store.get(7).await.unwrap().is_none());

    let mut config = TenantWebhookConfig::new(7);
    config.apply(enabled_update("https://example.com/hook")).unwrap();
    let saved = store.save(&config).await.unwrap();

    assert_eq!(saved, config);
    assert_eq!(store.get(7).await.unwrap(), Some(config));
}

#[sqlx::test]
async fn test_save_preserves_status_columns(pool: PgPool) {
    let store = PgWebhookStore::new(pool);
    let mut config = TenantWebhookConfig::new(7);
    config.apply(enabled_update("https://example.com/hook")).unwrap();
    store.save(&config).await.unwrap();

    let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    store.record_success(7, at).await.unwrap();
    store.record_error(7, "webhook delivery failed after 3 attempts: HTTP 500").await.unwrap();

    // An admin edit built from a stale read must not wipe the status
    config.apply(WebhookSettingsUpdate {
        enabled: Some(false),
        ..Default::default()
    })
    .unwrap();
    let saved = store.save(&config).await.unwrap();

    assert!(!saved.enabled);
    assert_eq!(saved.last_success_at, Some(at));
    assert_eq!(
        saved.last_error.as_deref(),
        Some("webhook delivery failed after 3 attempts: HTTP 500")
    );
}

#[sqlx::test]
async fn test_status_updates_for_unknown_department_are_noops(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = DepartmentWebhooks::new(&mut conn);

    assert!(!repo.record_success(99, Utc::now()).await.unwrap());
    assert!(!repo.record_error(99, "boom").await.unwrap());
}

#[sqlx::test]
async fn test_enabled_row_requires_url_and_secret(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = DepartmentWebhooks::new(&mut conn);

    let err = repo
        .upsert_settings(&DepartmentWebhookUpsertDBRequest {
            department_id: 7,
            enabled: true,
            endpoint_url: Some("https://example.com/hook".to_string()),
            secret: None,
            event_toggles: Default::default(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::CheckViolation { constraint: Some(ref c), .. } if c == "department_webhooks_enabled_requires_target"
    ));
}

#[sqlx::test]
async fn test_secret_is_stored_as_bytes(pool: PgPool) {
    let store = PgWebhookStore::new(pool);
    let mut config = TenantWebhookConfig::new(7);
    config.secret = Some(WebhookSecret::from(vec![0u8, 159, 146, 150]));
    store.save(&config).await.unwrap();

    let loaded = store.get(7).await.unwrap().unwrap();
    assert_eq!(loaded.secret.unwrap().as_bytes(), &[0u8, 159, 146, 150]);
}
