//! HTTP handlers for department webhook administration and event intake.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{debug, error, info, instrument};

use crate::{
    AppState,
    api::models::webhooks::{
        DepartmentPathParams, EventNotification, WebhookSecretResponse, WebhookSettingsResponse, WebhookTestResponse,
        WebhookUpdateResponse,
    },
    errors::{Error, Result},
    types::DepartmentId,
    webhooks::{TenantWebhookConfig, WebhookError, WebhookSettingsUpdate},
};

async fn load_config(state: &AppState, department_id: DepartmentId) -> Result<TenantWebhookConfig> {
    state.store.get(department_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Webhook configuration for department".to_string(),
        id: department_id.to_string(),
    })
}

/// Current settings and last delivery status for a department.
#[instrument(skip_all, fields(department_id = params.department_id))]
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(params): Path<DepartmentPathParams>,
) -> Result<Json<WebhookSettingsResponse>> {
    let config = load_config(&state, params.department_id).await?;
    Ok(Json(WebhookSettingsResponse::from(&config)))
}

/// Apply a partial settings update, creating the department's record on first use.
///
/// The generated secret is returned exactly once, in the response to the update that created it.
#[instrument(skip_all, fields(department_id = params.department_id))]
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(params): Path<DepartmentPathParams>,
    Json(update): Json<WebhookSettingsUpdate>,
) -> Result<Json<WebhookUpdateResponse>> {
    let department_id = params.department_id;
    let mut config = state
        .store
        .get(department_id)
        .await?
        .unwrap_or_else(|| TenantWebhookConfig::new(department_id));

    let changes = config.apply(update)?;
    let saved = state.store.save(&config).await?;

    info!(
        department_id,
        enabled = saved.enabled,
        generated_secret = changes.generated_secret,
        "Webhook settings updated"
    );

    let secret = changes
        .generated_secret
        .then(|| saved.secret.as_ref().map(|s| s.reveal()))
        .flatten();

    Ok(Json(WebhookUpdateResponse {
        settings: WebhookSettingsResponse::from(&saved),
        secret,
    }))
}

/// Replace the signing secret. The old one stops working immediately.
#[instrument(skip_all, fields(department_id = params.department_id))]
pub async fn rotate_secret(
    State(state): State<AppState>,
    Path(params): Path<DepartmentPathParams>,
) -> Result<Json<WebhookSecretResponse>> {
    let mut config = load_config(&state, params.department_id).await?;
    let secret = config.rotate_secret().reveal();
    state.store.save(&config).await?;

    info!(department_id = params.department_id, "Webhook secret rotated");

    Ok(Json(WebhookSecretResponse {
        department_id: params.department_id,
        secret,
    }))
}

/// Send a single `webhook.test` delivery and report how it went.
#[instrument(skip_all, fields(department_id = params.department_id))]
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(params): Path<DepartmentPathParams>,
) -> Result<Json<WebhookTestResponse>> {
    let config = load_config(&state, params.department_id).await?;

    let start = Instant::now();
    let result = state.notifier.send_test(&config).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) | Err(WebhookError::DeliveryExhausted(outcome)) => {
            Ok(Json(WebhookTestResponse::from_outcome(outcome, duration_ms)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Raise an event for a department. Accepted whether or not anything is delivered, including
/// when the department's settings cannot be loaded.
#[instrument(skip_all, fields(department_id = params.department_id, resource_type = %event.resource_type, action = %event.action))]
pub async fn publish_event(
    State(state): State<AppState>,
    Path(params): Path<DepartmentPathParams>,
    Json(event): Json<EventNotification>,
) -> StatusCode {
    match state.store.get(params.department_id).await {
        Ok(Some(config)) => state.notifier.notify(
            &config,
            &event.action,
            &event.resource_type,
            event.resource_id,
            &event.data,
        ),
        Ok(None) => debug!("Department has no webhook configuration, skipping"),
        Err(e) => error!(
            department_id = params.department_id,
            error = %e,
            "Failed to load webhook configuration, dropping event"
        ),
    }

    StatusCode::ACCEPTED
}
