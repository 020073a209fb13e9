//! HTTP surface for department webhook administration and event intake.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # Routes
//!
//! - `GET /healthz`: liveness
//! - `GET /departments/{department_id}/webhook`: settings and last delivery status
//! - `PATCH /departments/{department_id}/webhook`: enable/disable, set URL, toggle events
//! - `POST /departments/{department_id}/webhook/secret`: rotate the signing secret
//! - `POST /departments/{department_id}/webhook/test`: single-attempt test delivery
//! - `POST /departments/{department_id}/events`: raise an event (always `202 Accepted`)
//!
//! Authentication is handled in front of this service.

pub mod handlers;
pub mod models;
