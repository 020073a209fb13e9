//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection`, binds its own queries and returns records from
//! [`crate::db::models`].
//!
//! - [`DepartmentWebhooks`]: per-department webhook settings and last delivery status
//! - [`PgWebhookStore`]: pool-backed [`WebhookStore`](crate::webhooks::store::WebhookStore)

pub mod webhooks;

pub use webhooks::{DepartmentWebhooks, PgWebhookStore};
