//! Database record models matching table schemas.
//!
//! Models derive `sqlx::FromRow` and stay separate from the domain types in
//! [`crate::webhooks`], so storage and API representations can evolve independently.
//!
//! - [`webhooks`]: `department_webhooks` rows

pub mod webhooks;
