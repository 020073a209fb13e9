//! Database layer for webhook settings persistence.
//!
//! ```text
//! ┌──────────────────┐
//! │  WebhookStore    │  (webhooks::store - what the pipeline and API talk to)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │  Repositories    │  (db::handlers - queries over a connection)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │  Models          │  (db::models - database records)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │  PostgreSQL      │
//! └──────────────────┘
//! ```
//!
//! Repositories borrow a `&mut PgConnection`, so they work the same on a pooled connection or
//! inside a transaction:
//!
//! ```ignore
//! use fireems_webhooks::db::handlers::DepartmentWebhooks;
//!
//! let mut conn = pool.acquire().await?;
//! let mut repo = DepartmentWebhooks::new(&mut conn);
//! if let Some(row) = repo.get(7).await? {
//!     println!("department 7 enabled: {}", row.enabled);
//! }
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

/// Connect to PostgreSQL with the configured pool limits.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connected to PostgreSQL"
    );

    Ok(pool)
}
