//! Database layer for the Rollout deployment orchestrator.
//!
//! Provides repository traits and PostgreSQL implementations for the
//! outbox/lease job table and the approval gate, plus the durable
//! idempotency store.

pub mod error;
pub mod idempotency;
pub mod repo;

pub use error::{DbError, DbResult};
pub use idempotency::PgIdempotencyStore;
pub use repo::{ApprovalRepo, DeploymentJobRepo, PgApprovalRepo, PgDeploymentJobRepo};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
