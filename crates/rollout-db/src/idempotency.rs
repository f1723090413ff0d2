//! Durable backing for `rollout_coordination::IdempotencyStore`.

use async_trait::async_trait;
use rollout_core::Result;
use rollout_coordination::IdempotencyStore;
use sqlx::PgPool;

pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn claim(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_keys (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| rollout_core::Error::Internal(format!("idempotency claim: {e}")))?;
        Ok(result.rows_affected() == 1)
    }
}
