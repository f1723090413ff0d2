//! Distributed mutual exclusion over `(Environment, ModuleName)` — the
//! invariant that at most one pipeline may be actively deploying a given
//! module to a given environment at a time (spec §4.2).

use async_trait::async_trait;
use rollout_core::{Error, ExecutionContext, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Held until dropped or explicitly released. Implementations should treat
/// an un-released handle (caller panicked, process killed) as eventually
/// reclaimable — `PgAdvisoryLock` relies on session-scoped Postgres locks
/// being freed when the backing connection closes.
#[async_trait]
pub trait LockGuard: Send {
    async fn release(self: Box<Self>);
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Block (subject to `timeout` and `ctx` cancellation) until the named
    /// resource is exclusively held by this caller.
    async fn acquire(
        &self,
        resource: &str,
        timeout: Duration,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn LockGuard>>;
}

/// Hash an arbitrary resource name down to the `bigint` key
/// `pg_advisory_lock` takes.
fn advisory_key(resource: &str) -> i64 {
    let digest = Sha256::digest(resource.as_bytes());
    i64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is 32 bytes"))
}

/// Postgres session-scoped advisory lock. Acquisition polls
/// `pg_try_advisory_lock` rather than blocking on `pg_advisory_lock`, so
/// cancellation and timeouts stay cooperative instead of needing to kill the
/// underlying connection.
pub struct PgAdvisoryLock {
    pool: sqlx::PgPool,
}

impl PgAdvisoryLock {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributedLock for PgAdvisoryLock {
    async fn acquire(
        &self,
        resource: &str,
        timeout: Duration,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn LockGuard>> {
        let key = advisory_key(resource);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("acquiring connection for lock: {e}")))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
                .bind(key)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| Error::Internal(format!("pg_try_advisory_lock: {e}")))?;

            if acquired.0 {
                tracing::debug!(resource, key, "acquired advisory lock");
                return Ok(Box::new(PgAdvisoryLockGuard {
                    conn: Some(conn),
                    key,
                    resource: resource.to_string(),
                }));
            }

            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::LockTimeout(resource.to_string()));
            }
            if ctx.sleep_or_cancel(POLL_INTERVAL).await {
                return Err(Error::Cancelled);
            }
        }
    }
}

struct PgAdvisoryLockGuard {
    conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
    key: i64,
    resource: String,
}

#[async_trait]
impl LockGuard for PgAdvisoryLockGuard {
    async fn release(mut self: Box<Self>) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(self.key)
                .execute(&mut *conn)
                .await
            {
                tracing::warn!(resource = %self.resource, error = %e, "failed to release advisory lock");
            } else {
                tracing::debug!(resource = %self.resource, "released advisory lock");
            }
        }
    }
}

/// Single-process lock for tests and the single-replica dev profile. Not
/// durable across a crash — acceptable only because `PgAdvisoryLock` is what
/// ships in production.
#[derive(Clone, Default)]
pub struct InProcessLock {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InProcessLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for InProcessLock {
    async fn acquire(
        &self,
        resource: &str,
        timeout: Duration,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn LockGuard>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut held = self.held.lock().await;
                if !held.contains(resource) {
                    held.insert(resource.to_string());
                    return Ok(Box::new(InProcessLockGuard {
                        held: self.held.clone(),
                        resource: resource.to_string(),
                    }));
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::LockTimeout(resource.to_string()));
            }
            if ctx.sleep_or_cancel(POLL_INTERVAL).await {
                return Err(Error::Cancelled);
            }
        }
    }
}

struct InProcessLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    resource: String,
}

#[async_trait]
impl LockGuard for InProcessLockGuard {
    async fn release(self: Box<Self>) {
        self.held.lock().await.remove(&self.resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_blocks_until_release() {
        let lock = InProcessLock::new();
        let ctx = ExecutionContext::new();

        let guard = lock
            .acquire("dev/checkout", Duration::from_secs(1), &ctx)
            .await
            .expect("first acquire succeeds");

        let lock2 = lock.clone();
        let ctx2 = ctx.clone();
        let waiter = tokio::spawn(async move {
            lock2
                .acquire("dev/checkout", Duration::from_secs(5), &ctx2)
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        guard.release().await;

        let second = waiter.await.expect("task joins").expect("second acquires");
        second.release().await;
    }

    #[tokio::test]
    async fn acquire_times_out_when_held() {
        let lock = InProcessLock::new();
        let ctx = ExecutionContext::new();
        let _guard = lock
            .acquire("dev/checkout", Duration::from_secs(5), &ctx)
            .await
            .unwrap();

        let err = lock
            .acquire("dev/checkout", Duration::from_millis(150), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockTimeout(_)));
    }
}
