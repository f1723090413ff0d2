//! Distributed locking and idempotency tracking for the Rollout orchestrator.

pub mod idempotency;
pub mod lock;

pub use idempotency::{IdempotencyStore, InMemoryIdempotencyStore};
pub use lock::{DistributedLock, InProcessLock, LockGuard, PgAdvisoryLock};
