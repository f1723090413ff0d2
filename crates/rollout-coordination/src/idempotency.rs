//! At-most-once side-effect tracking, consulted from inside a held
//! distributed lock (spec §4.2: idempotency keys are only meaningful once
//! mutual exclusion is already guaranteed).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically check whether `key` has already been processed and, if
    /// not, record it as processed. Returns `true` the first time a key is
    /// seen, `false` on every subsequent call.
    async fn claim(&self, key: &str) -> Result<bool>;
}

/// Process-local store with a fixed retention window. Entries older than
/// `ttl` are evicted lazily on the next `claim` call — good enough for the
/// single-replica dev profile; `rollout-db::PgIdempotencyStore` backs
/// production.
pub struct InMemoryIdempotencyStore {
    ttl: Duration,
    seen: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn expired(&self, seen_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - seen_at).to_std().unwrap_or_default() >= self.ttl
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn claim(&self, key: &str) -> Result<bool> {
        let now = Utc::now();
        let mut seen = self.seen.lock().await;
        seen.retain(|_, seen_at| !self.expired(*seen_at, now));

        if seen.contains_key(key) {
            return Ok(false);
        }
        seen.insert(key.to_string(), now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_claim_succeeds_second_does_not() {
        let store = InMemoryIdempotencyStore::new(Duration::from_secs(60));
        assert!(store.claim("exec-1:deploy:node-a").await.unwrap());
        assert!(!store.claim("exec-1:deploy:node-a").await.unwrap());
    }

    #[tokio::test]
    async fn distinct_keys_both_claim() {
        let store = InMemoryIdempotencyStore::new(Duration::from_secs(60));
        assert!(store.claim("exec-1:deploy:node-a").await.unwrap());
        assert!(store.claim("exec-1:deploy:node-b").await.unwrap());
    }
}
