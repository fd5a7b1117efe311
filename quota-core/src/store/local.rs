use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ConditionalIncrement, Store, TokenOutcome};
use crate::error::Result;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

fn epoch_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// In-process store (spec §4.1 "local"). Two independent concurrent maps
/// — key -> window map, key -> bucket record — each using `DashMap`'s
/// sharded, per-entry locking so unrelated keys never serialize on a
/// single global lock (spec §9 "per-key locking over global").
pub struct LocalStore {
    windows: Arc<DashMap<String, DashMap<i64, u64>>>,
    buckets: Arc<DashMap<String, (f64, SystemTime)>>,
    ttl: Duration,
    shutdown: Arc<Notify>,
    eviction_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("keys_with_windows", &self.windows.len())
            .field("keys_with_buckets", &self.buckets.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let windows: Arc<DashMap<String, DashMap<i64, u64>>> = Arc::new(DashMap::new());
        let shutdown = Arc::new(Notify::new());

        let eviction_task = {
            let windows = Arc::clone(&windows);
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(Self::eviction_loop(windows, shutdown, ttl))
        };

        Self {
            windows,
            buckets: Arc::new(DashMap::new()),
            ttl,
            shutdown,
            eviction_task: SyncMutex::new(Some(eviction_task)),
        }
    }

    async fn eviction_loop(
        windows: Arc<DashMap<String, DashMap<i64, u64>>>,
        shutdown: Arc<Notify>,
        ttl: Duration,
    ) {
        let mut tick = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let cutoff = epoch_secs(SystemTime::now()) - ttl.as_secs() as i64;
                    for entry in windows.iter() {
                        // Held only for the duration of one map filter pass
                        // (spec §9 "eviction task holds each per-key lock
                        // only for the duration of one map filter pass").
                        entry.value().retain(|window_epoch, _| *window_epoch >= cutoff);
                    }
                    windows.retain(|_, inner| !inner.is_empty());
                    trace!(cutoff, "evicted expired window records");
                }
                _ = shutdown.notified() => {
                    debug!("eviction task shutting down");
                    break;
                }
            }
        }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn try_consume(
        &self,
        key: &str,
        capacity: f64,
        rate_per_second: f64,
        now: SystemTime,
        cost: f64,
    ) -> Result<TokenOutcome> {
        let mut entry = self.buckets.entry(key.to_string()).or_insert((capacity, now));
        let (tokens, last_refill) = *entry;

        // Negative clock skew clamps elapsed to zero, never a negative refill.
        let elapsed = now.duration_since(last_refill).unwrap_or(Duration::ZERO);
        let refilled = (tokens + elapsed.as_secs_f64() * rate_per_second)
            .min(capacity)
            .max(0.0);

        let (allowed, tokens_after) = if refilled >= cost {
            (true, (refilled - cost).max(0.0).min(capacity))
        } else {
            (false, refilled)
        };

        *entry = (tokens_after, now);
        trace!(key, allowed, tokens_after, "token bucket decide");

        Ok(TokenOutcome {
            allowed,
            tokens_after,
            last_refill: now,
        })
    }

    async fn try_increment(
        &self,
        key: &str,
        window: SystemTime,
        n: u64,
        budget: f64,
    ) -> Result<ConditionalIncrement> {
        let inner = self
            .windows
            .entry(key.to_string())
            .or_insert_with(DashMap::new);
        let epoch = epoch_secs(window);
        let mut count = inner.entry(epoch).or_insert(0);
        let current = *count;

        if (current + n) as f64 <= budget {
            *count = current + n;
            Ok(ConditionalIncrement {
                allowed: true,
                count: current + n,
            })
        } else {
            Ok(ConditionalIncrement {
                allowed: false,
                count: current,
            })
        }
    }

    async fn get_windows(
        &self,
        key: &str,
        from: SystemTime,
        to: SystemTime,
    ) -> Result<Vec<(SystemTime, u64)>> {
        let from_epoch = epoch_secs(from);
        let to_epoch = epoch_secs(to);
        let Some(inner) = self.windows.get(key) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for item in inner.iter() {
            let epoch = *item.key();
            if epoch >= from_epoch && epoch <= to_epoch {
                out.push((UNIX_EPOCH + Duration::from_secs(epoch.max(0) as u64), *item.value()));
            }
        }
        Ok(out)
    }

    async fn get_tokens(&self, key: &str) -> Result<(f64, SystemTime)> {
        Ok(self
            .buckets
            .get(key)
            .map(|r| *r)
            .unwrap_or((0.0, UNIX_EPOCH)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.windows.remove(key);
        self.buckets.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.notify_waiters();
        if let Some(handle) = self.eviction_task.lock().take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_cold_start_fills_capacity() {
        let store = LocalStore::new();
        let now = SystemTime::now();
        let outcome = store.try_consume("k", 10.0, 10.0, now, 1.0).await.unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.tokens_after, 9.0);
    }

    #[tokio::test]
    async fn token_bucket_denies_when_drained() {
        let store = LocalStore::new();
        let now = SystemTime::now();
        store.try_consume("k", 5.0, 5.0, now, 5.0).await.unwrap();
        let denied = store.try_consume("k", 5.0, 5.0, now, 1.0).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.tokens_after, 0.0);
    }

    #[tokio::test]
    async fn window_increment_respects_budget() {
        let store = LocalStore::new();
        let window = SystemTime::now();
        for _ in 0..10 {
            let r = store.try_increment("k", window, 1, 10.0).await.unwrap();
            assert!(r.allowed);
        }
        let denied = store.try_increment("k", window, 1, 10.0).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.count, 10);
    }

    #[tokio::test]
    async fn delete_clears_both_families() {
        let store = LocalStore::new();
        let now = SystemTime::now();
        store.try_consume("k", 5.0, 5.0, now, 1.0).await.unwrap();
        store.try_increment("k", now, 1, 5.0).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get_tokens("k").await.unwrap(), (0.0, UNIX_EPOCH));
        assert!(store.get_windows("k", UNIX_EPOCH, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_joins_the_eviction_task() {
        let store = LocalStore::new();
        store.close().await.unwrap();
        // A second close is a no-op: the handle was already taken.
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn independent_keys_do_not_interfere() {
        let store = LocalStore::new();
        let now = SystemTime::now();
        store.try_consume("a", 1.0, 1.0, now, 1.0).await.unwrap();
        let b = store.try_consume("b", 1.0, 1.0, now, 1.0).await.unwrap();
        assert!(b.allowed);
    }
}
