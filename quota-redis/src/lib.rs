//! The "shared" store (spec §4.1): delegates to a remote Redis-compatible
//! server whose atomic Lua scripts give the same per-key atomicity
//! guarantee the local store gets from its per-key mutex.
//!
//! Window family keys are namespaced `window:<key>`, bucket family keys
//! `tokens:<key>` (spec §6 "Persisted state layout"), so toggling the
//! algorithm used against the same `(identifier, resource)` never lets
//! one family's records corrupt the other's (spec §9 "key namespacing").

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use quota_core::error::{Error, Result};
use quota_core::store::{ConditionalIncrement, Store, TokenOutcome};
use tracing::{debug, trace};

const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

fn window_key(key: &str) -> String {
    format!("window:{key}")
}

fn tokens_key(key: &str) -> String {
    format!("tokens:{key}")
}

fn epoch_secs_f64(t: SystemTime) -> f64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn epoch_secs_i64(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Refills and conditionally consumes a token bucket in one round trip
/// (mirrors the teacher's `create_take_token_script`, generalized to a
/// fractional `cost` and a decimal-string reply to avoid the integer
/// truncation Redis applies to Lua number replies — spec §9 "the
/// shared-store encoding uses a decimal string to avoid host-endian
/// concerns").
fn take_token_script() -> Script {
    Script::new(
        r#"
        local key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local rate = tonumber(ARGV[2])
        local cost = tonumber(ARGV[3])
        local now = tonumber(ARGV[4])
        local ttl = tonumber(ARGV[5])

        local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
        local tokens = tonumber(bucket[1])
        local last_refill = tonumber(bucket[2])

        if not tokens then
            tokens = capacity
            last_refill = now
        end

        local elapsed = now - last_refill
        if elapsed < 0 then elapsed = 0 end
        tokens = math.min(capacity, tokens + elapsed * rate)
        if tokens < 0 then tokens = 0 end

        local allowed = 0
        if tokens >= cost then
            tokens = tokens - cost
            allowed = 1
        end

        redis.call('HMSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
        redis.call('EXPIRE', key, ttl)

        return {allowed, tostring(tokens)}
        "#,
    )
}

/// Atomically bumps the current window's count by `n` iff doing so keeps
/// it at or under `budget` (the caller has already folded any previous
/// window's weighted contribution into `budget` — spec §4.4).
fn take_window_script() -> Script {
    Script::new(
        r#"
        local key = KEYS[1]
        local field = ARGV[1]
        local n = tonumber(ARGV[2])
        local budget = tonumber(ARGV[3])
        local ttl = tonumber(ARGV[4])

        local current = tonumber(redis.call('HGET', key, field)) or 0
        local allowed = 0
        local result = current

        if (current + n) <= budget then
            result = current + n
            redis.call('HSET', key, field, result)
            allowed = 1
        end
        redis.call('EXPIRE', key, ttl)

        return {allowed, result}
        "#,
    )
}

/// Redis-backed `Store` implementation (spec §4.1 "shared").
pub struct SharedStore {
    connection: ConnectionManager,
    ttl_seconds: u64,
    take_token: Script,
    take_window: Script,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl SharedStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        Self::connect_with_ttl(redis_url, Duration::from_secs(DEFAULT_TTL_SECONDS)).await
    }

    pub async fn connect_with_ttl(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::StoreUnavailable(format!("redis client error: {e}")))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis connection error: {e}")))?;

        debug!(redis_url, "connected to shared store");
        Ok(Self {
            connection,
            ttl_seconds: ttl.as_secs().max(1),
            take_token: take_token_script(),
            take_window: take_window_script(),
        })
    }
}

#[async_trait]
impl Store for SharedStore {
    async fn try_consume(
        &self,
        key: &str,
        capacity: f64,
        rate_per_second: f64,
        now: SystemTime,
        cost: f64,
    ) -> Result<TokenOutcome> {
        let mut conn = self.connection.clone();
        let (allowed, tokens_after): (i32, String) = self
            .take_token
            .key(tokens_key(key))
            .arg(capacity)
            .arg(rate_per_second)
            .arg(cost)
            .arg(epoch_secs_f64(now))
            .arg(self.ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis script error: {e}")))?;

        let tokens_after: f64 = tokens_after
            .parse()
            .map_err(|e| Error::StoreInconsistent(format!("non-numeric token count: {e}")))?;

        trace!(key, allowed, tokens_after, "shared store token decide");
        Ok(TokenOutcome {
            allowed: allowed == 1,
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
        let mut conn = self.connection.clone();
        let field = epoch_secs_i64(window).to_string();
        let (allowed, count): (i32, u64) = self
            .take_window
            .key(window_key(key))
            .arg(&field)
            .arg(n)
            .arg(budget)
            .arg(self.ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis script error: {e}")))?;

        Ok(ConditionalIncrement {
            allowed: allowed == 1,
            count,
        })
    }

    async fn get_windows(
        &self,
        key: &str,
        from: SystemTime,
        to: SystemTime,
    ) -> Result<Vec<(SystemTime, u64)>> {
        let mut conn = self.connection.clone();
        let all: Vec<(String, u64)> = conn
            .hgetall(window_key(key))
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis hgetall error: {e}")))?;

        let from_epoch = epoch_secs_i64(from);
        let to_epoch = epoch_secs_i64(to);

        let mut out = Vec::new();
        for (field, count) in all {
            let epoch: i64 = field
                .parse()
                .map_err(|e| Error::StoreInconsistent(format!("non-numeric window field: {e}")))?;
            if epoch >= from_epoch && epoch <= to_epoch {
                out.push((UNIX_EPOCH + Duration::from_secs(epoch.max(0) as u64), count));
            }
        }
        Ok(out)
    }

    async fn get_tokens(&self, key: &str) -> Result<(f64, SystemTime)> {
        let mut conn = self.connection.clone();
        let bucket: (Option<String>, Option<String>) = conn
            .hget(tokens_key(key), &["tokens", "last_refill"])
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis hget error: {e}")))?;

        let tokens = match bucket.0 {
            Some(s) => s
                .parse()
                .map_err(|e| Error::StoreInconsistent(format!("non-numeric tokens: {e}")))?,
            None => return Ok((0.0, UNIX_EPOCH)),
        };
        let last_refill_secs: f64 = match bucket.1 {
            Some(s) => s
                .parse()
                .map_err(|e| Error::StoreInconsistent(format!("non-numeric last_refill: {e}")))?,
            None => 0.0,
        };

        Ok((tokens, UNIX_EPOCH + Duration::from_secs_f64(last_refill_secs.max(0.0))))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&[window_key(key), tokens_key(key)])
            .await
            .map_err(|e| Error::StoreUnavailable(format!("redis delete error: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // `ConnectionManager` has no explicit teardown; dropping the last
        // clone closes the underlying connection.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires a running redis instance at redis://127.0.0.1
    async fn take_token_roundtrip() {
        let store = SharedStore::connect("redis://127.0.0.1").await.unwrap();
        let now = SystemTime::now();
        let outcome = store.try_consume("test:user", 10.0, 10.0, now, 1.0).await.unwrap();
        assert!(outcome.allowed);
        store.delete("test:user").await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn take_window_respects_budget() {
        let store = SharedStore::connect("redis://127.0.0.1").await.unwrap();
        let now = SystemTime::now();
        for _ in 0..5 {
            let r = store.try_increment("test:win", now, 1, 5.0).await.unwrap();
            assert!(r.allowed);
        }
        let denied = store.try_increment("test:win", now, 1, 5.0).await.unwrap();
        assert!(!denied.allowed);
        store.delete("test:win").await.unwrap();
    }
}
