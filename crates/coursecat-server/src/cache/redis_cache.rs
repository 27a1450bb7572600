//! Redis cache gateway.
//!
//! Connections come from a `deadpool-redis` pool that dials lazily, so an
//! unreachable Redis at startup only means the first requests see
//! `Unavailable`. Every operation is bounded by the configured timeout, and
//! after a failure reads and writes skip the network for a backoff window that
//! doubles on each consecutive failure. Deletes and pattern sweeps ignore the
//! window: an invalidation skipped while Redis is healthy would leave
//! pre-write entries readable once the window closes.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Pool, Runtime};
use parking_lot::Mutex;
use redis::AsyncCommands;

use super::backend::{CacheGateway, CacheLookup, CacheStatus};
use crate::config::RedisConfig;

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 200;

/// Whether an operation honours an open backoff window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Skip the call while the window is open.
    UnlessBackingOff,
    /// Always try, bounded by the timeout.
    Always,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to create Redis pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    #[error("failed to get Redis connection: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis operation timed out after {0}ms")]
    Timeout(u64),
}

/// Capped exponential backoff between reconnection attempts.
#[derive(Debug)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    state: Mutex<BackoffState>,
}

#[derive(Debug)]
struct BackoffState {
    failures: u32,
    next_delay: Duration,
    retry_at: Option<Instant>,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            state: Mutex::new(BackoffState {
                failures: 0,
                next_delay: initial,
                retry_at: None,
            }),
        }
    }

    /// Whether calls should currently be short-circuited.
    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .retry_at
            .is_some_and(|at| Instant::now() < at)
    }

    /// Opens the window and returns its length. Failures reported while the
    /// window is already open (concurrent in-flight calls) do not extend it.
    pub fn record_failure(&self) -> Duration {
        let mut state = self.state.lock();
        let now = Instant::now();
        if let Some(at) = state.retry_at {
            if now < at {
                return at - now;
            }
        }
        let delay = state.next_delay;
        state.failures += 1;
        state.retry_at = Some(now + delay);
        state.next_delay = (delay * 2).min(self.max);
        delay
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.failures > 0 {
            tracing::info!(failures = state.failures, "Redis cache recovered");
        }
        state.failures = 0;
        state.next_delay = self.initial;
        state.retry_at = None;
    }

    pub fn failures(&self) -> u32 {
        self.state.lock().failures
    }
}

pub struct RedisCache {
    pool: Pool,
    timeout: Duration,
    backoff: ReconnectBackoff,
}

impl RedisCache {
    /// Builds the pool without dialing Redis.
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);
        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;

        Ok(Self {
            pool,
            timeout,
            backoff: ReconnectBackoff::new(
                Duration::from_millis(config.backoff_initial_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
        })
    }

    pub fn backoff(&self) -> &ReconnectBackoff {
        &self.backoff
    }

    /// Runs `op` under the timeout and feeds the outcome into the backoff.
    /// Returns `None` when the cache should be treated as unavailable.
    async fn execute<T, F, Fut>(
        &self,
        op_name: &'static str,
        key: &str,
        attempt: Attempt,
        op: F,
    ) -> Option<T>
    where
        F: FnOnce(Pool) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        if attempt == Attempt::UnlessBackingOff && self.backoff.is_open() {
            return None;
        }

        let result = match tokio::time::timeout(self.timeout, op(self.pool.clone())).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(value) => {
                self.backoff.record_success();
                Some(value)
            }
            Err(e) => {
                let retry_in = self.backoff.record_failure();
                tracing::warn!(
                    op = op_name,
                    key = %key,
                    error = %e,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Redis cache unavailable"
                );
                None
            }
        }
    }
}

#[async_trait]
impl CacheGateway for RedisCache {
    async fn get(&self, key: &str) -> CacheLookup {
        let value = self
            .execute("GET", key, Attempt::UnlessBackingOff, |pool| async move {
                let mut conn = pool.get().await?;
                let value: Option<String> = conn.get(key).await?;
                Ok(value)
            })
            .await;
        match value {
            Some(Some(payload)) => CacheLookup::Hit(payload),
            Some(None) => CacheLookup::Miss,
            None => CacheLookup::Unavailable,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheStatus {
        let ttl_secs = ttl.as_secs().max(1);
        self.execute("SET", key, Attempt::UnlessBackingOff, |pool| async move {
            let mut conn = pool.get().await?;
            let () = conn.set_ex(key, value, ttl_secs).await?;
            Ok(())
        })
        .await
        .map_or(CacheStatus::Unavailable, |()| CacheStatus::Done)
    }

    async fn delete(&self, key: &str) -> CacheStatus {
        self.execute("DEL", key, Attempt::Always, |pool| async move {
            let mut conn = pool.get().await?;
            let _removed: u64 = conn.del(key).await?;
            Ok(())
        })
        .await
        .map_or(CacheStatus::Unavailable, |()| CacheStatus::Done)
    }

    async fn delete_matching(&self, pattern: &str) -> CacheStatus {
        let removed = self
            .execute("SCAN+DEL", pattern, Attempt::Always, |pool| async move {
                let mut conn = pool.get().await?;
                let mut cursor: u64 = 0;
                let mut removed: u64 = 0;
                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_COUNT)
                        .query_async(&mut *conn)
                        .await?;
                    if !keys.is_empty() {
                        let count: u64 = conn.del(&keys).await?;
                        removed += count;
                    }
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(removed)
            })
            .await;

        match removed {
            Some(removed) => {
                tracing::debug!(pattern = %pattern, removed, "cache pattern sweep");
                CacheStatus::Done
            }
            None => CacheStatus::Unavailable,
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let backoff = ReconnectBackoff::new(Duration::from_millis(1), Duration::from_millis(4));
        let mut delays = Vec::new();
        for _ in 0..4 {
            delays.push(backoff.record_failure());
            std::thread::sleep(Duration::from_millis(6));
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(4),
                Duration::from_millis(4),
            ]
        );
        assert_eq!(backoff.failures(), 4);
    }

    #[test]
    fn window_is_open_until_it_elapses() {
        let backoff = ReconnectBackoff::new(Duration::from_secs(60), Duration::from_secs(60));
        assert!(!backoff.is_open());
        backoff.record_failure();
        assert!(backoff.is_open());

        // A concurrent failure does not push the window further out.
        assert!(backoff.record_failure() <= Duration::from_secs(60));
        assert_eq!(backoff.failures(), 1);
    }

    #[test]
    fn success_resets() {
        let backoff = ReconnectBackoff::new(Duration::from_millis(1), Duration::from_secs(1));
        backoff.record_failure();
        std::thread::sleep(Duration::from_millis(3));
        backoff.record_failure();
        backoff.record_success();
        assert!(!backoff.is_open());
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.record_failure(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_and_short_circuits_reads() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".into(),
            timeout_ms: 200,
            backoff_initial_ms: 60_000,
            ..RedisConfig::default()
        };
        let cache = RedisCache::new(&config).expect("pool is created lazily");

        assert_eq!(cache.get("course:cs101").await, CacheLookup::Unavailable);
        assert!(cache.backoff().is_open());

        let started = Instant::now();
        assert_eq!(
            cache.set("course:cs101", "{}", Duration::from_secs(5)).await,
            CacheStatus::Unavailable
        );
        assert_eq!(cache.get("course:cs101").await, CacheLookup::Unavailable);
        assert!(started.elapsed() < Duration::from_millis(50));

        assert_eq!(cache.delete_matching("search:*").await, CacheStatus::Unavailable);
        assert_eq!(cache.delete("course:stats").await, CacheStatus::Unavailable);
    }

    #[tokio::test]
    async fn invalidation_is_attempted_while_backing_off() {
        // Accepts connections but never answers, like a stalled Redis.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = accepted.clone();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                held.push(socket);
            }
        });

        let config = RedisConfig {
            enabled: true,
            url: format!("redis://127.0.0.1:{port}"),
            timeout_ms: 200,
            backoff_initial_ms: 60_000,
            ..RedisConfig::default()
        };
        let cache = RedisCache::new(&config).expect("pool is created lazily");
        cache.backoff().record_failure();

        assert_eq!(cache.get("course:cs101").await, CacheLookup::Unavailable);
        assert_eq!(
            cache.set("course:cs101", "{}", Duration::from_secs(5)).await,
            CacheStatus::Unavailable
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 0);

        assert_eq!(cache.delete_matching("search:*").await, CacheStatus::Unavailable);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(accepted.load(std::sync::atomic::Ordering::SeqCst) >= 1);

        server.abort();
    }
}
