//! The cache gateway contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Result of a cache read.
///
/// `Miss` and `Unavailable` are handled the same way by callers (fall back to
/// the store) but are kept apart so that monitoring can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Miss,
    Unavailable,
}

impl CacheLookup {
    pub fn outcome(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Unavailable => "unavailable",
        }
    }
}

/// Result of a cache write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Done,
    Unavailable,
}

impl CacheStatus {
    pub fn is_done(self) -> bool {
        matches!(self, CacheStatus::Done)
    }
}

/// Best-effort key/value cache.
///
/// No method returns an error: connectivity failures are folded into
/// [`CacheLookup::Unavailable`] / [`CacheStatus::Unavailable`] and logged by
/// the implementation. Callers must never assume the cache is reachable.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    async fn get(&self, key: &str) -> CacheLookup;

    /// Stores `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheStatus;

    async fn delete(&self, key: &str) -> CacheStatus;

    /// Deletes every key matching a glob pattern (`*` and `?` wildcards).
    async fn delete_matching(&self, pattern: &str) -> CacheStatus;

    fn backend_name(&self) -> &'static str;
}

pub type DynCacheGateway = Arc<dyn CacheGateway>;
