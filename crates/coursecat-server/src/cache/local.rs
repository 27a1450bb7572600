//! Single-instance cache backed by a `DashMap`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CacheGateway, CacheLookup, CacheStatus};

/// A cached payload with its expiry.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<str>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: &str, ttl: Duration) -> Self {
        Self {
            data: Arc::from(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// In-process cache. Never unavailable; expired entries are dropped lazily on
/// read and during pattern sweeps.
#[derive(Clone, Debug, Default)]
pub struct LocalCache {
    entries: Arc<DashMap<String, CachedEntry>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }
}

#[async_trait]
impl CacheGateway for LocalCache {
    async fn get(&self, key: &str) -> CacheLookup {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return CacheLookup::Hit(entry.data.to_string());
            }
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        CacheLookup::Miss
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheStatus {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, ttl));
        CacheStatus::Done
    }

    async fn delete(&self, key: &str) -> CacheStatus {
        self.entries.remove(key);
        CacheStatus::Done
    }

    async fn delete_matching(&self, pattern: &str) -> CacheStatus {
        self.entries
            .retain(|key, entry| !entry.is_expired() && !glob_match(pattern, key));
        CacheStatus::Done
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Redis-style glob matching restricted to `*` (any run) and `?` (one char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
