//! In-process response cache
//!
//! Provides:
//! - TTL expiry, checked lazily on read
//! - Capacity bound with least-recently-accessed eviction
//! - JSON-serialized values; undecodable entries count as misses
//! - Cache key builders
//!
//! One coarse lock guards the LRU list. Lookups decode under the lock, so a
//! corrupt entry is dropped without racing a concurrent `put`. A full cache
//! sheds expired entries before evicting a live one. No I/O happens while
//! the lock is held.

use crate::errors::AppError;
use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub capacity: usize,
    /// Time to live for every entry
    pub ttl: Duration,
    /// Name used in logs and metrics
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(600),
            name: "response".to_string(),
        }
    }
}

/// A stored value with its timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at: Instant,
    pub last_access_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created_at) >= ttl
    }
}

/// Counters reported by [`ResponseCache::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub corruptions: u64,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

/// Thread-safe TTL + LRU cache
pub struct ResponseCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a new cache. A zero capacity is raised to one.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..CacheStats::default()
                },
            }),
            config,
        }
    }

    pub fn with_capacity(capacity: usize, ttl: Duration) -> Self {
        Self::new(CacheConfig {
            capacity,
            ttl,
            ..CacheConfig::default()
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Look up `key` and decode it under the lock. Expired entries are
    /// removed; entries `decode` rejects are removed and counted as corrupt.
    fn fetch<T>(&self, key: &str, decode: impl FnOnce(&str) -> std::result::Result<T, String>) -> Option<T> {
        let now = Instant::now();
        let ttl = self.config.ttl;

        let (value, expired, corrupt) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.entries.peek(key).map(|entry| entry.is_expired(ttl, now)) {
                Some(false) => {
                    // get_mut promotes the entry to most recently used
                    let decoded = state.entries.get_mut(key).map(|entry| {
                        entry.last_access_at = now;
                        decode(&entry.value)
                    });
                    match decoded {
                        Some(Ok(value)) => {
                            state.stats.hits += 1;
                            (Some(value), false, None)
                        }
                        Some(Err(message)) => {
                            state.entries.pop(key);
                            state.stats.corruptions += 1;
                            state.stats.misses += 1;
                            (None, false, Some(message))
                        }
                        None => {
                            state.stats.misses += 1;
                            (None, false, None)
                        }
                    }
                }
                Some(true) => {
                    state.entries.pop(key);
                    state.stats.expirations += 1;
                    state.stats.misses += 1;
                    (None, true, None)
                }
                None => {
                    state.stats.misses += 1;
                    (None, false, None)
                }
            }
        };

        if let Some(message) = corrupt {
            let err = AppError::CacheCorruption {
                message: format!("key '{}': {}", key, message),
            };
            warn!(cache = %self.config.name, error = %err, "Discarding corrupted cache entry");
        }

        let hit = value.is_some();
        debug!(cache = %self.config.name, key = %key, hit, expired, "Cache lookup");
        crate::metrics::record_cache(hit, &self.config.name);
        value
    }

    /// Get the raw value for a key. Expired entries are removed and
    /// reported as absent.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.fetch(key, |raw| Ok(raw.to_string()))
    }

    /// Store a raw value. When the cache is full, expired entries go first;
    /// otherwise the least recently accessed entry is evicted.
    pub fn put_raw(&self, key: &str, value: String) {
        let now = Instant::now();
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            created_at: now,
            last_access_at: now,
        };

        let mut state = self.lock();
        if state.entries.len() >= state.entries.cap().get() && !state.entries.contains(key) {
            Self::drop_expired(&mut state, self.config.ttl, now);
        }
        if let Some((evicted_key, _)) = state.entries.push(key.to_string(), entry) {
            if evicted_key != key {
                state.stats.evictions += 1;
            }
        }
    }

    /// Get and decode a value. An entry that cannot be decoded is dropped
    /// and treated as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fetch(key, |raw| serde_json::from_str(raw).map_err(|e| e.to_string()))
    }

    /// Encode and store a value. Serialization failures are logged and the
    /// value is not cached.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.put_raw(key, json),
            Err(e) => {
                warn!(cache = %self.config.name, key = %key, error = %e, "Failed to serialize value, not caching");
            }
        }
    }

    /// Remove a key, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drop expired entries eagerly, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut state = self.lock();
        Self::drop_expired(&mut state, self.config.ttl, Instant::now())
    }

    fn drop_expired(state: &mut CacheState, ttl: Duration, now: Instant) -> usize {
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        state.stats.expirations += expired.len() as u64;
        expired.len()
    }

    /// Live entry count, including entries not yet lazily expired
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}

/// Cache key builder helpers
pub mod keys {
    use sha2::{Digest, Sha256};

    fn digest(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            // Separator keeps ("ab", "c") distinct from ("a", "bc")
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }

    /// Build an answer cache key from the normalized query, context and the
    /// knowledge version the answer was built from
    pub fn answer(normalized_query: &str, context: Option<&str>, knowledge_version: u64) -> String {
        let version = knowledge_version.to_string();
        format!(
            "answer:{}",
            digest(&[normalized_query, context.unwrap_or(""), &version])
        )
    }

    /// Build a generation memo key
    pub fn generation(prompt: &str, model: &str, temperature: f32, max_tokens: u32) -> String {
        let temperature = format!("{:.3}", temperature);
        let max_tokens = max_tokens.to_string();
        format!(
            "generation:{}:{}",
            model,
            digest(&[prompt, model, &temperature, &max_tokens])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_within_ttl_returns_value_twice() {
        let cache = ResponseCache::with_capacity(10, Duration::from_secs(60));
        cache.put("k", &"v".to_string());
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_entry_expires_without_invalidation() {
        let cache = ResponseCache::with_capacity(10, Duration::from_millis(40));
        cache.put("k", &"v".to_string());
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_accessed() {
        let cache = ResponseCache::with_capacity(2, Duration::from_secs(60));
        cache.put("a", &1);
        cache.put("b", &2);
        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get::<i32>("a"), Some(1));
        cache.put("c", &3);

        assert_eq!(cache.get::<i32>("b"), None);
        assert_eq!(cache.get::<i32>("a"), Some(1));
        assert_eq!(cache.get::<i32>("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_is_not_an_eviction() {
        let cache = ResponseCache::with_capacity(2, Duration::from_secs(60));
        cache.put("a", &1);
        cache.put("a", &2);
        assert_eq!(cache.get::<i32>("a"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let cache = ResponseCache::with_capacity(4, Duration::from_secs(60));
        cache.put_raw("k", "{not json".to_string());
        assert_eq!(cache.get::<Vec<String>>("k"), None);
        assert!(!cache.remove("k"));
        let stats = cache.stats();
        assert_eq!(stats.corruptions, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_full_cache_sheds_expired_before_live() {
        let cache = ResponseCache::with_capacity(2, Duration::from_millis(200));
        cache.put("stale", &1);
        std::thread::sleep(Duration::from_millis(120));
        cache.put("live", &2);
        // Promote "stale" so "live" is the least recently used entry
        assert_eq!(cache.get::<i32>("stale"), Some(1));
        std::thread::sleep(Duration::from_millis(120));

        cache.put("new", &3);
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
        assert_eq!(cache.get::<i32>("live"), Some(2));
        assert_eq!(cache.get::<i32>("new"), Some(3));
    }

    #[test]
    fn test_purge_expired() {
        let cache = ResponseCache::with_capacity(4, Duration::from_millis(20));
        cache.put("a", &1);
        cache.put("b", &2);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(ResponseCache::with_capacity(64, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("{}-{}", t, i % 8);
                        cache.put(&key, &i);
                        let _ = cache.get::<i32>(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }

    #[test]
    fn test_key_builders() {
        let a = keys::answer("how do i control aphids", None, 1);
        let b = keys::answer("how do i control aphids", Some("kenya"), 1);
        let c = keys::answer("how do i control aphids", None, 2);
        assert!(a.starts_with("answer:"));
        assert_ne!(a, b);
        assert_ne!(a, c);

        let g1 = keys::generation("prompt", "llama3.2", 0.3, 512);
        let g2 = keys::generation("prompt", "llama3.2", 0.7, 512);
        assert!(g1.contains("generation:llama3.2:"));
        assert_ne!(g1, g2);
    }
}
