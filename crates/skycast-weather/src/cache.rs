//! In-memory TTL cache for raw API payloads.
//!
//! Reads re-check entry age, so an expired entry behaves exactly like a
//! missing one; eviction is lazy and [`CacheStore::sweep_expired`] is
//! optional maintenance, never required for correctness. There is no size
//! bound: unbounded growth over a long session is an accepted tradeoff.
//!
//! Age is measured with [`tokio::time::Instant`], so tests running under
//! `#[tokio::test(start_paused = true)]` can advance the clock
//! deterministically.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

/// Entries older than this are treated as absent.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

/// TTL-keyed store of previously fetched payloads. No I/O.
#[derive(Debug)]
pub struct CacheStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Valid payload for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: &str, payload: Value) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries from the container.
    pub fn sweep_expired(&self) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "swept expired cache entries");
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_fresh_entry() {
        let cache = CacheStore::new();
        cache.put("current:city:Paris", json!({"temp": 10.0}));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("current:city:Paris"), Some(json!({"temp": 10.0})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_treated_as_missing() {
        let cache = CacheStore::new();
        cache.put("current:city:Paris", json!({"temp": 10.0}));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("current:city:Paris"), None);
        // Lazy eviction: the container still holds the inert entry.
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_valid_just_under_ttl() {
        let cache = CacheStore::new();
        cache.put("k", json!(1));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_stored_at() {
        let cache = CacheStore::new();
        cache.put("k", json!(1));
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.put("k", json!(2));
        tokio::time::advance(Duration::from_secs(50)).await;

        // 100s after the first put but only 50s after the second.
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = CacheStore::new();
        cache.put("old", json!(1));
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.put("new", json!(2));
        tokio::time::advance(Duration::from_secs(30)).await;

        cache.sweep_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
        assert!(cache.get("old").is_none());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let cache = CacheStore::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CacheStore::new();
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
