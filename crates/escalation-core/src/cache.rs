//! In-memory TTL cache for read responses.
//!
//! Entries expire lazily on read and are swept periodically by
//! [`spawn_sweeper`]. Keys are plain strings; writes invalidate every key
//! under a path prefix.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// TTL presets for cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 60 seconds.
    Short,
    /// 5 minutes.
    Medium,
    /// 15 minutes.
    Long,
    /// 1 hour.
    Hour,
}

impl CacheTtl {
    pub fn duration(self) -> Duration {
        match self {
            CacheTtl::Short => Duration::from_secs(60),
            CacheTtl::Medium => Duration::from_secs(300),
            CacheTtl::Long => Duration::from_secs(900),
            CacheTtl::Hour => Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent string-keyed cache with per-entry expiry.
#[derive(Debug)]
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, Entry<V>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The cached value, unless missing or expired. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every key starting with `prefix`. Returns the number removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Drop every key starting with any of `prefixes`.
    pub fn invalidate_matching(&self, prefixes: &[&str]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|k, _| !prefixes.iter().any(|p| k.starts_with(p)));
        before.saturating_sub(self.entries.len())
    }

    /// Drop expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Sweep `cache` every `interval` until `cancel` fires.
pub fn spawn_sweeper<V>(
    cache: Arc<TtlCache<V>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = cache.len(), "swept expired cache entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_fresh_value() {
        let cache = TtlCache::new();
        cache.insert("/api/v1/leagues", 1, CacheTtl::Short.duration());
        assert_eq!(cache.get("/api/v1/leagues"), Some(1));
        assert_eq!(cache.get("/api/v1/pods"), None);
    }

    #[test]
    fn test_expired_entry_evicted_on_read() {
        let cache = TtlCache::new();
        cache.insert("k", "v".to_string(), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_prefix() {
        let cache = TtlCache::new();
        let ttl = CacheTtl::Medium.duration();
        cache.insert("/api/v1/leagues?page=1#1", 1, ttl);
        cache.insert("/api/v1/leagues/3#1", 2, ttl);
        cache.insert("/api/v1/pods#1", 3, ttl);
        assert_eq!(cache.invalidate_prefix("/api/v1/leagues"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_matching() {
        let cache = TtlCache::new();
        let ttl = CacheTtl::Long.duration();
        cache.insert("/a/1", 1, ttl);
        cache.insert("/b/1", 2, ttl);
        cache.insert("/c/1", 3, ttl);
        assert_eq!(cache.invalidate_matching(&["/a", "/b"]), 2);
        assert_eq!(cache.get("/c/1"), Some(3));
    }

    #[test]
    fn test_sweep_expired() {
        let cache = TtlCache::new();
        cache.insert("old", 1, Duration::ZERO);
        cache.insert("new", 2, CacheTtl::Hour.duration());
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let cache = Arc::new(TtlCache::<i32>::new());
        cache.insert("old", 1, Duration::ZERO);
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(cache.clone(), Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(cache.is_empty());
    }
}
