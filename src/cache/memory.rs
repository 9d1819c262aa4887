//! In-process TTL store used as the local standby.
//!
//! Bounded by an LRU policy; expired entries are dropped on access and by a
//! periodic sweep. This store is NOT authoritative: it only keeps serving
//! while the distributed store is unreachable.

use super::error::{CacheError, CacheResult};
use super::store::{glob_to_regex, CacheStore};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Bounded in-memory cache with per-entry expiry.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("MemoryStore")
            .field("capacity", &entries.cap())
            .field("len", &entries.len())
            .finish()
    }
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` keys (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            closed: AtomicBool::new(false),
        }
    }

    /// Spawn the periodic expiry sweep. The task ends once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired local cache entries");
                }
            }
        })
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    fn live_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.ensure_open()?;
        let entry = Entry {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .pop(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.ensure_open()?;
        self.live_keys(pattern)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.ensure_open()?;
        let keys = self.live_keys(pattern)?;
        let mut entries = self.entries.lock();
        for key in &keys {
            entries.pop(key);
        }
        Ok(keys.len() as u64)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.ensure_open()?;
        let now = Instant::now();
        let entries = self.entries.lock();
        let remaining = match entries.peek(key) {
            Some(entry) if !entry.is_expired(now) => entry.expires_at.map(|at| at - now),
            _ => None,
        };
        // Round up so a key with 0.5s left still reports 1
        Ok(remaining
            .map(|left| left.as_millis().div_ceil(1000) as i64)
            .unwrap_or(-1))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.peek_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.clear();
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new(16);
        store.set("a", b"1", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert!(store.exists("a").await.unwrap());
        assert!(store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new(16);
        store
            .set("short", b"v", Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(store.ttl("short").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.ttl("short").await.unwrap(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired() {
        let store = Arc::new(MemoryStore::new(16));
        let _sweeper = store.spawn_sweeper(Duration::from_secs(10));
        store
            .set("gone", b"v", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.set("kept", b"v", None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.len(), 1);
        assert!(store.exists("kept").await.unwrap());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let store = MemoryStore::new(2);
        store.set("a", b"1", None).await.unwrap();
        store.set("b", b"2", None).await.unwrap();
        store.get("a").await.unwrap();
        store.set("c", b"3", None).await.unwrap();

        assert!(store.exists("a").await.unwrap());
        assert!(!store.exists("b").await.unwrap());
        assert!(store.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_and_delete_pattern() {
        let store = MemoryStore::new(16);
        store.set("search:a:default", b"1", None).await.unwrap();
        store.set("search:b:default", b"1", None).await.unwrap();
        store.set("url:1:default", b"1", None).await.unwrap();

        let mut keys = store.keys("search:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["search:a:default", "search:b:default"]);

        assert_eq!(store.delete_pattern("search:*").await.unwrap(), 2);
        assert_eq!(store.keys("*").await.unwrap(), vec!["url:1:default"]);
    }

    #[tokio::test]
    async fn test_expire_and_ttl_without_expiry() {
        let store = MemoryStore::new(16);
        store.set("k", b"v", None).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), -1);
        assert!(store.expire("k", Duration::from_secs(30)).await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), 30);
        assert!(!store.expire("missing", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = MemoryStore::new(16);
        store.set("k", b"v", None).await.unwrap();
        store.close().await;
        assert!(matches!(store.get("k").await, Err(CacheError::Closed)));
    }
}
