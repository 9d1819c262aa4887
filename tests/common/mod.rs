// Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use unm_gateway::cache::{CacheError, CacheResult, CacheStore, MemoryStore, ResilientCache};
use unm_gateway::config::CacheConfig;
use unm_gateway::sources::{
    Lyric, LyricCapability, Provider, ProviderError, ProviderRegistry, ProviderResult,
    SearchItem, SongUrl,
};

pub fn cache_config() -> CacheConfig {
    CacheConfig {
        key_prefix: "test:".to_string(),
        reconnect_base_delay_ms: 100,
        max_reconnect_attempts: 3,
        local_max_entries: 128,
        ..CacheConfig::default()
    }
}

/// Distributed store stand-in that can be switched off.
pub struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
    connects: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(1024),
            down: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Direct access, bypassing the outage switch.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::ConnectionError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn connect(&self) -> CacheResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        self.inner.keys(pattern).await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check()?;
        self.inner.delete_pattern(pattern).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.check()?;
        self.inner.ttl(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.check()?;
        self.inner.expire(key, ttl).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }
}

/// Cache over a healthy `FlakyStore`.
pub async fn connected_cache() -> (Arc<FlakyStore>, Arc<ResilientCache>) {
    let store = FlakyStore::new();
    let cache = ResilientCache::new(store.clone(), &cache_config());
    assert!(cache.connect().await);
    (store, cache)
}

/// Scripted source that counts its calls.
pub struct MockProvider {
    name: String,
    failing: AtomicBool,
    delay: Option<Duration>,
    lyric: bool,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn ok(name: &str) -> Arc<Self> {
        Self::build(name, false, None)
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, true, None)
    }

    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Self::build(name, false, Some(delay))
    }

    fn build(name: &str, failing: bool, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failing: AtomicBool::new(failing),
            delay,
            lyric: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_lyrics(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            delay: None,
            lyric: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn attempt(&self) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_url(&self, id: &str, _quality: Option<&str>) -> ProviderResult<SongUrl> {
        self.attempt().await?;
        Ok(SongUrl {
            id: id.to_string(),
            url: format!("https://{}.example/{}.mp3", self.name, id),
            bitrate: Some(320_000),
            size: None,
            format: Some("mp3".to_string()),
        })
    }

    async fn search(&self, keyword: &str, limit: usize) -> ProviderResult<Vec<SearchItem>> {
        self.attempt().await?;
        Ok((0..limit.min(2))
            .map(|i| SearchItem {
                id: format!("{}-{}", self.name, i),
                name: format!("{} {}", keyword, i),
                artists: vec!["artist".to_string()],
                album: None,
                duration_ms: Some(180_000),
            })
            .collect())
    }

    fn lyrics(&self) -> Option<&dyn LyricCapability> {
        if self.lyric {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl LyricCapability for MockProvider {
    async fn fetch_lyric(&self, id: &str) -> ProviderResult<Lyric> {
        self.attempt().await?;
        Ok(Lyric {
            id: id.to_string(),
            lyric: "[00:01.00]la la la".to_string(),
            translated: None,
        })
    }
}

pub fn registry_of(order: &[&str], providers: &[Arc<MockProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(order.iter().map(|s| s.to_string()).collect());
    for provider in providers {
        registry.register(provider.clone());
    }
    registry
}

pub fn sources(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
