//! Holder of the one active cache for the process.
//!
//! Constructed explicitly in `main` and shared by `Arc`; the cache inside is
//! created lazily on first use and closed once by `shutdown()`.

use super::redis::{redact_url, RedisStore};
use super::resilient::ResilientCache;
use crate::config::CacheConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

pub struct CacheRegistry {
    config: CacheConfig,
    cache: OnceCell<Arc<ResilientCache>>,
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("initialized", &self.cache.initialized())
            .field("cache", &self.cache.get())
            .finish()
    }
}

impl CacheRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            cache: OnceCell::new(),
        }
    }

    /// Registry around an already-built cache.
    pub fn with_cache(config: CacheConfig, cache: Arc<ResilientCache>) -> Self {
        Self {
            config,
            cache: OnceCell::new_with(Some(cache)),
        }
    }

    /// The active cache, created and connected on first call.
    pub async fn cache(&self) -> Arc<ResilientCache> {
        self.cache
            .get_or_init(|| async { self.build().await })
            .await
            .clone()
    }

    /// Whether the cache exists and its distributed store is ready.
    pub fn is_ready(&self) -> bool {
        self.cache.get().is_some_and(|cache| cache.is_healthy())
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.initialized()
    }

    /// Close the cache if it was ever created.
    pub async fn shutdown(&self) {
        if let Some(cache) = self.cache.get() {
            cache.close().await;
            info!("Cache registry shut down");
        }
    }

    async fn build(&self) -> Arc<ResilientCache> {
        if !self.config.redis_enabled {
            info!("Distributed cache disabled, using local store only");
            return ResilientCache::local_only(&self.config);
        }

        let url = self.config.connection_url();
        info!(url = %redact_url(&url), prefix = %self.config.key_prefix, "Initializing cache");

        let remote = Arc::new(RedisStore::new(
            url,
            Duration::from_millis(self.config.connect_timeout_ms),
        ));
        let cache = ResilientCache::new(remote, &self.config);
        cache.connect().await;
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_init_and_shutdown() {
        let registry = CacheRegistry::new(CacheConfig {
            redis_enabled: false,
            ..CacheConfig::default()
        });
        assert!(!registry.is_initialized());

        let first = registry.cache().await;
        let second = registry.cache().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!registry.is_ready());

        registry.shutdown().await;
        assert!(first.is_closed());
    }
}
