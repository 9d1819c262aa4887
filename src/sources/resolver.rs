//! Ordered source fallback with cache write-back.
//!
//! Per request: `Init -> TryingSource(i) -> Success | NextSource | AllExhausted`.
//! Sources are tried strictly in the order given, one at a time. The first
//! success is cached under `{class}:{item}:{sources}` with the class TTL;
//! failures are never cached.

use super::error::{ProviderError, ProviderResult};
use super::models::{ItemClass, Lyric, Picture, SearchItem, SongUrl, Sourced};
use super::provider::Provider;
use super::registry::ProviderRegistry;
use crate::cache::ResilientCache;
use crate::metrics;
use crate::utils::logging::truncate_for_log;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct SourceResolver {
    cache: Arc<ResilientCache>,
    providers: ProviderRegistry,
    timeout: Duration,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("providers", &self.providers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SourceResolver {
    pub fn new(cache: Arc<ResilientCache>, providers: ProviderRegistry, timeout: Duration) -> Self {
        Self {
            cache,
            providers,
            timeout,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub async fn resolve_url(
        &self,
        id: &str,
        quality: Option<&str>,
        sources: &[String],
    ) -> Option<Sourced<SongUrl>> {
        let item = match quality {
            Some(q) => format!("{}@{}", id, q),
            None => id.to_string(),
        };
        let id = id.to_string();
        let quality = quality.map(str::to_string);

        self.resolve(ItemClass::Url, &item, sources, move |provider| {
            let id = id.clone();
            let quality = quality.clone();
            Box::pin(async move { provider.resolve_url(&id, quality.as_deref()).await })
        })
        .await
    }

    pub async fn search(
        &self,
        keyword: &str,
        limit: usize,
        sources: &[String],
    ) -> Option<Sourced<Vec<SearchItem>>> {
        let item = format!("{}:{}", keyword, limit);
        let keyword = keyword.to_string();

        self.resolve(ItemClass::Search, &item, sources, move |provider| {
            let keyword = keyword.clone();
            Box::pin(async move { provider.search(&keyword, limit).await })
        })
        .await
    }

    pub async fn lyric(&self, id: &str, sources: &[String]) -> Option<Sourced<Lyric>> {
        let owned = id.to_string();

        self.resolve(ItemClass::Lyric, id, sources, move |provider| {
            let id = owned.clone();
            Box::pin(async move {
                match provider.lyrics() {
                    Some(capability) => capability.fetch_lyric(&id).await,
                    None => Err(ProviderError::Unsupported("lyric")),
                }
            })
        })
        .await
    }

    pub async fn picture(&self, id: &str, sources: &[String]) -> Option<Sourced<Picture>> {
        let owned = id.to_string();

        self.resolve(ItemClass::Picture, id, sources, move |provider| {
            let id = owned.clone();
            Box::pin(async move {
                match provider.pictures() {
                    Some(capability) => capability.fetch_picture(&id).await,
                    None => Err(ProviderError::Unsupported("picture")),
                }
            })
        })
        .await
    }

    /// Cache lookup, then each source in order until one succeeds.
    pub async fn resolve<T, F>(
        &self,
        class: ItemClass,
        item_id: &str,
        sources: &[String],
        call: F,
    ) -> Option<Sourced<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: for<'p> Fn(&'p dyn Provider) -> BoxFuture<'p, ProviderResult<T>>,
    {
        let key = cache_key(class, item_id, sources);
        let item = truncate_for_log(item_id, 128);

        if let Some(mut hit) = self.cache.get_json::<Sourced<T>>(&key).await {
            debug!(key = %key, source = %hit.source, "Resolved from cache");
            hit.cached = true;
            return Some(hit);
        }

        let order: Vec<String> = if sources.is_empty() {
            self.providers.default_order().to_vec()
        } else {
            sources.to_vec()
        };

        for name in &order {
            let Some(provider) = self.providers.get(name) else {
                warn!(source = %name, item = %item, "Unknown source requested, skipping");
                continue;
            };

            let started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, call(provider.as_ref()))
                .await
                .unwrap_or(Err(ProviderError::Timeout(self.timeout)));
            let elapsed = started.elapsed().as_secs_f64();

            match outcome {
                Ok(data) => {
                    metrics::record_provider_call(name, class.as_str(), "success", elapsed);
                    info!(source = %name, item = %item, operation = class.as_str(), "Resolved from source");

                    let result = Sourced::new(name.clone(), data);
                    if let Err(e) = self.cache.set_json(&key, &result, Some(class.ttl())).await {
                        warn!(key = %key, error = %e, "Failed to cache resolution");
                    }
                    return Some(result);
                }
                Err(e) => {
                    metrics::record_provider_call(name, class.as_str(), e.outcome(), elapsed);
                    warn!(
                        source = %name,
                        item = %item,
                        operation = class.as_str(),
                        error = %e,
                        "Source failed, trying next"
                    );
                }
            }
        }

        metrics::record_sources_exhausted(class.as_str());
        warn!(item = %item, operation = class.as_str(), sources = ?order, "All sources exhausted");
        None
    }
}

/// `{class}:{item}:{sources joined by ','}`, or `default` for the configured order.
pub fn cache_key(class: ItemClass, item_id: &str, sources: &[String]) -> String {
    let signature = if sources.is_empty() {
        "default".to_string()
    } else {
        sources.join(",")
    };
    format!("{}:{}:{}", class.as_str(), item_id, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_signature() {
        assert_eq!(cache_key(ItemClass::Url, "123", &[]), "url:123:default");
        assert_eq!(
            cache_key(
                ItemClass::Search,
                "hello:10",
                &["kuwo".to_string(), "migu".to_string()]
            ),
            "search:hello:10:kuwo,migu"
        );
    }
}
