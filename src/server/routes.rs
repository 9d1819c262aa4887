// HTTP routes configuration

use super::handlers::{
    cache_stats_handler, health_handler, lyric_handler, match_handler, metrics_handler,
    picture_handler, reconnect_handler, reset_stats_handler, search_handler,
};
use super::middleware::{request_id_layers, track_metrics};
use crate::cache::{CacheRegistry, ResilientCache};
use crate::config::{AppConfig, RateLimitRule};
use crate::ratelimit::{rate_limit, RateLimiter, RatePolicy};
use crate::sources::SourceResolver;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<CacheRegistry>,
    pub cache: Arc<ResilientCache>,
    pub resolver: Arc<SourceResolver>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        registry: Arc<CacheRegistry>,
        cache: Arc<ResilientCache>,
        resolver: SourceResolver,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(cache.clone()));
        Self {
            config: Arc::new(config),
            registry,
            cache,
            resolver: Arc::new(resolver),
            limiter,
        }
    }

    fn policy(&self, preset: &'static str, rule: &RateLimitRule) -> RatePolicy {
        RatePolicy::new(self.limiter.clone(), preset, rule.clone())
            .enabled(self.config.rate_limit.enabled)
    }
}

pub fn create_router(state: AppState) -> Router {
    let limits = &state.config.rate_limit;
    let global = state.policy("global", &limits.global);
    let api = state.policy("api", &limits.api);
    let search = state.policy("search", &limits.search);
    let sensitive = state.policy("sensitive", &limits.sensitive);

    let lookups = Router::new()
        .route("/api/match", get(match_handler))
        .route("/api/lyric", get(lyric_handler))
        .route("/api/picture", get(picture_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route_layer(from_fn_with_state(api, rate_limit));

    let searches = Router::new()
        .route("/api/search", get(search_handler))
        .route_layer(from_fn_with_state(search, rate_limit));

    let operator = Router::new()
        .route("/api/cache/stats/reset", post(reset_stats_handler))
        .route("/api/cache/reconnect", post(reconnect_handler))
        .route_layer(from_fn_with_state(sensitive, rate_limit));

    let (set_request_id, propagate_request_id) = request_id_layers();

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(lookups)
        .merge(searches)
        .merge(operator)
        .layer(from_fn_with_state(global, rate_limit))
        .layer(from_fn(track_metrics))
        // Only operator POSTs carry bodies, and they are empty
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state)
}
