// Router-level behaviour: envelopes, rate limit headers and health

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{connected_cache, registry_of, FlakyStore, MockProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use unm_gateway::cache::CacheRegistry;
use unm_gateway::config::{AppConfig, RateLimitRule};
use unm_gateway::server::{create_router, AppState};
use unm_gateway::sources::SourceResolver;

struct Harness {
    app: Router,
    store: Arc<FlakyStore>,
    good: Arc<MockProvider>,
}

async fn harness(api_limit: u64) -> Harness {
    let (store, cache) = connected_cache().await;
    let bad = MockProvider::failing("kuwo");
    let good = MockProvider::ok("migu");

    let mut config = AppConfig::default();
    config.rate_limit.api = RateLimitRule::per_minute(api_limit);
    config.rate_limit.global = RateLimitRule::per_minute(1000);

    let resolver = SourceResolver::new(
        cache.clone(),
        registry_of(&["kuwo", "migu"], &[bad, good.clone()]),
        Duration::from_secs(2),
    );
    let registry = Arc::new(CacheRegistry::with_cache(config.cache.clone(), cache.clone()));
    let app = create_router(AppState::new(config, registry, cache, resolver));

    Harness { app, store, good }
}

fn get(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_match_returns_envelope_with_provenance() {
    let h = harness(10).await;

    let response = h
        .app
        .clone()
        .oneshot(get("/api/match?id=42&server=kuwo,migu", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"]["source"], "migu");
    assert_eq!(body["data"]["cached"], false);
    assert_eq!(body["data"]["data"]["url"], "https://migu.example/42.mp3");

    let again = json(
        h.app
            .clone()
            .oneshot(get("/api/match?id=42&server=kuwo,migu", "10.0.0.1"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(again["data"]["cached"], true);
    assert_eq!(h.good.calls(), 1);
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let h = harness(10).await;
    let response = h.app.oneshot(get("/api/match", "10.0.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["code"], 400);
}

#[tokio::test]
async fn test_exhausted_sources_are_not_found() {
    let h = harness(10).await;
    let response = h
        .app
        .oneshot(get("/api/lyric?id=1&server=kuwo", "10.0.0.3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_preset_rejects_over_limit() {
    let h = harness(2).await;

    for remaining in ["1", "0"] {
        let response = h
            .app
            .clone()
            .oneshot(get("/api/match?id=1", "10.0.0.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let rejected = h
        .app
        .clone()
        .oneshot(get("/api/match?id=1", "10.0.0.4"))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(rejected.headers().contains_key("retry-after"));
    assert_eq!(rejected.headers()["x-ratelimit-remaining"], "0");
    let body = json(rejected).await;
    assert_eq!(body["code"], 429);
    assert_eq!(body["data"]["limit"], 2);

    // another client has its own window
    let other = h
        .app
        .oneshot(get("/api/match?id=1", "10.0.0.5"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_limits_fail_open_while_cache_is_down() {
    let h = harness(1).await;
    h.store.set_down(true);

    for _ in 0..4 {
        let response = h
            .app
            .clone()
            .oneshot(get("/api/match?id=1", "10.0.0.6"))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

#[tokio::test]
async fn test_health_reports_degraded_when_cache_down() {
    let h = harness(10).await;

    let healthy = json(h.app.clone().oneshot(get("/health", "10.0.0.7")).await.unwrap()).await;
    assert_eq!(healthy["status"], "healthy");
    assert_eq!(healthy["checks"]["cache"]["status"], "ok");

    h.store.set_down(true);
    // trip the outage through a cache read
    h.app
        .clone()
        .oneshot(get("/api/cache/stats", "10.0.0.7"))
        .await
        .unwrap();

    let degraded = json(h.app.oneshot(get("/health", "10.0.0.7")).await.unwrap()).await;
    assert_eq!(degraded["status"], "degraded");
    assert_eq!(degraded["checks"]["cache"]["status"], "warning");
    assert!(degraded["checks"]["cache"]["message"]
        .as_str()
        .unwrap()
        .contains("disconnected"));
}

#[tokio::test]
async fn test_health_is_degraded_before_registry_builds_cache() {
    let (_store, cache) = connected_cache().await;
    let config = AppConfig::default();
    let resolver = SourceResolver::new(
        cache.clone(),
        registry_of(&["migu"], &[MockProvider::ok("migu")]),
        Duration::from_secs(2),
    );
    let registry = Arc::new(CacheRegistry::new(config.cache.clone()));
    let app = create_router(AppState::new(config, registry.clone(), cache, resolver));

    let body = json(app.oneshot(get("/health", "10.0.0.9")).await.unwrap()).await;
    assert_eq!(body["status"], "degraded");
    assert!(!registry.is_initialized());
}

#[tokio::test]
async fn test_cache_admin_endpoints() {
    let h = harness(10).await;

    let stats = json(
        h.app
            .clone()
            .oneshot(get("/api/cache/stats", "10.0.0.8"))
            .await
            .unwrap(),
    )
    .await;
    assert!(stats["data"]["hitRate"].is_number());
    assert!(stats["data"]["lastResetTime"].is_string());

    let reset = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cache/stats/reset")
                .header("x-forwarded-for", "10.0.0.8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);

    let reconnect = json(
        h.app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/cache/reconnect")
                    .header("x-forwarded-for", "10.0.0.8")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(reconnect["data"]["maxReconnectAttempts"], 3);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let h = harness(10).await;
    h.app
        .clone()
        .oneshot(get("/api/match?id=3", "10.0.0.9"))
        .await
        .unwrap();

    let response = h.app.oneshot(get("/metrics", "10.0.0.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("provider_calls_total"));
}
