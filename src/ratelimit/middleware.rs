// Rate limit middleware for axum routes

use super::client_key::client_key;
use super::limiter::{RateLimitDecision, RateLimiter};
use crate::config::RateLimitRule;
use crate::error::AppError;
use crate::metrics;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// One preset bound to the shared limiter.
#[derive(Clone)]
pub struct RatePolicy {
    pub limiter: Arc<RateLimiter>,
    pub preset: &'static str,
    pub rule: RateLimitRule,
    pub enabled: bool,
}

impl RatePolicy {
    pub fn new(limiter: Arc<RateLimiter>, preset: &'static str, rule: RateLimitRule) -> Self {
        Self {
            limiter,
            preset,
            rule,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Count the request, reject with 429 when over the limit, and emit
/// `X-RateLimit-*` headers. Presets nest; the innermost one sets the headers.
pub async fn rate_limit(
    State(policy): State<RatePolicy>,
    request: Request,
    next: Next,
) -> Response {
    if !policy.enabled {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_key(request.headers(), peer);
    let bucket = format!("{}:{}", policy.preset, client);

    let decision = policy.limiter.check(&bucket, &policy.rule).await;

    if !decision.allowed {
        warn!(
            preset = policy.preset,
            client = %client,
            retry_after = decision.reset_seconds,
            "Rate limit exceeded"
        );
        metrics::record_rate_limit(policy.preset, "rejected");
        let mut response = AppError::RateLimitExceeded {
            limit: decision.limit,
            retry_after: decision.reset_seconds,
        }
        .into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    metrics::record_rate_limit(
        policy.preset,
        if decision.counted { "allowed" } else { "bypass" },
    );

    let mut response = next.run(request).await;

    let failed = response.status().as_u16() >= 400;
    if (failed && policy.rule.skip_failed_requests)
        || (!failed && policy.rule.skip_successful_requests)
    {
        policy.limiter.rollback(&decision).await;
    }

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    if headers.contains_key("x-ratelimit-limit") {
        return;
    }
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_seconds));
}
