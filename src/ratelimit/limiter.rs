//! Fixed-window request counter persisted through the shared cache.
//!
//! The read -> increment -> write sequence is not atomic. Two concurrent
//! requests in the same window can both read the old count, so a window may
//! admit slightly more than `max_requests` under load. Rollback re-writes the
//! pre-increment count and is equally approximate.

use crate::cache::ResilientCache;
use crate::config::RateLimitRule;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window ends.
    pub reset_seconds: u64,
    /// Count stored before this request was added.
    pub previous_count: u64,
    /// Whether this request was written to the counter (false when rejected or bypassed).
    pub counted: bool,
    #[serde(skip)]
    pub key: String,
    #[serde(skip)]
    pub window_ttl: Duration,
}

pub struct RateLimiter {
    cache: Arc<ResilientCache>,
}

impl RateLimiter {
    pub fn new(cache: Arc<ResilientCache>) -> Self {
        Self { cache }
    }

    pub async fn check(&self, client_key: &str, rule: &RateLimitRule) -> RateLimitDecision {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.check_at(client_key, rule, now_ms).await
    }

    /// `check` against an explicit clock, in milliseconds since the epoch.
    pub async fn check_at(
        &self,
        client_key: &str,
        rule: &RateLimitRule,
        now_ms: u64,
    ) -> RateLimitDecision {
        let window_ms = rule.window_ms.max(1);
        let window_index = now_ms / window_ms;
        let window_end = (window_index + 1) * window_ms;
        let reset_seconds = (window_end - now_ms).div_ceil(1000);
        let window_ttl = Duration::from_secs(window_ms.div_ceil(1000));
        let key = counter_key(client_key, window_index);

        if !self.cache.is_healthy() {
            return fail_open(client_key, rule, reset_seconds, key, window_ttl);
        }

        let count = self.current_count(&key).await;

        // The read itself may have tripped the outage and come from the local mirror
        if !self.cache.is_healthy() {
            return fail_open(client_key, rule, reset_seconds, key, window_ttl);
        }

        if count >= rule.max_requests {
            debug!(client = client_key, count, "Rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit: rule.max_requests,
                remaining: 0,
                reset_seconds,
                previous_count: count,
                counted: false,
                key,
                window_ttl,
            };
        }

        let next = count + 1;
        self.cache
            .set(&key, next.to_string().as_bytes(), Some(window_ttl))
            .await;

        RateLimitDecision {
            allowed: true,
            limit: rule.max_requests,
            remaining: rule.max_requests - next,
            reset_seconds,
            previous_count: count,
            counted: true,
            key,
            window_ttl,
        }
    }

    /// Undo the increment recorded by `decision` by re-writing the previous count.
    pub async fn rollback(&self, decision: &RateLimitDecision) {
        if !decision.counted {
            return;
        }
        self.cache
            .set(
                &decision.key,
                decision.previous_count.to_string().as_bytes(),
                Some(decision.window_ttl),
            )
            .await;
        debug!(key = %decision.key, count = decision.previous_count, "Rate limit count rolled back");
    }

    async fn current_count(&self, key: &str) -> u64 {
        self.cache
            .get(key)
            .await
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

fn fail_open(
    client_key: &str,
    rule: &RateLimitRule,
    reset_seconds: u64,
    key: String,
    window_ttl: Duration,
) -> RateLimitDecision {
    warn!(
        client = client_key,
        "Rate limit store unavailable, allowing request without counting"
    );
    RateLimitDecision {
        allowed: true,
        limit: rule.max_requests,
        remaining: rule.max_requests,
        reset_seconds,
        previous_count: 0,
        counted: false,
        key,
        window_ttl,
    }
}

/// `rate_limit:{client}:{window}`
pub fn counter_key(client_key: &str, window_index: u64) -> String {
    format!("rate_limit:{}:{}", client_key, window_index)
}
