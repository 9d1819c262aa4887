// Metrics module for Prometheus observability

mod registry;

pub use registry::{
    gather_metrics, CACHE_BACKEND_STATE, CACHE_OPERATIONS, PROVIDER_CALLS, PROVIDER_DURATION,
    RATE_LIMIT_DECISIONS, REQUESTS_TOTAL, REQUEST_DURATION, SOURCES_EXHAUSTED,
};

use crate::cache::ConnectionState;

/// Helper to record request metrics
pub fn record_request(method: &str, endpoint: &str, status_code: u16, duration_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status_code.to_string()])
        .inc();

    REQUEST_DURATION
        .with_label_values(&[method, endpoint])
        .observe(duration_secs);
}

/// Helper to record one upstream provider attempt
pub fn record_provider_call(source: &str, operation: &str, outcome: &str, duration_secs: f64) {
    PROVIDER_CALLS
        .with_label_values(&[source, operation, outcome])
        .inc();

    PROVIDER_DURATION
        .with_label_values(&[source, operation])
        .observe(duration_secs);
}

pub fn record_sources_exhausted(operation: &str) {
    SOURCES_EXHAUSTED.with_label_values(&[operation]).inc();
}

/// Helper to record cache operations
pub fn record_cache_operation(operation: &str, outcome: &str) {
    CACHE_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn update_cache_backend_state(current: ConnectionState) {
    for state in [
        ConnectionState::Connecting,
        ConnectionState::Ready,
        ConnectionState::Disconnected,
    ] {
        let value = if state == current { 1.0 } else { 0.0 };
        CACHE_BACKEND_STATE
            .with_label_values(&[state.as_str()])
            .set(value);
    }
}

/// Helper to record rate limiter decisions
pub fn record_rate_limit(preset: &str, decision: &str) {
    RATE_LIMIT_DECISIONS
        .with_label_values(&[preset, decision])
        .inc();
}
