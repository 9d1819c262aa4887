// Prometheus metrics registry and collectors

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, GaugeVec, HistogramVec, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // REQUEST METRICS
    // ============================================================================

    /// Total number of API requests
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("unm_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status_code"],
        REGISTRY
    ).unwrap();

    /// Request duration histogram
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("unm_request_duration_seconds", "Request duration in seconds")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // PROVIDER METRICS
    // ============================================================================

    /// Upstream provider calls by outcome
    pub static ref PROVIDER_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("unm_provider_calls_total", "Total upstream provider calls"),
        &["source", "operation", "outcome"], // outcome: success, failure, timeout, unsupported
        REGISTRY
    ).unwrap();

    /// Upstream provider call duration
    pub static ref PROVIDER_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("unm_provider_duration_seconds", "Upstream provider call duration")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source", "operation"],
        REGISTRY
    ).unwrap();

    /// Resolutions that found nothing in any source
    pub static ref SOURCES_EXHAUSTED: CounterVec = register_counter_vec_with_registry!(
        Opts::new("unm_sources_exhausted_total", "Resolutions where every source failed"),
        &["operation"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("unm_cache_operations_total", "Total cache operations"),
        &["operation", "outcome"], // outcome: hit, miss, ok, error
        REGISTRY
    ).unwrap();

    /// Distributed store connection state (1 for the current state, 0 otherwise)
    pub static ref CACHE_BACKEND_STATE: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("unm_cache_backend_state", "Distributed cache connection state"),
        &["state"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // RATE LIMIT METRICS
    // ============================================================================

    /// Rate limiter decisions
    pub static ref RATE_LIMIT_DECISIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("unm_rate_limit_decisions_total", "Rate limiter decisions"),
        &["preset", "decision"], // decision: allowed, rejected, bypass
        REGISTRY
    ).unwrap();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_recorded_series() {
        SOURCES_EXHAUSTED.with_label_values(&["lyric"]).inc();
        let metrics = gather_metrics();
        assert!(metrics.contains("unm_sources_exhausted_total"));
    }
}
