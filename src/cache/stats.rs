//! Lock-free operation counters.
//!
//! Counters are plain atomics with relaxed ordering: a snapshot taken while
//! other tasks are mid-operation may be slightly inconsistent across fields.
//! The numbers are diagnostic only.

use super::models::CacheStats;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    total_operations: AtomicU64,
    last_reset_millis: AtomicI64,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_operations: AtomicU64::new(0),
            last_reset_millis: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn record_operation(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter and stamp the reset time.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.total_operations.store(0, Ordering::Relaxed);
        self.last_reset_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let last_reset_time: DateTime<Utc> = Utc
            .timestamp_millis_opt(self.last_reset_millis.load(Ordering::Relaxed))
            .single()
            .unwrap_or_else(Utc::now);

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            total_operations: self.total_operations.load(Ordering::Relaxed),
            last_reset_time,
        }
    }
}

/// `hits / (hits + misses) * 100`, or 0 when nothing has been observed.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let observed = hits + misses;
    if observed == 0 {
        return 0.0;
    }
    hits as f64 / observed as f64 * 100.0
}
