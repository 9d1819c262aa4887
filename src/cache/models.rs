//! Cache statistics and connection state models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of cumulative cache operation counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of successful lookups.
    pub hits: u64,
    /// Number of lookups that found nothing in either store.
    pub misses: u64,
    /// Number of writes.
    pub sets: u64,
    /// Number of deletions.
    pub deletes: u64,
    /// Number of distributed-store failures.
    pub errors: u64,
    /// Percentage of lookups that were hits, 0 when nothing was looked up.
    pub hit_rate: f64,
    /// Every public cache call.
    pub total_operations: u64,
    /// When the counters were last reset.
    pub last_reset_time: DateTime<Utc>,
}

/// Connection state of the distributed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Ready,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

/// State plus the consecutive failure count, as reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}
