//! Distributed cache with a local hot standby.
//!
//! Every operation goes to the distributed store while it is `Ready`. A store
//! error flips the connection to `Disconnected`, schedules a reconnect with
//! exponential backoff and serves the call from the local `MemoryStore`.
//! Writes are always mirrored locally so the standby stays warm.
//! Deletes and clears that cannot reach the distributed store are queued and
//! replayed against it before it is marked `Ready` again.
//!
//! None of the public operations return errors: a miss is `None`, a failed
//! write is logged and counted.

use super::error::{CacheError, CacheResult};
use super::memory::MemoryStore;
use super::models::{CacheStats, ConnectionState, ConnectionStatus};
use super::reconnect::{ConnectionSupervisor, ReconnectPolicy};
use super::stats::StatsCollector;
use super::store::CacheStore;
use crate::config::CacheConfig;
use crate::metrics;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cache front used by the rate limiter and the source resolver.
pub struct ResilientCache {
    me: Weak<ResilientCache>,
    remote: Option<Arc<dyn CacheStore>>,
    local: Arc<MemoryStore>,
    key_prefix: String,
    default_ttl: Option<Duration>,
    stats: StatsCollector,
    supervisor: ConnectionSupervisor,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Keys deleted while the distributed store was unreachable.
    pending_deletes: Mutex<HashSet<String>>,
    /// A clear issued while the distributed store was unreachable.
    pending_clear: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for ResilientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCache")
            .field(
                "remote",
                &self.remote.as_ref().map(|r| r.provider_name()),
            )
            .field("key_prefix", &self.key_prefix)
            .field("status", &self.supervisor.status())
            .finish()
    }
}

impl ResilientCache {
    /// Wrap a distributed store. Call `connect()` to bring it up.
    ///
    /// Must be called inside a Tokio runtime (spawns the local sweep task).
    pub fn new(remote: Arc<dyn CacheStore>, config: &CacheConfig) -> Arc<Self> {
        Self::build(Some(remote), config, ConnectionState::Connecting)
    }

    /// Local-only cache: never healthy, never reconnects.
    pub fn local_only(config: &CacheConfig) -> Arc<Self> {
        Self::build(None, config, ConnectionState::Disconnected)
    }

    fn build(
        remote: Option<Arc<dyn CacheStore>>,
        config: &CacheConfig,
        initial: ConnectionState,
    ) -> Arc<Self> {
        let policy = ReconnectPolicy::new(
            Duration::from_millis(config.reconnect_base_delay_ms),
            config.max_reconnect_attempts,
        );
        let local = Arc::new(MemoryStore::new(config.local_max_entries));
        let sweeper =
            local.spawn_sweeper(Duration::from_secs(config.local_sweep_interval_secs.max(1)));
        let default_ttl =
            (config.default_ttl_seconds > 0).then(|| Duration::from_secs(config.default_ttl_seconds));

        metrics::update_cache_backend_state(initial);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            remote,
            local,
            key_prefix: config.key_prefix.clone(),
            default_ttl,
            stats: StatsCollector::new(),
            supervisor: ConnectionSupervisor::new(policy, initial),
            tasks: Mutex::new(vec![sweeper]),
            pending_deletes: Mutex::new(HashSet::new()),
            pending_clear: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Initial connection. On failure the cache keeps working locally and
    /// reconnects in the background.
    pub async fn connect(&self) -> bool {
        let Some(remote) = self.remote.clone() else {
            return false;
        };
        if self.is_closed() {
            return false;
        }

        self.supervisor.begin_connect();
        match self.establish(&remote).await {
            Ok(()) => {
                info!(store = remote.provider_name(), "Distributed cache ready");
                true
            }
            Err(e) => {
                warn!(
                    store = remote.provider_name(),
                    error = %e,
                    "Distributed cache unavailable, serving from local store"
                );
                self.handle_failure();
                false
            }
        }
    }

    /// True only while the distributed store is `Ready`.
    pub fn is_healthy(&self) -> bool {
        !self.is_closed() && self.supervisor.is_ready()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.supervisor.status()
    }

    /// Watch connection state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe()
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Cache statistics reset");
    }

    /// Operator-triggered: clear the attempt counter and reconnect now.
    pub fn reset_connection(&self) {
        if self.remote.is_none() || self.is_closed() {
            return;
        }
        info!("Distributed cache reconnect requested");
        self.supervisor.reset();
        self.schedule_reconnect(Duration::ZERO);
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.begin_operation() {
            return None;
        }

        if let Some(remote) = self.ready_remote() {
            match remote.get(&self.prefixed(key)).await {
                Ok(Some(value)) => {
                    self.record_hit();
                    return Some(value);
                }
                Ok(None) => {
                    self.record_miss();
                    return None;
                }
                Err(e) => self.on_remote_error("get", key, e),
            }
        }

        match self.local.get(key).await {
            Ok(Some(value)) => {
                self.record_hit();
                Some(value)
            }
            _ => {
                self.record_miss();
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        if !self.begin_operation() {
            return;
        }
        let ttl = ttl.or(self.default_ttl);

        if let Some(remote) = self.ready_remote() {
            if let Err(e) = remote.set(&self.prefixed(key), value, ttl).await {
                self.on_remote_error("set", key, e);
            }
        }

        if let Err(e) = self.local.set(key, value, ttl).await {
            debug!(key, error = %e, "Local cache write failed");
        }

        self.stats.record_set();
        metrics::record_cache_operation("set", "ok");
    }

    pub async fn delete(&self, key: &str) {
        if !self.begin_operation() {
            return;
        }

        if self.remote.is_some() {
            self.delete_remote(key).await;
        }
        if let Err(e) = self.local.delete(key).await {
            debug!(key, error = %e, "Local cache delete failed");
        }

        self.stats.record_delete();
        metrics::record_cache_operation("delete", "ok");
    }

    pub async fn exists(&self, key: &str) -> bool {
        if !self.begin_operation() {
            return false;
        }

        if let Some(remote) = self.ready_remote() {
            match remote.exists(&self.prefixed(key)).await {
                Ok(found) => return found,
                Err(e) => self.on_remote_error("exists", key, e),
            }
        }
        self.local.exists(key).await.unwrap_or(false)
    }

    /// Remove every key under this cache's prefix, in both stores.
    pub async fn clear(&self) {
        if !self.begin_operation() {
            return;
        }

        if self.remote.is_some() {
            self.clear_remote().await;
        }
        self.local.clear();
        info!("Cache cleared");
    }

    /// Keys matching `pattern`, without the distributed prefix.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        if !self.begin_operation() {
            return Vec::new();
        }

        if let Some(remote) = self.ready_remote() {
            match remote.keys(&self.prefixed(pattern)).await {
                Ok(keys) => {
                    return keys
                        .into_iter()
                        .map(|k| match k.strip_prefix(&self.key_prefix) {
                            Some(stripped) => stripped.to_string(),
                            None => k,
                        })
                        .collect()
                }
                Err(e) => self.on_remote_error("keys", pattern, e),
            }
        }
        self.local.keys(pattern).await.unwrap_or_default()
    }

    /// Seconds left before `key` expires, `-1` when absent or without expiry.
    pub async fn ttl(&self, key: &str) -> i64 {
        if !self.begin_operation() {
            return -1;
        }

        if let Some(remote) = self.ready_remote() {
            match remote.ttl(&self.prefixed(key)).await {
                Ok(ttl) => return ttl,
                Err(e) => self.on_remote_error("ttl", key, e),
            }
        }
        self.local.ttl(key).await.unwrap_or(-1)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) {
        if !self.begin_operation() {
            return;
        }

        if let Some(remote) = self.ready_remote() {
            if let Err(e) = remote.expire(&self.prefixed(key), ttl).await {
                self.on_remote_error("expire", key, e);
            }
        }
        if let Err(e) = self.local.expire(key, ttl).await {
            debug!(key, error = %e, "Local cache expire failed");
        }
    }

    /// Deserialize a JSON value. Undecodable entries count as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let raw = serde_json::to_vec(value)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        self.set(key, &raw, ttl).await;
        Ok(())
    }

    /// Stop background tasks and close both stores. Later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Some(remote) = &self.remote {
            remote.close().await;
        }
        self.local.close().await;
        self.supervisor.mark_disconnected();
        info!("Cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn begin_operation(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.stats.record_operation();
        true
    }

    fn ready_remote(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.supervisor.is_ready() {
            self.remote.as_ref()
        } else {
            None
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn record_hit(&self) {
        self.stats.record_hit();
        metrics::record_cache_operation("get", "hit");
    }

    fn record_miss(&self) {
        self.stats.record_miss();
        metrics::record_cache_operation("get", "miss");
    }

    /// Delete from the distributed store, or queue the key for replay when
    /// the store is unreachable. The queue is only written while the store is
    /// not ready, checked under the queue lock the replay also takes.
    async fn delete_remote(&self, key: &str) {
        loop {
            if let Some(remote) = self.ready_remote() {
                match remote.delete(&self.prefixed(key)).await {
                    Ok(_) => return,
                    Err(e) => self.on_remote_error("delete", key, e),
                }
            }

            let mut pending = self.pending_deletes.lock();
            if !self.supervisor.is_ready() {
                pending.insert(key.to_string());
                debug!(key, queued = pending.len(), "Delete queued until the distributed store returns");
                return;
            }
        }
    }

    /// Same as `delete_remote` for the whole prefix.
    async fn clear_remote(&self) {
        let pattern = self.prefixed("*");
        loop {
            if let Some(remote) = self.ready_remote() {
                match remote.delete_pattern(&pattern).await {
                    Ok(count) => {
                        debug!(count, "Cleared distributed cache");
                        return;
                    }
                    Err(e) => self.on_remote_error("clear", &pattern, e),
                }
            }

            let _pending = self.pending_deletes.lock();
            if !self.supervisor.is_ready() {
                self.pending_clear.store(true, Ordering::Release);
                debug!("Clear queued until the distributed store returns");
                return;
            }
        }
    }

    /// Connect, replay queued invalidations, then mark the store ready.
    async fn establish(&self, remote: &Arc<dyn CacheStore>) -> CacheResult<()> {
        remote.connect().await?;

        loop {
            if self.pending_clear.swap(false, Ordering::AcqRel) {
                let pattern = self.prefixed("*");
                if let Err(e) = remote.delete_pattern(&pattern).await {
                    self.pending_clear.store(true, Ordering::Release);
                    return Err(e);
                }
                info!("Replayed cache clear against distributed store");
            }

            let batch: Vec<String> = self.pending_deletes.lock().drain().collect();
            if batch.is_empty() {
                let settled = {
                    let pending = self.pending_deletes.lock();
                    if pending.is_empty() && !self.pending_clear.load(Ordering::Acquire) {
                        self.supervisor.mark_ready();
                        true
                    } else {
                        false
                    }
                };
                if settled {
                    return Ok(());
                }
                continue;
            }

            for (done, key) in batch.iter().enumerate() {
                if let Err(e) = remote.delete(&self.prefixed(key)).await {
                    self.pending_deletes
                        .lock()
                        .extend(batch[done..].iter().cloned());
                    return Err(e);
                }
            }
            info!(count = batch.len(), "Replayed queued deletes against distributed store");
        }
    }

    fn on_remote_error(&self, operation: &str, key: &str, error: CacheError) {
        warn!(
            operation,
            key,
            error = %error,
            "Distributed cache operation failed, falling back to local store"
        );
        metrics::record_cache_operation(operation, "error");
        self.handle_failure();
    }

    fn handle_failure(&self) {
        self.stats.record_error();
        if let Some(delay) = self.supervisor.record_failure() {
            let status = self.supervisor.status();
            info!(
                attempt = status.reconnect_attempts,
                max_attempts = status.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling distributed cache reconnect"
            );
            self.schedule_reconnect(delay);
        }
    }

    fn schedule_reconnect(&self, delay: Duration) {
        if self.is_closed() {
            return;
        }
        let me = self.me.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(cache) = me.upgrade() {
                cache.reconnect().await;
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    async fn reconnect(&self) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        if self.is_closed() {
            return;
        }

        self.supervisor.begin_connect();
        match self.establish(&remote).await {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "Distributed cache reconnect failed");
                self.handle_failure();
            }
        }
    }
}
