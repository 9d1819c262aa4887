//! Connection state machine for the distributed store.
//!
//! `Connecting -> Ready | Disconnected`. Each failure while no reconnect is
//! already pending counts one attempt and yields the delay before the next
//! try: `base * 2^(attempts - 1)`. Once `max_attempts` is exceeded no delay is
//! returned and the owner stays local-only until `reset()`.

use super::models::{ConnectionState, ConnectionStatus};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Exponential reconnect schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Deterministic doubling: no jitter, no elapsed-time cutoff.
    fn backoff(&self) -> ExponentialBackoff {
        let ceiling = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(self.max_attempts.min(31)));
        let mut backoff = ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: ceiling.max(self.base_delay),
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

struct SupervisorState {
    state: ConnectionState,
    attempts: u32,
    reconnect_pending: bool,
    backoff: ExponentialBackoff,
}

/// Owns the connection state and the reconnect schedule.
pub struct ConnectionSupervisor {
    policy: ReconnectPolicy,
    inner: Mutex<SupervisorState>,
    state_tx: watch::Sender<ConnectionState>,
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("policy", &self.policy)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionSupervisor {
    pub fn new(policy: ReconnectPolicy, initial: ConnectionState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            policy,
            inner: Mutex::new(SupervisorState {
                state: initial,
                attempts: 0,
                reconnect_pending: false,
                backoff: policy.backoff(),
            }),
            state_tx,
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock();
        ConnectionStatus {
            state: inner.state,
            reconnect_attempts: inner.attempts,
            max_reconnect_attempts: self.policy.max_attempts,
        }
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// A connect attempt is starting; clears any pending schedule.
    pub fn begin_connect(&self) {
        let mut inner = self.inner.lock();
        inner.reconnect_pending = false;
        self.transition(&mut inner, ConnectionState::Connecting);
    }

    /// Connection established; attempts go back to zero.
    pub fn mark_ready(&self) {
        let mut inner = self.inner.lock();
        if inner.attempts > 0 {
            info!(attempts = inner.attempts, "Distributed cache reconnected");
        }
        inner.attempts = 0;
        inner.reconnect_pending = false;
        inner.backoff.reset();
        self.transition(&mut inner, ConnectionState::Ready);
    }

    /// Mark disconnected without counting an attempt (used on close).
    pub fn mark_disconnected(&self) {
        let mut inner = self.inner.lock();
        inner.reconnect_pending = false;
        self.transition(&mut inner, ConnectionState::Disconnected);
    }

    /// Record a store failure. Returns the delay before the next reconnect, or
    /// `None` if one is already pending or the ceiling has been exceeded.
    pub fn record_failure(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, ConnectionState::Disconnected);

        if inner.reconnect_pending {
            return None;
        }

        inner.attempts = inner.attempts.saturating_add(1);
        if inner.attempts > self.policy.max_attempts {
            if inner.attempts == self.policy.max_attempts.saturating_add(1) {
                warn!(
                    max_attempts = self.policy.max_attempts,
                    "Distributed cache reconnect attempts exhausted, staying in local-only mode"
                );
            }
            return None;
        }

        let delay = inner.backoff.next_backoff().unwrap_or(inner.backoff.max_interval);
        inner.reconnect_pending = true;
        Some(delay)
    }

    /// Operator reset: forget previous failures so a fresh cycle can start.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.attempts = 0;
        inner.reconnect_pending = false;
        inner.backoff.reset();
    }

    fn transition(&self, inner: &mut SupervisorState, next: ConnectionState) {
        if inner.state != next {
            inner.state = next;
            crate::metrics::update_cache_backend_state(next);
            self.state_tx.send_replace(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor(base_ms: u64, max: u32) -> ConnectionSupervisor {
        ConnectionSupervisor::new(
            ReconnectPolicy::new(Duration::from_millis(base_ms), max),
            ConnectionState::Connecting,
        )
    }

    #[test]
    fn test_delay_doubles_per_consecutive_failure() {
        let sup = supervisor(100, 5);
        for n in 1..=5u32 {
            sup.begin_connect();
            let delay = sup.record_failure().expect("below ceiling");
            assert_eq!(delay.as_millis() as u64, 100 * 2u64.pow(n - 1));
            assert_eq!(sup.status().reconnect_attempts, n);
        }
    }

    #[test]
    fn test_no_reconnect_after_ceiling() {
        let sup = supervisor(10, 2);
        sup.begin_connect();
        assert!(sup.record_failure().is_some());
        sup.begin_connect();
        assert!(sup.record_failure().is_some());
        sup.begin_connect();
        assert!(sup.record_failure().is_none());
        sup.begin_connect();
        assert!(sup.record_failure().is_none());
        assert_eq!(sup.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_pending_reconnect_absorbs_concurrent_failures() {
        let sup = supervisor(10, 5);
        assert!(sup.record_failure().is_some());
        assert!(sup.record_failure().is_none());
        assert_eq!(sup.status().reconnect_attempts, 1);
    }

    #[test]
    fn test_ready_resets_attempts_and_delay() {
        let sup = supervisor(50, 5);
        sup.record_failure();
        sup.begin_connect();
        sup.record_failure();
        sup.mark_ready();
        assert_eq!(sup.status().reconnect_attempts, 0);
        assert!(sup.is_ready());

        let delay = sup.record_failure().unwrap();
        assert_eq!(delay.as_millis(), 50);
    }

    #[test]
    fn test_reset_after_exhaustion_allows_new_cycle() {
        let sup = supervisor(10, 1);
        assert!(sup.record_failure().is_some());
        sup.begin_connect();
        assert!(sup.record_failure().is_none());

        sup.reset();
        sup.begin_connect();
        assert_eq!(sup.record_failure().unwrap().as_millis(), 10);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let sup = supervisor(10, 1);
        let mut rx = sup.subscribe();
        sup.mark_ready();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Ready);
    }
}
