//! Circuit breaker state machine
//!
//! Wraps arbitrary fallible async operations with threshold tripping and
//! exponential-backoff recovery. The breaker is independent of the graph
//! and dispatcher; it knows nothing about workstreams.
//!
//! # Locking
//!
//! `execute` checks admission under the lock, runs the operation with the
//! lock released, then reacquires the lock to reconcile the outcome.
//! Holding the lock across the operation would serialize all guarded
//! execution, so the window where another caller is admitted right at a
//! state-transition boundary is accepted: staleness is bounded to the
//! in-flight operations of one round.

use super::error::BreakerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation; failures are counted against the threshold
    Closed,
    /// Tripped; operations are rejected until the backoff elapses
    Open,
    /// Probing; the next outcome decides between Closed and Open
    HalfOpen,
}

/// Circuit breaker configuration
///
/// `window` is declared for a future sliding-window trip policy but is not
/// consulted by the current logic, which compares the raw failure count to
/// `threshold`. It is kept so persisted configs stay forward compatible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures in Closed that trip the breaker
    pub threshold: u32,
    /// Reserved for a sliding-window policy; currently unused
    pub window: u32,
    /// Base backoff before an Open breaker probes again
    pub timeout: Duration,
    /// Cap on the exponential backoff
    pub max_backoff: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window: 5,
            timeout: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Read-only view of the breaker's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub consecutive_opens: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Persistable deep copy of the breaker's state
///
/// Timestamps are wall-clock so backoff accounting survives a process
/// restart when the snapshot is restored from a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub consecutive_opens: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
}

impl Default for BreakerSnapshot {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            consecutive_opens: 0,
            last_failure_at: None,
            last_state_change: Utc::now(),
        }
    }
}

/// Mutable breaker state, guarded by the breaker's lock
#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    consecutive_opens: u32,
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change: DateTime<Utc>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            consecutive_opens: 0,
            last_failure_at: None,
            last_state_change: Utc::now(),
        }
    }

    fn transition(&mut self, to: CircuitState) {
        debug!(from = ?self.state, to = ?to, "circuit breaker state change");
        self.state = to;
        self.last_state_change = Utc::now();
    }
}

/// Three-state fault-tolerance guard for fallible async operations
///
/// # Example
///
/// ```
/// use taxis::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker = CircuitBreaker::new(BreakerConfig::default());
///
/// let outcome = breaker
///     .execute(|| async { Ok::<_, String>(42) })
///     .await;
///
/// assert_eq!(outcome.unwrap(), 42);
/// assert_eq!(breaker.state().await, CircuitState::Closed);
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker in the Closed state
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Returns the breaker configuration
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Runs `op` under the breaker's admission and accounting rules
    ///
    /// While Open, returns [`BreakerError::Open`] without invoking `op`
    /// unless the backoff for the current open streak has elapsed, in which
    /// case the breaker transitions to HalfOpen and the probe proceeds.
    /// The operation itself runs with the breaker lock released.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let backoff = self.backoff_for(inner.consecutive_opens);
                let elapsed = Utc::now()
                    .signed_duration_since(inner.last_state_change)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if elapsed < backoff {
                    return Err(BreakerError::Open);
                }
                inner.transition(CircuitState::HalfOpen);
            }
        }

        let result = op().await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(value) => {
                inner.success_count += 1;
                match inner.state {
                    CircuitState::Closed => inner.failure_count = 0,
                    CircuitState::HalfOpen => {
                        inner.failure_count = 0;
                        inner.consecutive_opens = 0;
                        inner.transition(CircuitState::Closed);
                    }
                    CircuitState::Open => {}
                }
                Ok(value)
            }
            Err(e) => {
                inner.failure_count += 1;
                inner.last_failure_at = Some(Utc::now());
                match inner.state {
                    CircuitState::Closed if inner.failure_count >= self.config.threshold => {
                        inner.consecutive_opens += 1;
                        inner.transition(CircuitState::Open);
                    }
                    CircuitState::HalfOpen => {
                        inner.consecutive_opens += 1;
                        inner.transition(CircuitState::Open);
                    }
                    _ => {}
                }
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Backoff for the k-th consecutive open: `timeout * 2^(k-1)`, capped
    /// at `max_backoff`. The exponent is clamped so the multiply cannot
    /// overflow.
    fn backoff_for(&self, consecutive_opens: u32) -> Duration {
        if consecutive_opens <= 1 {
            return self.config.timeout;
        }
        let exponent = (consecutive_opens - 1).min(16);
        self.config
            .timeout
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff)
    }

    /// Returns the current state
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Returns a read-only snapshot of the counters
    pub async fn metrics(&self) -> BreakerMetrics {
        let inner = self.inner.lock().await;
        BreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            consecutive_opens: inner.consecutive_opens,
            last_failure_at: inner.last_failure_at,
        }
    }

    /// Returns a persistable deep copy of the state
    pub async fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().await;
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            consecutive_opens: inner.consecutive_opens,
            last_failure_at: inner.last_failure_at,
            last_state_change: inner.last_state_change,
        }
    }

    /// Overwrites state and counters from a snapshot
    ///
    /// Used on checkpoint resume; deliberately bypasses the transition
    /// table.
    pub async fn restore(&self, snapshot: BreakerSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.state = snapshot.state;
        inner.failure_count = snapshot.failure_count;
        inner.success_count = snapshot.success_count;
        inner.consecutive_opens = snapshot.consecutive_opens;
        inner.last_failure_at = snapshot.last_failure_at;
        inner.last_state_change = snapshot.last_state_change;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            threshold: 2,
            window: 5,
            timeout: Duration::from_millis(20),
            max_backoff: Duration::from_millis(200),
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(|| async { Err::<(), String>("boom".to_string()) })
            .await;
    }

    async fn succeed(breaker: &CircuitBreaker) {
        breaker
            .execute(|| async { Ok::<(), String>(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trips_after_threshold_failures() {
        let breaker = CircuitBreaker::new(fast_config());

        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(breaker.metrics().await.consecutive_opens, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new(fast_config());

        fail(&breaker).await;
        succeed(&breaker).await;
        assert_eq!(breaker.metrics().await.failure_count, 0);

        // one more failure must not trip a threshold-2 breaker
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = CircuitBreaker::new(fast_config());
        fail(&breaker).await;
        fail(&breaker).await;

        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invoked);
        let result = breaker
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_probe_after_backoff_then_close() {
        let breaker = CircuitBreaker::new(fast_config());
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        // backoff elapsed: the probe is admitted and its success closes
        succeed(&breaker).await;
        let metrics = breaker.metrics().await;
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.consecutive_opens, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(fast_config());
        fail(&breaker).await;
        fail(&breaker).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        fail(&breaker).await;

        let metrics = breaker.metrics().await;
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.consecutive_opens, 2);
    }

    #[tokio::test]
    async fn test_backoff_doubles_and_caps() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            threshold: 3,
            window: 5,
            timeout: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300),
        });

        assert_eq!(breaker.backoff_for(0), Duration::from_secs(60));
        assert_eq!(breaker.backoff_for(1), Duration::from_secs(60));
        assert_eq!(breaker.backoff_for(2), Duration::from_secs(120));
        assert_eq!(breaker.backoff_for(3), Duration::from_secs(240));
        // 60 * 2^3 = 480 > cap
        assert_eq!(breaker.backoff_for(4), Duration::from_secs(300));
        assert_eq!(breaker.backoff_for(30), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_snapshot_restore_roundtrip() {
        let breaker = CircuitBreaker::new(fast_config());
        fail(&breaker).await;
        fail(&breaker).await;

        let snapshot = breaker.snapshot().await;
        assert_eq!(snapshot.state, CircuitState::Open);

        let fresh = CircuitBreaker::new(fast_config());
        fresh.restore(snapshot.clone()).await;
        assert_eq!(fresh.snapshot().await, snapshot);
    }

    #[tokio::test]
    async fn test_operation_error_is_passed_through() {
        let breaker = CircuitBreaker::new(fast_config());
        let result = breaker
            .execute(|| async { Err::<(), String>("boom".to_string()) })
            .await;

        match result {
            Err(BreakerError::Operation(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected operation error, got {other:?}"),
        }
    }
}
