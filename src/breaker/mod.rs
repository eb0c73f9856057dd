//! Circuit breaker for fault isolation
//!
//! A three-state guard (Closed, Open, HalfOpen) that stops invoking a
//! failing operation after repeated failures and periodically probes for
//! recovery with exponential backoff. One breaker instance is shared per
//! dispatcher run, so sustained failures anywhere throttle the whole run
//! while Open: a deliberate fail-fast tradeoff.

mod circuit;
mod error;

pub use circuit::{BreakerConfig, BreakerMetrics, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::BreakerError;
