//! Dispatch engine - orchestrates graph, breaker, and checkpoints
//!
//! The dispatcher restores from a checkpoint when one exists, repeatedly
//! computes the ready set, launches a bounded-concurrency batch per round
//! wrapped in the run's circuit breaker, updates bookkeeping, persists a
//! checkpoint each round, and cleans the checkpoint up after a
//! zero-failure completion.

mod dispatcher;
mod error;
mod result;

pub use dispatcher::{
    Dispatcher, DispatcherConfig, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use error::{DispatchError, ExecuteError, WorkError};
pub use result::ExecuteResult;
