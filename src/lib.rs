//! Taxis: dependency-ordered workstream dispatch
//!
//! `taxis` (τάξις, Greek for "arrangement" or "order") schedules a set of
//! interdependent workstreams across a bounded pool of concurrent
//! executors. It guarantees dependency ordering, isolates repeated
//! failures behind a circuit breaker, and survives process crashes via
//! atomic, resumable checkpoints.
//!
//! # Features
//!
//! - **Dependency ordering**: a workstream never starts before all of its
//!   declared dependencies have completed
//! - **Wavefront concurrency**: each round runs up to a bounded number of
//!   ready workstreams in parallel, then joins before the next round
//! - **Failure isolation**: per-workstream failures are recorded, never
//!   escalated; dependents of a failed workstream still run
//! - **Circuit breaking**: sustained failures trip a shared breaker with
//!   exponential-backoff recovery probes
//! - **Durable checkpoints**: atomically written JSON snapshots allow a
//!   crashed or interrupted run to resume without re-running finished work
//!
//! # Quick Start
//!
//! ```no_run
//! use taxis::prelude::*;
//!
//! async fn run_workstream(id: String) -> Result<(), WorkError> {
//!     // run one workstream out-of-process, call a service, etc.
//!     println!("executing {id}");
//!     Ok(())
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Workstreams arrive from an external parser in dependency order.
//! let graph = build_graph(&[
//!     WorkstreamSpec::new("schema"),
//!     WorkstreamSpec::new("api").depends_on("schema"),
//!     WorkstreamSpec::new("ui").depends_on("schema"),
//!     WorkstreamSpec::new("e2e").depends_on("api").depends_on("ui"),
//! ])?;
//!
//! let config = DispatcherConfig {
//!     checkpoint_dir: Some(".taxis".into()),
//!     ..Default::default()
//! };
//! let dispatcher = Dispatcher::new(graph, "feature-42", config);
//!
//! let results = dispatcher.execute(run_workstream).await?;
//! for result in &results {
//!     println!("{}: success={}", result.workstream_id, result.success);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! Each module hides one design decision that is likely to change:
//!
//! - [`graph`]: dependency graph structure and ready-set queries (hides
//!   the graph representation)
//! - [`breaker`]: circuit breaker state machine (hides the trip and
//!   backoff policy)
//! - [`checkpoint`]: durable snapshots (hides the on-disk format and
//!   atomicity protocol)
//! - [`dispatch`]: the orchestration loop (hides the scheduling strategy)
//!
//! Out of scope by design: workstream file parsing, HTTP/CLI surfaces,
//! the execution strategy inside the caller-supplied function, and any
//! storage backend for work results.

pub mod breaker;
pub mod checkpoint;
pub mod dispatch;
pub mod graph;

// Re-export commonly used types for convenience
pub use breaker::{
    BreakerConfig, BreakerError, BreakerMetrics, BreakerSnapshot, CircuitBreaker, CircuitState,
};
pub use checkpoint::{
    create_checkpoint, restore_graph, Checkpoint, CheckpointError, CheckpointManager,
    CheckpointResult, GraphSnapshot, NodeSnapshot, CHECKPOINT_VERSION,
};
pub use dispatch::{
    DispatchError, Dispatcher, DispatcherConfig, ExecuteError, ExecuteResult, WorkError,
};
pub use graph::{build_graph, DependencyGraph, GraphError, GraphResult, WorkstreamSpec};

/// Prelude module for convenient glob imports
///
/// # Example
///
/// ```
/// use taxis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::breaker::{BreakerConfig, BreakerMetrics, CircuitBreaker, CircuitState};
    pub use crate::checkpoint::{Checkpoint, CheckpointManager};
    pub use crate::dispatch::{
        DispatchError, Dispatcher, DispatcherConfig, ExecuteError, ExecuteResult, WorkError,
    };
    pub use crate::graph::{build_graph, DependencyGraph, GraphError, WorkstreamSpec};
}
