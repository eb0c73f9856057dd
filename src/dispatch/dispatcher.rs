//! Dispatcher - wavefront execution of the dependency graph
//!
//! Each round takes up to `concurrency` ready workstreams, runs them as
//! spawned tasks wrapped in the shared circuit breaker, joins the whole
//! batch, updates the graph and bookkeeping, and persists a checkpoint.
//! There is no persistent worker pool draining a continuous queue; the
//! join barrier between rounds is the synchronization point.
//!
//! The graph and the completed/failed maps sit behind one dispatcher lock.
//! Ordering across rounds is guaranteed only by dependency edges: a
//! workstream never starts before its declared dependencies have been
//! marked complete, whether those ultimately succeeded or failed.

use super::error::{DispatchError, ExecuteError, WorkError};
use super::result::ExecuteResult;
use crate::breaker::{BreakerConfig, BreakerMetrics, CircuitBreaker};
use crate::checkpoint::{self, CheckpointManager};
use crate::graph::DependencyGraph;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lowest allowed per-round concurrency
pub const MIN_CONCURRENCY: usize = 1;
/// Highest allowed per-round concurrency
pub const MAX_CONCURRENCY: usize = 5;
/// Concurrency used when none is configured
pub const DEFAULT_CONCURRENCY: usize = 3;

// Type aliases for the caller-supplied workstream function
type WorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send>>;
type ExecuteFn = Arc<dyn Fn(String) -> WorkFuture + Send + Sync>;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Workstreams launched per round, clamped to
    /// [`MIN_CONCURRENCY`]..=[`MAX_CONCURRENCY`]
    pub concurrency: usize,
    /// Configuration for the run's shared circuit breaker
    pub breaker: BreakerConfig,
    /// Directory for checkpoint files; `None` disables checkpointing
    pub checkpoint_dir: Option<PathBuf>,
    /// Consecutive empty rounds tolerated before the run aborts as stalled
    pub max_empty_rounds: u32,
    /// Bounded wait between empty rounds
    pub empty_round_wait: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            breaker: BreakerConfig::default(),
            checkpoint_dir: None,
            max_empty_rounds: 3,
            empty_round_wait: Duration::from_millis(50),
        }
    }
}

/// Shared mutable run state, guarded by the dispatcher's lock
#[derive(Debug)]
struct RunState {
    graph: DependencyGraph,
    completed: HashSet<String>,
    failed: HashMap<String, ExecuteError>,
}

/// Orchestrates a full run over one dependency graph
///
/// Owns the graph, a circuit breaker shared across all workstreams of the
/// run, and optionally a checkpoint manager scoped to the feature id.
/// Explicitly owned and passed; there are no singletons.
///
/// # Example
///
/// ```no_run
/// use taxis::dispatch::{Dispatcher, DispatcherConfig, WorkError};
/// use taxis::graph::{build_graph, WorkstreamSpec};
///
/// async fn run_workstream(id: String) -> Result<(), WorkError> {
///     println!("running {id}");
///     Ok(())
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = build_graph(&[
///     WorkstreamSpec::new("ws-a"),
///     WorkstreamSpec::new("ws-b").depends_on("ws-a"),
/// ])?;
///
/// let dispatcher = Dispatcher::new(graph, "feature-42", DispatcherConfig::default());
/// let results = dispatcher.execute(run_workstream).await?;
/// assert_eq!(results.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    feature_id: String,
    run_id: Uuid,
    concurrency: usize,
    max_empty_rounds: u32,
    empty_round_wait: Duration,
    breaker: Arc<CircuitBreaker>,
    checkpoints: Option<CheckpointManager>,
    state: Arc<Mutex<RunState>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given graph, scoped to a feature id
    pub fn new(
        graph: DependencyGraph,
        feature_id: impl Into<String>,
        config: DispatcherConfig,
    ) -> Self {
        let feature_id = feature_id.into();
        let checkpoints = config
            .checkpoint_dir
            .as_ref()
            .map(|dir| CheckpointManager::new(dir, feature_id.clone()));
        Self {
            feature_id,
            run_id: Uuid::new_v4(),
            concurrency: config.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            max_empty_rounds: config.max_empty_rounds,
            empty_round_wait: config.empty_round_wait,
            breaker: Arc::new(CircuitBreaker::new(config.breaker)),
            checkpoints,
            state: Arc::new(Mutex::new(RunState {
                graph,
                completed: HashSet::new(),
                failed: HashMap::new(),
            })),
        }
    }

    /// Returns the feature id this run is scoped to
    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    /// Returns the unique id of this run, used for log correlation
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs the whole graph with the caller-supplied workstream function
    ///
    /// The function is opaque and single-attempt per invocation; retries
    /// beyond the circuit breaker are the caller's responsibility. It runs
    /// to completion: no cancellation or timeout is propagated.
    ///
    /// Per-workstream failures never abort the run; they are recorded and
    /// the failed workstream's dependents still become eligible. The
    /// returned records are in batch-completion order, not topological
    /// order.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Stalled`] if no workstream becomes ready for
    /// `max_empty_rounds` consecutive rounds while work remains, and
    /// [`DispatchError::TaskJoin`] if a spawned task panics.
    pub async fn execute<F, Fut>(&self, run: F) -> Result<Vec<ExecuteResult>, DispatchError>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        let run: ExecuteFn = Arc::new(move |id| -> WorkFuture { Box::pin(run(id)) });
        self.execute_boxed(run).await
    }

    async fn execute_boxed(&self, run: ExecuteFn) -> Result<Vec<ExecuteResult>, DispatchError> {
        self.try_resume().await;

        let total = self.state.lock().await.graph.len();
        let mut results = Vec::with_capacity(total);
        let mut round: u64 = 0;
        let mut empty_rounds: u32 = 0;

        loop {
            let batch: Vec<String> = {
                let st = self.state.lock().await;
                if st.completed.len() + st.failed.len() >= total {
                    break;
                }
                st.graph
                    .ready()
                    .into_iter()
                    .filter(|id| !st.completed.contains(id) && !st.failed.contains_key(id))
                    .take(self.concurrency)
                    .collect()
            };

            if batch.is_empty() {
                // Rounds are joined before the next ready computation, so
                // an empty batch with work remaining means the dependency
                // state cannot make progress on its own. Wait briefly in
                // case of restored-snapshot skew, then abort as stalled.
                empty_rounds += 1;
                if empty_rounds >= self.max_empty_rounds {
                    let st = self.state.lock().await;
                    let remaining = total - st.completed.len() - st.failed.len();
                    return Err(DispatchError::Stalled {
                        rounds: empty_rounds,
                        remaining,
                    });
                }
                tokio::time::sleep(self.empty_round_wait).await;
                continue;
            }
            empty_rounds = 0;
            round += 1;
            debug!(
                run_id = %self.run_id,
                round,
                batch_size = batch.len(),
                "dispatching round"
            );

            let mut tasks = JoinSet::new();
            for id in batch {
                let run = Arc::clone(&run);
                let breaker = Arc::clone(&self.breaker);
                let state = Arc::clone(&self.state);
                tasks.spawn(async move {
                    let started = Instant::now();
                    let outcome = breaker
                        .execute({
                            let id = id.clone();
                            move || (*run)(id)
                        })
                        .await;
                    let record = match outcome {
                        Ok(()) => ExecuteResult::success(id.clone(), started.elapsed()),
                        Err(e) => {
                            ExecuteResult::failure(id.clone(), ExecuteError::from(e), started.elapsed())
                        }
                    };

                    let mut st = state.lock().await;
                    match &record.error {
                        None => {
                            st.completed.insert(id.clone());
                        }
                        Some(e) => {
                            warn!(workstream = %id, error = %e, "workstream did not succeed");
                            st.failed.insert(id.clone(), e.clone());
                        }
                    }
                    // A failed workstream still unblocks its dependents:
                    // the run continues on failure and reports everything.
                    st.graph.mark_complete(&id);
                    record
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let record = joined.map_err(|e| DispatchError::TaskJoin(e.to_string()))?;
                results.push(record);
            }

            self.save_checkpoint().await;
        }

        let failed_count = {
            let st = self.state.lock().await;
            st.failed.len()
        };
        if failed_count == 0 {
            if let Some(manager) = &self.checkpoints {
                if let Err(e) = manager.delete().await {
                    warn!(error = %e, feature_id = %self.feature_id, "checkpoint delete failed");
                }
            }
        }
        info!(
            run_id = %self.run_id,
            feature_id = %self.feature_id,
            attempted = results.len(),
            failed = failed_count,
            "dispatch run finished"
        );
        Ok(results)
    }

    /// Restores completion sets, graph state, and breaker counters from a
    /// matching checkpoint. Stale, foreign, or corrupt checkpoints never
    /// fail the run; the dispatcher proceeds from a clean slate.
    async fn try_resume(&self) {
        let Some(manager) = &self.checkpoints else {
            return;
        };
        match manager.load().await {
            Ok(Some(cp)) if cp.feature_id == self.feature_id => {
                info!(
                    run_id = %self.run_id,
                    feature_id = %self.feature_id,
                    completed = cp.completed.len(),
                    failed = cp.failed.len(),
                    "resuming from checkpoint"
                );
                let mut st = self.state.lock().await;
                st.graph = checkpoint::restore_graph(&cp);
                st.completed = cp.completed.iter().cloned().collect();
                st.failed = cp
                    .failed
                    .iter()
                    .map(|id| {
                        (
                            id.clone(),
                            ExecuteError::Failed("failed before checkpoint resume".to_string()),
                        )
                    })
                    .collect();
                drop(st);
                self.breaker.restore(cp.breaker).await;
            }
            Ok(Some(cp)) => {
                warn!(
                    found = %cp.feature_id,
                    expected = %self.feature_id,
                    "ignoring checkpoint for a different feature"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "checkpoint load failed; starting from a clean slate");
            }
        }
    }

    /// Persists the round's checkpoint. Save failures are logged and never
    /// abort the run.
    async fn save_checkpoint(&self) {
        let Some(manager) = &self.checkpoints else {
            return;
        };
        let mut cp = {
            let st = self.state.lock().await;
            let mut completed: Vec<String> = st.completed.iter().cloned().collect();
            completed.sort();
            let mut failed: Vec<String> = st.failed.keys().cloned().collect();
            failed.sort();
            checkpoint::create_checkpoint(&st.graph, &self.feature_id, &completed, &failed)
        };
        cp.breaker = self.breaker.snapshot().await;
        if let Err(e) = manager.save(&cp).await {
            warn!(error = %e, feature_id = %self.feature_id, "checkpoint save failed; continuing");
        }
    }

    /// Returns the ids recorded completed so far, sorted
    pub async fn completed(&self) -> Vec<String> {
        let st = self.state.lock().await;
        let mut ids: Vec<String> = st.completed.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the failed ids with the error recorded for each
    pub async fn failed(&self) -> HashMap<String, ExecuteError> {
        self.state.lock().await.failed.clone()
    }

    /// Returns a read-only snapshot of the shared circuit breaker
    pub async fn circuit_breaker_metrics(&self) -> BreakerMetrics {
        self.breaker.metrics().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, WorkstreamSpec};

    fn linear_graph() -> DependencyGraph {
        build_graph(&[
            WorkstreamSpec::new("a"),
            WorkstreamSpec::new("b").depends_on("a"),
            WorkstreamSpec::new("c").depends_on("b"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrency_is_clamped() {
        let config = DispatcherConfig {
            concurrency: 99,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(linear_graph(), "feat", config);
        assert_eq!(dispatcher.concurrency, MAX_CONCURRENCY);

        let config = DispatcherConfig {
            concurrency: 0,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(linear_graph(), "feat", config);
        assert_eq!(dispatcher.concurrency, MIN_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_empty_graph_finishes_immediately() {
        let dispatcher = Dispatcher::new(
            DependencyGraph::new(),
            "feat",
            DispatcherConfig::default(),
        );
        let results = dispatcher
            .execute(|_id| async move { Ok(()) })
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(dispatcher.completed().await.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_graph_aborts() {
        // A snapshot-shaped graph whose only node is blocked forever: its
        // dependency is marked complete in no one's books.
        let cp = crate::checkpoint::Checkpoint {
            version: crate::checkpoint::CHECKPOINT_VERSION,
            feature_id: "feat".to_string(),
            timestamp: chrono::Utc::now(),
            completed: vec![],
            failed: vec![],
            graph: crate::checkpoint::GraphSnapshot {
                nodes: vec![crate::checkpoint::NodeSnapshot {
                    id: "stuck".to_string(),
                    depends_on: vec!["ghost".to_string()],
                    indegree: 1,
                    completed: false,
                }],
                edges: HashMap::new(),
            },
            breaker: crate::breaker::BreakerSnapshot::default(),
        };
        let graph = checkpoint::restore_graph(&cp);

        let config = DispatcherConfig {
            max_empty_rounds: 2,
            empty_round_wait: Duration::from_millis(5),
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(graph, "feat", config);
        let result = dispatcher.execute(|_id| async move { Ok(()) }).await;
        assert!(matches!(
            result,
            Err(DispatchError::Stalled {
                rounds: 2,
                remaining: 1
            })
        ));
    }
}
