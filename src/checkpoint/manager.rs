//! Atomic checkpoint persistence
//!
//! The final checkpoint file only ever changes at the rename; any failure
//! before that leaves a prior checkpoint untouched, so readers never
//! observe a partially written file. Files that fail to parse are renamed
//! aside rather than deleted.
//!
//! One writer per feature id is assumed. Concurrent dispatchers sharing a
//! checkpoint directory and feature id race on the same paths.

use super::error::{CheckpointError, CheckpointResult};
use super::snapshot::{Checkpoint, GraphSnapshot, NodeSnapshot, CHECKPOINT_VERSION};
use crate::breaker::BreakerSnapshot;
use crate::graph::{DependencyGraph, WorkstreamNode};
use chrono::Utc;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Builds a checkpoint from the current graph and bookkeeping state
///
/// Deep-copies every node and edge list. The breaker section is left at
/// its default; the caller assigns it from a live breaker snapshot.
pub fn create_checkpoint(
    graph: &DependencyGraph,
    feature_id: &str,
    completed: &[String],
    failed: &[String],
) -> Checkpoint {
    let nodes = graph
        .nodes()
        .map(|node| NodeSnapshot {
            id: node.id().to_string(),
            depends_on: node.depends_on().to_vec(),
            indegree: node.indegree(),
            completed: node.is_completed(),
        })
        .collect();
    let edges = graph
        .nodes()
        .map(|node| {
            (
                node.id().to_string(),
                graph.dependents(node.id()).unwrap_or(&[]).to_vec(),
            )
        })
        .collect();

    Checkpoint {
        version: CHECKPOINT_VERSION,
        feature_id: feature_id.to_string(),
        timestamp: Utc::now(),
        completed: completed.to_vec(),
        failed: failed.to_vec(),
        graph: GraphSnapshot { nodes, edges },
        breaker: BreakerSnapshot::default(),
    }
}

/// Reconstructs a dependency graph directly from a checkpoint snapshot
///
/// Bypasses `add_node` ordering and validation: the snapshot is trusted,
/// including its indegrees and completed flags.
pub fn restore_graph(checkpoint: &Checkpoint) -> DependencyGraph {
    let nodes = checkpoint
        .graph
        .nodes
        .iter()
        .map(|n| {
            WorkstreamNode::restored(
                n.id.clone(),
                n.depends_on.clone(),
                n.indegree,
                n.completed,
            )
        })
        .collect();
    DependencyGraph::from_parts(nodes, checkpoint.graph.edges.clone())
}

/// Durable, atomic checkpoint storage for one feature id
///
/// The checkpoint lives at `<dir>/<feature_id>-checkpoint.json`; writes go
/// through a sibling `.tmp` file that is fsynced and renamed into place.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    feature_id: String,
}

impl CheckpointManager {
    /// Creates a manager rooted at `dir` for the given feature id
    pub fn new(dir: impl Into<PathBuf>, feature_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            feature_id: feature_id.into(),
        }
    }

    /// Returns the feature id this manager is scoped to
    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    /// Returns the final checkpoint path
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}-checkpoint.json", self.feature_id))
    }

    fn temp_path(&self) -> PathBuf {
        append_extension(&self.path(), "tmp")
    }

    fn corrupt_path(&self) -> PathBuf {
        append_extension(&self.path(), "corrupt")
    }

    /// Atomically persists a checkpoint
    ///
    /// Writes to the temp file, forces it to disk, then renames it over
    /// the final path. A failure before the rename leaves any existing
    /// checkpoint untouched.
    pub async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(checkpoint).map_err(CheckpointError::Encode)?;

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, self.path()).await?;
        Ok(())
    }

    /// Loads the checkpoint, if one exists
    ///
    /// Returns `Ok(None)` when no checkpoint file is present. A file that
    /// fails to parse is renamed to `<name>.corrupt` (preserving the bytes
    /// for inspection) and reported as [`CheckpointError::Corrupt`].
    pub async fn load(&self) -> CheckpointResult<Option<Checkpoint>> {
        let path = self.path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(parse_err) => {
                let quarantined = self.corrupt_path();
                fs::rename(&path, &quarantined).await?;
                Err(CheckpointError::Corrupt {
                    quarantined,
                    reason: parse_err.to_string(),
                })
            }
        }
    }

    /// Removes the checkpoint and any stray temp file
    ///
    /// Intended to run only after a run completes with zero failures.
    /// Missing files are not an error.
    pub async fn delete(&self) -> CheckpointResult<()> {
        remove_if_present(&self.path()).await?;
        remove_if_present(&self.temp_path()).await?;
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
