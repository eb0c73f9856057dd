//! Durable checkpointing for dispatcher runs
//!
//! Serializes {graph state, completion sets, circuit-breaker state} to an
//! indented JSON file, written atomically (temp file, fsync, rename) so a
//! crash never leaves a partially written checkpoint. Corrupted files are
//! quarantined rather than dropped.

mod error;
mod manager;
mod snapshot;

pub use error::{CheckpointError, CheckpointResult};
pub use manager::{create_checkpoint, restore_graph, CheckpointManager};
pub use snapshot::{Checkpoint, GraphSnapshot, NodeSnapshot, CHECKPOINT_VERSION};
