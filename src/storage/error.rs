//! Key-value store error types

use thiserror::Error;

use crate::types::{PartitionId, SpaceId};

/// Errors surfaced by the replicated key-value store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// Space is not hosted on this node
    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    /// Partition is not hosted on this node
    #[error("partition {part} of space {space} not found")]
    PartNotFound { space: SpaceId, part: PartitionId },

    /// This node is no longer the leader of the partition
    #[error("leader of partition {part} in space {space} changed")]
    LeaderChanged { space: SpaceId, part: PartitionId },

    /// No snapshot is open for the space
    #[error("no snapshot open for space {0}")]
    SnapshotNotFound(SpaceId),

    /// A snapshot is already open for the space
    #[error("snapshot already open for space {0}")]
    SnapshotExists(SpaceId),

    /// Replication layer failed to commit the write
    #[error("consensus error: {0}")]
    Consensus(String),

    /// Store is shutting down or closed
    #[error("store is closed")]
    Closed,
}

/// Result type for key-value store operations
pub type KvResult<T> = Result<T, KvError>;
