//! Index build error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::schema::SchemaError;
use crate::storage::KvError;
use crate::types::{PartitionId, SchemaVer, SpaceId};

/// Per-partition result codes reported to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    Succeeded,
    /// Node lost leadership of the partition; retry against the new leader
    LeaderChanged,
    SpaceNotFound,
    PartNotFound,
    SnapshotNotFound,
    ConsensusError,
    /// Store failure without a more specific code
    Unknown,
}

impl ErrorCode {
    pub fn is_ok(&self) -> bool {
        *self == ErrorCode::Succeeded
    }
}

impl From<&KvError> for ErrorCode {
    fn from(e: &KvError) -> Self {
        match e {
            KvError::SpaceNotFound(_) => ErrorCode::SpaceNotFound,
            KvError::PartNotFound { .. } => ErrorCode::PartNotFound,
            KvError::LeaderChanged { .. } => ErrorCode::LeaderChanged,
            KvError::SnapshotNotFound(_) => ErrorCode::SnapshotNotFound,
            KvError::Consensus(_) => ErrorCode::ConsensusError,
            KvError::SnapshotExists(_) | KvError::Closed => ErrorCode::Unknown,
        }
    }
}

/// Why a row produced no index entry
///
/// Row-level outcomes are never fatal to the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Key length does not match the indexed entity kind
    KeyLength(usize),
    /// Row's entity type is not referenced by the index
    NotIndexable,
    /// Row was written under an older schema version
    StaleVersion { row: SchemaVer, newest: SchemaVer },
    /// Indexed property absent from the row's schema
    MissingProperty(String),
    /// Schema lookup or row decoding failed
    Schema(SchemaError),
}

/// Request-level and invariant errors of index builds
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("user '{user}' may not build indexes in space {space}")]
    PermissionDenied { user: String, space: SpaceId },

    #[error("invalid index definition: {0}")]
    InvalidIndex(String),

    #[error("an index build is already running in space {0}")]
    BuildInProgress(SpaceId),

    /// Partition id does not fit the key layout
    #[error("partition {0} is outside the addressable key range")]
    PartitionOutOfRange(PartitionId),

    #[error("store error: {0}")]
    Store(#[from] KvError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A partition reported after the build was finalized
    #[error("partition {part} of space {space} reported after build finalized")]
    ReportAfterFinalize { space: SpaceId, part: PartitionId },

    /// Build finished without delivering a result
    #[error("index build in space {0} ended without a result")]
    Aborted(SpaceId),
}

/// Result type for index build requests
pub type IndexResult<T> = Result<T, IndexError>;
