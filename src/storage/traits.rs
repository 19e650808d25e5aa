//! Key-value store trait definition

use crate::storage::error::{KvError, KvResult};
use crate::types::{HostAddr, PartitionId, SpaceId};

/// A key-value pair
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Ordered iterator over a snapshot scan
pub type KvIter = Box<dyn Iterator<Item = KeyValue> + Send>;

/// Completion callback of an asynchronous multi-put
///
/// Invoked exactly once with the replicated outcome of the write.
pub type PutCallback = Box<dyn FnOnce(Result<(), KvError>) + Send + 'static>;

/// Replicated, partitioned key-value store as seen by background jobs
///
/// Reads go through a per-space snapshot; writes are handed to the
/// replication layer and complete through a callback.
pub trait KvStore: Send + Sync {
    /// Partitions of the space this node currently leads, in ascending order
    fn leader_parts(&self, space: SpaceId) -> KvResult<Vec<PartitionId>>;

    /// Open a consistent point-in-time snapshot over every partition of the space
    fn create_snapshot(&self, space: SpaceId) -> KvResult<()>;

    /// Release the snapshot of the space
    fn delete_snapshot(&self, space: SpaceId) -> KvResult<()>;

    /// Scan keys starting with `prefix` in one partition, as of the open snapshot
    ///
    /// Entries are returned in key order.
    fn prefix_snapshot(&self, space: SpaceId, part: PartitionId, prefix: &[u8])
        -> KvResult<KvIter>;

    /// Replicate a batch of puts to the partition
    ///
    /// Returns immediately; `callback` runs once the write is committed or
    /// has failed.
    fn async_multi_put(
        &self,
        space: SpaceId,
        part: PartitionId,
        data: Vec<KeyValue>,
        callback: PutCallback,
    );

    /// Current leader of the partition
    fn part_leader(&self, space: SpaceId, part: PartitionId) -> KvResult<HostAddr>;
}
