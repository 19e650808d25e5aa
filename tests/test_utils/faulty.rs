//! Store wrapper that misbehaves on demand

use std::sync::Arc;

use graphidx::storage::{KeyValue, KvError, KvIter, KvResult, KvStore, MemKvStore, PutCallback};
use graphidx::types::{HostAddr, PartitionId, SpaceId};

/// Forwards to a `MemKvStore` unless told to fail
pub struct FaultyStore {
    inner: Arc<MemKvStore>,
    /// Snapshot scans of this partition panic
    panic_on_scan: Option<PartitionId>,
    /// Leader lookups fail
    leader_lookup_fails: bool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemKvStore>) -> Self {
        Self {
            inner,
            panic_on_scan: None,
            leader_lookup_fails: false,
        }
    }

    pub fn panic_on_scan(mut self, part: PartitionId) -> Self {
        self.panic_on_scan = Some(part);
        self
    }

    pub fn fail_leader_lookup(mut self) -> Self {
        self.leader_lookup_fails = true;
        self
    }
}

impl KvStore for FaultyStore {
    fn leader_parts(&self, space: SpaceId) -> KvResult<Vec<PartitionId>> {
        self.inner.leader_parts(space)
    }

    fn create_snapshot(&self, space: SpaceId) -> KvResult<()> {
        self.inner.create_snapshot(space)
    }

    fn delete_snapshot(&self, space: SpaceId) -> KvResult<()> {
        self.inner.delete_snapshot(space)
    }

    fn prefix_snapshot(&self, space: SpaceId, part: PartitionId, prefix: &[u8]) -> KvResult<KvIter> {
        if self.panic_on_scan == Some(part) {
            panic!("scan of partition {} blew up", part);
        }
        self.inner.prefix_snapshot(space, part, prefix)
    }

    fn async_multi_put(&self, space: SpaceId, part: PartitionId, data: Vec<KeyValue>, callback: PutCallback) {
        self.inner.async_multi_put(space, part, data, callback)
    }

    fn part_leader(&self, space: SpaceId, part: PartitionId) -> KvResult<HostAddr> {
        if self.leader_lookup_fails {
            return Err(KvError::Consensus("meta service unreachable".into()));
        }
        self.inner.part_leader(space, part)
    }
}
