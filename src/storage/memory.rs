//! In-memory partitioned key-value store
//!
//! Stands in for the replicated store on a single node: each partition is a
//! shared sorted `BTreeMap`, copied on write while a snapshot still holds it.
//! Leadership is tracked per partition. Multi-puts complete through their callback on the
//! tokio runtime, like a replicated write would.
//!
//! Fault injection hooks let callers exercise leadership loss and failing
//! scans without a real cluster.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::error::{KvError, KvResult};
use crate::storage::traits::{KeyValue, KvIter, KvStore, PutCallback};
use crate::types::{HostAddr, PartitionId, SpaceId};

type PartMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Failure injected into a partition's multi-puts
#[derive(Debug, Clone)]
pub struct PutFault {
    /// Number of batches that still commit before the fault triggers
    pub after_batches: usize,
    /// Error returned once triggered
    pub error: KvError,
    /// Leadership moves here when the fault triggers
    pub new_leader: Option<HostAddr>,
}

impl PutFault {
    /// Leadership moves to `new_leader` after `after_batches` committed batches
    pub fn leader_change(space: SpaceId, part: PartitionId, after_batches: usize, new_leader: HostAddr) -> Self {
        Self {
            after_batches,
            error: KvError::LeaderChanged { space, part },
            new_leader: Some(new_leader),
        }
    }
}

#[derive(Debug)]
struct PartData {
    data: Arc<PartMap>,
    leader: HostAddr,
    /// Committed multi-put batches
    batches: usize,
    put_fault: Option<PutFault>,
    scan_fault: Option<KvError>,
}

#[derive(Debug, Default)]
struct SpaceData {
    parts: BTreeMap<PartitionId, PartData>,
    snapshot: Option<HashMap<PartitionId, Arc<PartMap>>>,
}

/// In-memory key-value store
#[derive(Debug)]
pub struct MemKvStore {
    /// Address of this node
    local: HostAddr,
    spaces: RwLock<HashMap<SpaceId, SpaceData>>,
}

impl MemKvStore {
    /// Create an empty store for the node at `local`
    pub fn new(local: HostAddr) -> Self {
        Self {
            local,
            spaces: RwLock::new(HashMap::new()),
        }
    }

    /// Host a space with the given partitions, all led by this node
    pub fn add_space(&self, space: SpaceId, parts: impl IntoIterator<Item = PartitionId>) {
        let mut spaces = self.spaces.write();
        let entry = spaces.entry(space).or_default();
        for part in parts {
            entry.parts.entry(part).or_insert_with(|| PartData {
                data: Arc::new(PartMap::new()),
                leader: self.local.clone(),
                batches: 0,
                put_fault: None,
                scan_fault: None,
            });
        }
    }

    /// Write a key directly, bypassing replication
    pub fn put(&self, space: SpaceId, part: PartitionId, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.with_part_mut(space, part, |p| {
            Arc::make_mut(&mut p.data).insert(key.to_vec(), value.to_vec());
        })
    }

    /// Read a key from the live (non-snapshot) view
    pub fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.with_part(space, part, |p| p.data.get(key).cloned())
    }

    /// Scan keys with `prefix` in the live (non-snapshot) view
    pub fn scan_prefix(&self, space: SpaceId, part: PartitionId, prefix: &[u8]) -> KvResult<Vec<KeyValue>> {
        self.with_part(space, part, |p| collect_prefix(&p.data, prefix))
    }

    /// Move leadership of a partition
    pub fn transfer_leader(&self, space: SpaceId, part: PartitionId, leader: HostAddr) -> KvResult<()> {
        self.with_part_mut(space, part, |p| p.leader = leader)
    }

    /// Make future multi-puts to the partition fail
    pub fn inject_put_fault(&self, space: SpaceId, part: PartitionId, fault: PutFault) -> KvResult<()> {
        self.with_part_mut(space, part, |p| p.put_fault = Some(fault))
    }

    /// Make snapshot scans of the partition fail with `error`
    pub fn inject_scan_fault(&self, space: SpaceId, part: PartitionId, error: KvError) -> KvResult<()> {
        self.with_part_mut(space, part, |p| p.scan_fault = Some(error))
    }

    /// Number of multi-put batches committed to the partition
    pub fn committed_batches(&self, space: SpaceId, part: PartitionId) -> KvResult<usize> {
        self.with_part(space, part, |p| p.batches)
    }

    /// Whether a snapshot is currently open for the space
    pub fn has_snapshot(&self, space: SpaceId) -> bool {
        self.spaces
            .read()
            .get(&space)
            .is_some_and(|s| s.snapshot.is_some())
    }

    fn with_part<T>(&self, space: SpaceId, part: PartitionId, f: impl FnOnce(&PartData) -> T) -> KvResult<T> {
        let spaces = self.spaces.read();
        let space_data = spaces.get(&space).ok_or(KvError::SpaceNotFound(space))?;
        let part_data = space_data
            .parts
            .get(&part)
            .ok_or(KvError::PartNotFound { space, part })?;
        Ok(f(part_data))
    }

    fn with_part_mut<T>(
        &self,
        space: SpaceId,
        part: PartitionId,
        f: impl FnOnce(&mut PartData) -> T,
    ) -> KvResult<T> {
        let mut spaces = self.spaces.write();
        let space_data = spaces.get_mut(&space).ok_or(KvError::SpaceNotFound(space))?;
        let part_data = space_data
            .parts
            .get_mut(&part)
            .ok_or(KvError::PartNotFound { space, part })?;
        Ok(f(part_data))
    }

    /// Apply a replicated batch, returning the outcome the callback will see
    fn commit_batch(&self, space: SpaceId, part: PartitionId, data: Vec<KeyValue>) -> KvResult<()> {
        let local = &self.local;
        self.with_part_mut(space, part, |p| {
            if let Some(fault) = &p.put_fault {
                if p.batches >= fault.after_batches {
                    if let Some(leader) = &fault.new_leader {
                        p.leader = leader.clone();
                    }
                    return Err(fault.error.clone());
                }
            }
            if &p.leader != local {
                return Err(KvError::LeaderChanged { space, part });
            }
            Arc::make_mut(&mut p.data).extend(data);
            p.batches += 1;
            Ok(())
        })?
    }
}

/// Lazy prefix scan over a frozen partition
///
/// Each step seeks past the last returned key, so the iterator holds no
/// borrow of the map and rows are only copied when consumed.
struct SnapshotIter {
    map: Arc<PartMap>,
    prefix: Vec<u8>,
    cursor: Bound<Vec<u8>>,
}

impl Iterator for SnapshotIter {
    type Item = KeyValue;

    fn next(&mut self) -> Option<KeyValue> {
        let (key, value) = self
            .map
            .range::<Vec<u8>, _>((self.cursor.as_ref(), Bound::Unbounded))
            .next()?;
        if !key.starts_with(&self.prefix) {
            return None;
        }
        self.cursor = Bound::Excluded(key.clone());
        Some((key.clone(), value.clone()))
    }
}

fn collect_prefix(data: &PartMap, prefix: &[u8]) -> Vec<KeyValue> {
    data.range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvStore for MemKvStore {
    fn leader_parts(&self, space: SpaceId) -> KvResult<Vec<PartitionId>> {
        let spaces = self.spaces.read();
        let space_data = spaces.get(&space).ok_or(KvError::SpaceNotFound(space))?;
        Ok(space_data
            .parts
            .iter()
            .filter(|(_, p)| p.leader == self.local)
            .map(|(id, _)| *id)
            .collect())
    }

    fn create_snapshot(&self, space: SpaceId) -> KvResult<()> {
        let mut spaces = self.spaces.write();
        let space_data = spaces.get_mut(&space).ok_or(KvError::SpaceNotFound(space))?;
        if space_data.snapshot.is_some() {
            return Err(KvError::SnapshotExists(space));
        }
        let frozen = space_data
            .parts
            .iter()
            .map(|(id, p)| (*id, Arc::clone(&p.data)))
            .collect();
        space_data.snapshot = Some(frozen);
        tracing::debug!(space, "Created snapshot");
        Ok(())
    }

    fn delete_snapshot(&self, space: SpaceId) -> KvResult<()> {
        let mut spaces = self.spaces.write();
        let space_data = spaces.get_mut(&space).ok_or(KvError::SpaceNotFound(space))?;
        match space_data.snapshot.take() {
            Some(_) => {
                tracing::debug!(space, "Released snapshot");
                Ok(())
            }
            None => Err(KvError::SnapshotNotFound(space)),
        }
    }

    fn prefix_snapshot(&self, space: SpaceId, part: PartitionId, prefix: &[u8]) -> KvResult<KvIter> {
        let spaces = self.spaces.read();
        let space_data = spaces.get(&space).ok_or(KvError::SpaceNotFound(space))?;
        let part_data = space_data
            .parts
            .get(&part)
            .ok_or(KvError::PartNotFound { space, part })?;
        if let Some(err) = &part_data.scan_fault {
            return Err(err.clone());
        }
        let snapshot = space_data
            .snapshot
            .as_ref()
            .ok_or(KvError::SnapshotNotFound(space))?;
        let frozen = snapshot.get(&part).ok_or(KvError::PartNotFound { space, part })?;
        Ok(Box::new(SnapshotIter {
            map: Arc::clone(frozen),
            prefix: prefix.to_vec(),
            cursor: Bound::Included(prefix.to_vec()),
        }))
    }

    fn async_multi_put(&self, space: SpaceId, part: PartitionId, data: Vec<KeyValue>, callback: PutCallback) {
        let result = self.commit_batch(space, part, data);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { callback(result) });
            }
            Err(_) => callback(result),
        }
    }

    fn part_leader(&self, space: SpaceId, part: PartitionId) -> KvResult<HostAddr> {
        self.with_part(space, part, |p| p.leader.clone())
    }
}
