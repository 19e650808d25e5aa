//! Store wrapper that completes writes after a random delay

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use graphidx::storage::{KeyValue, KvIter, KvResult, KvStore, MemKvStore, PutCallback};
use graphidx::types::{HostAddr, PartitionId, SpaceId};

/// Delays every multi-put by up to `max_delay` before it reaches the inner store
///
/// Also records the largest number of multi-puts outstanding at once.
pub struct DelayedStore {
    inner: Arc<MemKvStore>,
    max_delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl DelayedStore {
    pub fn new(inner: Arc<MemKvStore>, max_delay: Duration) -> Self {
        Self {
            inner,
            max_delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Most multi-puts that were awaiting completion at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl KvStore for DelayedStore {
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
        self.inner.prefix_snapshot(space, part, prefix)
    }

    fn async_multi_put(&self, space: SpaceId, part: PartitionId, data: Vec<KeyValue>, callback: PutCallback) {
        let max_ms = self.max_delay.as_millis().max(1) as u64;
        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..max_ms));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Count the put as done before the writer can resume
        let in_flight = self.in_flight.clone();
        let callback: PutCallback = Box::new(move |result| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
            callback(result);
        });

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.async_multi_put(space, part, data, callback);
        });
    }

    fn part_leader(&self, space: SpaceId, part: PartitionId) -> KvResult<HostAddr> {
        self.inner.part_leader(space, part)
    }
}
