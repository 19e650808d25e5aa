//! Index builders
//!
//! `IndexBuilder` accepts a build request for a space and fans out one
//! `PartitionIndexBuilder` task per partition this node leads. Each partition
//! scans the space snapshot, derives index entries and writes them in
//! batches; its outcome goes to the shared `BuildTracker`.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Semaphore};

use super::def::{BuildResult, IndexDefinition, PartitionResult};
use super::error::{ErrorCode, IndexError, IndexResult, SkipReason};
use super::tracker::BuildTracker;
use super::transform::RowTransformer;
use super::writer::BatchWriter;
use crate::acl::{check_build_permission, AccessControl};
use crate::config::IndexBuildConfig;
use crate::schema::SchemaManager;
use crate::storage::keys::{part_prefix, MAX_PARTITION_ID};
use crate::storage::{KeyValue, KvStore};
use crate::types::{PartitionId, SpaceId};

/// Counters of one partition's build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub rows_scanned: usize,
    pub skipped_key_length: usize,
    pub skipped_not_indexable: usize,
    pub skipped_stale_version: usize,
    /// Decode, schema lookup or missing property
    pub skipped_invalid: usize,
    pub entries_written: usize,
    pub batches: usize,
}

impl PartitionStats {
    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::KeyLength(_) => self.skipped_key_length += 1,
            SkipReason::NotIndexable => self.skipped_not_indexable += 1,
            SkipReason::StaleVersion { .. } => self.skipped_stale_version += 1,
            SkipReason::MissingProperty(_) | SkipReason::Schema(_) => self.skipped_invalid += 1,
        }
    }
}

/// Builds one index over the partitions of one space
#[derive(Clone)]
pub struct PartitionIndexBuilder {
    space: SpaceId,
    index: Arc<IndexDefinition>,
    kv: Arc<dyn KvStore>,
    transformer: RowTransformer,
    writer: BatchWriter,
    batch_size: usize,
}

impl PartitionIndexBuilder {
    pub fn new(
        space: SpaceId,
        index: Arc<IndexDefinition>,
        kv: Arc<dyn KvStore>,
        schema_man: Arc<dyn SchemaManager>,
        batch_size: usize,
    ) -> Self {
        Self {
            space,
            transformer: RowTransformer::new(space, index.clone(), schema_man),
            writer: BatchWriter::new(kv.clone()),
            index,
            kv,
            batch_size: batch_size.max(1),
        }
    }

    /// Build the partition and report its outcome to `tracker`
    ///
    /// The build runs as its own task, so a panic inside it still reports
    /// the partition as failed.
    pub async fn run(&self, part: PartitionId, tracker: &BuildTracker) {
        let builder = self.clone();
        let result = match tokio::spawn(async move { builder.build(part).await }).await {
            Ok((result, _)) => result,
            Err(e) => {
                tracing::error!(space = self.space, part, error = %e, "Partition build task failed");
                PartitionResult::failed(part, ErrorCode::Unknown)
            }
        };
        if let Err(e) = tracker.report(result) {
            tracing::error!(space = self.space, part, error = %e, "Lost partition result");
        }
    }

    /// Scan the partition under the space snapshot and write its index entries
    pub async fn build(&self, part: PartitionId) -> (PartitionResult, PartitionStats) {
        let mut stats = PartitionStats::default();

        let iter = match self.kv.prefix_snapshot(self.space, part, &part_prefix(part)) {
            Ok(iter) => iter,
            Err(e) => {
                tracing::warn!(space = self.space, part, error = %e, "Failed to open snapshot scan");
                return (PartitionResult::failed(part, ErrorCode::from(&e)), stats);
            }
        };

        let mut batch: Vec<KeyValue> = Vec::with_capacity(self.batch_size);
        for (key, value) in iter {
            stats.rows_scanned += 1;
            match self.transformer.transform(part, &key, &value) {
                Ok(index_key) => batch.push((index_key, key)),
                Err(reason) => {
                    tracing::trace!(space = self.space, part, ?reason, "Skipping row");
                    stats.record_skip(&reason);
                    continue;
                }
            }

            if batch.len() >= self.batch_size {
                if let Some(failed) = self.flush(part, &mut batch, &mut stats).await {
                    return (failed, stats);
                }
            }
        }

        if let Some(failed) = self.flush(part, &mut batch, &mut stats).await {
            return (failed, stats);
        }

        tracing::debug!(space = self.space, part, index = self.index.index_id, ?stats, "Partition index built");
        (PartitionResult::succeeded(part), stats)
    }

    /// Write the pending batch; returns the partition's final result on failure
    async fn flush(
        &self,
        part: PartitionId,
        batch: &mut Vec<KeyValue>,
        stats: &mut PartitionStats,
    ) -> Option<PartitionResult> {
        if batch.is_empty() {
            return None;
        }
        let data = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        let len = data.len();

        match self.writer.put(self.space, part, data).await {
            ErrorCode::Succeeded => {
                stats.entries_written += len;
                stats.batches += 1;
                None
            }
            ErrorCode::LeaderChanged => {
                let leader = match self.kv.part_leader(self.space, part) {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        tracing::warn!(space = self.space, part, error = %e, "Failed to look up new leader");
                        None
                    }
                };
                tracing::info!(space = self.space, part, leader = ?leader, "Leader changed, stopping partition");
                Some(PartitionResult {
                    part,
                    code: ErrorCode::LeaderChanged,
                    leader,
                })
            }
            code => {
                tracing::warn!(space = self.space, part, ?code, "Batch write failed, stopping partition");
                Some(PartitionResult::failed(part, code))
            }
        }
    }
}

/// An index build request from the coordinator
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub space: SpaceId,
    /// Requesting user, checked when authorization is enabled
    pub user: String,
    pub index: IndexDefinition,
}

/// Pending result of a started build
///
/// Dropping the handle does not stop the build.
#[derive(Debug)]
pub struct BuildHandle {
    space: SpaceId,
    rx: oneshot::Receiver<BuildResult>,
}

impl BuildHandle {
    /// Wait for every partition to report
    pub async fn wait(self) -> IndexResult<BuildResult> {
        self.rx.await.map_err(|_| IndexError::Aborted(self.space))
    }
}

/// Entry point for index builds on this node
pub struct IndexBuilder {
    kv: Arc<dyn KvStore>,
    schema_man: Arc<dyn SchemaManager>,
    acl: Arc<dyn AccessControl>,
    config: IndexBuildConfig,
    /// Spaces with a build in flight; each owns the space snapshot
    active: Arc<Mutex<HashSet<SpaceId>>>,
}

impl IndexBuilder {
    pub fn new(
        kv: Arc<dyn KvStore>,
        schema_man: Arc<dyn SchemaManager>,
        acl: Arc<dyn AccessControl>,
        config: IndexBuildConfig,
    ) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self {
            kv,
            schema_man,
            acl,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn config(&self) -> &IndexBuildConfig {
        &self.config
    }

    /// Whether a build is running in the space
    pub fn is_building(&self, space: SpaceId) -> bool {
        self.active.lock().contains(&space)
    }

    /// Start building an index over every partition this node leads
    ///
    /// Request-level problems are returned immediately; partition outcomes
    /// arrive through the returned handle. Must be called within a tokio
    /// runtime.
    pub async fn start_index_build(&self, req: BuildRequest) -> IndexResult<BuildHandle> {
        let space = req.space;

        if self.config.security_authorization_enable
            && !check_build_permission(self.acl.as_ref(), &req.user, space).await
        {
            return Err(IndexError::PermissionDenied { user: req.user, space });
        }
        self.validate_index(space, &req.index)?;

        if !self.active.lock().insert(space) {
            return Err(IndexError::BuildInProgress(space));
        }

        match self.launch(space, Arc::new(req.index)) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.active.lock().remove(&space);
                Err(e)
            }
        }
    }

    /// Check the definition against the newest schemas of the space
    fn validate_index(&self, space: SpaceId, index: &IndexDefinition) -> IndexResult<()> {
        if index.fields.is_empty() {
            return Err(IndexError::InvalidIndex(format!("index {} has no fields", index.index_id)));
        }
        for entity in index.entity_types() {
            let schema = self
                .schema_man
                .newest_schema(space, entity)
                .map_err(|e| IndexError::InvalidIndex(e.to_string()))?;
            if let Some(prop) = index.props_for(entity.id()).find(|p| schema.prop_index(p).is_none()) {
                return Err(IndexError::InvalidIndex(format!("{} has no property '{}'", entity, prop)));
            }
        }
        Ok(())
    }

    fn launch(&self, space: SpaceId, index: Arc<IndexDefinition>) -> IndexResult<BuildHandle> {
        let parts = self.kv.leader_parts(space)?;
        if let Some(&part) = parts.iter().find(|&&p| p > MAX_PARTITION_ID) {
            return Err(IndexError::PartitionOutOfRange(part));
        }
        self.kv.create_snapshot(space)?;

        let (tx, rx) = oneshot::channel();
        let active = self.active.clone();
        let on_finish = Box::new(move |result: BuildResult| {
            active.lock().remove(&space);
            if tx.send(result).is_err() {
                tracing::debug!(space, "Build result dropped by caller");
            }
        });

        tracing::info!(space, index = index.index_id, parts = parts.len(), "Starting index build");
        let tracker = Arc::new(BuildTracker::new(space, parts.len(), self.kv.clone(), on_finish));
        if parts.is_empty() {
            // Nothing will report; finalize with an empty success right away
            tracker.finish_empty();
        }

        let builder = PartitionIndexBuilder::new(
            space,
            index,
            self.kv.clone(),
            self.schema_man.clone(),
            self.config.bulk_number_per_index_creation,
        );
        let limiter = match self.config.max_concurrent_partitions {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        for part in parts {
            let builder = builder.clone();
            let tracker = tracker.clone();
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _permit = match &limiter {
                    Some(sem) => sem.clone().acquire_owned().await.ok(),
                    None => None,
                };
                builder.run(part, &tracker).await;
            });
        }

        Ok(BuildHandle { space, rx })
    }
}
