//! Completion aggregator for one space-wide index build
//!
//! Partitions report independently and in any order. The report that brings
//! the outstanding count to zero finalizes the build: it releases the space
//! snapshot and hands the assembled `BuildResult` to the completion callback.

use std::sync::Arc;

use parking_lot::Mutex;

use super::def::{BuildResult, PartitionResult};
use super::error::{IndexError, IndexResult};
use crate::storage::KvStore;
use crate::types::SpaceId;

/// Completion callback of a build, invoked exactly once
pub type BuildCallback = Box<dyn FnOnce(BuildResult) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Finalizing,
    Done,
}

struct TrackerState {
    phase: Phase,
    remaining: usize,
    result: BuildResult,
    on_finish: Option<BuildCallback>,
}

/// Join barrier across the partition builders of one build
pub struct BuildTracker {
    space: SpaceId,
    kv: Arc<dyn KvStore>,
    state: Mutex<TrackerState>,
}

impl BuildTracker {
    /// Track `parts` outstanding partitions
    ///
    /// The space snapshot must already be open; it is released on
    /// finalization.
    pub fn new(space: SpaceId, parts: usize, kv: Arc<dyn KvStore>, on_finish: BuildCallback) -> Self {
        Self {
            space,
            kv,
            state: Mutex::new(TrackerState {
                phase: Phase::Running,
                remaining: parts,
                result: BuildResult::default(),
                on_finish: Some(on_finish),
            }),
        }
    }

    /// Record one partition's outcome
    ///
    /// Reports after the last partition has been counted are a bookkeeping
    /// bug and are rejected.
    pub fn report(&self, result: PartitionResult) -> IndexResult<()> {
        let finished = {
            let mut state = self.state.lock();
            if state.phase != Phase::Running || state.remaining == 0 {
                tracing::error!(
                    space = self.space,
                    part = result.part,
                    phase = ?state.phase,
                    "Partition reported after index build finalized"
                );
                return Err(IndexError::ReportAfterFinalize {
                    space: self.space,
                    part: result.part,
                });
            }

            if result.is_ok() {
                state.result.succeeded.push(result.part);
            } else {
                state.result.failed.push(result);
            }
            state.remaining -= 1;

            if state.remaining == 0 {
                state.phase = Phase::Finalizing;
                let build_result = std::mem::take(&mut state.result);
                state.on_finish.take().map(|cb| (build_result, cb))
            } else {
                None
            }
        };

        if let Some((build_result, on_finish)) = finished {
            self.finalize(build_result, on_finish);
        }
        Ok(())
    }

    /// Finalize a build that tracks no partitions
    pub fn finish_empty(&self) {
        let on_finish = {
            let mut state = self.state.lock();
            if state.phase != Phase::Running || state.remaining != 0 {
                return;
            }
            state.phase = Phase::Finalizing;
            state.on_finish.take()
        };
        if let Some(on_finish) = on_finish {
            self.finalize(BuildResult::default(), on_finish);
        }
    }

    fn finalize(&self, mut result: BuildResult, on_finish: BuildCallback) {
        if let Err(e) = self.kv.delete_snapshot(self.space) {
            tracing::warn!(space = self.space, error = %e, "Failed to release snapshot");
        }

        result.succeeded.sort_unstable();
        result.failed.sort_by_key(|r| r.part);
        tracing::info!(
            space = self.space,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Index build finished"
        );

        on_finish(result);
        self.state.lock().phase = Phase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::error::ErrorCode;
    use crate::storage::MemKvStore;
    use crate::types::HostAddr;

    fn tracked(parts: usize) -> (Arc<MemKvStore>, BuildTracker, std::sync::mpsc::Receiver<BuildResult>) {
        let kv = Arc::new(MemKvStore::new(HostAddr::new("127.0.0.1", 44500)));
        kv.add_space(1, 1..=parts as u32);
        kv.create_snapshot(1).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let tracker = BuildTracker::new(
            1,
            parts,
            kv.clone(),
            Box::new(move |r| {
                let _ = tx.send(r);
            }),
        );
        (kv, tracker, rx)
    }

    #[test]
    fn test_finalizes_on_last_report() {
        let (kv, tracker, rx) = tracked(3);
        tracker.report(PartitionResult::succeeded(2)).unwrap();
        tracker
            .report(PartitionResult::failed(3, ErrorCode::ConsensusError))
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert!(kv.has_snapshot(1));

        tracker.report(PartitionResult::succeeded(1)).unwrap();
        let result = rx.try_recv().unwrap();
        assert_eq!(result.succeeded, vec![1, 2]);
        assert_eq!(result.failed, vec![PartitionResult::failed(3, ErrorCode::ConsensusError)]);
        assert!(!kv.has_snapshot(1));
        assert!(tracker.report(PartitionResult::succeeded(1)).is_err());
    }

    #[test]
    fn test_report_after_finalize_rejected() {
        let (_kv, tracker, rx) = tracked(1);
        tracker.report(PartitionResult::succeeded(1)).unwrap();
        assert!(matches!(
            tracker.report(PartitionResult::succeeded(1)),
            Err(IndexError::ReportAfterFinalize { space: 1, part: 1 })
        ));
        // Callback still ran exactly once
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_reports_finalize_once() {
        let parts = 64;
        let (kv, tracker, rx) = tracked(parts);
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (1..=parts as u32)
            .map(|part| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.report(PartitionResult::succeeded(part)))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let result = rx.recv().unwrap();
        assert_eq!(result.succeeded.len(), parts);
        assert!(rx.try_recv().is_err());
        assert!(!kv.has_snapshot(1));
    }
}
