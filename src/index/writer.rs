//! Batch writer: wait on a callback-driven replicated multi-put

use std::sync::Arc;

use tokio::sync::oneshot;

use super::error::ErrorCode;
use crate::storage::{KeyValue, KvStore};
use crate::types::{PartitionId, SpaceId};

/// Writes index batches through the replicated store
///
/// `put` suspends the calling task until the store's completion callback has
/// fired, so a partition's batches commit strictly one after another. The
/// writer only translates the outcome; resolving a new leader after
/// `LeaderChanged` is left to the caller.
#[derive(Clone)]
pub struct BatchWriter {
    kv: Arc<dyn KvStore>,
}

impl BatchWriter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Replicate `data` to the partition and wait for the outcome
    pub async fn put(&self, space: SpaceId, part: PartitionId, data: Vec<KeyValue>) -> ErrorCode {
        if data.is_empty() {
            return ErrorCode::Succeeded;
        }

        let (tx, rx) = oneshot::channel();
        self.kv.async_multi_put(
            space,
            part,
            data,
            Box::new(move |result| {
                // Receiver only goes away if the waiting task was dropped
                let _ = tx.send(result);
            }),
        );

        match rx.await {
            Ok(Ok(())) => ErrorCode::Succeeded,
            Ok(Err(e)) => {
                tracing::debug!(space, part, error = %e, "Batch put failed");
                ErrorCode::from(&e)
            }
            Err(_) => {
                tracing::warn!(space, part, "Store dropped put callback without completing");
                ErrorCode::Unknown
            }
        }
    }
}
