//! Secondary index construction
//!
//! Builds a tag or edge index from the rows already stored on this node:
//! a snapshot scan per partition, schema-version gated key derivation,
//! batched replicated writes, and one aggregated result per space.

pub mod builder;
pub mod def;
pub mod error;
pub mod tracker;
pub mod transform;
pub mod writer;

pub use builder::{BuildHandle, BuildRequest, IndexBuilder, PartitionIndexBuilder, PartitionStats};
pub use def::{BuildResult, IndexDefinition, IndexField, PartitionResult};
pub use error::{ErrorCode, IndexError, IndexResult, SkipReason};
pub use tracker::{BuildCallback, BuildTracker};
pub use transform::RowTransformer;
pub use writer::BatchWriter;
