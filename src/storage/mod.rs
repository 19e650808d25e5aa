//! Storage layer
//!
//! Key encoding for data rows and index entries, and the partitioned
//! key-value store interface index builds run against.

pub mod error;
pub mod keys;
pub mod memory;
pub mod traits;

pub use error::{KvError, KvResult};
pub use memory::{MemKvStore, PutFault};
pub use traits::{KeyValue, KvIter, KvStore, PutCallback};
