//! graphidx - secondary index construction for a partitioned graph store
//!
//! Features:
//! - Snapshot-consistent scans of every partition the node leads
//! - Index entries derived only from rows at the newest schema version
//! - Batched writes through the replicated key-value layer
//! - One aggregated result per space, with leader redirects for lost partitions

pub mod acl;
pub mod config;
pub mod index;
pub mod schema;
pub mod storage;
pub mod types;
