//! Identifier types shared across the storage, schema and index layers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Graph space identifier
pub type SpaceId = u32;

/// Partition identifier within a space
pub type PartitionId = u32;

/// Index identifier
pub type IndexId = u32;

/// Tag (vertex type) identifier
pub type TagId = i32;

/// Edge type identifier (negative values denote reverse edges)
pub type EdgeType = i32;

/// Vertex identifier
pub type VertexId = i64;

/// Edge rank
pub type EdgeRanking = i64;

/// Schema version of an entity type
pub type SchemaVer = i64;

/// Storage host address (ip, port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Kind of entity an index is built over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Vertex,
    Edge,
}

/// A concrete entity type: a tag or an edge type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Tag(TagId),
    Edge(EdgeType),
}

impl EntityType {
    /// Build an entity type of the given kind from a raw type id
    pub fn new(kind: EntityKind, id: i32) -> Self {
        match kind {
            EntityKind::Vertex => EntityType::Tag(id),
            EntityKind::Edge => EntityType::Edge(id),
        }
    }

    /// Raw type id (tag id or edge type)
    pub fn id(&self) -> i32 {
        match self {
            EntityType::Tag(id) | EntityType::Edge(id) => *id,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Tag(id) => write!(f, "tag {}", id),
            EntityType::Edge(id) => write!(f, "edge {}", id),
        }
    }
}
