//! Index definitions and build results

use serde::{Deserialize, Serialize};

use super::error::ErrorCode;
use crate::types::{EntityKind, EntityType, HostAddr, IndexId, PartitionId};

/// One indexed property of one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexField {
    /// Tag id or edge type
    pub type_id: i32,
    pub prop: String,
}

/// What an index build derives
///
/// Fields are ordered; for a row of entity type `T`, the properties of every
/// field with `type_id == T` are encoded in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub index_id: IndexId,
    pub kind: EntityKind,
    pub fields: Vec<IndexField>,
}

impl IndexDefinition {
    /// Create a definition with no fields
    pub fn new(index_id: IndexId, kind: EntityKind) -> Self {
        Self {
            index_id,
            kind,
            fields: Vec::new(),
        }
    }

    /// Add an indexed property
    #[must_use]
    pub fn field(mut self, type_id: i32, prop: impl Into<String>) -> Self {
        self.fields.push(IndexField {
            type_id,
            prop: prop.into(),
        });
        self
    }

    /// Properties indexed for an entity type, in field order
    pub fn props_for(&self, type_id: i32) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(move |f| f.type_id == type_id)
            .map(|f| f.prop.as_str())
    }

    /// Distinct entity types referenced by the definition
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = Vec::new();
        for f in &self.fields {
            let entity = EntityType::new(self.kind, f.type_id);
            if !types.contains(&entity) {
                types.push(entity);
            }
        }
        types
    }
}

/// Outcome of one partition's build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    pub part: PartitionId,
    pub code: ErrorCode,
    /// New leader when `code` is `LeaderChanged`
    pub leader: Option<HostAddr>,
}

impl PartitionResult {
    pub fn succeeded(part: PartitionId) -> Self {
        Self {
            part,
            code: ErrorCode::Succeeded,
            leader: None,
        }
    }

    pub fn failed(part: PartitionId, code: ErrorCode) -> Self {
        Self {
            part,
            code,
            leader: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// Space-wide outcome of an index build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Partitions that failed, with their codes
    pub failed: Vec<PartitionResult>,
    /// Partitions that completed successfully
    pub succeeded: Vec<PartitionId>,
}

impl BuildResult {
    /// Succeeds only when no partition failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Failure of a given partition, if any
    pub fn failure(&self, part: PartitionId) -> Option<&PartitionResult> {
        self.failed.iter().find(|r| r.part == part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_for_keeps_field_order() {
        let def = IndexDefinition::new(1, EntityKind::Vertex)
            .field(10, "name")
            .field(20, "title")
            .field(10, "age");
        assert_eq!(def.props_for(10).collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(def.props_for(30).count(), 0);
        assert_eq!(def.entity_types(), vec![EntityType::Tag(10), EntityType::Tag(20)]);
    }

    #[test]
    fn test_build_result_serializes() {
        let mut result = BuildResult::default();
        result.succeeded.push(1);
        result.failed.push(PartitionResult {
            part: 2,
            code: ErrorCode::LeaderChanged,
            leader: Some(HostAddr::new("10.0.0.3", 44500)),
        });
        assert!(!result.is_success());
        assert_eq!(result.failure(2).unwrap().code, ErrorCode::LeaderChanged);

        let json = serde_json::to_string(&result).unwrap();
        let back: BuildResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
