//! Schema - versioned property layouts of tags and edge types
//!
//! Every tag and edge type has a sequence of schema versions. Rows record the
//! version they were written under; the newest version is the canonical
//! layout index builds target.

pub mod memory;
pub mod row;

use std::sync::Arc;

use thiserror::Error;

use crate::types::{EntityType, SchemaVer, SpaceId};

pub use memory::MemSchemaManager;
pub use row::{encode_row, RowReader, Value};

/// Property data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Int,
    Double,
    String,
    /// Unix seconds, stored as an integer
    Timestamp,
}

impl PropertyType {
    /// Check whether a decoded value fits this type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (PropertyType::Bool, Value::Bool(_))
                | (PropertyType::Int | PropertyType::Timestamp, Value::Int(_))
                | (PropertyType::Double, Value::Double(_))
                | (PropertyType::String, Value::String(_))
        )
    }
}

/// Property definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub prop_type: PropertyType,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, prop_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            prop_type,
        }
    }
}

/// One version of an entity type's layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub version: SchemaVer,
    pub props: Vec<PropertyDef>,
}

impl Schema {
    /// Create an empty schema at `version`
    pub fn new(version: SchemaVer) -> Self {
        Self {
            version,
            props: Vec::new(),
        }
    }

    /// Add a property
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, prop_type: PropertyType) -> Self {
        self.props.push(PropertyDef::new(name, prop_type));
        self
    }

    /// Position of a property by name
    pub fn prop_index(&self, name: &str) -> Option<usize> {
        self.props.iter().position(|p| p.name == name)
    }
}

/// Schema lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    #[error("{entity} not found in space {space}")]
    EntityNotFound { space: SpaceId, entity: EntityType },

    #[error("{entity} has no schema version {version}")]
    VersionNotFound { entity: EntityType, version: SchemaVer },

    #[error("row decode error: {0}")]
    Decode(String),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Versioned schema lookup service
pub trait SchemaManager: Send + Sync {
    /// Newest schema version of the entity type
    fn newest_version(&self, space: SpaceId, entity: EntityType) -> SchemaResult<SchemaVer>;

    /// Schema of the entity type at a given version
    fn schema(&self, space: SpaceId, entity: EntityType, version: SchemaVer) -> SchemaResult<Arc<Schema>>;

    /// Schema of the entity type at its newest version
    fn newest_schema(&self, space: SpaceId, entity: EntityType) -> SchemaResult<Arc<Schema>> {
        let version = self.newest_version(space, entity)?;
        self.schema(space, entity, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder() {
        let schema = Schema::new(2)
            .prop("name", PropertyType::String)
            .prop("age", PropertyType::Int);
        assert_eq!(schema.version, 2);
        assert_eq!(schema.prop_index("age"), Some(1));
        assert_eq!(schema.prop_index("email"), None);
    }

    #[test]
    fn test_property_type_accepts() {
        assert!(PropertyType::Timestamp.accepts(&Value::Int(1_700_000_000)));
        assert!(PropertyType::String.accepts(&Value::Null));
        assert!(!PropertyType::Bool.accepts(&Value::Int(1)));
        assert!(!PropertyType::Double.accepts(&Value::String("1.0".into())));
    }
}
