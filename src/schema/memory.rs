//! In-memory schema manager

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Schema, SchemaError, SchemaManager, SchemaResult};
use crate::types::{EntityType, SchemaVer, SpaceId};

/// Schema cache keyed by space and entity type, versions kept in order
#[derive(Debug, Default)]
pub struct MemSchemaManager {
    spaces: RwLock<HashMap<SpaceId, HashMap<EntityType, BTreeMap<SchemaVer, Arc<Schema>>>>>,
}

impl MemSchemaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a space with no entity types
    pub fn add_space(&self, space: SpaceId) {
        self.spaces.write().entry(space).or_default();
    }

    /// Register a schema version, creating the space and entity type if needed
    pub fn add_schema(&self, space: SpaceId, entity: EntityType, schema: Schema) {
        self.spaces
            .write()
            .entry(space)
            .or_default()
            .entry(entity)
            .or_default()
            .insert(schema.version, Arc::new(schema));
    }

    fn with_versions<T>(
        &self,
        space: SpaceId,
        entity: EntityType,
        f: impl FnOnce(&BTreeMap<SchemaVer, Arc<Schema>>) -> SchemaResult<T>,
    ) -> SchemaResult<T> {
        let spaces = self.spaces.read();
        let entities = spaces.get(&space).ok_or(SchemaError::SpaceNotFound(space))?;
        let versions = entities
            .get(&entity)
            .ok_or(SchemaError::EntityNotFound { space, entity })?;
        f(versions)
    }
}

impl SchemaManager for MemSchemaManager {
    fn newest_version(&self, space: SpaceId, entity: EntityType) -> SchemaResult<SchemaVer> {
        self.with_versions(space, entity, |versions| {
            versions
                .keys()
                .next_back()
                .copied()
                .ok_or(SchemaError::EntityNotFound { space, entity })
        })
    }

    fn schema(&self, space: SpaceId, entity: EntityType, version: SchemaVer) -> SchemaResult<Arc<Schema>> {
        self.with_versions(space, entity, |versions| {
            versions
                .get(&version)
                .cloned()
                .ok_or(SchemaError::VersionNotFound { entity, version })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyType;

    #[test]
    fn test_newest_version() {
        let schemas = MemSchemaManager::new();
        let person = EntityType::Tag(1);
        schemas.add_schema(1, person, Schema::new(0).prop("name", PropertyType::String));
        schemas.add_schema(
            1,
            person,
            Schema::new(1)
                .prop("name", PropertyType::String)
                .prop("age", PropertyType::Int),
        );

        assert_eq!(schemas.newest_version(1, person).unwrap(), 1);
        assert_eq!(schemas.newest_schema(1, person).unwrap().props.len(), 2);
        assert_eq!(schemas.schema(1, person, 0).unwrap().props.len(), 1);
        assert_eq!(
            schemas.schema(1, person, 5),
            Err(SchemaError::VersionNotFound { entity: person, version: 5 })
        );
    }

    #[test]
    fn test_unknown_entities() {
        let schemas = MemSchemaManager::new();
        schemas.add_space(3);
        assert_eq!(schemas.newest_version(2, EntityType::Tag(1)), Err(SchemaError::SpaceNotFound(2)));
        assert_eq!(
            schemas.newest_version(3, EntityType::Edge(1)),
            Err(SchemaError::EntityNotFound { space: 3, entity: EntityType::Edge(1) })
        );
    }
}
