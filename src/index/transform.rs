//! Row transformer: derive the index key of one raw row
//!
//! Only rows written under the newest schema version of their entity type are
//! indexed. Older rows are skipped and picked up by a later rebuild once they
//! have been rewritten.

use std::sync::Arc;

use super::def::IndexDefinition;
use super::error::SkipReason;
use crate::schema::{RowReader, SchemaManager, Value};
use crate::storage::keys::{self, EdgeKey, VertexKey};
use crate::types::{EntityKind, EntityType, PartitionId, SpaceId};

/// Derives index keys from raw rows for one index definition
#[derive(Clone)]
pub struct RowTransformer {
    space: SpaceId,
    index: Arc<IndexDefinition>,
    schema_man: Arc<dyn SchemaManager>,
}

impl RowTransformer {
    pub fn new(space: SpaceId, index: Arc<IndexDefinition>, schema_man: Arc<dyn SchemaManager>) -> Self {
        Self {
            space,
            index,
            schema_man,
        }
    }

    /// Derive the index key of a raw row, or the reason it is skipped
    pub fn transform(&self, part: PartitionId, key: &[u8], value: &[u8]) -> Result<Vec<u8>, SkipReason> {
        match self.index.kind {
            EntityKind::Vertex => self.vertex_index_key(part, key, value),
            EntityKind::Edge => self.edge_index_key(part, key, value),
        }
    }

    fn vertex_index_key(&self, part: PartitionId, key: &[u8], value: &[u8]) -> Result<Vec<u8>, SkipReason> {
        let row = VertexKey::decode(key).ok_or(SkipReason::KeyLength(key.len()))?;
        let values = self.collect_values(EntityType::Tag(row.tag_id), value)?;
        Ok(keys::vertex_index_key(
            part,
            self.index.index_id,
            row.vertex_id,
            row.version,
            &values,
        ))
    }

    fn edge_index_key(&self, part: PartitionId, key: &[u8], value: &[u8]) -> Result<Vec<u8>, SkipReason> {
        let row = EdgeKey::decode(key).ok_or(SkipReason::KeyLength(key.len()))?;
        let values = self.collect_values(EntityType::Edge(row.edge_type), value)?;
        Ok(keys::edge_index_key(part, self.index.index_id, &row, &values))
    }

    /// Encode the indexed properties of a row at the newest schema version
    fn collect_values(&self, entity: EntityType, value: &[u8]) -> Result<Vec<u8>, SkipReason> {
        let mut props = self.index.props_for(entity.id()).peekable();
        if props.peek().is_none() {
            return Err(SkipReason::NotIndexable);
        }

        let reader = RowReader::new(self.schema_man.as_ref(), value, self.space, entity)
            .map_err(SkipReason::Schema)?;
        let newest = self
            .schema_man
            .newest_version(self.space, entity)
            .map_err(SkipReason::Schema)?;
        if reader.schema_ver() != newest {
            return Err(SkipReason::StaleVersion {
                row: reader.schema_ver(),
                newest,
            });
        }

        let mut buf = Vec::new();
        for prop in props {
            let value: &Value = reader
                .get(prop)
                .ok_or_else(|| SkipReason::MissingProperty(prop.to_string()))?;
            keys::encode_index_value(&mut buf, value);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{encode_row, MemSchemaManager, PropertyType, Schema};
    use crate::storage::keys::{encode_index_values, EdgeIndexKey, VertexIndexKey};

    const SPACE: SpaceId = 1;
    const PERSON: i32 = 10;
    const LIKES: i32 = 20;

    fn schemas() -> Arc<MemSchemaManager> {
        let schemas = MemSchemaManager::new();
        schemas.add_schema(SPACE, EntityType::Tag(PERSON), Schema::new(0).prop("name", PropertyType::String));
        schemas.add_schema(
            SPACE,
            EntityType::Tag(PERSON),
            Schema::new(1)
                .prop("name", PropertyType::String)
                .prop("age", PropertyType::Int),
        );
        schemas.add_schema(SPACE, EntityType::Edge(LIKES), Schema::new(0).prop("weight", PropertyType::Double));
        Arc::new(schemas)
    }

    fn vertex(vid: i64, tag: i32) -> Vec<u8> {
        VertexKey {
            part: 1,
            vertex_id: vid,
            tag_id: tag,
            version: 0,
        }
        .encode()
    }

    fn vertex_transformer() -> RowTransformer {
        let def = IndexDefinition::new(5, EntityKind::Vertex)
            .field(PERSON, "age")
            .field(PERSON, "name");
        RowTransformer::new(SPACE, Arc::new(def), schemas())
    }

    #[test]
    fn test_newest_version_row_indexed() {
        let t = vertex_transformer();
        let value = encode_row(1, &[Value::String("Alice".into()), Value::Int(30)]);
        let key = t.transform(1, &vertex(100, PERSON), &value).unwrap();

        let decoded = VertexIndexKey::decode(&key).unwrap();
        assert_eq!(decoded.index_id, 5);
        assert_eq!(decoded.vertex_id, 100);
        assert_eq!(
            decoded.values,
            encode_index_values(&[Value::Int(30), Value::String("Alice".into())]).as_slice()
        );
    }

    #[test]
    fn test_stale_version_row_skipped() {
        let t = vertex_transformer();
        let value = encode_row(0, &[Value::String("Alice".into())]);
        assert_eq!(
            t.transform(1, &vertex(100, PERSON), &value),
            Err(SkipReason::StaleVersion { row: 0, newest: 1 })
        );
    }

    #[test]
    fn test_unreferenced_type_and_bad_keys_skipped() {
        let t = vertex_transformer();
        let value = encode_row(1, &[Value::String("Alice".into()), Value::Int(30)]);
        assert_eq!(t.transform(1, &vertex(100, 99), &value), Err(SkipReason::NotIndexable));
        assert_eq!(t.transform(1, b"garbage", &value), Err(SkipReason::KeyLength(7)));

        let edge = EdgeKey {
            part: 1,
            src: 1,
            edge_type: LIKES,
            rank: 0,
            dst: 2,
            version: 0,
        };
        assert!(matches!(
            t.transform(1, &edge.encode(), &value),
            Err(SkipReason::KeyLength(_))
        ));
    }

    #[test]
    fn test_undecodable_row_skipped() {
        let t = vertex_transformer();
        assert!(matches!(
            t.transform(1, &vertex(100, PERSON), b"\x01"),
            Err(SkipReason::Schema(_))
        ));
    }

    #[test]
    fn test_missing_property_skipped() {
        let def = IndexDefinition::new(5, EntityKind::Vertex).field(PERSON, "email");
        let t = RowTransformer::new(SPACE, Arc::new(def), schemas());
        let value = encode_row(1, &[Value::String("Alice".into()), Value::Int(30)]);
        assert_eq!(
            t.transform(1, &vertex(100, PERSON), &value),
            Err(SkipReason::MissingProperty("email".into()))
        );
    }

    #[test]
    fn test_edge_row_indexed() {
        let def = IndexDefinition::new(6, EntityKind::Edge).field(LIKES, "weight");
        let t = RowTransformer::new(SPACE, Arc::new(def), schemas());
        let edge = EdgeKey {
            part: 2,
            src: 1,
            edge_type: LIKES,
            rank: 3,
            dst: 2,
            version: 7,
        };
        let value = encode_row(0, &[Value::Double(0.75)]);
        let key = t.transform(2, &edge.encode(), &value).unwrap();

        let decoded = EdgeIndexKey::decode(&key).unwrap();
        assert_eq!(decoded.part, 2);
        assert_eq!((decoded.src, decoded.edge_type, decoded.rank, decoded.dst), (1, LIKES, 3, 2));
        assert_eq!(decoded.version, 7);
        assert_eq!(decoded.values, encode_index_values(&[Value::Double(0.75)]).as_slice());

        // Vertex rows never match an edge index
        assert!(matches!(
            t.transform(2, &vertex(1, PERSON), &value),
            Err(SkipReason::KeyLength(_))
        ));
    }
}
