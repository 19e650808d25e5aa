//! Shared test utilities
//!
//! Note: clippy reports false-positive dead_code warnings because it can't
//! trace usage across test binaries. These utilities are used by multiple tests.

#![allow(dead_code)]

pub mod delayed;
pub mod faulty;

use std::sync::Arc;

use graphidx::acl::MemAccessControl;
use graphidx::config::IndexBuildConfig;
use graphidx::index::IndexBuilder;
use graphidx::schema::{encode_row, MemSchemaManager, PropertyType, Schema, Value};
use graphidx::storage::keys::{EdgeKey, VertexKey};
use graphidx::storage::{KvStore, MemKvStore};
use graphidx::types::{EntityType, HostAddr, PartitionId, SpaceId, VertexId};

pub const SPACE: SpaceId = 1;
pub const PERSON: i32 = 10;
pub const KNOWS: i32 = 20;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn local_addr() -> HostAddr {
    HostAddr::new("127.0.0.1", 44500)
}

/// A storage node with in-memory collaborators
pub struct TestNode {
    pub kv: Arc<MemKvStore>,
    pub schemas: Arc<MemSchemaManager>,
    pub acl: Arc<MemAccessControl>,
}

impl TestNode {
    /// Node leading `parts` of `SPACE`, with `person(name: string)` at version 0
    /// and `knows(since: int)` at version 0
    pub fn new(parts: impl IntoIterator<Item = PartitionId>) -> Self {
        init_tracing();
        let kv = Arc::new(MemKvStore::new(local_addr()));
        kv.add_space(SPACE, parts);

        let schemas = Arc::new(MemSchemaManager::new());
        schemas.add_schema(
            SPACE,
            EntityType::Tag(PERSON),
            Schema::new(0).prop("name", PropertyType::String),
        );
        schemas.add_schema(
            SPACE,
            EntityType::Edge(KNOWS),
            Schema::new(0).prop("since", PropertyType::Int),
        );

        Self {
            kv,
            schemas,
            acl: Arc::new(MemAccessControl::new()),
        }
    }

    pub fn builder(&self, config: IndexBuildConfig) -> IndexBuilder {
        self.builder_with_store(self.kv.clone(), config)
    }

    pub fn builder_with_store(&self, kv: Arc<dyn KvStore>, config: IndexBuildConfig) -> IndexBuilder {
        IndexBuilder::new(kv, self.schemas.clone(), self.acl.clone(), config).unwrap()
    }

    /// Store a person vertex written under schema `version`
    pub fn put_person(&self, part: PartitionId, vid: VertexId, version: i64, values: &[Value]) {
        let key = VertexKey {
            part,
            vertex_id: vid,
            tag_id: PERSON,
            version: 0,
        };
        self.kv
            .put(SPACE, part, &key.encode(), &encode_row(version, values))
            .unwrap();
    }

    /// Store a knows edge at schema version 0
    pub fn put_knows(&self, part: PartitionId, src: VertexId, dst: VertexId, since: i64) {
        let key = EdgeKey {
            part,
            src,
            edge_type: KNOWS,
            rank: 0,
            dst,
            version: 0,
        };
        self.kv
            .put(SPACE, part, &key.encode(), &encode_row(0, &[Value::Int(since)]))
            .unwrap();
    }
}
