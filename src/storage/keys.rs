//! Raw data and index key encoding
//!
//! Every key starts with a 4-byte big-endian item `(partition << 8) | key_type`
//! so that a partition's data rows and its index entries live in disjoint,
//! prefix-scannable ranges.
//!
//! Vertex row:  `item(4) | vid(8) | tag(4) | version(8)`
//! Edge row:    `item(4) | src(8) | edge_type(4) | rank(8) | dst(8) | version(8)`
//! Vertex index: `item(4) | index_id(4) | vid(8) | version(8) | values`
//! Edge index:   `item(4) | index_id(4) | src(8) | edge_type(4) | rank(8) | dst(8) | version(8) | values`

use crate::schema::Value;
use crate::types::{EdgeRanking, EdgeType, IndexId, PartitionId, TagId, VertexId};

/// Key type of a data row
pub const KEY_TYPE_DATA: u8 = 0x01;

/// Key type of an index entry
pub const KEY_TYPE_INDEX: u8 = 0x02;

/// Bits reserved for the key type below the partition id
const PARTITION_OFFSET: u32 = 8;

/// Largest partition id the item can carry
pub const MAX_PARTITION_ID: PartitionId = (1 << (32 - PARTITION_OFFSET)) - 1;

/// Length of the partition/key-type item
pub const ITEM_LEN: usize = 4;

/// Length of a vertex row key
pub const VERTEX_KEY_LEN: usize = ITEM_LEN + 8 + 4 + 8;

/// Length of an edge row key
pub const EDGE_KEY_LEN: usize = ITEM_LEN + 8 + 4 + 8 + 8 + 8;

// Value tags inside encoded index values
const VAL_NULL: u8 = 0x00;
const VAL_BOOL: u8 = 0x01;
const VAL_INT: u8 = 0x02;
const VAL_DOUBLE: u8 = 0x03;
const VAL_STRING: u8 = 0x04;

/// Ids above `MAX_PARTITION_ID` lose their high bits; callers reject them first.
fn item(part: PartitionId, key_type: u8) -> [u8; ITEM_LEN] {
    debug_assert!(part <= MAX_PARTITION_ID);
    ((part << PARTITION_OFFSET) | key_type as u32).to_be_bytes()
}

fn read_u32(key: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(key.get(at..at + 4)?.try_into().ok()?))
}

fn read_i32(key: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_be_bytes(key.get(at..at + 4)?.try_into().ok()?))
}

fn read_i64(key: &[u8], at: usize) -> Option<i64> {
    Some(i64::from_be_bytes(key.get(at..at + 8)?.try_into().ok()?))
}

/// Decode the leading item into (partition, key_type)
fn read_item(key: &[u8]) -> Option<(PartitionId, u8)> {
    let item = read_u32(key, 0)?;
    Some((item >> PARTITION_OFFSET, (item & 0xff) as u8))
}

/// Prefix of all data rows in a partition
pub fn part_prefix(part: PartitionId) -> Vec<u8> {
    item(part, KEY_TYPE_DATA).to_vec()
}

/// Prefix of all entries of one index in a partition
pub fn index_prefix(part: PartitionId, index_id: IndexId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ITEM_LEN + 4);
    key.extend_from_slice(&item(part, KEY_TYPE_INDEX));
    key.extend_from_slice(&index_id.to_be_bytes());
    key
}

/// Check whether a raw key has the shape of a vertex row
pub fn is_vertex_key(key: &[u8]) -> bool {
    key.len() == VERTEX_KEY_LEN && matches!(read_item(key), Some((_, KEY_TYPE_DATA)))
}

/// Check whether a raw key has the shape of an edge row
pub fn is_edge_key(key: &[u8]) -> bool {
    key.len() == EDGE_KEY_LEN && matches!(read_item(key), Some((_, KEY_TYPE_DATA)))
}

/// Decoded vertex row key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexKey {
    pub part: PartitionId,
    pub vertex_id: VertexId,
    pub tag_id: TagId,
    pub version: i64,
}

impl VertexKey {
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(VERTEX_KEY_LEN);
        key.extend_from_slice(&item(self.part, KEY_TYPE_DATA));
        key.extend_from_slice(&self.vertex_id.to_be_bytes());
        key.extend_from_slice(&self.tag_id.to_be_bytes());
        key.extend_from_slice(&self.version.to_be_bytes());
        key
    }

    /// Decode a vertex row key; `None` if the key is not one
    pub fn decode(key: &[u8]) -> Option<Self> {
        if !is_vertex_key(key) {
            return None;
        }
        let (part, _) = read_item(key)?;
        Some(Self {
            part,
            vertex_id: read_i64(key, 4)?,
            tag_id: read_i32(key, 12)?,
            version: read_i64(key, 16)?,
        })
    }
}

/// Decoded edge row key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeKey {
    pub part: PartitionId,
    pub src: VertexId,
    pub edge_type: EdgeType,
    pub rank: EdgeRanking,
    pub dst: VertexId,
    pub version: i64,
}

impl EdgeKey {
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(EDGE_KEY_LEN);
        key.extend_from_slice(&item(self.part, KEY_TYPE_DATA));
        self.encode_descriptor(&mut key);
        key.extend_from_slice(&self.version.to_be_bytes());
        key
    }

    /// Decode an edge row key; `None` if the key is not one
    pub fn decode(key: &[u8]) -> Option<Self> {
        if !is_edge_key(key) {
            return None;
        }
        let (part, _) = read_item(key)?;
        Some(Self {
            part,
            src: read_i64(key, 4)?,
            edge_type: read_i32(key, 12)?,
            rank: read_i64(key, 16)?,
            dst: read_i64(key, 24)?,
            version: read_i64(key, 32)?,
        })
    }

    fn encode_descriptor(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.src.to_be_bytes());
        buf.extend_from_slice(&self.edge_type.to_be_bytes());
        buf.extend_from_slice(&self.rank.to_be_bytes());
        buf.extend_from_slice(&self.dst.to_be_bytes());
    }
}

/// Build the index key of a vertex row
pub fn vertex_index_key(
    part: PartitionId,
    index_id: IndexId,
    vertex_id: VertexId,
    version: i64,
    values: &[u8],
) -> Vec<u8> {
    let mut key = index_prefix(part, index_id);
    key.reserve(16 + values.len());
    key.extend_from_slice(&vertex_id.to_be_bytes());
    key.extend_from_slice(&version.to_be_bytes());
    key.extend_from_slice(values);
    key
}

/// Build the index key of an edge row
///
/// `edge.part` is ignored in favour of `part`.
pub fn edge_index_key(part: PartitionId, index_id: IndexId, edge: &EdgeKey, values: &[u8]) -> Vec<u8> {
    let mut key = index_prefix(part, index_id);
    key.reserve(36 + values.len());
    edge.encode_descriptor(&mut key);
    key.extend_from_slice(&edge.version.to_be_bytes());
    key.extend_from_slice(values);
    key
}

/// Decoded vertex index key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexIndexKey<'a> {
    pub part: PartitionId,
    pub index_id: IndexId,
    pub vertex_id: VertexId,
    pub version: i64,
    pub values: &'a [u8],
}

impl<'a> VertexIndexKey<'a> {
    pub fn decode(key: &'a [u8]) -> Option<Self> {
        let (part, key_type) = read_item(key)?;
        if key_type != KEY_TYPE_INDEX {
            return None;
        }
        Some(Self {
            part,
            index_id: read_u32(key, 4)?,
            vertex_id: read_i64(key, 8)?,
            version: read_i64(key, 16)?,
            values: key.get(24..)?,
        })
    }
}

/// Decoded edge index key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeIndexKey<'a> {
    pub part: PartitionId,
    pub index_id: IndexId,
    pub src: VertexId,
    pub edge_type: EdgeType,
    pub rank: EdgeRanking,
    pub dst: VertexId,
    pub version: i64,
    pub values: &'a [u8],
}

impl<'a> EdgeIndexKey<'a> {
    pub fn decode(key: &'a [u8]) -> Option<Self> {
        let (part, key_type) = read_item(key)?;
        if key_type != KEY_TYPE_INDEX {
            return None;
        }
        Some(Self {
            part,
            index_id: read_u32(key, 4)?,
            src: read_i64(key, 8)?,
            edge_type: read_i32(key, 16)?,
            rank: read_i64(key, 20)?,
            dst: read_i64(key, 28)?,
            version: read_i64(key, 36)?,
            values: key.get(44..)?,
        })
    }
}

/// Append one property value in order-preserving form
///
/// Strings escape `0x00` as `0x00 0xff` and end with `0x00 0x00`, so a string
/// sorts before every longer string it prefixes.
pub fn encode_index_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(VAL_NULL),
        Value::Bool(b) => {
            buf.push(VAL_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(VAL_INT);
            buf.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
        }
        Value::Double(d) => {
            buf.push(VAL_DOUBLE);
            let bits = d.to_bits();
            // Negative floats sort in reverse, so flip every bit for them
            let ordered = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
            buf.extend_from_slice(&ordered.to_be_bytes());
        }
        Value::String(s) => {
            buf.push(VAL_STRING);
            for &b in s.as_bytes() {
                buf.push(b);
                if b == 0 {
                    buf.push(0xff);
                }
            }
            buf.extend_from_slice(&[0, 0]);
        }
    }
}

/// Encode property values in index-field order
pub fn encode_index_values(values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    for value in values {
        encode_index_value(&mut buf, value);
    }
    buf
}
