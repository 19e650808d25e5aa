//! Row value encoding and schema-aware decoding
//!
//! Value format: `[schema_ver:i64 LE][num_cols:u16 LE][datum...]`
//! Each datum: `[tag:u8][data...]`

use std::sync::Arc;

use super::{Schema, SchemaError, SchemaManager, SchemaResult};
use crate::types::{EntityType, SchemaVer, SpaceId};

/// Length of the schema version header
const VERSION_LEN: usize = 8;

// Datum type tags
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_STRING: u8 = 4;

/// A single property value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

/// Encode a row value written under `version`
pub fn encode_row(version: SchemaVer, values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VERSION_LEN + 2 + values.len() * 9);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&(values.len() as u16).to_le_bytes());
    for value in values {
        encode_datum(&mut buf, value);
    }
    buf
}

fn encode_datum(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Double(d) => {
            buf.push(TAG_DOUBLE);
            buf.extend_from_slice(&d.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

fn decode_err(msg: impl Into<String>) -> SchemaError {
    SchemaError::Decode(msg.into())
}

fn read_array<const N: usize>(data: &[u8], at: usize) -> SchemaResult<[u8; N]> {
    data.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| decode_err("unexpected end of row"))
}

/// Decode one datum, returning it with the bytes consumed
fn decode_datum(data: &[u8]) -> SchemaResult<(Value, usize)> {
    let tag = *data.first().ok_or_else(|| decode_err("unexpected end of datum"))?;
    match tag {
        TAG_NULL => Ok((Value::Null, 1)),
        TAG_BOOL => {
            let [b] = read_array::<1>(data, 1)?;
            Ok((Value::Bool(b != 0), 2))
        }
        TAG_INT => Ok((Value::Int(i64::from_le_bytes(read_array(data, 1)?)), 9)),
        TAG_DOUBLE => Ok((Value::Double(f64::from_le_bytes(read_array(data, 1)?)), 9)),
        TAG_STRING => {
            let len = u32::from_le_bytes(read_array(data, 1)?) as usize;
            let bytes = data
                .get(5..5 + len)
                .ok_or_else(|| decode_err("string data too short"))?;
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|_| decode_err("invalid utf8 in string"))?;
            Ok((Value::String(s), 5 + len))
        }
        _ => Err(decode_err(format!("unknown datum tag: {}", tag))),
    }
}

/// Schema version a raw row was written under
pub fn row_schema_ver(data: &[u8]) -> SchemaResult<SchemaVer> {
    Ok(i64::from_le_bytes(read_array(data, 0)?))
}

/// Property reader bound to one raw row value
///
/// Decoding is driven by the schema version recorded in the row, so columns
/// are resolved by name against the layout the row was written with.
#[derive(Debug)]
pub struct RowReader {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl RowReader {
    /// Decode `data` as a row of `entity` in `space`
    pub fn new(
        schema_man: &dyn SchemaManager,
        data: &[u8],
        space: SpaceId,
        entity: EntityType,
    ) -> SchemaResult<Self> {
        let version = row_schema_ver(data)?;
        let schema = schema_man.schema(space, entity, version)?;
        Self::with_schema(schema, data)
    }

    /// Decode `data` against a known schema
    pub fn with_schema(schema: Arc<Schema>, data: &[u8]) -> SchemaResult<Self> {
        let version = row_schema_ver(data)?;
        if version != schema.version {
            return Err(decode_err(format!(
                "row version {} does not match schema version {}",
                version, schema.version
            )));
        }

        let num_cols = u16::from_le_bytes(read_array(data, VERSION_LEN)?) as usize;
        if num_cols != schema.props.len() {
            return Err(decode_err(format!(
                "row has {} columns, schema version {} has {}",
                num_cols,
                schema.version,
                schema.props.len()
            )));
        }

        let mut offset = VERSION_LEN + 2;
        let mut values = Vec::with_capacity(num_cols);
        for prop in &schema.props {
            let rest = data.get(offset..).unwrap_or_default();
            let (value, consumed) = decode_datum(rest)?;
            if !prop.prop_type.accepts(&value) {
                return Err(decode_err(format!(
                    "value {:?} does not fit property {} of type {:?}",
                    value, prop.name, prop.prop_type
                )));
            }
            values.push(value);
            offset += consumed;
        }

        Ok(Self { schema, values })
    }

    /// Schema version the row was written under
    pub fn schema_ver(&self) -> SchemaVer {
        self.schema.version
    }

    /// Property value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.prop_index(name).and_then(|i| self.values.get(i))
    }
}
