//! Records and the fixed-width frame codec
//!
//! A record maps column names to values; on disk it becomes one frame
//! whose layout is fixed by the table schema: fields appear in schema
//! order with widths of 4 (INT), 4 (FLOAT), 1 (BOOL), `n` (CHAR(n)), and
//! 4 + `n` (STRING(n), a length prefix ahead of the content bytes).
//! Numbers are written host-native; files are not portable across hosts.

use crate::catalog::{Column, DataType, TableSchema};
use crate::error::{Error, Result};
use crate::storage::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// A row: column name to value.
///
/// Insertion order is irrelevant; serialization follows the schema's
/// column order and fills missing fields with typed zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Check if a field is present
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no fields are present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in column-name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Overlay every field of `other` onto this record
    pub fn merge(&mut self, other: &Record) {
        for (column, value) in other.iter() {
            self.fields.insert(column.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// The typed zero written for a field the record does not supply.
pub fn default_value(data_type: DataType) -> Value {
    match data_type {
        DataType::Int => Value::Int(0),
        DataType::Float => Value::Float(0.0),
        DataType::Str(_) | DataType::Char(_) => Value::Str(String::new()),
        DataType::Bool => Value::Bool(false),
    }
}

/// Encode one record as a frame in schema column order.
///
/// A present value of the wrong type for its column is an error; the
/// caller's state is untouched because nothing has been written yet.
pub fn encode(record: &Record, schema: &TableSchema) -> Result<Vec<u8>> {
    let mut frame = Vec::with_capacity(schema.row_width());
    for column in &schema.columns {
        match record.get(&column.name) {
            Some(value) => encode_field(&mut frame, value, column)?,
            None => encode_field(&mut frame, &default_value(column.data_type), column)?,
        }
    }
    Ok(frame)
}

fn encode_field(frame: &mut Vec<u8>, value: &Value, column: &Column) -> Result<()> {
    match (column.data_type, value) {
        (DataType::Int, Value::Int(v)) => frame.extend_from_slice(&v.to_ne_bytes()),
        (DataType::Float, Value::Float(v)) => frame.extend_from_slice(&v.to_ne_bytes()),
        (DataType::Str(length), Value::Str(s)) => {
            frame.extend_from_slice(&(length as i32).to_ne_bytes());
            frame.extend_from_slice(&fit_to_length(s, length));
        }
        (DataType::Char(length), Value::Str(s)) => {
            frame.extend_from_slice(&fit_to_length(s, length));
        }
        (DataType::Bool, Value::Bool(v)) => frame.push(u8::from(*v)),
        _ => return Err(Error::TypeMismatch(column.name.clone())),
    }
    Ok(())
}

/// Truncate to the declared length on a char boundary, then pad with NULs.
fn fit_to_length(s: &str, length: usize) -> Vec<u8> {
    let mut end = s.len().min(length);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut bytes = s.as_bytes()[..end].to_vec();
    bytes.resize(length, 0);
    bytes
}

/// Decode one record frame from `reader`.
///
/// A short read mid-record means the data file is corrupt or truncated
/// and fails the whole scan.
pub fn decode(reader: &mut impl Read, schema: &TableSchema) -> Result<Record> {
    let mut record = Record::new();
    for column in &schema.columns {
        let value = decode_field(reader, column, &schema.name)?;
        record.set(column.name.clone(), value);
    }
    Ok(record)
}

fn decode_field(reader: &mut impl Read, column: &Column, table: &str) -> Result<Value> {
    match column.data_type {
        DataType::Int => {
            let mut buf = [0u8; 4];
            read_frame_bytes(reader, &mut buf, table)?;
            Ok(Value::Int(i32::from_ne_bytes(buf)))
        }
        DataType::Float => {
            let mut buf = [0u8; 4];
            read_frame_bytes(reader, &mut buf, table)?;
            Ok(Value::Float(f32::from_ne_bytes(buf)))
        }
        DataType::Str(length) => {
            let mut prefix = [0u8; 4];
            read_frame_bytes(reader, &mut prefix, table)?;
            let stored = i32::from_ne_bytes(prefix);
            if stored < 0 {
                return Err(Error::CorruptTable(table.to_string()));
            }
            // The field slot is always `length` bytes; the prefix only
            // bounds the content portion.
            let mut bytes = vec![0u8; length];
            read_frame_bytes(reader, &mut bytes, table)?;
            bytes.truncate((stored as usize).min(length));
            Ok(Value::Str(bytes_to_string(bytes, table)?))
        }
        DataType::Char(length) => {
            let mut bytes = vec![0u8; length];
            read_frame_bytes(reader, &mut bytes, table)?;
            Ok(Value::Str(bytes_to_string(bytes, table)?))
        }
        DataType::Bool => {
            let mut buf = [0u8; 1];
            read_frame_bytes(reader, &mut buf, table)?;
            Ok(Value::Bool(buf[0] != 0))
        }
    }
}

fn read_frame_bytes(reader: &mut impl Read, buf: &mut [u8], table: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::CorruptTable(table.to_string())
        } else {
            Error::Io(e)
        }
    })
}

fn bytes_to_string(mut bytes: Vec<u8>, table: &str) -> Result<String> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| Error::CorruptTable(table.to_string()))
}
