//! Conversion between JSON values and SQLite values.
//!
//! Booleans are stored as integers, arrays and objects as JSON text.
//! Blobs read back as a one-key object `{"$blob": "<hex>"}`, which binds
//! back to the same blob, so rows survive a read/write cycle unchanged.
//! Non-finite reals read back as `null`.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};
use tableshape_core::Row;

use crate::error::{Result, SqliteError};

/// Key of the object a blob value is read into.
pub const BLOB_KEY: &str = "$blob";

/// Converts a JSON value into an owned SQLite value for binding.
///
/// # Errors
///
/// [`SqliteError::ConversionError`] for integers outside the `i64` range,
/// which SQLite cannot store without losing precision.
pub(crate) fn to_sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => SqlValue::Integer(i),
            (None, Some(u), _) => {
                return Err(SqliteError::ConversionError(format!(
                    "integer {u} exceeds the 64-bit signed range"
                )));
            }
            (None, None, Some(f)) => SqlValue::Real(f),
            (None, None, None) => SqlValue::Null,
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Object(map) => match blob_bytes(map) {
            Some(bytes) => SqlValue::Blob(bytes),
            None => SqlValue::Text(value.to_string()),
        },
        Value::Array(_) => SqlValue::Text(value.to_string()),
    })
}

/// Decodes a `{"$blob": "<hex>"}` object. Anything else is ordinary JSON.
fn blob_bytes(map: &Map<String, Value>) -> Option<Vec<u8>> {
    if map.len() != 1 {
        return None;
    }
    map.get(BLOB_KEY)
        .and_then(Value::as_str)
        .and_then(|encoded| hex::decode(encoded).ok())
}

/// Converts a borrowed SQLite column value into JSON.
pub(crate) fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            let mut map = Map::with_capacity(1);
            map.insert(BLOB_KEY.to_string(), Value::String(hex::encode(bytes)));
            Value::Object(map)
        }
    }
}

/// Reads one result row into a column-name keyed map.
pub(crate) fn row_to_map(row: &rusqlite::Row<'_>, names: &[String]) -> Result<Row> {
    let mut map = Map::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        map.insert(name.clone(), from_sql_value(row.get_ref(i)?));
    }
    Ok(map)
}
