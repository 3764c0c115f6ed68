//! Row conversion between nested documents and flat table rows.
//!
//! Both directions are driven by the derived [`TableStructure`]: every
//! schema column stores the field path it came from, so a nested document
//! is flattened by walking each column's path, and a flat row is rebuilt by
//! writing each column back at its path.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tableshape_core::*;
//!
//! let schema = SchemaNode::object([
//!     ("id", SchemaNode::string()),
//!     ("profile", SchemaNode::object([
//!         ("name", SchemaNode::string()),
//!         ("tags", SchemaNode::array(SchemaNode::string())),
//!     ])),
//! ]);
//! let options = TableOptions::default();
//!
//! let doc = json!({ "id": "u1", "profile": { "name": "Ada", "tags": ["x"] } });
//! let flat = flatten_row(doc.as_object().unwrap(), &schema, &options).unwrap();
//! assert_eq!(flat["profile_name"], json!("Ada"));
//! assert_eq!(flat["profile_tags"], json!("[\"x\"]"));
//!
//! let structure = derive_structure(&schema, &options).unwrap();
//! assert_eq!(unflatten_row(&flat, &structure), doc);
//! ```

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::flatten::Storage;
use crate::options::TableOptions;
use crate::structure::{ColumnOrigin, TableStructure, derive_structure};
use crate::types::SchemaNode;

/// Flat row keyed by column name.
pub type Row = Map<String, Value>;

/// Flattens a nested document into column values for `schema`.
///
/// Fields absent from `data` are omitted so column defaults apply. An
/// explicit `null` on a flattened object sets all of its columns to `null`.
/// Arrays and objects landing in a single column are JSON-encoded. Keys
/// naming auto-ID, timestamp or extra columns are passed through; any other
/// key the structure does not know is dropped.
pub fn flatten_row(data: &Map<String, Value>, schema: &SchemaNode, options: &TableOptions) -> Result<Row> {
    let structure = derive_structure(schema, options)?;
    Ok(flatten_row_with(data, &structure))
}

/// Like [`flatten_row`] but for an already derived structure.
pub fn flatten_row_with(data: &Map<String, Value>, structure: &TableStructure) -> Row {
    let mut row = Row::new();

    for column in &structure.columns {
        match &column.origin {
            ColumnOrigin::Schema { path, storage } => {
                let Some(value) = lookup(data, path, &column.name) else {
                    continue;
                };
                let value = match (storage, value) {
                    (_, Value::Null) => Value::Null,
                    (Storage::Json, v) => Value::String(v.to_string()),
                    (Storage::Scalar, v @ (Value::Array(_) | Value::Object(_))) => {
                        Value::String(v.to_string())
                    }
                    (Storage::Scalar, v) => v.clone(),
                };
                row.insert(column.name.clone(), value);
            }
            _ => {
                if let Some(value) = data.get(&column.name) {
                    row.insert(column.name.clone(), value.clone());
                }
            }
        }
    }

    for key in data.keys() {
        if !row.contains_key(key) && !is_schema_root(structure, key) {
            debug!(key = %key, "dropping key with no matching column");
        }
    }

    row
}

/// Rebuilds a nested document from a flat row.
///
/// JSON-stored columns are decoded, and `0`/`1` in `BOOLEAN` columns become
/// booleans. `null` values below the top level are omitted. Row keys the
/// structure does not know are ignored.
pub fn unflatten_row(row: &Map<String, Value>, structure: &TableStructure) -> Value {
    let mut doc = Map::new();

    for column in &structure.columns {
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        match &column.origin {
            ColumnOrigin::Schema { path, storage } => {
                let value = decode(value, *storage, &column.sql_type);
                if value.is_null() && path.len() > 1 {
                    continue;
                }
                insert_at(&mut doc, path, value);
            }
            _ => {
                doc.insert(column.name.clone(), value.clone());
            }
        }
    }

    Value::Object(doc)
}

fn is_schema_root(structure: &TableStructure, key: &str) -> bool {
    structure.columns.iter().any(|c| match &c.origin {
        ColumnOrigin::Schema { path, .. } => path.first().is_some_and(|root| root == key),
        _ => false,
    })
}

/// Walks `path` through `data`.
///
/// Returns `None` when a segment is missing, `Some(Null)` when an ancestor
/// is explicitly null.
fn lookup<'a>(data: &'a Map<String, Value>, path: &[String], column: &str) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut current = data;
    for segment in parents {
        match current.get(segment)? {
            Value::Object(child) => current = child,
            null @ Value::Null => return Some(null),
            other => {
                warn!(
                    column = %column,
                    field = %segment,
                    value = %other,
                    "expected an object for flattened field, dropping value"
                );
                return None;
            }
        }
    }
    current.get(last)
}

fn decode(value: &Value, storage: Storage, sql_type: &str) -> Value {
    match (storage, value) {
        (Storage::Json, Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| value.clone())
        }
        (Storage::Scalar, Value::Number(n)) if sql_type.eq_ignore_ascii_case("BOOLEAN") => {
            match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => value.clone(),
            }
        }
        _ => value.clone(),
    }
}

fn insert_at(doc: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        current = child;
    }
    current.insert(last.clone(), value);
}
