//! Recursive schema flattening.
//!
//! Walks an object's fields in declaration order and turns every leaf into
//! one column. Nested objects are expanded into `parent_child` columns while
//! depth remains; once depth is exhausted an object collapses into a single
//! JSON column. Arrays are never expanded.
//!
//! Depth is consumed per level of object nesting, not per field: with
//! `depth = 2` the root's object fields and their object fields expand, and
//! the third level is stored as JSON.
//!
//! # Example
//!
//! ```
//! use tableshape_core::{Dialect, SchemaNode, Storage, flatten};
//!
//! let schema = SchemaNode::object([
//!     ("id", SchemaNode::string()),
//!     ("profile", SchemaNode::object([
//!         ("firstName", SchemaNode::string()),
//!         ("address", SchemaNode::object([
//!             ("city", SchemaNode::string()),
//!             ("country", SchemaNode::object([("code", SchemaNode::string())])),
//!         ])),
//!     ])),
//! ]);
//!
//! let columns = flatten(schema.as_object().unwrap(), 2, Dialect::Postgres);
//! let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
//! assert_eq!(names, ["id", "profile_firstName", "profile_address_city", "profile_address_country"]);
//! assert_eq!(columns[3].storage, Storage::Json);
//! assert_eq!(columns[3].sql_type, "JSONB");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialect::Dialect;
use crate::typemap::map_primitive;
use crate::types::{Fields, Shape};

/// Separator between path segments in flattened column names.
pub const PATH_SEPARATOR: &str = "_";

/// How a column's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    /// A single scalar value.
    Scalar,
    /// A JSON-serialized array or object.
    Json,
}

/// One column produced by [`flatten`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatColumn {
    /// Column name: `path` joined with [`PATH_SEPARATOR`].
    pub name: String,
    /// Field names from the root object down to this column.
    pub path: Vec<String>,
    /// Mapped SQL type.
    pub sql_type: &'static str,
    /// Scalar or JSON storage.
    pub storage: Storage,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value for scalar columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Flattens `fields` into an ordered column list.
///
/// A field is nullable when it, or any flattened object above it, carries an
/// `Optional` or `Nullable` layer. A `Default` on an expanded object is
/// pushed down to its children by field name; JSON columns never carry a
/// default.
pub fn flatten(fields: &Fields, depth: usize, dialect: Dialect) -> Vec<FlatColumn> {
    let mut columns = Vec::new();
    let mut path = Vec::new();
    walk(fields, &mut path, depth, false, None, dialect, &mut columns);
    columns
}

fn walk(
    fields: &Fields,
    path: &mut Vec<String>,
    depth: usize,
    parent_nullable: bool,
    parent_default: Option<&Map<String, Value>>,
    dialect: Dialect,
    out: &mut Vec<FlatColumn>,
) {
    for (name, node) in fields.iter() {
        let unwrapped = node.unwrap_modifiers();
        let nullable = parent_nullable || unwrapped.nullable;
        let default = unwrapped
            .default
            .or_else(|| parent_default.and_then(|d| d.get(name)));

        path.push(name.to_string());
        match unwrapped.shape {
            Shape::Object(children) if depth > 0 => {
                let nested_default = default.and_then(Value::as_object);
                walk(children, path, depth - 1, nullable, nested_default, dialect, out);
            }
            Shape::Object(_) | Shape::Array(_) => out.push(FlatColumn {
                name: path.join(PATH_SEPARATOR),
                path: path.clone(),
                sql_type: dialect.json_type(),
                storage: Storage::Json,
                nullable,
                default: None,
            }),
            Shape::Primitive(primitive) => out.push(FlatColumn {
                name: path.join(PATH_SEPARATOR),
                path: path.clone(),
                sql_type: map_primitive(primitive, dialect),
                storage: Storage::Scalar,
                nullable,
                default: default.filter(|v| !v.is_null()).cloned(),
            }),
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaNode;
    use serde_json::json;

    /// Object nested `levels` deep: `l1 { l2 { ... { leaf } } }`.
    fn nested(levels: usize) -> SchemaNode {
        let mut node = SchemaNode::object([("leaf", SchemaNode::string())]);
        for level in (1..=levels).rev() {
            node = SchemaNode::object([(format!("l{level}"), node)]);
        }
        node
    }

    fn names(columns: &[FlatColumn]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_depth_zero_collapses_every_object() {
        let schema = nested(5);
        let columns = flatten(schema.as_object().unwrap(), 0, Dialect::Sqlite);
        assert_eq!(names(&columns), ["l1"]);
        assert_eq!(columns[0].storage, Storage::Json);
    }

    #[test]
    fn test_depth_n_expands_n_levels() {
        let schema = nested(5);
        let columns = flatten(schema.as_object().unwrap(), 2, Dialect::Sqlite);
        assert_eq!(names(&columns), ["l1_l2_l3"]);
        assert_eq!(columns[0].storage, Storage::Json);
        assert_eq!(columns[0].path, ["l1", "l2", "l3"]);
    }

    #[test]
    fn test_depth_beyond_nesting_expands_everything() {
        let schema = nested(5);
        let columns = flatten(schema.as_object().unwrap(), 5, Dialect::Sqlite);
        assert_eq!(names(&columns), ["l1_l2_l3_l4_l5_leaf"]);
        assert_eq!(columns[0].storage, Storage::Scalar);
    }

    #[test]
    fn test_arrays_are_never_expanded() {
        let schema = SchemaNode::object([(
            "items",
            SchemaNode::array(SchemaNode::object([("sku", SchemaNode::string())])),
        )]);
        let columns = flatten(schema.as_object().unwrap(), 10, Dialect::Mysql);
        assert_eq!(names(&columns), ["items"]);
        assert_eq!(columns[0].sql_type, "JSON");
    }

    #[test]
    fn test_nullability_per_wrapper() {
        let schema = SchemaNode::object([
            ("required", SchemaNode::string()),
            ("optional", SchemaNode::string().optional()),
            ("nullable", SchemaNode::string().nullable()),
            ("defaulted", SchemaNode::string().with_default(json!("x"))),
        ]);
        let columns = flatten(schema.as_object().unwrap(), 2, Dialect::Sqlite);
        let nullable: Vec<bool> = columns.iter().map(|c| c.nullable).collect();
        assert_eq!(nullable, [false, true, true, false]);
        assert_eq!(columns[3].default, Some(json!("x")));
    }

    #[test]
    fn test_children_of_optional_object_are_nullable() {
        let schema = SchemaNode::object([(
            "address",
            SchemaNode::object([("city", SchemaNode::string())]).optional(),
        )]);
        let columns = flatten(schema.as_object().unwrap(), 1, Dialect::Sqlite);
        assert_eq!(names(&columns), ["address_city"]);
        assert!(columns[0].nullable);
    }

    #[test]
    fn test_object_default_pushed_down() {
        let schema = SchemaNode::object([(
            "prefs",
            SchemaNode::object([
                ("theme", SchemaNode::string()),
                ("volume", SchemaNode::integer()),
            ])
            .with_default(json!({ "theme": "dark" })),
        )]);
        let columns = flatten(schema.as_object().unwrap(), 1, Dialect::Sqlite);
        assert_eq!(columns[0].default, Some(json!("dark")));
        assert_eq!(columns[1].default, None);
    }

    #[test]
    fn test_json_column_drops_default() {
        let schema = SchemaNode::object([(
            "tags",
            SchemaNode::array(SchemaNode::string()).with_default(json!([])),
        )]);
        let columns = flatten(schema.as_object().unwrap(), 2, Dialect::Sqlite);
        assert_eq!(columns[0].default, None);
    }

    #[test]
    fn test_output_is_deterministic() {
        let schema = nested(3);
        let fields = schema.as_object().unwrap();
        assert_eq!(
            flatten(fields, 2, Dialect::Postgres),
            flatten(fields, 2, Dialect::Postgres)
        );
    }
}
