//! Primitive-to-SQL type mapping.
//!
//! | kind | sqlite | postgres | mysql |
//! |---|---|---|---|
//! | integer | `INTEGER` | `INTEGER` | `INT` |
//! | number | `REAL` | `DOUBLE PRECISION` | `DOUBLE` |
//! | string, enum | `TEXT` | `TEXT` | `TEXT` |
//! | datetime string, date | `TEXT` | `TIMESTAMP WITH TIME ZONE` | `DATETIME` |
//! | boolean | `BOOLEAN` | `BOOLEAN` | `BOOLEAN` |
//! | array, object | `TEXT` | `JSONB` | `JSON` |
//! | any, unknown | `TEXT` | `TEXT` | `TEXT` |

use crate::dialect::Dialect;
use crate::types::{Primitive, SchemaNode, Shape, StringFormat};

/// Maps a primitive to its SQL type in `dialect`. Never fails.
pub fn map_primitive(primitive: &Primitive, dialect: Dialect) -> &'static str {
    match primitive {
        Primitive::Integer => match dialect {
            Dialect::Sqlite | Dialect::Postgres => "INTEGER",
            Dialect::Mysql => "INT",
        },
        Primitive::Number => match dialect {
            Dialect::Sqlite => "REAL",
            Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::Mysql => "DOUBLE",
        },
        Primitive::String(Some(StringFormat::DateTime)) | Primitive::Date => {
            dialect.datetime_type()
        }
        Primitive::String(_) | Primitive::Enum(_) => "TEXT",
        Primitive::Boolean => "BOOLEAN",
        // Permissive fallback for untyped and unrecognized kinds.
        Primitive::Any | Primitive::Unknown => "TEXT",
    }
}

/// Maps any node to a single-column SQL type: primitives through
/// [`map_primitive`], objects and arrays to the dialect's JSON type.
pub fn map_node(node: &SchemaNode, dialect: Dialect) -> &'static str {
    match node.unwrap_modifiers().shape {
        Shape::Primitive(p) => map_primitive(p, dialect),
        Shape::Object(_) | Shape::Array(_) => dialect.json_type(),
    }
}
