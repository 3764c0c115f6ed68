//! Schema-to-table derivation.
//!
//! This crate turns declarative data-shape descriptions into relational
//! table definitions for SQLite, PostgreSQL and MySQL:
//!
//! - [`SchemaNode`]: closed recursive description of a document shape
//!   (primitives, objects, arrays, and optional/nullable/default wrappers).
//! - [`TableOptions`]: dialect, primary key, indexes, flatten depth, extra
//!   columns, timestamps and auto-ID settings.
//! - [`flatten`]: recursive walk that expands nested objects into
//!   `parent_child` columns up to the flatten depth, with JSON fallback.
//! - [`derive_structure`]: the full ordered [`TableStructure`], validated.
//! - [`generate_ddl`]: `CREATE TABLE` and `CREATE INDEX` statements.
//! - [`flatten_row`] / [`unflatten_row`]: document to row and back, driven
//!   by the column paths recorded in the structure.
//! - [`insert_statement`], [`update_statement`], [`SelectBuilder`]:
//!   parameterized statements with dialect placeholders.
//!
//! Everything here is pure: no I/O, no shared state.
//!
//! # Example
//!
//! ```
//! use tableshape_core::*;
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
//! let options = TableOptions::new(Dialect::Postgres).with_primary_key("id");
//! let structure = derive_structure(&schema, &options).unwrap();
//! assert_eq!(
//!     structure.column_names(),
//!     ["id", "profile_firstName", "profile_address_city", "profile_address_country"]
//! );
//! assert_eq!(structure.column("profile_address_country").unwrap().sql_type, "JSONB");
//!
//! let ddl = generate_ddl("users", &schema, &options).unwrap();
//! assert!(ddl.create_table.starts_with("CREATE TABLE IF NOT EXISTS \"users\""));
//! ```

mod ddl;
mod dialect;
mod error;
mod flatten;
mod options;
mod row;
mod statement;
mod structure;
mod typemap;
mod types;
mod validate;

pub use ddl::{
    DdlStatements, generate_ddl, render_add_column, render_column, render_create_table,
    render_ddl, render_drop_table, render_indexes,
};
pub use dialect::Dialect;
pub use error::{Result, SchemaError};
pub use flatten::{FlatColumn, PATH_SEPARATOR, Storage, flatten};
pub use options::{
    AutoId, AutoIdKind, ColumnPosition, DEFAULT_FLATTEN_DEPTH, ExtraColumn, ForeignKey,
    PrimaryKey, ReferentialAction, TableOptions,
};
pub use row::{Row, flatten_row, flatten_row_with, unflatten_row};
pub use statement::{Order, SelectBuilder, Statement, insert_statement, update_statement};
pub use structure::{
    ColumnDefinition, ColumnOrigin, ForeignKeyConstraint, TableStructure, TimestampKind,
    derive_structure, flatten_schema,
};
pub use typemap::{map_node, map_primitive};
pub use types::*;
pub use validate::{ValidationError, validate_identifier, validate_structure};
