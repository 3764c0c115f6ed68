//! Table structure derivation.
//!
//! [`derive_structure`] combines the flattened schema columns with the
//! columns requested by [`TableOptions`] in a fixed order:
//!
//! 1. auto-ID column
//! 2. `created_at`, `updated_at`
//! 3. extra columns positioned at the start, in caller order
//! 4. flattened schema columns
//! 5. remaining extra columns, in caller order
//!
//! The result is validated before it is returned, so every structure handed
//! out has unique, well-formed column names and indexes that reference
//! existing columns.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::flatten::{FlatColumn, Storage, flatten};
use crate::options::{AutoId, AutoIdKind, ColumnPosition, ExtraColumn, ForeignKey, PrimaryKey, TableOptions};
use crate::types::SchemaNode;
use crate::validate::validate_structure;

/// Which timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampKind {
    /// `created_at`
    Created,
    /// `updated_at`
    Updated,
}

impl TimestampKind {
    /// Column name.
    pub fn column_name(self) -> &'static str {
        match self {
            TimestampKind::Created => "created_at",
            TimestampKind::Updated => "updated_at",
        }
    }
}

/// Where a derived column came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnOrigin {
    /// The synthetic ID column.
    AutoId { id_kind: AutoIdKind },
    /// A timestamp column.
    Timestamp { timestamp: TimestampKind },
    /// A caller-supplied extra column.
    Extra,
    /// A schema field, with its nesting path from the root object.
    Schema { path: Vec<String>, storage: Storage },
}

impl fmt::Display for ColumnOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnOrigin::AutoId { .. } => f.write_str("the auto-id column"),
            ColumnOrigin::Timestamp { timestamp } => {
                write!(f, "the {} timestamp", timestamp.column_name())
            }
            ColumnOrigin::Extra => f.write_str("an extra column"),
            ColumnOrigin::Schema { path, .. } => write!(f, "schema field '{}'", path.join(".")),
        }
    }
}

/// A derived column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    /// Raw SQL default expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Rendered inline as `PRIMARY KEY`.
    pub primary_key: bool,
    pub unique: bool,
    pub origin: ColumnOrigin,
}

impl ColumnDefinition {
    /// Returns `true` for columns stored as JSON text.
    pub fn is_json(&self) -> bool {
        matches!(
            self.origin,
            ColumnOrigin::Schema {
                storage: Storage::Json,
                ..
            }
        )
    }
}

/// Table-level foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyConstraint {
    /// Referencing column in this table.
    pub column: String,
    /// Referenced table and column.
    pub references: ForeignKey,
}

/// Complete description of a derived table.
///
/// When exactly one column carries `primary_key`, the key is rendered
/// inline on that column; otherwise a non-empty `primary_keys` list is
/// rendered as a table constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStructure {
    pub columns: Vec<ColumnDefinition>,
    pub primary_keys: Vec<String>,
    pub indexes: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

impl TableStructure {
    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns `true` if the structure has a column named `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Flattened key to SQL type map, in column order.
    pub fn column_types(&self) -> Vec<(&str, &str)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.sql_type.as_str()))
            .collect()
    }

    /// Returns `true` if the primary key is a table-level constraint.
    pub fn has_composite_primary_key(&self) -> bool {
        !self.primary_keys.is_empty() && !self.columns.iter().any(|c| c.primary_key)
    }
}

/// Flattens the root object of `schema` with the options' depth and dialect.
///
/// # Errors
///
/// Returns [`SchemaError::NotAnObject`] if `schema` does not unwrap to an
/// object.
pub fn flatten_schema(schema: &SchemaNode, options: &TableOptions) -> Result<Vec<FlatColumn>> {
    let fields = schema.as_object().ok_or(SchemaError::NotAnObject)?;
    Ok(flatten(fields, options.flatten_depth, options.dialect))
}

/// Derives the full table structure for `schema` under `options`.
///
/// Two calls with equal inputs produce equal structures.
///
/// # Errors
///
/// - [`SchemaError::NotAnObject`] if the root is not an object.
/// - [`SchemaError::ConflictingPrimaryKeys`] if more than one column is
///   individually marked as primary key.
/// - [`SchemaError::InvalidPrimaryKeyReference`] if `options.primary_key`
///   names a column the structure does not have.
/// - [`SchemaError::Validation`] for column collisions, malformed
///   identifiers and indexes over unknown columns.
///
/// # Examples
///
/// ```
/// use tableshape_core::*;
///
/// let schema = SchemaNode::object([
///     ("email", SchemaNode::string()),
///     ("age", SchemaNode::integer().optional()),
/// ]);
/// let options = TableOptions::new(Dialect::Sqlite)
///     .with_auto_id(AutoId::integer("id"))
///     .with_timestamps();
///
/// let structure = derive_structure(&schema, &options).unwrap();
/// assert_eq!(
///     structure.column_names(),
///     ["id", "created_at", "updated_at", "email", "age"]
/// );
/// assert_eq!(structure.primary_keys, ["id"]);
/// ```
pub fn derive_structure(schema: &SchemaNode, options: &TableOptions) -> Result<TableStructure> {
    let dialect = options.dialect;
    let flat = flatten_schema(schema, options)?;

    let mut columns = Vec::with_capacity(flat.len() + options.extra_columns.len() + 3);

    if let Some(auto_id) = &options.auto_id {
        columns.push(auto_id_column(auto_id, dialect));
    }
    if options.timestamps {
        columns.push(timestamp_column(TimestampKind::Created, dialect));
        columns.push(timestamp_column(TimestampKind::Updated, dialect));
    }
    columns.extend(
        options
            .extra_columns
            .iter()
            .filter(|c| c.position == ColumnPosition::Start)
            .map(extra_column),
    );
    columns.extend(flat.into_iter().map(|c| schema_column(c, dialect)));
    columns.extend(
        options
            .extra_columns
            .iter()
            .filter(|c| c.position == ColumnPosition::End)
            .map(extra_column),
    );

    let primary_keys = resolve_primary_key(&mut columns, options.primary_key.as_ref())?;

    let foreign_keys = options
        .extra_columns
        .iter()
        .filter_map(|c| {
            c.foreign_key.as_ref().map(|fk| ForeignKeyConstraint {
                column: c.name.clone(),
                references: fk.clone(),
            })
        })
        .collect();

    let structure = TableStructure {
        columns,
        primary_keys,
        indexes: options.indexes.clone(),
        foreign_keys,
    };

    if let Some(error) = validate_structure(&structure, options.dialect).into_iter().next() {
        return Err(error.into());
    }

    Ok(structure)
}

fn auto_id_column(auto_id: &AutoId, dialect: Dialect) -> ColumnDefinition {
    ColumnDefinition {
        name: auto_id.name.clone(),
        sql_type: dialect.auto_id_type(auto_id.kind).to_string(),
        not_null: true,
        default_value: match auto_id.kind {
            AutoIdKind::Integer => None,
            AutoIdKind::Uuid => Some(dialect.uuid_default().to_string()),
        },
        primary_key: true,
        unique: false,
        origin: ColumnOrigin::AutoId {
            id_kind: auto_id.kind,
        },
    }
}

fn timestamp_column(kind: TimestampKind, dialect: Dialect) -> ColumnDefinition {
    ColumnDefinition {
        name: kind.column_name().to_string(),
        sql_type: dialect.timestamp_type().to_string(),
        not_null: true,
        default_value: Some(dialect.timestamp_default().to_string()),
        primary_key: false,
        unique: false,
        origin: ColumnOrigin::Timestamp { timestamp: kind },
    }
}

fn extra_column(extra: &ExtraColumn) -> ColumnDefinition {
    ColumnDefinition {
        name: extra.name.clone(),
        sql_type: extra.sql_type.clone(),
        not_null: extra.not_null,
        default_value: extra.default_value.clone(),
        primary_key: extra.primary_key,
        unique: extra.unique,
        origin: ColumnOrigin::Extra,
    }
}

fn schema_column(flat: FlatColumn, dialect: Dialect) -> ColumnDefinition {
    ColumnDefinition {
        default_value: flat.default.as_ref().map(|v| dialect.literal(v)),
        name: flat.name,
        sql_type: flat.sql_type.to_string(),
        not_null: !flat.nullable,
        primary_key: false,
        unique: false,
        origin: ColumnOrigin::Schema {
            path: flat.path,
            storage: flat.storage,
        },
    }
}

/// Applies the requested primary key and returns the ordered key columns.
///
/// A column already marked as primary key (auto-ID or extra) takes
/// precedence: the requested key is then ignored, with a warning unless it
/// names that same column.
fn resolve_primary_key(
    columns: &mut [ColumnDefinition],
    requested: Option<&PrimaryKey>,
) -> Result<Vec<String>> {
    let inline: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.clone())
        .collect();
    if inline.len() > 1 {
        return Err(SchemaError::ConflictingPrimaryKeys(inline));
    }

    let Some(requested) = requested else {
        return Ok(inline);
    };
    let wanted = requested.columns();

    if let Some(existing) = inline.first() {
        if wanted.as_slice() != [existing.as_str()] {
            warn!(
                existing = %existing,
                requested = ?wanted,
                "ignoring primary_key option: a column is already declared as primary key"
            );
        }
        return Ok(inline);
    }

    for name in &wanted {
        if !columns.iter().any(|c| c.name == *name) {
            return Err(SchemaError::InvalidPrimaryKeyReference((*name).to_string()));
        }
    }

    match wanted.as_slice() {
        [] => Ok(Vec::new()),
        [single] => {
            if let Some(column) = columns.iter_mut().find(|c| c.name == *single) {
                column.primary_key = true;
            }
            Ok(vec![(*single).to_string()])
        }
        many => Ok(many.iter().map(|s| (*s).to_string()).collect()),
    }
}
