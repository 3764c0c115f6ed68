//! Table-options configuration.
//!
//! [`TableOptions`] controls how a schema becomes a table: dialect, primary
//! key, indexes, flatten depth, caller-supplied extra columns, timestamp
//! columns and an optional synthetic ID column. Every field has a serde
//! default, so a document only needs the parts it changes:
//!
//! ```yaml
//! dialect: postgres
//! primary_key: id
//! flatten_depth: 1
//! timestamps: true
//! indexes:
//!   idx_users_email: [email]
//! extra_columns:
//!   - name: org_id
//!     sql_type: INTEGER
//!     not_null: true
//!     position: start
//!     foreign_key: { table: orgs, column: id, on_delete: cascade }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// Default number of nested object levels expanded into columns.
pub const DEFAULT_FLATTEN_DEPTH: usize = 2;

/// Options controlling structure derivation.
///
/// # Examples
///
/// ```
/// use tableshape_core::{AutoId, Dialect, ExtraColumn, TableOptions};
///
/// let options = TableOptions::new(Dialect::Postgres)
///     .with_auto_id(AutoId::uuid("id"))
///     .with_timestamps()
///     .with_flatten_depth(1)
///     .with_index("idx_users_email", ["email"])
///     .with_extra_column(ExtraColumn::new("tenant", "TEXT").not_null().at_start());
///
/// assert_eq!(options.flatten_depth, 1);
/// assert!(options.timestamps);
/// assert_eq!(options.indexes["idx_users_email"], vec!["email".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Target dialect.
    pub dialect: Dialect,
    /// Requested primary key: a single column or an ordered compound key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    /// Index name to ordered column list.
    pub indexes: BTreeMap<String, Vec<String>>,
    /// Number of nested object levels expanded into columns before falling
    /// back to JSON storage.
    pub flatten_depth: usize,
    /// Caller-supplied columns placed before or after the schema columns.
    pub extra_columns: Vec<ExtraColumn>,
    /// Adds `created_at` and `updated_at` columns.
    pub timestamps: bool,
    /// Adds a synthetic primary-key column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_id: Option<AutoId>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            primary_key: None,
            indexes: BTreeMap::new(),
            flatten_depth: DEFAULT_FLATTEN_DEPTH,
            extra_columns: Vec::new(),
            timestamps: false,
            auto_id: None,
        }
    }
}

impl TableOptions {
    /// Creates default options for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Sets the requested primary key.
    pub fn with_primary_key(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Adds (or replaces) an index definition.
    pub fn with_index<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes
            .insert(name.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the flatten depth.
    pub fn with_flatten_depth(mut self, depth: usize) -> Self {
        self.flatten_depth = depth;
        self
    }

    /// Appends an extra column.
    pub fn with_extra_column(mut self, column: ExtraColumn) -> Self {
        self.extra_columns.push(column);
        self
    }

    /// Enables `created_at`/`updated_at` columns.
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Enables a synthetic ID column.
    pub fn with_auto_id(mut self, auto_id: AutoId) -> Self {
        self.auto_id = Some(auto_id);
        self
    }
}

/// Requested primary key.
///
/// Deserializes from either a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// A single column, rendered inline on that column.
    Single(String),
    /// An ordered compound key, rendered as a table constraint.
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Column names of the key, in order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(name) => vec![name.as_str()],
            PrimaryKey::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(name: &str) -> Self {
        PrimaryKey::Single(name.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(name: String) -> Self {
        PrimaryKey::Single(name)
    }
}

impl From<Vec<String>> for PrimaryKey {
    fn from(names: Vec<String>) -> Self {
        PrimaryKey::Composite(names)
    }
}

impl From<Vec<&str>> for PrimaryKey {
    fn from(names: Vec<&str>) -> Self {
        PrimaryKey::Composite(names.into_iter().map(String::from).collect())
    }
}

/// Kind of synthetic ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoIdKind {
    /// Auto-incrementing integer.
    #[default]
    Integer,
    /// Database-generated UUID.
    Uuid,
}

/// Synthetic primary-key column, always placed first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoId {
    /// Column name.
    pub name: String,
    /// ID kind.
    #[serde(default)]
    pub kind: AutoIdKind,
}

impl AutoId {
    /// An auto-incrementing integer ID column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AutoIdKind::Integer,
        }
    }

    /// A UUID ID column.
    pub fn uuid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AutoIdKind::Uuid,
        }
    }
}

/// Where an extra column is placed relative to the schema columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnPosition {
    /// Before the schema columns (after auto-ID and timestamps).
    Start,
    /// After the schema columns.
    #[default]
    End,
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[serde(alias = "CASCADE")]
    Cascade,
    #[serde(alias = "SET NULL", alias = "set null")]
    SetNull,
    #[serde(alias = "SET DEFAULT", alias = "set default")]
    SetDefault,
    #[serde(alias = "RESTRICT")]
    Restrict,
    #[serde(alias = "NO ACTION", alias = "no action")]
    NoAction,
}

impl ReferentialAction {
    /// SQL keyword form.
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// Foreign-key reference carried by an extra column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKey {
    /// A reference to `table.column` with no referential actions.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the `ON DELETE` action.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the `ON UPDATE` action.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// A caller-supplied column that is not part of the schema.
///
/// `sql_type` and `default_value` are raw SQL and are emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraColumn {
    pub name: String,
    pub sql_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub position: ColumnPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl ExtraColumn {
    /// A nullable column placed after the schema columns.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            default_value: None,
            primary_key: false,
            unique: false,
            position: ColumnPosition::End,
            foreign_key: None,
        }
    }

    /// Adds `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets a raw SQL default expression.
    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self
    }

    /// Marks the column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Adds `UNIQUE`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Places the column before the schema columns.
    pub fn at_start(mut self) -> Self {
        self.position = ColumnPosition::Start;
        self
    }

    /// Attaches a foreign-key reference.
    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }
}
