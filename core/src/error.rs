//! Error types for structure derivation.
//!
//! Derivation degrades permissively on unknown node kinds, so the variants
//! here cover option-level mistakes (dialect names, primary-key references)
//! and structural conflicts detected by validation.

use thiserror::Error;

use crate::validate::ValidationError;

/// Errors that can occur while deriving a table structure or building
/// statements from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A dialect name outside `sqlite`, `postgres`, `mysql`.
    #[error("unsupported dialect '{0}': expected one of sqlite, postgres, mysql")]
    UnsupportedDialect(String),

    /// `primary_key` names a column that is neither a schema column nor an
    /// extra column.
    #[error("primary key references unknown column: {0}")]
    InvalidPrimaryKeyReference(String),

    /// More than one column is individually marked as primary key.
    #[error("multiple columns are individually marked as primary key: {}", .0.join(", "))]
    ConflictingPrimaryKeys(Vec<String>),

    /// The root of a table schema does not unwrap to an object.
    #[error("table schema root must be an object")]
    NotAnObject,

    /// A row or filter references a column the structure does not have.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// An update statement with no assignments.
    #[error("update has no columns to set")]
    EmptyUpdate,

    /// The derived structure failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
