//! Table-structure validation.
//!
//! Catches problems that would otherwise surface as confusing database
//! errors: two sources producing the same column name, identifiers the
//! engines cannot accept, and indexes over columns that do not exist.
//!
//! # Examples
//!
//! ```
//! use tableshape_core::*;
//!
//! let schema = SchemaNode::object([("email", SchemaNode::string())]);
//! let mut structure = derive_structure(&schema, &TableOptions::default()).unwrap();
//! assert!(validate_structure(&structure, Dialect::Sqlite).is_empty());
//!
//! // Index over a column the table does not have
//! structure.indexes.insert("idx_missing".into(), vec!["missing".into()]);
//! let errors = validate_structure(&structure, Dialect::Sqlite);
//! assert!(matches!(errors[0], ValidationError::UnknownIndexColumn { .. }));
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::dialect::Dialect;
use crate::structure::{ColumnOrigin, TableStructure};

/// Structure validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two sources produced the same column name, e.g. a nested
    /// `profile.address` and a top-level `profile_address`.
    #[error("column '{column}' is produced by both {first} and {second}")]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },
    /// Identifier is empty, too long or contains a NUL byte.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },
    /// Index lists no columns.
    #[error("index '{0}' has no columns")]
    EmptyIndex(String),
    /// Index references a column the table does not have.
    #[error("index '{index}' references unknown column '{column}'")]
    UnknownIndexColumn { index: String, column: String },
}

/// Checks that `name` can be used as a quoted identifier in `dialect`.
pub fn validate_identifier(name: &str, dialect: Dialect) -> Result<(), ValidationError> {
    let reason = if name.is_empty() {
        "identifier cannot be empty".to_string()
    } else if name.contains('\0') {
        "identifier contains a NUL byte".to_string()
    } else {
        match dialect.max_identifier_len() {
            Some(max) if name.len() > max => format!("identifier exceeds {max} bytes on {dialect}"),
            _ => return Ok(()),
        }
    };
    Err(ValidationError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    })
}

/// Validates a derived table structure.
///
/// Returns every problem found, column problems first.
pub fn validate_structure(structure: &TableStructure, dialect: Dialect) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen: HashMap<&str, &ColumnOrigin> = HashMap::new();
    for column in &structure.columns {
        if let Err(err) = validate_identifier(&column.name, dialect) {
            errors.push(err);
            continue;
        }
        if let Some(first) = seen.insert(column.name.as_str(), &column.origin) {
            errors.push(ValidationError::ColumnCollision {
                column: column.name.clone(),
                first: first.to_string(),
                second: column.origin.to_string(),
            });
        }
    }

    for (index, columns) in &structure.indexes {
        if let Err(err) = validate_identifier(index, dialect) {
            errors.push(err);
        }
        if columns.is_empty() {
            errors.push(ValidationError::EmptyIndex(index.clone()));
        }
        for column in columns {
            if !structure.has_column(column) {
                errors.push(ValidationError::UnknownIndexColumn {
                    index: index.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    errors
}
