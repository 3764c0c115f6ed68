//! Error types for table catalog loading.

use std::path::PathBuf;

use tableshape_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while loading or saving table definitions.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// File extension is not `json`, `yaml` or `yml`.
    #[error("unsupported definition format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Two definitions declare the same table.
    #[error("duplicate table '{table}' in {}", .path.display())]
    DuplicateTable { table: String, path: PathBuf },

    /// A definition does not derive a valid structure.
    #[error("invalid definition for table '{table}': {source}")]
    InvalidDefinition {
        table: String,
        #[source]
        source: SchemaError,
    },

    /// Requested table is not in the catalog.
    #[error("table not found in catalog: {0}")]
    TableNotFound(String),

    /// All configured loader sources failed.
    #[error("no catalog sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;
