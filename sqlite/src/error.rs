//! Error types for table access and migration.
//!
//! Migration failures are split by how much damage they can leave behind:
//! [`SqliteError::DestructiveMigrationBlocked`] performs no mutation and is
//! recoverable by retrying with authorization;
//! [`SqliteError::MigrationAlterFailed`] may leave earlier columns added;
//! [`SqliteError::MigrationRecreateFailed`] may leave the table recreated
//! but only partially restored unless the cycle was rolled back.

use tableshape_catalog::CatalogError;
use tableshape_core::SchemaError;
use thiserror::Error;

use crate::migration::RecreateStage;

/// Errors that can occur while executing statements or migrating tables.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Structure derivation or statement building failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Loading table definitions failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Value conversion between JSON and SQL failed.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Migration would remove columns and destructive recreate was not
    /// allowed. Nothing was changed.
    #[error(
        "migration of table '{table}' would remove columns [{}]; re-run with destructive recreate allowed",
        .columns.join(", ")
    )]
    DestructiveMigrationBlocked { table: String, columns: Vec<String> },

    /// `ALTER TABLE ... ADD COLUMN` failed. Columns added earlier in the
    /// same migration are kept.
    #[error("failed to add column '{column}' to table '{table}': {message}")]
    MigrationAlterFailed {
        table: String,
        column: String,
        message: String,
    },

    /// A step of the backup/drop/recreate/restore cycle failed.
    ///
    /// Unless `rolled_back` is set, the table may be recreated but only
    /// partially restored.
    #[error("recreating table '{table}' failed at the {stage} step (rolled back: {rolled_back}): {message}")]
    MigrationRecreateFailed {
        table: String,
        stage: RecreateStage,
        message: String,
        rolled_back: bool,
    },

    /// A row could not be inserted.
    #[error("insert failed: {0}")]
    InsertFailed(String),

    /// A statement failed on a non-SQLite executor.
    #[error("execution error: {0}")]
    ExecutionError(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
