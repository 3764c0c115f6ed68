//! Data access for one derived table.
//!
//! [`Table`] binds a table name, its derived [`TableStructure`] and an
//! [`Executor`]. Documents go in nested and come back nested: inserts and
//! updates are flattened through the structure's column paths, and fetched
//! rows are unflattened the same way.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use serde_json::json;
//! use tableshape_core::{AutoId, SchemaNode, TableOptions};
//! use tableshape_sqlite::Table;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let schema = SchemaNode::object([
//!     ("title", SchemaNode::string()),
//!     ("meta", SchemaNode::object([("pages", SchemaNode::integer())])),
//! ]);
//! let options = TableOptions::default().with_auto_id(AutoId::integer("id"));
//!
//! let books = Table::new("books", &schema, &options, &conn).unwrap();
//! books.create().unwrap();
//! books.insert(json!({ "title": "Dune", "meta": { "pages": 412 } }).as_object().unwrap()).unwrap();
//!
//! let all = books.fetch_all().unwrap();
//! assert_eq!(all, vec![json!({ "id": 1, "title": "Dune", "meta": { "pages": 412 } })]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tableshape_catalog::TableDefinition;
use tableshape_core::{
    DdlStatements, Dialect, SchemaNode, SelectBuilder, TableOptions, TableStructure,
    derive_structure, flatten_row_with, insert_statement, render_ddl, render_drop_table,
    unflatten_row, update_statement,
};
use tracing::{debug, info, warn};

use crate::error::{Result, SqliteError};
use crate::executor::Executor;
use crate::introspect::table_exists;
use crate::migration::{MigrationOutcome, Migrator};

/// Default number of rows per batch-insert chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Batch-insert behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Rows per chunk. Zero is treated as one.
    pub chunk_size: usize,
    /// Abandons the remaining chunks after a chunk with a failed row.
    pub stop_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stop_on_error: false,
        }
    }
}

/// A row that failed during a batch insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Index of the row in the input.
    pub index: usize,
    pub message: String,
}

/// Result of [`Table::insert_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub inserted: usize,
    pub failures: Vec<BatchFailure>,
    /// Chunks processed, including the one that triggered an abort.
    pub chunks: usize,
    /// Set when `stop_on_error` abandoned the remaining chunks.
    pub aborted: bool,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }
}

/// Handle to one table over an executor.
pub struct Table<'e, E: Executor + ?Sized> {
    name: String,
    structure: TableStructure,
    dialect: Dialect,
    db: &'e E,
}

impl<'e, E: Executor + ?Sized> Table<'e, E> {
    /// Derives the structure of `schema` and binds it to `db`.
    pub fn new(name: impl Into<String>, schema: &SchemaNode, options: &TableOptions, db: &'e E) -> Result<Self> {
        let name = name.into();
        let structure = derive_structure(schema, options)?;
        if options.dialect != db.dialect() {
            warn!(
                table = %name,
                options = %options.dialect,
                executor = %db.dialect(),
                "table dialect differs from executor dialect"
            );
        }
        Ok(Self {
            name,
            structure,
            dialect: options.dialect,
            db,
        })
    }

    /// Binds a loaded table definition to `db`.
    pub fn from_definition(definition: &TableDefinition, db: &'e E) -> Result<Self> {
        Self::new(&definition.table, &definition.schema, &definition.options, db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn structure(&self) -> &TableStructure {
        &self.structure
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn ddl(&self) -> DdlStatements {
        render_ddl(&self.name, &self.structure, self.dialect)
    }

    /// Creates the table and its indexes if they do not exist.
    pub fn create(&self) -> Result<()> {
        for sql in self.ddl().statements() {
            self.db.execute(sql, &[])?;
        }
        info!(table = %self.name, columns = self.structure.columns.len(), "table created");
        Ok(())
    }

    /// Drops the table if it exists.
    pub fn drop_table(&self) -> Result<()> {
        self.db.execute(&render_drop_table(&self.name, self.dialect), &[])?;
        info!(table = %self.name, "table dropped");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        table_exists(&self.name, self.db, self.dialect)
    }

    /// Flattens and inserts one document.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Schema`] for keys that name no column after
    /// flattening (never raised for schema fields) and
    /// [`SqliteError::InsertFailed`] when the database rejects the row.
    pub fn insert(&self, doc: &Map<String, Value>) -> Result<()> {
        let row = flatten_row_with(doc, &self.structure);
        let stmt = insert_statement(&self.name, &self.structure, self.dialect, &row)?;
        self.db
            .execute(&stmt.sql, &stmt.params)
            .map_err(|e| SqliteError::InsertFailed(format!("table '{}': {e}", self.name)))?;
        Ok(())
    }

    /// Inserts documents in chunks of `options.chunk_size`.
    ///
    /// Failed rows are recorded in the report rather than returned as an
    /// error. With `stop_on_error`, the chunk containing the first failure
    /// is finished and the remaining chunks are skipped.
    pub fn insert_batch(&self, docs: &[Value], options: &BatchOptions) -> BatchReport {
        let mut report = BatchReport::default();
        let chunk_size = options.chunk_size.max(1);

        for (chunk_index, chunk) in docs.chunks(chunk_size).enumerate() {
            report.chunks += 1;
            let failures_before = report.failures.len();

            for (offset, doc) in chunk.iter().enumerate() {
                let index = chunk_index * chunk_size + offset;
                let result = match doc.as_object() {
                    Some(map) => self.insert(map),
                    None => Err(SqliteError::InsertFailed(format!(
                        "row {index} is not an object"
                    ))),
                };
                match result {
                    Ok(()) => report.inserted += 1,
                    Err(err) => {
                        warn!(table = %self.name, index, error = %err, "batch row failed");
                        report.failures.push(BatchFailure {
                            index,
                            message: err.to_string(),
                        });
                    }
                }
            }

            debug!(
                table = %self.name,
                chunk = chunk_index,
                rows = chunk.len(),
                "batch chunk processed"
            );

            if options.stop_on_error && report.failures.len() > failures_before {
                report.aborted = report.chunks * chunk_size < docs.len();
                break;
            }
        }

        report
    }

    /// Updates rows matching the flat column `filter` with the flattened
    /// `changes` document.
    pub fn update(&self, changes: &Map<String, Value>, filter: &Map<String, Value>) -> Result<()> {
        let row = flatten_row_with(changes, &self.structure);
        let stmt = update_statement(&self.name, &self.structure, self.dialect, &row, filter)?;
        self.db.execute(&stmt.sql, &stmt.params)?;
        Ok(())
    }

    /// Starts a select over this table.
    pub fn select(&self) -> SelectBuilder<'_> {
        SelectBuilder::new(&self.name, &self.structure, self.dialect)
    }

    /// Runs `query` and returns unflattened documents.
    pub fn fetch(&self, query: &SelectBuilder<'_>) -> Result<Vec<Value>> {
        let stmt = query.build()?;
        let rows = self.db.execute(&stmt.sql, &stmt.params)?;
        Ok(rows
            .iter()
            .map(|row| unflatten_row(row, &self.structure))
            .collect())
    }

    /// Returns every row as a document.
    pub fn fetch_all(&self) -> Result<Vec<Value>> {
        self.fetch(&self.select())
    }

    /// Returns documents whose flat columns equal `filter`.
    pub fn find(&self, filter: &Map<String, Value>) -> Result<Vec<Value>> {
        self.fetch(&self.select().filter_map(filter))
    }

    /// Counts rows whose flat columns equal `filter`.
    pub fn count(&self, filter: &Map<String, Value>) -> Result<u64> {
        let stmt = self.select().filter_map(filter).count()?;
        let rows = self.db.execute(&stmt.sql, &stmt.params)?;
        rows.first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_u64)
            .ok_or_else(|| SqliteError::ConversionError("COUNT(*) returned no integer".to_string()))
    }

    /// Migrates the live table to this handle's structure.
    pub fn migrate(&self, migrator: &Migrator<'_>) -> Result<MigrationOutcome> {
        migrator.migrate_structure(&self.name, &self.structure, self.dialect, self.db)
    }
}
