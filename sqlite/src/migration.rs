//! Additive table migration.
//!
//! A migration compares the live columns of one table with the columns of
//! a freshly derived [`TableStructure`] and evolves the table in place:
//!
//! 1. **Inspect**: read live column names. No columns (or a failed
//!    introspection) means the table is absent and the migration is a
//!    no-op; creating tables is a separate, explicit operation.
//! 2. **Diff**: set difference over column names, not types.
//! 3. **Add columns**: one `ALTER TABLE ... ADD COLUMN` per new column,
//!    always nullable so existing rows stay valid.
//! 4. **Recreate**: only when columns would be removed *and* destructive
//!    recreate is allowed: back up all rows in memory, drop, create, and
//!    restore the shared non-null columns of each row.
//!
//! Without [`MigrationOptions::transactional`] the recreate cycle is not
//! atomic: a failure after the drop leaves the new table only partially
//! restored, and the in-memory snapshot is gone once the call returns. Keep
//! your own backup.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use tableshape_core::{SchemaNode, TableOptions};
//! use tableshape_sqlite::{MigrationOptions, MigrationOutcome, Migrator};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch("CREATE TABLE users (name TEXT)").unwrap();
//!
//! let schema = SchemaNode::object([
//!     ("name", SchemaNode::string()),
//!     ("email", SchemaNode::string()),
//! ]);
//! let outcome = Migrator::new(MigrationOptions::default())
//!     .migrate("users", &schema, &TableOptions::default(), &conn)
//!     .unwrap();
//! assert_eq!(outcome, MigrationOutcome::ColumnsAdded { columns: vec!["email".into()] });
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tableshape_catalog::TableCatalog;
use tableshape_core::{
    ColumnDefinition, Dialect, Row, SchemaNode, TableOptions, TableStructure, derive_structure,
    insert_statement, render_add_column, render_ddl, render_drop_table,
};
use tracing::info;

use crate::error::{Result, SqliteError};
use crate::events::{MigrationEvent, MigrationListener, TracingListener};
use crate::executor::Executor;
use crate::introspect::get_live_columns;

static TRACING_LISTENER: TracingListener = TracingListener;

/// Caller authorization and behavior switches for a migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Allows the backup/drop/recreate/restore cycle when columns would be
    /// removed. Without it such migrations fail with
    /// [`SqliteError::DestructiveMigrationBlocked`].
    pub allow_destructive: bool,
    /// Wraps drop, create and restore in one transaction where the dialect
    /// supports transactional DDL (SQLite, PostgreSQL). Ignored, with a
    /// warning event, on MySQL.
    pub transactional: bool,
}

impl MigrationOptions {
    pub fn destructive() -> Self {
        Self {
            allow_destructive: true,
            transactional: false,
        }
    }

    pub fn with_transaction(mut self) -> Self {
        self.transactional = true;
        self
    }
}

/// Column diff between a live table and a derived structure.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Derived columns missing from the live table, in structure order.
    pub columns_to_add: Vec<ColumnDefinition>,
    /// Live columns absent from the structure, in table order.
    pub columns_to_remove: Vec<String>,
}

impl MigrationPlan {
    pub fn compute(live: &[String], structure: &TableStructure) -> Self {
        let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();
        let columns_to_add = structure
            .columns
            .iter()
            .filter(|c| !live_set.contains(c.name.as_str()))
            .cloned()
            .collect();
        let columns_to_remove = live
            .iter()
            .filter(|name| !structure.has_column(name))
            .cloned()
            .collect();
        Self {
            columns_to_add,
            columns_to_remove,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns_to_add.is_empty() && self.columns_to_remove.is_empty()
    }

    pub fn is_destructive(&self) -> bool {
        !self.columns_to_remove.is_empty()
    }

    fn added_names(&self) -> Vec<String> {
        self.columns_to_add.iter().map(|c| c.name.clone()).collect()
    }
}

/// What a migration did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The table does not exist; nothing was done.
    TableMissing,
    /// The live columns already match.
    UpToDate,
    /// Columns were added in place.
    ColumnsAdded { columns: Vec<String> },
    /// The table was recreated.
    Recreated {
        added: Vec<String>,
        removed: Vec<String>,
        rows_restored: usize,
    },
}

/// Step of the recreate cycle, reported in
/// [`SqliteError::MigrationRecreateFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecreateStage {
    Backup,
    Drop,
    Create,
    Restore,
    Commit,
}

impl fmt::Display for RecreateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecreateStage::Backup => "backup",
            RecreateStage::Drop => "drop",
            RecreateStage::Create => "create",
            RecreateStage::Restore => "restore",
            RecreateStage::Commit => "commit",
        })
    }
}

/// Runs migrations and reports their steps to a listener.
///
/// Migrations against one table must be serialized by the caller; no
/// locking is performed.
pub struct Migrator<'l> {
    options: MigrationOptions,
    listener: &'l dyn MigrationListener,
}

impl Migrator<'static> {
    /// Creates a migrator that reports through `tracing`.
    pub fn new(options: MigrationOptions) -> Self {
        Self {
            options,
            listener: &TRACING_LISTENER,
        }
    }
}

impl<'l> Migrator<'l> {
    /// Replaces the event listener.
    pub fn with_listener<'m>(self, listener: &'m dyn MigrationListener) -> Migrator<'m> {
        Migrator {
            options: self.options,
            listener,
        }
    }

    pub fn options(&self) -> MigrationOptions {
        self.options
    }

    /// Derives the structure for `schema` and migrates `table` to it.
    ///
    /// # Errors
    ///
    /// - [`SqliteError::Schema`] if the structure cannot be derived.
    /// - [`SqliteError::DestructiveMigrationBlocked`] if columns would be
    ///   removed without authorization; nothing is changed.
    /// - [`SqliteError::MigrationAlterFailed`] if adding a column fails;
    ///   earlier additions are kept.
    /// - [`SqliteError::MigrationRecreateFailed`] if a recreate step fails.
    pub fn migrate<E: Executor + ?Sized>(
        &self,
        table: &str,
        schema: &SchemaNode,
        table_options: &TableOptions,
        db: &E,
    ) -> Result<MigrationOutcome> {
        let structure = derive_structure(schema, table_options)?;
        self.migrate_structure(table, &structure, table_options.dialect, db)
    }

    /// Migrates `table` to an already derived structure.
    pub fn migrate_structure<E: Executor + ?Sized>(
        &self,
        table: &str,
        structure: &TableStructure,
        dialect: Dialect,
        db: &E,
    ) -> Result<MigrationOutcome> {
        let live = get_live_columns(table, db, dialect);
        if live.is_empty() {
            self.emit(MigrationEvent::TableMissing {
                table: table.to_string(),
            });
            return Ok(MigrationOutcome::TableMissing);
        }

        let plan = MigrationPlan::compute(&live, structure);
        self.emit(MigrationEvent::PlanComputed {
            table: table.to_string(),
            add: plan.added_names(),
            remove: plan.columns_to_remove.clone(),
        });

        if plan.is_empty() {
            self.emit(MigrationEvent::UpToDate {
                table: table.to_string(),
            });
            return Ok(MigrationOutcome::UpToDate);
        }

        if plan.is_destructive() {
            if !self.options.allow_destructive {
                self.emit(MigrationEvent::DestructiveChangeBlocked {
                    table: table.to_string(),
                    columns: plan.columns_to_remove.clone(),
                });
                return Err(SqliteError::DestructiveMigrationBlocked {
                    table: table.to_string(),
                    columns: plan.columns_to_remove,
                });
            }
            return self.recreate(table, structure, dialect, &live, &plan, db);
        }

        let mut added = Vec::with_capacity(plan.columns_to_add.len());
        for column in &plan.columns_to_add {
            let sql = render_add_column(table, column, dialect);
            db.execute(&sql, &[])
                .map_err(|e| SqliteError::MigrationAlterFailed {
                    table: table.to_string(),
                    column: column.name.clone(),
                    message: e.to_string(),
                })?;
            self.emit(MigrationEvent::ColumnAdded {
                table: table.to_string(),
                column: column.name.clone(),
                sql_type: column.sql_type.clone(),
            });
            added.push(column.name.clone());
        }

        Ok(MigrationOutcome::ColumnsAdded { columns: added })
    }

    /// Migrates every table of `catalog`, in table-name order.
    ///
    /// Stops at the first failing table.
    pub fn migrate_catalog<E: Executor + ?Sized>(
        &self,
        catalog: &TableCatalog,
        db: &E,
    ) -> Result<Vec<(String, MigrationOutcome)>> {
        let mut outcomes = Vec::with_capacity(catalog.len());
        for definition in catalog.iter() {
            let outcome = self.migrate(&definition.table, &definition.schema, &definition.options, db)?;
            outcomes.push((definition.table.clone(), outcome));
        }
        Ok(outcomes)
    }

    fn recreate<E: Executor + ?Sized>(
        &self,
        table: &str,
        structure: &TableStructure,
        dialect: Dialect,
        live: &[String],
        plan: &MigrationPlan,
        db: &E,
    ) -> Result<MigrationOutcome> {
        info!(
            table = %table,
            removed = ?plan.columns_to_remove,
            "recreating table to remove columns"
        );

        let select = format!(
            "SELECT {} FROM {}",
            live.iter()
                .map(|c| dialect.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            dialect.quote_ident(table)
        );
        let backup = db
            .execute(&select, &[])
            .map_err(|e| recreate_failed(table, RecreateStage::Backup, e, false))?;
        self.emit(MigrationEvent::BackupTaken {
            table: table.to_string(),
            rows: backup.len(),
        });

        let transactional = self.options.transactional && dialect.supports_transactional_ddl();
        if self.options.transactional && !transactional {
            self.emit(MigrationEvent::TransactionUnavailable {
                table: table.to_string(),
                dialect,
            });
        }
        if transactional {
            db.execute(dialect.begin_transaction(), &[])
                .map_err(|e| recreate_failed(table, RecreateStage::Drop, e, false))?;
        }

        match self.run_cycle(table, structure, dialect, &backup, transactional, db) {
            Ok(rows_restored) => Ok(MigrationOutcome::Recreated {
                added: plan.added_names(),
                removed: plan.columns_to_remove.clone(),
                rows_restored,
            }),
            Err((stage, err)) => {
                let rolled_back = transactional && db.execute("ROLLBACK", &[]).is_ok();
                if rolled_back {
                    self.emit(MigrationEvent::RecreateRolledBack {
                        table: table.to_string(),
                    });
                }
                Err(recreate_failed(table, stage, err, rolled_back))
            }
        }
    }

    /// Drop, create, restore and (when transactional) commit.
    fn run_cycle<E: Executor + ?Sized>(
        &self,
        table: &str,
        structure: &TableStructure,
        dialect: Dialect,
        backup: &[Row],
        transactional: bool,
        db: &E,
    ) -> std::result::Result<usize, (RecreateStage, SqliteError)> {
        db.execute(&render_drop_table(table, dialect), &[])
            .map_err(|e| (RecreateStage::Drop, e))?;
        self.emit(MigrationEvent::TableDropped {
            table: table.to_string(),
        });

        let ddl = render_ddl(table, structure, dialect);
        for sql in ddl.statements() {
            db.execute(sql, &[]).map_err(|e| (RecreateStage::Create, e))?;
        }
        self.emit(MigrationEvent::TableRecreated {
            table: table.to_string(),
        });

        let mut defaulted = 0;
        for row in backup {
            let restorable: Row = row
                .iter()
                .filter(|(name, value)| !value.is_null() && structure.has_column(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            if restorable.is_empty() {
                defaulted += 1;
            }
            let stmt = insert_statement(table, structure, dialect, &restorable)
                .map_err(|e| (RecreateStage::Restore, SqliteError::from(e)))?;
            db.execute(&stmt.sql, &stmt.params)
                .map_err(|e| (RecreateStage::Restore, e))?;
        }
        self.emit(MigrationEvent::RowsRestored {
            table: table.to_string(),
            rows: backup.len(),
            defaulted,
        });

        if transactional {
            db.execute("COMMIT", &[])
                .map_err(|e| (RecreateStage::Commit, e))?;
        }
        Ok(backup.len())
    }

    fn emit(&self, event: MigrationEvent) {
        self.listener.on_event(&event);
    }
}

impl fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn recreate_failed(table: &str, stage: RecreateStage, err: SqliteError, rolled_back: bool) -> SqliteError {
    SqliteError::MigrationRecreateFailed {
        table: table.to_string(),
        stage,
        message: err.to_string(),
        rolled_back,
    }
}

/// Migrates `table` to the structure derived from `schema`, reporting
/// through `tracing`.
///
/// Shorthand for [`Migrator::new`] followed by [`Migrator::migrate`].
pub fn migrate<E: Executor + ?Sized>(
    table: &str,
    schema: &SchemaNode,
    table_options: &TableOptions,
    db: &E,
    options: MigrationOptions,
) -> Result<MigrationOutcome> {
    Migrator::new(options).migrate(table, schema, table_options, db)
}
