//! Structured migration events.
//!
//! The migration engine reports each step as a [`MigrationEvent`] to an
//! injected [`MigrationListener`]. [`TracingListener`] forwards events to
//! `tracing` with named fields; [`RecordingListener`] keeps them in memory.

use std::sync::Mutex;

use serde::Serialize;
use tableshape_core::Dialect;
use tracing::{debug, info, warn};

/// One step of a table migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    /// Introspection found no columns; nothing was done.
    TableMissing { table: String },
    /// Live columns already match the derived structure.
    UpToDate { table: String },
    /// Column diff between the live table and the derived structure.
    PlanComputed {
        table: String,
        add: Vec<String>,
        remove: Vec<String>,
    },
    /// A column was added with `ALTER TABLE`.
    ColumnAdded {
        table: String,
        column: String,
        sql_type: String,
    },
    /// Columns would be removed but destructive recreate is not allowed.
    DestructiveChangeBlocked { table: String, columns: Vec<String> },
    /// Existing rows were read into memory before the drop.
    BackupTaken { table: String, rows: usize },
    /// The live table was dropped.
    TableDropped { table: String },
    /// The table was created from the derived structure.
    TableRecreated { table: String },
    /// Backed-up rows were written back. `defaulted` counts rows with no
    /// restorable column, inserted with default values only.
    RowsRestored {
        table: String,
        rows: usize,
        defaulted: usize,
    },
    /// A transactional recreate was requested but the dialect commits DDL
    /// implicitly; the cycle runs without a transaction.
    TransactionUnavailable { table: String, dialect: Dialect },
    /// The recreate cycle failed and its transaction was rolled back.
    RecreateRolledBack { table: String },
}

/// Receives migration events.
pub trait MigrationListener {
    fn on_event(&self, event: &MigrationEvent);
}

/// Forwards migration events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl MigrationListener for TracingListener {
    fn on_event(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::TableMissing { table } => {
                info!(table = %table, "table not found, skipping migration");
            }
            MigrationEvent::UpToDate { table } => {
                debug!(table = %table, "table is up to date");
            }
            MigrationEvent::PlanComputed { table, add, remove } => {
                debug!(table = %table, add = ?add, remove = ?remove, "migration plan computed");
            }
            MigrationEvent::ColumnAdded {
                table,
                column,
                sql_type,
            } => {
                info!(table = %table, column = %column, sql_type = %sql_type, "column added");
            }
            MigrationEvent::DestructiveChangeBlocked { table, columns } => {
                warn!(table = %table, columns = ?columns, "destructive migration blocked");
            }
            MigrationEvent::BackupTaken { table, rows } => {
                info!(table = %table, rows, "rows backed up before recreate");
            }
            MigrationEvent::TableDropped { table } => {
                info!(table = %table, "table dropped");
            }
            MigrationEvent::TableRecreated { table } => {
                info!(table = %table, "table recreated");
            }
            MigrationEvent::RowsRestored {
                table,
                rows,
                defaulted,
            } => {
                info!(table = %table, rows, defaulted, "rows restored");
            }
            MigrationEvent::TransactionUnavailable { table, dialect } => {
                warn!(
                    table = %table,
                    dialect = %dialect,
                    "dialect commits DDL implicitly, recreate cycle is not atomic"
                );
            }
            MigrationEvent::RecreateRolledBack { table } => {
                warn!(table = %table, "recreate cycle rolled back");
            }
        }
    }
}

/// Collects migration events in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of `ColumnAdded` events received.
    pub fn columns_added(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MigrationEvent::ColumnAdded { .. }))
            .count()
    }
}

impl MigrationListener for RecordingListener {
    fn on_event(&self, event: &MigrationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
