//! SQLite-family data access and additive migration for derived tables.
//!
//! This crate runs the statements produced by `tableshape-core` against a
//! database. It is organized into:
//!
//! - **`executor`**: the [`Executor`] seam, implemented for
//!   [`rusqlite::Connection`]
//! - **`introspect`**: live column and table lookup per dialect
//! - **`migration`**: additive migration with guarded destructive recreate
//! - **`events`**: structured migration events and listeners
//! - **`table`**: nested-document insert, update and select for one table
//!
//! # Quick start
//!
//! ```no_run
//! use rusqlite::Connection;
//! use tableshape_catalog::TableCatalog;
//! use tableshape_sqlite::{MigrationOptions, Migrator, Table};
//!
//! let conn = Connection::open("app.db").unwrap();
//! let catalog = TableCatalog::from_dir("tables/").unwrap();
//!
//! for def in catalog.iter() {
//!     Table::from_definition(def, &conn).unwrap().create().unwrap();
//! }
//!
//! let outcomes = Migrator::new(MigrationOptions::default())
//!     .migrate_catalog(&catalog, &conn)
//!     .unwrap();
//! for (table, outcome) in outcomes {
//!     println!("{table}: {outcome:?}");
//! }
//! ```

mod convert;
mod error;
mod events;
mod executor;
mod introspect;
mod migration;
mod table;

pub use convert::BLOB_KEY;
pub use error::{Result, SqliteError};
pub use events::{MigrationEvent, MigrationListener, RecordingListener, TracingListener};
pub use executor::Executor;
pub use introspect::{get_live_columns, table_exists};
pub use migration::{
    MigrationOptions, MigrationOutcome, MigrationPlan, Migrator, RecreateStage, migrate,
};
pub use table::{BatchFailure, BatchOptions, BatchReport, DEFAULT_CHUNK_SIZE, Table};
