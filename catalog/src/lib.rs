//! Loading table definitions from YAML and JSON files.
//!
//! A [`TableDefinition`] pairs a table name with its schema and
//! [`TableOptions`](tableshape_core::TableOptions). A [`TableCatalog`] holds
//! many definitions, loaded from a directory (one file per table) or from a
//! single bundle file.
//!
//! # Quick start
//!
//! ```no_run
//! use tableshape_catalog::TableCatalog;
//!
//! let catalog = TableCatalog::builder()
//!     .from_dir("tables/")
//!     .from_bundle("tables.yaml")
//!     .build()
//!     .unwrap();
//!
//! for def in catalog.iter() {
//!     print!("{}", def.ddl().unwrap().to_sql());
//! }
//! ```

mod definition;
mod error;
mod loader;

pub use definition::{Format, TableDefinition};
pub use error::{CatalogError, Result};
pub use loader::{CatalogBuilder, CatalogBundle, CatalogSource, TableCatalog};
