//! Table catalog loading with builder pattern and fallback chains.
//!
//! Provides [`TableCatalog`] for lookup of table definitions by name and
//! [`CatalogBuilder`] for constructing a catalog from several sources with
//! fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use tableshape_catalog::TableCatalog;
//!
//! // One definition per file, json or yaml
//! let catalog = TableCatalog::from_dir("tables/").unwrap();
//! assert!(catalog.get("users").is_some());
//!
//! // A single bundle listing every table
//! let catalog = TableCatalog::from_bundle("tables.yaml").unwrap();
//!
//! // First source that loads wins
//! let catalog = TableCatalog::builder()
//!     .from_dir("tables/")
//!     .from_bundle("tables.yaml")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Every definition is checked with [`TableDefinition::structure`] while
//! loading, so a catalog never holds a table whose DDL cannot be rendered.
//! Iteration is ordered by table name.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::definition::{Format, TableDefinition};
use crate::error::{CatalogError, Result};

/// Describes where a [`TableCatalog`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// A directory of individual definition files.
    Directory(PathBuf),
    /// A single [`CatalogBundle`] file.
    Bundle(PathBuf),
    /// Definitions supplied in memory.
    Inline,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<CatalogSource>),
}

/// File layout of a bundle: every table in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogBundle {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

impl CatalogBundle {
    /// Writes the bundle as JSON or YAML depending on the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format =
            Format::from_path(path).ok_or_else(|| CatalogError::UnsupportedFormat(path.to_path_buf()))?;
        let writer = BufWriter::new(std::fs::File::create(path)?);
        match format {
            Format::Json => serde_json::to_writer_pretty(writer, self)?,
            Format::Yaml => serde_yaml::to_writer(writer, self)?,
        }
        Ok(())
    }
}

/// Table definitions indexed by table name.
///
/// # Examples
///
/// ```
/// use tableshape_catalog::{TableCatalog, TableDefinition};
/// use tableshape_core::{SchemaNode, TableOptions};
///
/// let catalog = TableCatalog::from_definitions([TableDefinition::new(
///     "tags",
///     SchemaNode::object([("label", SchemaNode::string())]),
///     TableOptions::default(),
/// )])
/// .unwrap();
///
/// assert_eq!(catalog.len(), 1);
/// for def in catalog.iter() {
///     println!("{}", def.ddl().unwrap().to_sql());
/// }
/// ```
#[derive(Debug)]
pub struct TableCatalog {
    tables: BTreeMap<String, TableDefinition>,
    source: CatalogSource,
}

impl TableCatalog {
    /// Returns a new [`CatalogBuilder`] for configuring a fallback chain.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Builds a catalog from in-memory definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateTable`] if two definitions share a
    /// table name, or [`CatalogError::InvalidDefinition`] if one does not
    /// derive a valid structure.
    pub fn from_definitions(definitions: impl IntoIterator<Item = TableDefinition>) -> Result<Self> {
        let mut catalog = Self {
            tables: BTreeMap::new(),
            source: CatalogSource::Inline,
        };
        for def in definitions {
            catalog.add(def, Path::new("<inline>"))?;
        }
        Ok(catalog)
    }

    /// Loads definitions from a directory of `*.json`, `*.yaml` and `*.yml`
    /// files. Other files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::IoError`] if the directory or a file cannot be
    /// read, a parse error for malformed files, and the validation errors of
    /// [`from_definitions`](Self::from_definitions).
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() && Format::from_path(&file_path).is_some() {
                files.push(file_path);
            }
        }
        // read_dir order is platform dependent
        files.sort();

        let mut catalog = Self {
            tables: BTreeMap::new(),
            source: CatalogSource::Directory(path.to_path_buf()),
        };
        for file_path in files {
            let def = TableDefinition::load(&file_path)?;
            catalog.add(def, &file_path)?;
        }
        Ok(catalog)
    }

    /// Loads definitions from a single [`CatalogBundle`] file.
    ///
    /// # Errors
    ///
    /// Same as [`from_dir`](Self::from_dir), plus
    /// [`CatalogError::UnsupportedFormat`] for an unknown extension.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format =
            Format::from_path(path).ok_or_else(|| CatalogError::UnsupportedFormat(path.to_path_buf()))?;
        let reader = BufReader::new(std::fs::File::open(path)?);
        let bundle: CatalogBundle = match format {
            Format::Json => serde_json::from_reader(reader)?,
            Format::Yaml => serde_yaml::from_reader(reader)?,
        };

        let mut catalog = Self {
            tables: BTreeMap::new(),
            source: CatalogSource::Bundle(path.to_path_buf()),
        };
        for def in bundle.tables {
            catalog.add(def, path)?;
        }
        Ok(catalog)
    }

    fn add(&mut self, def: TableDefinition, origin: &Path) -> Result<()> {
        if self.tables.contains_key(&def.table) {
            return Err(CatalogError::DuplicateTable {
                table: def.table,
                path: origin.to_path_buf(),
            });
        }
        def.structure()?;
        self.tables.insert(def.table.clone(), def);
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<&TableDefinition> {
        self.tables.get(table)
    }

    /// Like [`get`](Self::get) but fails with
    /// [`CatalogError::TableNotFound`].
    pub fn require(&self, table: &str) -> Result<&TableDefinition> {
        self.get(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names in order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    /// Definitions in table-name order.
    pub fn iter(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.values()
    }

    /// Collects the catalog into a bundle, e.g. for [`CatalogBundle::save`].
    pub fn to_bundle(&self) -> CatalogBundle {
        CatalogBundle {
            tables: self.tables.values().cloned().collect(),
        }
    }

    pub fn source(&self) -> &CatalogSource {
        &self.source
    }
}

/// Builder for constructing a [`TableCatalog`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`CatalogError::NoSourcesAvailable`] is returned.
pub struct CatalogBuilder {
    sources: Vec<CatalogSource>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of definition files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CatalogSource::Directory(path.into()));
        self
    }

    /// Adds a bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CatalogSource::Bundle(path.into()));
        self
    }

    /// Attempts each configured source in order.
    pub fn build(self) -> Result<TableCatalog> {
        if self.sources.is_empty() {
            return Err(CatalogError::NoSourcesAvailable);
        }

        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                CatalogSource::Directory(path) => TableCatalog::from_dir(path),
                CatalogSource::Bundle(path) => TableCatalog::from_bundle(path),
                CatalogSource::Inline | CatalogSource::Multiple(_) => continue,
            };

            if let Ok(mut catalog) = result {
                catalog.source = CatalogSource::Multiple(all_sources);
                return Ok(catalog);
            }
        }

        Err(CatalogError::NoSourcesAvailable)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
