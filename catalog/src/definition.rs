//! Table definition documents.
//!
//! A definition pairs a table name with its schema and options. It can be
//! written in JSON or YAML; the format is chosen by file extension.
//!
//! # Example YAML
//!
//! ```yaml
//! table: users
//! schema:
//!   type: object
//!   fields:
//!     email: { type: string }
//!     profile:
//!       type: object
//!       fields:
//!         name: { type: string }
//!         age: { type: optional, of: { type: integer } }
//! options:
//!   dialect: postgres
//!   auto_id: { name: id, kind: uuid }
//!   timestamps: true
//!   indexes:
//!     idx_users_email: [email]
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tableshape_core::{DdlStatements, SchemaNode, TableOptions, TableStructure, derive_structure, render_ddl};

use crate::error::{CatalogError, Result};

/// Definition file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Picks the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml" | "yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// One table: name, schema and options.
///
/// # Examples
///
/// ```
/// use tableshape_catalog::TableDefinition;
///
/// let def = TableDefinition::from_yaml_str(
///     "table: tags\nschema: { type: object, fields: { label: { type: string } } }\n",
/// )
/// .unwrap();
/// assert_eq!(def.table, "tags");
/// assert_eq!(def.structure().unwrap().column_names(), ["label"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table: String,
    pub schema: SchemaNode,
    #[serde(default)]
    pub options: TableOptions,
}

impl TableDefinition {
    pub fn new(table: impl Into<String>, schema: SchemaNode, options: TableOptions) -> Self {
        Self {
            table: table.into(),
            schema,
            options,
        }
    }

    /// Loads a definition from a `.json`, `.yaml` or `.yml` file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedFormat`] for other extensions,
    /// [`CatalogError::IoError`] if the file cannot be read, or a parse
    /// error for malformed documents.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format =
            Format::from_path(path).ok_or_else(|| CatalogError::UnsupportedFormat(path.to_path_buf()))?;
        let reader = BufReader::new(std::fs::File::open(path)?);
        Ok(match format {
            Format::Json => serde_json::from_reader(reader)?,
            Format::Yaml => serde_yaml::from_reader(reader)?,
        })
    }

    /// Saves the definition in the format implied by the extension.
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

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Derives the table structure.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidDefinition`] if derivation fails.
    pub fn structure(&self) -> Result<TableStructure> {
        derive_structure(&self.schema, &self.options).map_err(|source| CatalogError::InvalidDefinition {
            table: self.table.clone(),
            source,
        })
    }

    /// Renders the table's DDL.
    pub fn ddl(&self) -> Result<DdlStatements> {
        let structure = self.structure()?;
        Ok(render_ddl(&self.table, &structure, self.options.dialect))
    }
}
