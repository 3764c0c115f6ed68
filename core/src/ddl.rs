//! DDL rendering for derived table structures.
//!
//! Every identifier is quoted for the target dialect, and every statement
//! is safe to re-run: `CREATE TABLE IF NOT EXISTS`, `CREATE INDEX IF NOT
//! EXISTS`, `DROP TABLE IF EXISTS`.
//!
//! # Example
//!
//! ```
//! use tableshape_core::*;
//!
//! let schema = SchemaNode::object([
//!     ("email", SchemaNode::string()),
//!     ("age", SchemaNode::integer().optional()),
//! ]);
//! let options = TableOptions::new(Dialect::Sqlite)
//!     .with_auto_id(AutoId::integer("id"))
//!     .with_index("idx_users_email", ["email"]);
//!
//! let ddl = generate_ddl("users", &schema, &options).unwrap();
//! assert_eq!(
//!     ddl.create_table,
//!     "CREATE TABLE IF NOT EXISTS \"users\" (\n  \
//!      \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
//!      \"email\" TEXT NOT NULL,\n  \
//!      \"age\" INTEGER\n)"
//! );
//! assert_eq!(
//!     ddl.indexes,
//!     ["CREATE INDEX IF NOT EXISTS \"idx_users_email\" ON \"users\" (\"email\")"]
//! );
//! ```

use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::options::{ForeignKey, TableOptions};
use crate::structure::{ColumnDefinition, ColumnOrigin, TableStructure, derive_structure};
use crate::types::SchemaNode;

/// Rendered DDL for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlStatements {
    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub create_table: String,
    /// One `CREATE INDEX IF NOT EXISTS` statement per index, ordered by
    /// index name.
    pub indexes: Vec<String>,
}

impl DdlStatements {
    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.create_table.as_str()).chain(self.indexes.iter().map(String::as_str))
    }

    /// All statements as one script, each terminated by `;`.
    pub fn to_sql(&self) -> String {
        self.statements().map(|s| format!("{s};\n")).collect()
    }
}

/// Derives the structure for `schema` and renders its DDL.
pub fn generate_ddl(table: &str, schema: &SchemaNode, options: &TableOptions) -> Result<DdlStatements> {
    let structure = derive_structure(schema, options)?;
    Ok(render_ddl(table, &structure, options.dialect))
}

/// Renders DDL for an already derived structure.
pub fn render_ddl(table: &str, structure: &TableStructure, dialect: Dialect) -> DdlStatements {
    DdlStatements {
        create_table: render_create_table(table, structure, dialect),
        indexes: render_indexes(table, structure, dialect),
    }
}

/// Renders the `CREATE TABLE IF NOT EXISTS` statement.
pub fn render_create_table(table: &str, structure: &TableStructure, dialect: Dialect) -> String {
    let mut parts: Vec<String> = structure
        .columns
        .iter()
        .map(|c| render_column(c, dialect))
        .collect();

    if structure.has_composite_primary_key() {
        parts.push(format!(
            "PRIMARY KEY ({})",
            quote_list(&structure.primary_keys, dialect)
        ));
    }

    for fk in &structure.foreign_keys {
        parts.push(render_foreign_key(&fk.column, &fk.references, dialect));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        dialect.quote_ident(table),
        parts.join(",\n  ")
    )
}

/// Renders one `CREATE INDEX IF NOT EXISTS` statement per index.
pub fn render_indexes(table: &str, structure: &TableStructure, dialect: Dialect) -> Vec<String> {
    structure
        .indexes
        .iter()
        .map(|(name, columns)| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                dialect.quote_ident(name),
                dialect.quote_ident(table),
                quote_list(columns, dialect)
            )
        })
        .collect()
}

/// Renders a column definition clause.
///
/// Auto-ID and timestamp columns use the dialect's fixed clauses; every
/// other column renders as `name TYPE [PRIMARY KEY] [NOT NULL] [UNIQUE]
/// [DEFAULT expr]`.
pub fn render_column(column: &ColumnDefinition, dialect: Dialect) -> String {
    let name = dialect.quote_ident(&column.name);
    match &column.origin {
        ColumnOrigin::AutoId { id_kind } => format!("{name} {}", dialect.auto_id_clause(*id_kind)),
        ColumnOrigin::Timestamp { timestamp } => {
            format!("{name} {}", dialect.timestamp_clause(*timestamp))
        }
        ColumnOrigin::Extra | ColumnOrigin::Schema { .. } => {
            let mut clause = format!("{name} {}", column.sql_type);
            if column.primary_key {
                clause.push_str(" PRIMARY KEY");
            }
            if column.not_null && !column.primary_key {
                clause.push_str(" NOT NULL");
            }
            if column.unique {
                clause.push_str(" UNIQUE");
            }
            if let Some(default) = &column.default_value {
                clause.push_str(" DEFAULT ");
                clause.push_str(default);
            }
            clause
        }
    }
}

/// Renders `ALTER TABLE ... ADD COLUMN` for a migration.
///
/// The added column never carries `NOT NULL`, so existing rows stay valid.
pub fn render_add_column(table: &str, column: &ColumnDefinition, dialect: Dialect) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        dialect.quote_ident(table),
        dialect.quote_ident(&column.name),
        column.sql_type
    )
}

/// Renders `DROP TABLE IF EXISTS`.
pub fn render_drop_table(table: &str, dialect: Dialect) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote_ident(table))
}

fn render_foreign_key(column: &str, fk: &ForeignKey, dialect: Dialect) -> String {
    let mut clause = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote_ident(column),
        dialect.quote_ident(&fk.table),
        dialect.quote_ident(&fk.column)
    );
    if let Some(action) = fk.on_delete {
        clause.push_str(" ON DELETE ");
        clause.push_str(action.as_sql());
    }
    if let Some(action) = fk.on_update {
        clause.push_str(" ON UPDATE ");
        clause.push_str(action.as_sql());
    }
    clause
}

fn quote_list(names: &[String], dialect: Dialect) -> String {
    names
        .iter()
        .map(|n| dialect.quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AutoId, ExtraColumn, ReferentialAction};
    use serde_json::json;

    fn schema() -> SchemaNode {
        SchemaNode::object([
            ("name", SchemaNode::string()),
            ("score", SchemaNode::number().nullable()),
        ])
    }

    #[test]
    fn test_auto_id_clauses_per_dialect() {
        let expected = [
            (Dialect::Sqlite, AutoId::integer("id"), "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"),
            (Dialect::Sqlite, AutoId::uuid("id"), "\"id\" TEXT PRIMARY KEY DEFAULT (uuid())"),
            (Dialect::Postgres, AutoId::integer("id"), "\"id\" SERIAL PRIMARY KEY"),
            (
                Dialect::Postgres,
                AutoId::uuid("id"),
                "\"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()",
            ),
            (Dialect::Mysql, AutoId::integer("id"), "`id` INT AUTO_INCREMENT PRIMARY KEY"),
            (Dialect::Mysql, AutoId::uuid("id"), "`id` CHAR(36) PRIMARY KEY DEFAULT (UUID())"),
        ];
        for (dialect, auto_id, clause) in expected {
            let options = TableOptions::new(dialect).with_auto_id(auto_id);
            let ddl = generate_ddl("t", &schema(), &options).unwrap();
            assert!(ddl.create_table.contains(clause), "{dialect}: {}", ddl.create_table);
        }
    }

    #[test]
    fn test_timestamp_clauses() {
        let options = TableOptions::new(Dialect::Mysql).with_timestamps();
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert!(ddl
            .create_table
            .contains("`created_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,"));
        assert!(ddl.create_table.contains(
            "`updated_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        ));

        let options = TableOptions::new(Dialect::Postgres).with_timestamps();
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert!(ddl
            .create_table
            .contains("\"updated_at\" TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()"));
    }

    #[test]
    fn test_nullability_rendering() {
        for dialect in Dialect::ALL {
            let ddl = generate_ddl("t", &schema(), &TableOptions::new(dialect)).unwrap();
            let name = format!("{} TEXT NOT NULL", dialect.quote_ident("name"));
            assert!(ddl.create_table.contains(&name), "{dialect}");
            assert!(!ddl.create_table.contains("score\" DOUBLE PRECISION NOT NULL"));
            assert!(!ddl.create_table.contains("`score` DOUBLE NOT NULL"));
            assert!(!ddl.create_table.contains("\"score\" REAL NOT NULL"));
        }
    }

    #[test]
    fn test_inline_primary_key_on_schema_field() {
        let options = TableOptions::new(Dialect::Postgres).with_primary_key("name");
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert!(ddl.create_table.contains("\"name\" TEXT PRIMARY KEY,"));
        assert!(!ddl.create_table.contains("PRIMARY KEY ("));
    }

    #[test]
    fn test_compound_primary_key_constraint() {
        let options = TableOptions::new(Dialect::Mysql).with_primary_key(vec!["name", "score"]);
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert!(ddl.create_table.ends_with(",\n  PRIMARY KEY (`name`, `score`)\n)"));
    }

    #[test]
    fn test_extra_column_with_foreign_key() {
        let options = TableOptions::new(Dialect::Postgres).with_extra_column(
            ExtraColumn::new("org_id", "INTEGER")
                .not_null()
                .references(ForeignKey::new("orgs", "id").on_delete(ReferentialAction::Cascade)),
        );
        let ddl = generate_ddl("members", &schema(), &options).unwrap();
        assert!(ddl.create_table.contains("\"org_id\" INTEGER NOT NULL,"));
        assert!(ddl.create_table.contains(
            "FOREIGN KEY (\"org_id\") REFERENCES \"orgs\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_unique_and_raw_default_on_extra() {
        let options = TableOptions::default().with_extra_column(
            ExtraColumn::new("slug", "TEXT").unique().with_default("'none'"),
        );
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert!(ddl.create_table.contains("\"slug\" TEXT UNIQUE DEFAULT 'none'"));
    }

    #[test]
    fn test_schema_default_literal() {
        let schema = SchemaNode::object([("enabled", SchemaNode::boolean().with_default(json!(false)))]);
        let ddl = generate_ddl("t", &schema, &TableOptions::new(Dialect::Postgres)).unwrap();
        assert!(ddl.create_table.contains("\"enabled\" BOOLEAN NOT NULL DEFAULT FALSE"));
    }

    #[test]
    fn test_indexes_quoted_per_dialect() {
        let options = TableOptions::new(Dialect::Mysql).with_index("idx_t_name_score", ["name", "score"]);
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        assert_eq!(
            ddl.indexes,
            ["CREATE INDEX IF NOT EXISTS `idx_t_name_score` ON `t` (`name`, `score`)"]
        );
    }

    #[test]
    fn test_add_column_never_not_null() {
        let structure = derive_structure(&schema(), &TableOptions::default()).unwrap();
        let name = structure.column("name").unwrap();
        assert!(name.not_null);
        assert_eq!(
            render_add_column("t", name, Dialect::Sqlite),
            "ALTER TABLE \"t\" ADD COLUMN \"name\" TEXT"
        );
    }

    #[test]
    fn test_script_joins_statements() {
        let options = TableOptions::default().with_index("idx_name", ["name"]);
        let ddl = generate_ddl("t", &schema(), &options).unwrap();
        let script = ddl.to_sql();
        assert_eq!(script.matches(";\n").count(), 2);
        assert!(script.starts_with("CREATE TABLE IF NOT EXISTS \"t\""));
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(render_drop_table("t", Dialect::Mysql), "DROP TABLE IF EXISTS `t`");
    }
}
