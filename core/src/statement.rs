//! Parameterized DML statements over a derived structure.
//!
//! Builders never interpolate values into SQL: each value becomes a dialect
//! placeholder (`?1` for SQLite, `$1` for PostgreSQL, `?` for MySQL) and is
//! returned alongside the SQL in [`Statement::params`]. Column names are
//! checked against the structure before they are quoted into the text.

use serde_json::{Map, Value};

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::structure::TableStructure;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

fn check_column(structure: &TableStructure, name: &str) -> Result<()> {
    if structure.has_column(name) {
        Ok(())
    } else {
        Err(SchemaError::UnknownColumn(name.to_string()))
    }
}

/// Builds an `INSERT` for a flat row.
///
/// Columns are emitted in structure order, not row order. An empty row
/// inserts defaults only.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tableshape_core::*;
///
/// let schema = SchemaNode::object([("a", SchemaNode::string()), ("b", SchemaNode::integer())]);
/// let options = TableOptions::new(Dialect::Postgres);
/// let structure = derive_structure(&schema, &options).unwrap();
///
/// let row = json!({ "b": 2, "a": "x" });
/// let stmt = insert_statement("t", &structure, Dialect::Postgres, row.as_object().unwrap()).unwrap();
/// assert_eq!(stmt.sql, "INSERT INTO \"t\" (\"a\", \"b\") VALUES ($1, $2)");
/// assert_eq!(stmt.params, vec![json!("x"), json!(2)]);
/// ```
pub fn insert_statement(
    table: &str,
    structure: &TableStructure,
    dialect: Dialect,
    row: &Map<String, Value>,
) -> Result<Statement> {
    for key in row.keys() {
        check_column(structure, key)?;
    }

    let table = dialect.quote_ident(table);
    let mut columns = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for column in &structure.columns {
        if let Some(value) = row.get(&column.name) {
            columns.push(dialect.quote_ident(&column.name));
            params.push(value.clone());
        }
    }

    if columns.is_empty() {
        let sql = match dialect {
            Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
            Dialect::Sqlite | Dialect::Postgres => format!("INSERT INTO {table} DEFAULT VALUES"),
        };
        return Ok(Statement::new(sql, params));
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect.placeholder(i)).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(Statement::new(sql, params))
}

/// Builds an `UPDATE ... SET ... WHERE` with equality filters.
///
/// An empty `filter` updates every row; empty `changes` is an error.
pub fn update_statement(
    table: &str,
    structure: &TableStructure,
    dialect: Dialect,
    changes: &Map<String, Value>,
    filter: &Map<String, Value>,
) -> Result<Statement> {
    for key in changes.keys() {
        check_column(structure, key)?;
    }
    if changes.is_empty() {
        return Err(SchemaError::EmptyUpdate);
    }

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for column in &structure.columns {
        if let Some(value) = changes.get(&column.name) {
            params.push(value.clone());
            assignments.push(format!(
                "{} = {}",
                dialect.quote_ident(&column.name),
                dialect.placeholder(params.len())
            ));
        }
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_ident(table),
        assignments.join(", ")
    );
    let filters: Vec<(String, Value)> = filter.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    push_where(&mut sql, &mut params, structure, dialect, &filters)?;
    Ok(Statement::new(sql, params))
}

fn push_where(
    sql: &mut String,
    params: &mut Vec<Value>,
    structure: &TableStructure,
    dialect: Dialect,
    filters: &[(String, Value)],
) -> Result<()> {
    let mut clauses = Vec::with_capacity(filters.len());
    for (column, value) in filters {
        check_column(structure, column)?;
        let quoted = dialect.quote_ident(column);
        if value.is_null() {
            clauses.push(format!("{quoted} IS NULL"));
        } else {
            params.push(value.clone());
            clauses.push(format!("{quoted} = {}", dialect.placeholder(params.len())));
        }
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

/// Sort direction for [`SelectBuilder::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Builder for `SELECT` statements over one table.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tableshape_core::*;
///
/// let schema = SchemaNode::object([("name", SchemaNode::string()), ("age", SchemaNode::integer())]);
/// let structure = derive_structure(&schema, &TableOptions::default()).unwrap();
///
/// let stmt = SelectBuilder::new("people", &structure, Dialect::Sqlite)
///     .columns(["name"])
///     .filter_eq("age", json!(30))
///     .order_by("name", Order::Asc)
///     .limit(10)
///     .build()
///     .unwrap();
/// assert_eq!(
///     stmt.sql,
///     "SELECT \"name\" FROM \"people\" WHERE \"age\" = ?1 ORDER BY \"name\" ASC LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SelectBuilder<'a> {
    table: String,
    structure: &'a TableStructure,
    dialect: Dialect,
    columns: Vec<String>,
    filters: Vec<(String, Value)>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(table: impl Into<String>, structure: &'a TableStructure, dialect: Dialect) -> Self {
        Self {
            table: table.into(),
            structure,
            dialect,
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Restricts the selected columns. Defaults to every column.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds `column = value`; a `null` value becomes `column IS NULL`.
    pub fn filter_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    /// Adds every entry of `filter` as an equality filter.
    pub fn filter_map(mut self, filter: &Map<String, Value>) -> Self {
        self.filters
            .extend(filter.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Builds `SELECT COUNT(*)` with the same filters.
    pub fn count(&self) -> Result<Statement> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(&self.table));
        let mut params = Vec::new();
        push_where(&mut sql, &mut params, self.structure, self.dialect, &self.filters)?;
        Ok(Statement::new(sql, params))
    }

    pub fn build(&self) -> Result<Statement> {
        let dialect = self.dialect;
        let projection = if self.columns.is_empty() {
            self.structure
                .columns
                .iter()
                .map(|c| dialect.quote_ident(&c.name))
                .collect::<Vec<_>>()
        } else {
            let mut quoted = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                check_column(self.structure, column)?;
                quoted.push(dialect.quote_ident(column));
            }
            quoted
        };

        let mut sql = format!(
            "SELECT {} FROM {}",
            projection.join(", "),
            dialect.quote_ident(&self.table)
        );
        let mut params = Vec::new();
        push_where(&mut sql, &mut params, self.structure, dialect, &self.filters)?;

        if !self.order.is_empty() {
            let mut terms = Vec::with_capacity(self.order.len());
            for (column, order) in &self.order {
                check_column(self.structure, column)?;
                terms.push(format!("{} {}", dialect.quote_ident(column), order.as_sql()));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // OFFSET alone is not valid in SQLite or MySQL.
            (None, Some(offset)) => match dialect {
                Dialect::Sqlite => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                Dialect::Mysql => sql.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX)),
                Dialect::Postgres => sql.push_str(&format!(" OFFSET {offset}")),
            },
            (None, None) => {}
        }

        Ok(Statement::new(sql, params))
    }
}
