//! Statement execution capability.
//!
//! The migration engine and [`Table`](crate::Table) only need to run one
//! statement at a time and read back its rows. [`Executor`] is that seam:
//! it is implemented for [`rusqlite::Connection`], and callers targeting
//! another SQLite-family client (or wrapping a connection to record or
//! fault-inject statements) implement it themselves.

use rusqlite::Connection;
use rusqlite::params_from_iter;
use serde_json::Value;
use tableshape_core::{Dialect, Row};
use tracing::debug;

use crate::convert::{row_to_map, to_sql_value};
use crate::error::Result;

/// Runs SQL statements and returns their rows.
pub trait Executor {
    /// Executes `sql` with positional `params`.
    ///
    /// Statements that produce no result columns return an empty list.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Dialect of the statements this executor accepts.
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).execute(sql, params)
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }
}

impl Executor for Connection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "executing statement");
        let mut stmt = self.prepare(sql)?;
        let bound = params.iter().map(to_sql_value).collect::<Result<Vec<_>>>()?;

        if stmt.column_count() == 0 {
            stmt.execute(params_from_iter(&bound))?;
            return Ok(Vec::new());
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(&bound))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_map(row, &names)?);
        }
        Ok(out)
    }
}
