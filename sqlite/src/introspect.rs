//! Live table introspection.

use serde_json::Value;
use tableshape_core::Dialect;
use tracing::debug;

use crate::executor::Executor;

/// Returns the live column names of `table`, in table order.
///
/// Uses `PRAGMA table_info` on SQLite, `SHOW COLUMNS` on MySQL and
/// `information_schema.columns` (restricted to the current schema) on
/// PostgreSQL. An introspection failure is reported as an empty list:
/// callers treat both as "table absent".
pub fn get_live_columns<E: Executor + ?Sized>(table: &str, db: &E, dialect: Dialect) -> Vec<String> {
    let (sql, params, field) = match dialect {
        Dialect::Sqlite => (
            format!("PRAGMA table_info({})", dialect.quote_ident(table)),
            Vec::new(),
            "name",
        ),
        Dialect::Mysql => (
            format!("SHOW COLUMNS FROM {}", dialect.quote_ident(table)),
            Vec::new(),
            "Field",
        ),
        Dialect::Postgres => (
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position"
                .to_string(),
            vec![Value::from(table)],
            "column_name",
        ),
    };

    match db.execute(&sql, &params) {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| row.get(field).and_then(Value::as_str).map(String::from))
            .collect(),
        Err(err) => {
            debug!(table = %table, error = %err, "introspection failed, treating table as absent");
            Vec::new()
        }
    }
}

/// Returns `true` if `table` has at least one live column.
pub fn table_exists<E: Executor + ?Sized>(table: &str, db: &E, dialect: Dialect) -> bool {
    !get_live_columns(table, db, dialect).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SqliteError};
    use rusqlite::Connection;
    use std::cell::RefCell;
    use tableshape_core::Row;

    struct Scripted {
        seen: RefCell<Vec<(String, Vec<Value>)>>,
        rows: Vec<Row>,
    }

    impl Executor for Scripted {
        fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            self.seen.borrow_mut().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    struct Failing;

    impl Executor for Failing {
        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Err(SqliteError::ExecutionError("boom".into()))
        }
    }

    fn row(key: &str, value: &str) -> Row {
        let mut row = Row::new();
        row.insert(key.to_string(), Value::from(value));
        row
    }

    #[test]
    fn test_sqlite_pragma() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        assert_eq!(get_live_columns("users", &conn, Dialect::Sqlite), ["id", "name"]);
        assert!(get_live_columns("missing", &conn, Dialect::Sqlite).is_empty());
        assert!(table_exists("users", &conn, Dialect::Sqlite));
    }

    #[test]
    fn test_mysql_show_columns() {
        let db = Scripted {
            seen: RefCell::new(Vec::new()),
            rows: vec![row("Field", "id"), row("Field", "email")],
        };
        assert_eq!(get_live_columns("users", &db, Dialect::Mysql), ["id", "email"]);
        assert_eq!(db.seen.borrow()[0].0, "SHOW COLUMNS FROM `users`");
    }

    #[test]
    fn test_postgres_binds_table_name() {
        let db = Scripted {
            seen: RefCell::new(Vec::new()),
            rows: vec![row("column_name", "id")],
        };
        assert_eq!(get_live_columns("users", &db, Dialect::Postgres), ["id"]);
        let seen = db.seen.borrow();
        assert!(seen[0].0.contains("information_schema.columns"));
        assert!(seen[0].0.contains("table_schema = current_schema()"));
        assert_eq!(seen[0].1, vec![Value::from("users")]);
    }

    #[test]
    fn test_failure_means_absent() {
        assert!(get_live_columns("users", &Failing, Dialect::Postgres).is_empty());
        assert!(!table_exists("users", &Failing, Dialect::Sqlite));
    }
}
