//! SQL dialect families and their syntax differences.
//!
//! Everything that varies per target engine and is not a type mapping lives
//! here: identifier quoting, parameter placeholders, literal rendering,
//! auto-ID and timestamp column clauses, and introspection capabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::options::AutoIdKind;
use crate::structure::TimestampKind;

/// Target SQL engine family.
///
/// Parsed case-insensitively from `sqlite`, `postgres` (or `postgresql`)
/// and `mysql`; any other name is rejected with
/// [`SchemaError::UnsupportedDialect`].
///
/// # Examples
///
/// ```
/// use tableshape_core::Dialect;
///
/// let dialect: Dialect = "Postgres".parse().unwrap();
/// assert_eq!(dialect, Dialect::Postgres);
/// assert_eq!(dialect.quote_ident("users"), "\"users\"");
/// assert_eq!(Dialect::Mysql.quote_ident("users"), "`users`");
/// assert!("oracle".parse::<Dialect>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    /// SQLite and compatible engines (libSQL, Turso).
    #[default]
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    Mysql,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 3] = [Dialect::Sqlite, Dialect::Postgres, Dialect::Mysql];

    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_ident(self, name: &str) -> String {
        let quote = match self {
            Dialect::Sqlite | Dialect::Postgres => '"',
            Dialect::Mysql => '`',
        };
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for c in name.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Column type used for JSON-serialized values.
    pub fn json_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgres => "JSONB",
            Dialect::Mysql => "JSON",
        }
    }

    /// Column type used for datetime-formatted strings and dates.
    pub fn datetime_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgres => "TIMESTAMP WITH TIME ZONE",
            Dialect::Mysql => "DATETIME",
        }
    }

    /// Returns the bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Postgres => format!("${index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Longest identifier the engine accepts, in bytes. SQLite has no
    /// practical limit.
    pub fn max_identifier_len(self) -> Option<usize> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => Some(63),
            Dialect::Mysql => Some(64),
        }
    }

    /// Whether `CREATE`/`DROP TABLE` can run inside a transaction that is
    /// later rolled back. MySQL commits implicitly on DDL.
    pub fn supports_transactional_ddl(self) -> bool {
        match self {
            Dialect::Sqlite | Dialect::Postgres => true,
            Dialect::Mysql => false,
        }
    }

    /// Statement that opens a transaction.
    pub fn begin_transaction(self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::Postgres => "BEGIN",
            Dialect::Mysql => "START TRANSACTION",
        }
    }

    /// Renders a JSON value as a SQL literal suitable for a `DEFAULT` clause.
    ///
    /// Strings are single-quoted with embedded quotes doubled; arrays and
    /// objects are rendered as quoted JSON text.
    pub fn literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match (self, b) {
                (Dialect::Sqlite, true) => "1".to_string(),
                (Dialect::Sqlite, false) => "0".to_string(),
                (_, true) => "TRUE".to_string(),
                (_, false) => "FALSE".to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_string(s),
            Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
        }
    }

    /// Full column clause (type and constraints) for an auto-ID column.
    pub fn auto_id_clause(self, kind: AutoIdKind) -> &'static str {
        match (self, kind) {
            (Dialect::Sqlite, AutoIdKind::Integer) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (Dialect::Sqlite, AutoIdKind::Uuid) => "TEXT PRIMARY KEY DEFAULT (uuid())",
            (Dialect::Postgres, AutoIdKind::Integer) => "SERIAL PRIMARY KEY",
            (Dialect::Postgres, AutoIdKind::Uuid) => "UUID PRIMARY KEY DEFAULT gen_random_uuid()",
            (Dialect::Mysql, AutoIdKind::Integer) => "INT AUTO_INCREMENT PRIMARY KEY",
            (Dialect::Mysql, AutoIdKind::Uuid) => "CHAR(36) PRIMARY KEY DEFAULT (UUID())",
        }
    }

    /// Bare column type of an auto-ID column, as used by `ADD COLUMN`.
    pub fn auto_id_type(self, kind: AutoIdKind) -> &'static str {
        match (self, kind) {
            (Dialect::Sqlite, AutoIdKind::Integer) => "INTEGER",
            (Dialect::Sqlite, AutoIdKind::Uuid) => "TEXT",
            (Dialect::Postgres, AutoIdKind::Integer) => "SERIAL",
            (Dialect::Postgres, AutoIdKind::Uuid) => "UUID",
            (Dialect::Mysql, AutoIdKind::Integer) => "INT",
            (Dialect::Mysql, AutoIdKind::Uuid) => "CHAR(36)",
        }
    }

    /// Default expression of a UUID auto-ID column.
    pub fn uuid_default(self) -> &'static str {
        match self {
            Dialect::Sqlite => "(uuid())",
            Dialect::Postgres => "gen_random_uuid()",
            Dialect::Mysql => "(UUID())",
        }
    }

    /// Bare column type of the `created_at`/`updated_at` columns.
    pub fn timestamp_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgres => "TIMESTAMP WITH TIME ZONE",
            Dialect::Mysql => "TIMESTAMP",
        }
    }

    /// Default expression of the timestamp columns.
    pub fn timestamp_default(self) -> &'static str {
        match self {
            Dialect::Sqlite => "(datetime('now'))",
            Dialect::Postgres => "NOW()",
            Dialect::Mysql => "CURRENT_TIMESTAMP",
        }
    }

    /// Full column clause for a timestamp column.
    pub fn timestamp_clause(self, kind: TimestampKind) -> String {
        let base = format!(
            "{} NOT NULL DEFAULT {}",
            self.timestamp_type(),
            self.timestamp_default()
        );
        match (self, kind) {
            (Dialect::Mysql, TimestampKind::Updated) => {
                format!("{base} ON UPDATE CURRENT_TIMESTAMP")
            }
            _ => base,
        }
    }
}

fn quote_string(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            _ => Err(SchemaError::UnsupportedDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(dialect: Dialect) -> Self {
        dialect.as_str().to_string()
    }
}
