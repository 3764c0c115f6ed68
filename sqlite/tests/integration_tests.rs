//! Integration tests for the tableshape-sqlite crate.

use std::cell::RefCell;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::{Map, Value, json};
use tableshape_catalog::{TableCatalog, TableDefinition};
use tableshape_core::{AutoId, Dialect, ExtraColumn, Order, Row, SchemaNode, TableOptions};
use tableshape_sqlite::{
    BatchOptions, Executor, MigrationEvent, MigrationOptions, MigrationOutcome, Migrator,
    RecordingListener, RecreateStage, SqliteError, Table, get_live_columns, migrate,
};

/// Wraps a connection and remembers every statement it runs.
struct Recording<'c> {
    conn: &'c Connection,
    statements: RefCell<Vec<String>>,
}

impl<'c> Recording<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            statements: RefCell::new(Vec::new()),
        }
    }

    fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements
            .borrow()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }

    fn clear(&self) {
        self.statements.borrow_mut().clear();
    }
}

impl Executor for Recording<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> tableshape_sqlite::Result<Vec<Row>> {
        self.statements.borrow_mut().push(sql.to_string());
        Executor::execute(self.conn, sql, params)
    }
}

/// Fails every statement starting with `prefix`.
struct FailOn<'c> {
    conn: &'c Connection,
    prefix: &'static str,
}

impl Executor for FailOn<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> tableshape_sqlite::Result<Vec<Row>> {
        if sql.starts_with(self.prefix) {
            return Err(SqliteError::ExecutionError("injected fault".to_string()));
        }
        Executor::execute(self.conn, sql, params)
    }
}

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn live_columns(conn: &Connection, table: &str) -> Vec<String> {
    get_live_columns(table, conn, Dialect::Sqlite)
}

/// `{id, name, obsolete}` with two rows.
fn legacy_people(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, obsolete TEXT);
         INSERT INTO people (id, name, obsolete) VALUES (1, 'Ada', 'x');
         INSERT INTO people (id, name, obsolete) VALUES (2, 'Grace', NULL);",
    )
    .unwrap();
}

fn people_schema() -> (SchemaNode, TableOptions) {
    (
        SchemaNode::object([("name", SchemaNode::string())]),
        TableOptions::default().with_auto_id(AutoId::integer("id")),
    )
}

#[test]
fn test_add_columns_then_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE users (name TEXT)").unwrap();
    let schema = SchemaNode::object([
        ("name", SchemaNode::string()),
        ("email", SchemaNode::string()),
        (
            "profile",
            SchemaNode::object([("age", SchemaNode::integer().optional())]),
        ),
    ]);
    let db = Recording::new(&conn);
    let migrator = Migrator::new(MigrationOptions::default());

    let outcome = migrator
        .migrate("users", &schema, &TableOptions::default(), &db)
        .unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::ColumnsAdded {
            columns: vec!["email".into(), "profile_age".into()]
        }
    );
    assert_eq!(db.count_starting_with("ALTER TABLE"), 2);
    assert_eq!(live_columns(&conn, "users"), ["name", "email", "profile_age"]);

    db.clear();
    let again = migrator
        .migrate("users", &schema, &TableOptions::default(), &db)
        .unwrap();
    assert_eq!(again, MigrationOutcome::UpToDate);
    assert_eq!(db.count_starting_with("ALTER TABLE"), 0);
}

#[test]
fn test_added_columns_are_nullable() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE t (a TEXT); INSERT INTO t (a) VALUES ('old');")
        .unwrap();
    let schema = SchemaNode::object([("a", SchemaNode::string()), ("b", SchemaNode::integer())]);

    migrate("t", &schema, &TableOptions::default(), &conn, MigrationOptions::default()).unwrap();

    // Existing rows stay valid even though `b` is required in the schema.
    let rows = Executor::execute(&conn, "SELECT a, b FROM t", &[]).unwrap();
    assert_eq!(rows[0]["a"], json!("old"));
    assert_eq!(rows[0]["b"], Value::Null);
}

#[test]
fn test_missing_table_is_noop() {
    let conn = Connection::open_in_memory().unwrap();
    let db = Recording::new(&conn);
    let (schema, options) = people_schema();

    let outcome = Migrator::new(MigrationOptions::destructive())
        .migrate("nobody", &schema, &options, &db)
        .unwrap();
    assert_eq!(outcome, MigrationOutcome::TableMissing);
    assert_eq!(db.count_starting_with("CREATE"), 0);
    assert_eq!(db.count_starting_with("ALTER"), 0);
}

#[test]
fn test_destructive_change_blocked_without_authorization() {
    let conn = Connection::open_in_memory().unwrap();
    legacy_people(&conn);
    let (schema, options) = people_schema();
    let listener = RecordingListener::new();

    let err = Migrator::new(MigrationOptions::default())
        .with_listener(&listener)
        .migrate("people", &schema, &options, &conn)
        .unwrap_err();
    match err {
        SqliteError::DestructiveMigrationBlocked { table, columns } => {
            assert_eq!(table, "people");
            assert_eq!(columns, ["obsolete"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(live_columns(&conn, "people"), ["id", "name", "obsolete"]);
    let rows = Executor::execute(&conn, "SELECT obsolete FROM people WHERE id = 1", &[]).unwrap();
    assert_eq!(rows[0]["obsolete"], json!("x"));
    assert!(listener.events().contains(&MigrationEvent::DestructiveChangeBlocked {
        table: "people".into(),
        columns: vec!["obsolete".into()],
    }));
}

#[test]
fn test_destructive_recreate_preserves_values() {
    let conn = Connection::open_in_memory().unwrap();
    legacy_people(&conn);
    let (schema, options) = people_schema();
    let listener = RecordingListener::new();

    let outcome = Migrator::new(MigrationOptions::destructive())
        .with_listener(&listener)
        .migrate("people", &schema, &options, &conn)
        .unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Recreated {
            added: vec![],
            removed: vec!["obsolete".into()],
            rows_restored: 2,
        }
    );
    assert_eq!(live_columns(&conn, "people"), ["id", "name"]);

    let people = Table::new("people", &schema, &options, &conn).unwrap();
    let rows = people.fetch(&people.select().order_by("id", Order::Asc)).unwrap();
    assert_eq!(
        rows,
        vec![json!({ "id": 1, "name": "Ada" }), json!({ "id": 2, "name": "Grace" })]
    );

    let kinds: Vec<&str> = listener
        .events()
        .iter()
        .map(|e| match e {
            MigrationEvent::PlanComputed { .. } => "plan",
            MigrationEvent::BackupTaken { .. } => "backup",
            MigrationEvent::TableDropped { .. } => "drop",
            MigrationEvent::TableRecreated { .. } => "create",
            MigrationEvent::RowsRestored { .. } => "restore",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, ["plan", "backup", "drop", "create", "restore"]);

    // A second run has nothing left to do.
    let again = Migrator::new(MigrationOptions::destructive())
        .migrate("people", &schema, &options, &conn)
        .unwrap();
    assert_eq!(again, MigrationOutcome::UpToDate);
}

#[test]
fn test_transactional_recreate_rolls_back_on_restore_failure() {
    let conn = Connection::open_in_memory().unwrap();
    legacy_people(&conn);
    let (schema, options) = people_schema();
    let db = FailOn {
        conn: &conn,
        prefix: "INSERT",
    };
    let listener = RecordingListener::new();

    let err = Migrator::new(MigrationOptions::destructive().with_transaction())
        .with_listener(&listener)
        .migrate("people", &schema, &options, &db)
        .unwrap_err();
    match err {
        SqliteError::MigrationRecreateFailed {
            table,
            stage,
            rolled_back,
            ..
        } => {
            assert_eq!(table, "people");
            assert_eq!(stage, RecreateStage::Restore);
            assert!(rolled_back);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The original table and its data survive.
    assert_eq!(live_columns(&conn, "people"), ["id", "name", "obsolete"]);
    let rows = Executor::execute(&conn, "SELECT COUNT(*) AS n FROM people", &[]).unwrap();
    assert_eq!(rows[0]["n"], json!(2));
    assert!(listener.events().contains(&MigrationEvent::RecreateRolledBack {
        table: "people".into()
    }));
}

#[test]
fn test_non_transactional_recreate_failure_is_not_rolled_back() {
    let conn = Connection::open_in_memory().unwrap();
    legacy_people(&conn);
    let (schema, options) = people_schema();
    let db = FailOn {
        conn: &conn,
        prefix: "INSERT",
    };

    let err = Migrator::new(MigrationOptions::destructive())
        .migrate("people", &schema, &options, &db)
        .unwrap_err();
    assert!(matches!(
        err,
        SqliteError::MigrationRecreateFailed {
            stage: RecreateStage::Restore,
            rolled_back: false,
            ..
        }
    ));

    // Dropped and recreated, nothing restored.
    assert_eq!(live_columns(&conn, "people"), ["id", "name"]);
    let rows = Executor::execute(&conn, "SELECT COUNT(*) AS n FROM people", &[]).unwrap();
    assert_eq!(rows[0]["n"], json!(0));
}

#[test]
fn test_backup_failure_changes_nothing() {
    let conn = Connection::open_in_memory().unwrap();
    legacy_people(&conn);
    let (schema, options) = people_schema();
    // Introspection uses PRAGMA, so only the backup SELECT fails.
    let db = FailOn {
        conn: &conn,
        prefix: "SELECT",
    };

    let err = Migrator::new(MigrationOptions::destructive().with_transaction())
        .migrate("people", &schema, &options, &db)
        .unwrap_err();
    assert!(matches!(
        err,
        SqliteError::MigrationRecreateFailed {
            stage: RecreateStage::Backup,
            rolled_back: false,
            ..
        }
    ));
    assert_eq!(live_columns(&conn, "people"), ["id", "name", "obsolete"]);
}

#[test]
fn test_recreate_preserves_blob_values() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE files (id INTEGER PRIMARY KEY, name TEXT, payload BLOB, obsolete TEXT);
         INSERT INTO files (id, name, payload, obsolete) VALUES (1, 'a.bin', X'0102', 'x');",
    )
    .unwrap();
    let schema = SchemaNode::object([("name", SchemaNode::string())]);
    let options = TableOptions::default()
        .with_auto_id(AutoId::integer("id"))
        .with_extra_column(ExtraColumn::new("payload", "BLOB"));

    Migrator::new(MigrationOptions::destructive())
        .migrate("files", &schema, &options, &conn)
        .unwrap();

    assert_eq!(live_columns(&conn, "files"), ["id", "name", "payload"]);
    let rows = Executor::execute(
        &conn,
        "SELECT typeof(payload) AS kind, hex(payload) AS bytes FROM files",
        &[],
    )
    .unwrap();
    assert_eq!(rows[0]["kind"], json!("blob"));
    assert_eq!(rows[0]["bytes"], json!("0102"));
}

#[test]
fn test_recreate_row_without_restorable_values_uses_defaults() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE notes (body TEXT, obsolete TEXT);
         INSERT INTO notes (body, obsolete) VALUES (NULL, 'x');",
    )
    .unwrap();
    let schema = SchemaNode::object([("body", SchemaNode::string().optional())]);
    let db = Recording::new(&conn);
    let listener = RecordingListener::new();

    let outcome = Migrator::new(MigrationOptions::destructive())
        .with_listener(&listener)
        .migrate("notes", &schema, &TableOptions::default(), &db)
        .unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Recreated {
            added: vec![],
            removed: vec!["obsolete".into()],
            rows_restored: 1,
        }
    );
    assert_eq!(db.count_starting_with("INSERT INTO \"notes\" DEFAULT VALUES"), 1);
    assert!(listener.events().contains(&MigrationEvent::RowsRestored {
        table: "notes".into(),
        rows: 1,
        defaulted: 1,
    }));

    let rows = Executor::execute(&conn, "SELECT body FROM notes", &[]).unwrap();
    assert_eq!(rows, vec![obj(json!({ "body": null }))]);
}

#[test]
fn test_recreate_null_value_takes_column_default() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, status TEXT, obsolete TEXT);
         INSERT INTO accounts (id, status, obsolete) VALUES (1, NULL, 'x');
         INSERT INTO accounts (id, status, obsolete) VALUES (2, 'closed', 'y');",
    )
    .unwrap();
    let schema = SchemaNode::object([("status", SchemaNode::string().with_default(json!("active")))]);
    let options = TableOptions::default().with_auto_id(AutoId::integer("id"));

    Migrator::new(MigrationOptions::destructive())
        .migrate("accounts", &schema, &options, &conn)
        .unwrap();

    let rows = Executor::execute(&conn, "SELECT id, status FROM accounts ORDER BY id", &[]).unwrap();
    assert_eq!(
        rows,
        vec![
            obj(json!({ "id": 1, "status": "active" })),
            obj(json!({ "id": 2, "status": "closed" })),
        ]
    );
}

/// Answers like a MySQL server holding `people(id, name, obsolete)`.
struct ScriptedMysql {
    statements: RefCell<Vec<String>>,
}

impl Executor for ScriptedMysql {
    fn execute(&self, sql: &str, _params: &[Value]) -> tableshape_sqlite::Result<Vec<Row>> {
        self.statements.borrow_mut().push(sql.to_string());
        if sql.starts_with("SHOW COLUMNS") {
            return Ok(["id", "name", "obsolete"]
                .iter()
                .map(|field| obj(json!({ "Field": field })))
                .collect());
        }
        if sql.starts_with("SELECT") {
            return Ok(vec![obj(json!({ "id": 1, "name": "Ada", "obsolete": "x" }))]);
        }
        Ok(Vec::new())
    }

    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }
}

#[test]
fn test_mysql_transactional_request_runs_without_transaction() {
    let db = ScriptedMysql {
        statements: RefCell::new(Vec::new()),
    };
    let schema = SchemaNode::object([("name", SchemaNode::string())]);
    let options = TableOptions::new(Dialect::Mysql).with_auto_id(AutoId::integer("id"));
    let listener = RecordingListener::new();

    let outcome = Migrator::new(MigrationOptions::destructive().with_transaction())
        .with_listener(&listener)
        .migrate("people", &schema, &options, &db)
        .unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Recreated {
            added: vec![],
            removed: vec!["obsolete".into()],
            rows_restored: 1,
        }
    );
    assert!(listener.events().contains(&MigrationEvent::TransactionUnavailable {
        table: "people".into(),
        dialect: Dialect::Mysql,
    }));

    let statements = db.statements.borrow();
    for keyword in ["START TRANSACTION", "BEGIN", "COMMIT", "ROLLBACK"] {
        assert!(
            !statements.iter().any(|s| s.starts_with(keyword)),
            "unexpected {keyword} in {statements:?}"
        );
    }
    assert!(statements.iter().any(|s| s.starts_with("DROP TABLE")));
    assert!(statements.iter().any(|s| s.starts_with("INSERT INTO `people`")));
}

#[test]
fn test_document_round_trip() {
    let conn = Connection::open_in_memory().unwrap();
    let schema = SchemaNode::object([
        ("title", SchemaNode::string()),
        ("published", SchemaNode::boolean()),
        (
            "meta",
            SchemaNode::object([
                ("pages", SchemaNode::integer()),
                ("tags", SchemaNode::array(SchemaNode::string())),
                ("isbn", SchemaNode::string().optional()),
            ]),
        ),
    ]);
    let options = TableOptions::default().with_auto_id(AutoId::integer("id"));
    let books = Table::new("books", &schema, &options, &conn).unwrap();
    books.create().unwrap();
    assert!(books.exists());

    books
        .insert(&obj(json!({
            "title": "Dune",
            "published": true,
            "meta": { "pages": 412, "tags": ["sf", "classic"] }
        })))
        .unwrap();
    books
        .insert(&obj(json!({
            "title": "Draft",
            "published": false,
            "meta": { "pages": 3, "tags": [], "isbn": "000" }
        })))
        .unwrap();

    let found = books.find(&obj(json!({ "title": "Dune" }))).unwrap();
    assert_eq!(
        found,
        vec![json!({
            "id": 1,
            "title": "Dune",
            "published": true,
            "meta": { "pages": 412, "tags": ["sf", "classic"] }
        })]
    );

    books
        .update(
            &obj(json!({ "meta": { "pages": 5 } })),
            &obj(json!({ "title": "Draft" })),
        )
        .unwrap();
    let draft = books.find(&obj(json!({ "meta_pages": 5 }))).unwrap();
    assert_eq!(draft.len(), 1);
    assert_eq!(draft[0]["meta"]["isbn"], json!("000"));

    assert_eq!(books.count(&Map::new()).unwrap(), 2);
    assert_eq!(books.count(&obj(json!({ "published": false }))).unwrap(), 1);
}

#[test]
fn test_batch_insert_stop_on_error() {
    let conn = Connection::open_in_memory().unwrap();
    let schema = SchemaNode::object([("sku", SchemaNode::string())]);
    let items = Table::new("items", &schema, &TableOptions::default(), &conn).unwrap();
    items.create().unwrap();

    // Row 1 violates NOT NULL on `sku`.
    let docs = vec![
        json!({ "sku": "a" }),
        json!({}),
        json!({ "sku": "c" }),
        json!({ "sku": "d" }),
    ];

    let report = items.insert_batch(
        &docs,
        &BatchOptions {
            chunk_size: 2,
            stop_on_error: true,
        },
    );
    assert_eq!(report.inserted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.chunks, 1);
    assert!(report.aborted);
    assert!(!report.is_complete());

    items.drop_table().unwrap();
    items.create().unwrap();
    let report = items.insert_batch(
        &docs,
        &BatchOptions {
            chunk_size: 2,
            stop_on_error: false,
        },
    );
    assert_eq!(report.inserted, 3);
    assert_eq!(report.chunks, 2);
    assert!(!report.aborted);
    assert_eq!(items.count(&Map::new()).unwrap(), 3);
}

#[test]
fn test_timestamps_default_to_now() {
    let conn = Connection::open_in_memory().unwrap();
    let schema = SchemaNode::object([("body", SchemaNode::string())]);
    let options = TableOptions::default().with_timestamps();
    let notes = Table::new("notes", &schema, &options, &conn).unwrap();
    notes.create().unwrap();
    notes.insert(&obj(json!({ "body": "hello" }))).unwrap();

    let rows = notes.fetch_all().unwrap();
    let created = rows[0]["created_at"].as_str().unwrap();
    let updated = rows[0]["updated_at"].as_str().unwrap();
    let created = NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S").unwrap();
    NaiveDateTime::parse_from_str(updated, "%Y-%m-%d %H:%M:%S").unwrap();

    let age = chrono::Utc::now().naive_utc() - created;
    assert!(age.num_seconds().abs() < 60);
}

#[test]
fn test_migrate_catalog() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE accounts (email TEXT)").unwrap();
    let catalog = TableCatalog::from_definitions([
        TableDefinition::new(
            "accounts",
            SchemaNode::object([
                ("email", SchemaNode::string()),
                ("plan", SchemaNode::string()),
            ]),
            TableOptions::default(),
        ),
        TableDefinition::new(
            "invoices",
            SchemaNode::object([("total", SchemaNode::number())]),
            TableOptions::default(),
        ),
    ])
    .unwrap();

    let outcomes = Migrator::new(MigrationOptions::default())
        .migrate_catalog(&catalog, &conn)
        .unwrap();
    assert_eq!(
        outcomes,
        vec![
            (
                "accounts".to_string(),
                MigrationOutcome::ColumnsAdded {
                    columns: vec!["plan".into()]
                }
            ),
            ("invoices".to_string(), MigrationOutcome::TableMissing),
        ]
    );

    let invoices = Table::from_definition(catalog.require("invoices").unwrap(), &conn).unwrap();
    invoices.create().unwrap();
    assert_eq!(
        Migrator::new(MigrationOptions::default())
            .migrate_catalog(&catalog, &conn)
            .unwrap()
            .into_iter()
            .map(|(_, outcome)| outcome)
            .collect::<Vec<_>>(),
        [MigrationOutcome::UpToDate, MigrationOutcome::UpToDate]
    );
}

#[test]
fn test_file_backed_database_persists_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let schema = SchemaNode::object([("a", SchemaNode::string())]);
    {
        let conn = Connection::open(&path).unwrap();
        Table::new("t", &schema, &TableOptions::default(), &conn)
            .unwrap()
            .create()
            .unwrap();
    }

    let wider = SchemaNode::object([("a", SchemaNode::string()), ("b", SchemaNode::date())]);
    {
        let conn = Connection::open(&path).unwrap();
        migrate("t", &wider, &TableOptions::default(), &conn, MigrationOptions::default()).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(live_columns(&conn, "t"), ["a", "b"]);
}
