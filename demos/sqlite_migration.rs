//! SQLite migration and data access example.
//!
//! Creates a table from a schema, stores nested documents, evolves the
//! schema additively, then removes a field with an authorized recreate.
//! Every migration step is printed from a recording listener.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p tableshape-demos --example sqlite_migration
//! ```

use rusqlite::Connection;
use serde_json::json;
use tableshape_core::{AutoId, SchemaNode, TableOptions};
use tableshape_sqlite::{
    BatchOptions, MigrationEvent, MigrationOptions, Migrator, RecordingListener, Table,
};

fn main() {
    let conn = Connection::open_in_memory().unwrap();
    let options = TableOptions::default()
        .with_auto_id(AutoId::integer("id"))
        .with_timestamps();

    // === Step 1: Create the table and insert documents ===
    println!("=== Create ===");
    let v1 = SchemaNode::object([
        ("title", SchemaNode::string()),
        ("legacy_code", SchemaNode::string().optional()),
        (
            "meta",
            SchemaNode::object([
                ("pages", SchemaNode::integer()),
                ("tags", SchemaNode::array(SchemaNode::string())),
            ]),
        ),
    ]);
    let books = Table::new("books", &v1, &options, &conn).unwrap();
    books.create().unwrap();
    print!("{}", books.ddl().to_sql());

    let report = books.insert_batch(
        &[
            json!({ "title": "Dune", "legacy_code": "D1", "meta": { "pages": 412, "tags": ["sf"] } }),
            json!({ "title": "Emma", "meta": { "pages": 474, "tags": [] } }),
            json!({ "meta": { "pages": 1, "tags": [] } }),
        ],
        &BatchOptions::default(),
    );
    println!(
        "inserted {} rows, {} failed",
        report.inserted,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  row {}: {}", failure.index, failure.message);
    }

    // === Step 2: Additive migration ===
    println!("\n=== Add a field ===");
    let v2 = SchemaNode::object([
        ("title", SchemaNode::string()),
        ("legacy_code", SchemaNode::string().optional()),
        ("author", SchemaNode::string().optional()),
        (
            "meta",
            SchemaNode::object([
                ("pages", SchemaNode::integer()),
                ("tags", SchemaNode::array(SchemaNode::string())),
            ]),
        ),
    ]);
    let listener = RecordingListener::new();
    let migrator = Migrator::new(MigrationOptions::default()).with_listener(&listener);
    let outcome = migrator.migrate("books", &v2, &options, &conn).unwrap();
    println!("outcome: {outcome:?}");

    // === Step 3: Removing a field needs authorization ===
    println!("\n=== Remove a field ===");
    let v3 = SchemaNode::object([
        ("title", SchemaNode::string()),
        ("author", SchemaNode::string().optional()),
        (
            "meta",
            SchemaNode::object([
                ("pages", SchemaNode::integer()),
                ("tags", SchemaNode::array(SchemaNode::string())),
            ]),
        ),
    ]);
    if let Err(err) = migrator.migrate("books", &v3, &options, &conn) {
        println!("without authorization: {err}");
    }

    let destructive = Migrator::new(MigrationOptions::destructive().with_transaction())
        .with_listener(&listener);
    let outcome = destructive.migrate("books", &v3, &options, &conn).unwrap();
    println!("with authorization: {outcome:?}");

    println!("\n=== Events ===");
    for event in listener.events() {
        match serde_json::to_string(&event) {
            Ok(line) => println!("  {line}"),
            Err(err) => println!("  <{err}>"),
        }
        if let MigrationEvent::RowsRestored { defaulted, .. } = event {
            assert_eq!(defaulted, 0);
        }
    }

    // === Step 4: Read back nested documents ===
    println!("\n=== Rows ===");
    let books = Table::new("books", &v3, &options, &conn).unwrap();
    books
        .update(
            json!({ "author": "Frank Herbert" }).as_object().unwrap(),
            json!({ "title": "Dune" }).as_object().unwrap(),
        )
        .unwrap();
    for doc in books.fetch_all().unwrap() {
        println!("  {doc}");
    }
    println!(
        "books with no tags: {}",
        books
            .count(json!({ "meta_tags": "[]" }).as_object().unwrap())
            .unwrap()
    );
}
