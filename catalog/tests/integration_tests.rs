use tableshape_catalog::{CatalogError, TableCatalog, TableDefinition};
use tableshape_core::{ColumnOrigin, Dialect, PrimaryKey};

const USERS_YAML: &str = r#"
table: users
schema:
  type: object
  fields:
    email: { type: string, format: email }
    profile:
      type: object
      fields:
        name: { type: string }
        tags: { type: array, items: { type: string } }
    active: { type: default, of: { type: boolean }, value: true }
options:
  dialect: postgres
  auto_id: { name: id, kind: uuid }
  timestamps: true
  indexes:
    idx_users_email: [email]
"#;

const ORDERS_JSON: &str = r#"{
  "table": "orders",
  "schema": {
    "type": "object",
    "fields": {
      "order_no": { "type": "integer" },
      "line": { "type": "integer" },
      "total": { "type": "number" }
    }
  },
  "options": {
    "dialect": "postgres",
    "primary_key": ["order_no", "line"],
    "extra_columns": [
      {
        "name": "user_id",
        "sql_type": "UUID",
        "foreign_key": { "table": "users", "column": "id", "on_delete": "cascade" }
      }
    ]
  }
}"#;

#[test]
fn test_directory_catalog_renders_ddl() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("users.yaml"), USERS_YAML).unwrap();
    std::fs::write(dir.path().join("orders.json"), ORDERS_JSON).unwrap();

    let catalog = TableCatalog::from_dir(dir.path()).unwrap();
    assert_eq!(catalog.tables().collect::<Vec<_>>(), ["orders", "users"]);

    let users = catalog.require("users").unwrap();
    assert_eq!(users.options.dialect, Dialect::Postgres);
    let structure = users.structure().unwrap();
    assert_eq!(
        structure.column_names(),
        ["id", "created_at", "updated_at", "email", "profile_name", "profile_tags", "active"]
    );
    assert!(matches!(structure.columns[0].origin, ColumnOrigin::AutoId { .. }));

    let ddl = users.ddl().unwrap();
    assert!(ddl.create_table.contains("\"profile_tags\" JSONB"));
    assert!(ddl.create_table.contains("\"active\" BOOLEAN NOT NULL DEFAULT TRUE"));
    assert_eq!(
        ddl.indexes,
        vec![r#"CREATE INDEX IF NOT EXISTS "idx_users_email" ON "users" ("email")"#.to_string()]
    );

    let orders = catalog.require("orders").unwrap();
    assert_eq!(
        orders.options.primary_key,
        Some(PrimaryKey::Composite(vec!["order_no".into(), "line".into()]))
    );
    let sql = orders.ddl().unwrap().create_table;
    assert!(sql.contains(r#"PRIMARY KEY ("order_no", "line")"#));
    assert!(sql.contains(r#"FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON DELETE CASCADE"#));
}

#[test]
fn test_malformed_file_fails_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("users.yaml"), USERS_YAML).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let err = TableCatalog::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CatalogError::JsonError(_)));
}

#[test]
fn test_unknown_primary_key_is_invalid() {
    let raw = r#"
table: t
schema: { type: object, fields: { a: { type: string } } }
options: { primary_key: missing }
"#;
    let def = TableDefinition::from_yaml_str(raw).unwrap();
    let err = TableCatalog::from_definitions([def]).unwrap_err();
    assert!(err.to_string().contains("invalid definition for table 't'"));
}

#[test]
fn test_definition_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let def = TableDefinition::from_yaml_str(USERS_YAML).unwrap();

    let yaml_path = dir.path().join("users.yml");
    def.save(&yaml_path).unwrap();
    assert_eq!(TableDefinition::load(&yaml_path).unwrap(), def);

    let txt_path = dir.path().join("users.txt");
    assert!(matches!(
        def.save(&txt_path),
        Err(CatalogError::UnsupportedFormat(_))
    ));
}
