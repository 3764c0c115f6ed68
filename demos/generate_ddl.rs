//! DDL generation example.
//!
//! Derives one table structure from a nested schema and prints its DDL for
//! every supported dialect.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p tableshape-demos --example generate_ddl
//! ```

use serde_json::json;
use tableshape_core::{
    AutoId, Dialect, ExtraColumn, ForeignKey, ReferentialAction, SchemaNode, StringFormat,
    TableOptions, derive_structure, generate_ddl,
};

fn order_schema() -> SchemaNode {
    SchemaNode::object([
        ("number", SchemaNode::string()),
        ("status", SchemaNode::enumeration(["open", "paid", "shipped"])),
        ("total", SchemaNode::number()),
        ("placed_at", SchemaNode::datetime()),
        ("gift", SchemaNode::boolean().with_default(json!(false))),
        (
            "shipping",
            SchemaNode::object([
                ("name", SchemaNode::string()),
                ("email", SchemaNode::formatted_string(StringFormat::Email).optional()),
                (
                    "address",
                    SchemaNode::object([
                        ("city", SchemaNode::string()),
                        ("geo", SchemaNode::object([("lat", SchemaNode::number())])),
                    ]),
                ),
            ])
            .optional(),
        ),
        ("lines", SchemaNode::array(SchemaNode::any())),
    ])
}

fn main() {
    let schema = order_schema();

    for dialect in Dialect::ALL {
        let options = TableOptions::new(dialect)
            .with_auto_id(AutoId::integer("id"))
            .with_timestamps()
            .with_index("idx_orders_number", ["number"])
            .with_extra_column(
                ExtraColumn::new("customer_id", "INTEGER").references(
                    ForeignKey::new("customers", "id").on_delete(ReferentialAction::Cascade),
                ),
            );

        println!("=== {dialect} ===");
        match generate_ddl("orders", &schema, &options) {
            Ok(ddl) => print!("{}", ddl.to_sql()),
            Err(err) => eprintln!("error: {err}"),
        }
        println!();
    }

    // Deeper flattening turns the JSON `shipping_address_geo` column into
    // a scalar `shipping_address_geo_lat` column.
    let options = TableOptions::default().with_flatten_depth(3);
    let structure = derive_structure(&schema, &options).unwrap();
    println!("=== columns at depth 3 ===");
    for column in &structure.columns {
        let null = if column.not_null { "NOT NULL" } else { "NULL" };
        println!("  {:<28} {:<8} {null}", column.name, column.sql_type);
    }
}
