use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use tableshape_catalog::{TableCatalog, TableDefinition};
use tableshape_core::{ColumnOrigin, Dialect, flatten_row_with};
use tableshape_sqlite::{MigrationOptions, MigrationOutcome, Migrator, Table};
use tracing::Level;

/// Output format for structured documents.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tableshape")]
#[command(about = "Derive relational tables from data-shape schemas", version)]
struct Cli {
    /// Minimum level of log events written to stderr.
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,
    /// Log event format.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print CREATE TABLE and CREATE INDEX statements.
    Ddl(DdlArgs),
    /// Print the derived table structure.
    Structure(StructureArgs),
    /// List derived columns with their SQL types.
    Columns(ColumnsArgs),
    /// Flatten JSON documents into rows keyed by column name.
    Flatten(FlattenArgs),
    /// Migrate tables of a SQLite database to their derived structure.
    Migrate(MigrateArgs),
}

/// Where table definitions come from.
#[derive(Debug, Args)]
struct DefinitionArgs {
    /// Single table definition file (.json, .yaml or .yml).
    #[arg(long, conflicts_with = "catalog")]
    definition: Option<PathBuf>,
    /// Directory of definition files, or a bundle file.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Table to select from the catalog.
    #[arg(long, requires = "catalog")]
    table: Option<String>,
    /// Overrides the dialect of every loaded definition.
    #[arg(long)]
    dialect: Option<Dialect>,
}

#[derive(Debug, Args)]
struct DdlArgs {
    #[command(flatten)]
    source: DefinitionArgs,
}

#[derive(Debug, Args)]
struct StructureArgs {
    #[command(flatten)]
    source: DefinitionArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    #[command(flatten)]
    source: DefinitionArgs,
}

#[derive(Debug, Args)]
struct FlattenArgs {
    #[command(flatten)]
    source: DefinitionArgs,
    /// JSON file holding one document or an array of documents. Reads stdin
    /// when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(flatten)]
    source: DefinitionArgs,
    /// SQLite database file path.
    #[arg(long)]
    db: PathBuf,
    /// Allow recreating tables when columns would be removed.
    #[arg(long)]
    allow_destructive: bool,
    /// Run the recreate cycle inside a transaction.
    #[arg(long)]
    transactional: bool,
    /// Create missing tables instead of skipping them.
    #[arg(long)]
    create: bool,
}

/// One line of `migrate` output.
#[derive(Debug, Serialize)]
struct MigrateReport {
    table: String,
    created: bool,
    #[serde(flatten)]
    outcome: MigrationOutcome,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_level, cli.log_format);

    let result = match cli.command {
        Command::Ddl(args) => run_ddl(args),
        Command::Structure(args) => run_structure(args),
        Command::Columns(args) => run_columns(args),
        Command::Flatten(args) => run_flatten(args),
        Command::Migrate(args) => run_migrate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn setup_logging(level: LogLevel, format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::from(level))
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

fn run_ddl(args: DdlArgs) -> Result<(), String> {
    let definitions = load_definitions(&args.source)?;
    let mut output = String::new();
    for def in &definitions {
        let ddl = def.ddl().map_err(|err| err.to_string())?;
        output.push_str(&ddl.to_sql());
    }
    print!("{output}");
    Ok(())
}

fn run_structure(args: StructureArgs) -> Result<(), String> {
    let def = load_single(&args.source)?;
    let structure = def.structure().map_err(|err| err.to_string())?;
    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&structure)
            .map_err(|err| format!("Failed to serialize structure: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&structure)
            .map_err(|err| format!("Failed to serialize structure: {err}"))?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_columns(args: ColumnsArgs) -> Result<(), String> {
    let def = load_single(&args.source)?;
    let structure = def.structure().map_err(|err| err.to_string())?;
    for column in &structure.columns {
        println!("{}", format_column_line(&column.name, &column.sql_type, column.not_null, &column.origin));
    }
    Ok(())
}

fn run_flatten(args: FlattenArgs) -> Result<(), String> {
    let def = load_single(&args.source)?;
    let structure = def.structure().map_err(|err| err.to_string())?;

    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|err| format!("Failed to read stdin: {err}"))?;
            buf
        }
    };
    let input: Value =
        serde_json::from_str(&raw).map_err(|err| format!("Invalid JSON input: {err}"))?;

    let output = match input {
        Value::Object(doc) => Value::Object(flatten_row_with(&doc, &structure)),
        Value::Array(docs) => Value::Array(
            docs.iter()
                .enumerate()
                .map(|(index, doc)| {
                    doc.as_object()
                        .map(|doc| Value::Object(flatten_row_with(doc, &structure)))
                        .ok_or_else(|| format!("Document {index} is not a JSON object"))
                })
                .collect::<Result<_, _>>()?,
        ),
        _ => return Err("Input must be a JSON object or an array of objects".to_string()),
    };

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|err| format!("Failed to serialize rows: {err}"))?;
    println!("{rendered}");
    Ok(())
}

fn run_migrate(args: MigrateArgs) -> Result<(), String> {
    let definitions = load_definitions(&args.source)?;
    if let Some(def) = definitions.iter().find(|d| d.options.dialect != Dialect::Sqlite) {
        return Err(format!(
            "Table '{}' uses the {} dialect; migrate only runs against SQLite databases",
            def.table, def.options.dialect
        ));
    }

    let conn = Connection::open(&args.db)
        .map_err(|err| format!("Failed to open database '{}': {err}", args.db.display()))?;
    let options = MigrationOptions {
        allow_destructive: args.allow_destructive,
        transactional: args.transactional,
    };
    let migrator = Migrator::new(options);

    let mut reports = Vec::with_capacity(definitions.len());
    for def in &definitions {
        let table = Table::from_definition(def, &conn).map_err(|err| err.to_string())?;
        let created = args.create && !table.exists();
        if created {
            table.create().map_err(|err| err.to_string())?;
        }
        let outcome = table.migrate(&migrator).map_err(|err| err.to_string())?;
        reports.push(MigrateReport {
            table: def.table.clone(),
            created,
            outcome,
        });
    }

    for report in &reports {
        let line = serde_json::to_string(report)
            .map_err(|err| format!("Failed to serialize report: {err}"))?;
        println!("{line}");
    }
    Ok(())
}

fn load_definitions(args: &DefinitionArgs) -> Result<Vec<TableDefinition>, String> {
    let mut definitions = match (&args.definition, &args.catalog) {
        (Some(path), _) => vec![
            TableDefinition::load(path)
                .map_err(|err| format!("Failed to load '{}': {err}", path.display()))?,
        ],
        (None, Some(path)) => {
            let catalog = load_catalog(path)?;
            match &args.table {
                Some(table) => vec![catalog.require(table).map_err(|err| err.to_string())?.clone()],
                None => catalog.iter().cloned().collect(),
            }
        }
        (None, None) => return Err("Specify a table source: --definition or --catalog".to_string()),
    };

    if let Some(dialect) = args.dialect {
        for def in &mut definitions {
            def.options.dialect = dialect;
        }
    }
    Ok(definitions)
}

fn load_single(args: &DefinitionArgs) -> Result<TableDefinition, String> {
    let mut definitions = load_definitions(args)?;
    match definitions.len() {
        1 => Ok(definitions.remove(0)),
        0 => Err("Catalog holds no tables".to_string()),
        n => Err(format!("Catalog holds {n} tables; pick one with --table")),
    }
}

fn load_catalog(path: &Path) -> Result<TableCatalog, String> {
    let catalog = if path.is_dir() {
        TableCatalog::from_dir(path)
    } else {
        TableCatalog::from_bundle(path)
    };
    catalog.map_err(|err| format!("Failed to load catalog '{}': {err}", path.display()))
}

fn format_column_line(name: &str, sql_type: &str, not_null: bool, origin: &ColumnOrigin) -> String {
    let nullability = if not_null { "NOT NULL" } else { "NULL" };
    format!("{name}\t{sql_type}\t{nullability}\t{origin}")
}
