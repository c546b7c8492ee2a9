use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gencrud::builder::{build_schema, BuildOptions, SoftDeletePolicy};
use gencrud::codegen::{CodeGenConfig, CodeGenerator, PythonGenerator};
use gencrud::config::{DbConfig, DbOverrides};
use gencrud::introspect::{CatalogSnapshot, TableFilter};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum CliSoftDelete {
    /// Generate tables without `deleted_at` but leave out `delete()`
    #[default]
    Omit,
    /// Fail when a table has no `deleted_at` column
    Require,
}

impl From<CliSoftDelete> for SoftDeletePolicy {
    fn from(policy: CliSoftDelete) -> Self {
        match policy {
            CliSoftDelete::Omit => SoftDeletePolicy::Omit,
            CliSoftDelete::Require => SoftDeletePolicy::Require,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gencrud")]
#[command(version, about = "Generate asyncpg CRUD classes for an existing PostgreSQL schema", long_about = None)]
struct Cli {
    /// Database name (overrides DB_NAME)
    #[arg(long)]
    db: Option<String>,

    /// Username for the database connection (overrides DB_USER)
    #[arg(long)]
    user: Option<String>,

    /// Password for the database connection (overrides DB_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Hostname of the database (overrides DB_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Database port (overrides DB_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Database schema to introspect
    #[arg(long, default_value = "public")]
    schema: String,

    /// Name of the generated file
    #[arg(short, long, default_value = "generated.py")]
    output: PathBuf,

    /// Path to .env file for connection config
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,

    /// Comma-separated list of tables to include (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Comma-separated list of tables to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Handling of tables without a deleted_at column
    #[arg(long, value_enum, default_value_t = CliSoftDelete::Omit)]
    soft_delete: CliSoftDelete,

    /// Fail instead of warning on unrecognized column types
    #[arg(long)]
    strict_types: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("gencrud v{}", env!("CARGO_PKG_VERSION"));
    info!(
        output = ?cli.output,
        schema = ?cli.schema,
        soft_delete = ?cli.soft_delete,
        strict_types = cli.strict_types,
        "Starting code generation"
    );

    // Load configuration
    let overrides = DbOverrides {
        host: cli.host,
        port: cli.port,
        database: cli.db,
        user: cli.user,
        password: cli.password,
    };
    let config = DbConfig::load(&cli.env_file, &overrides)
        .context("Failed to load database configuration")?;
    debug!(connection = ?config.redacted_connection_string(), "Loaded configuration");

    let options = BuildOptions {
        filter: TableFilter {
            include: cli.tables,
            exclude: cli.exclude,
        },
        soft_delete: cli.soft_delete.into(),
        strict_types: cli.strict_types,
    };

    if options.filter.include.is_some() || options.filter.exclude.is_some() {
        debug!(filter = ?options.filter, "Table filter configured");
    }

    // Introspect database
    let snapshot = introspect_database(&config, &cli.schema)?;

    let (schema, report) = build_schema(&snapshot, &options).context("Failed to build schema model")?;

    if schema.tables.is_empty() {
        warn!("No tables found after filtering, nothing written");
        return Ok(());
    }

    if !report.type_warnings.is_empty() {
        warn!(
            count = report.type_warnings.len(),
            "Some columns have unrecognized types; the generated annotations need attention"
        );
    }

    info!(
        tables = ?schema.tables.len(),
        enums = ?schema.enums.len(),
        "Schema ready for code generation"
    );

    // Log table names at debug level
    for table in &schema.tables {
        debug!(
            table = ?table.name,
            columns = ?table.columns.len(),
            primary_key = ?table.primary_key,
            soft_delete = table.soft_delete_column().is_some(),
            "Table"
        );
    }

    let codegen_config = CodeGenConfig::new(cli.output);
    debug!(codegen_config = ?codegen_config, "Code generation config");

    let path = PythonGenerator::new()
        .generate(&schema, &codegen_config)
        .context("Failed to generate code")?;
    info!(path = ?path, "Done");

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[cfg(feature = "postgres")]
fn introspect_database(config: &DbConfig, schema_name: &str) -> Result<CatalogSnapshot> {
    use gencrud::error::GencrudError;
    use gencrud::introspect::CatalogSource;
    use gencrud::PostgresCatalog;
    use postgres::NoTls;

    info!(connection = ?config.redacted_connection_string(), "Connecting to PostgreSQL");

    let mut client = postgres::Client::connect(&config.postgres_connection_string(), NoTls)
        .map_err(|e| {
            GencrudError::Connection(format!("{} ({})", e, config.redacted_connection_string()))
        })?;

    info!("Connected to database");

    let snapshot = PostgresCatalog::new(&mut client)
        .snapshot(schema_name)
        .context("Failed to introspect schema")?;

    Ok(snapshot)
}

#[cfg(not(feature = "postgres"))]
fn introspect_database(_config: &DbConfig, _schema_name: &str) -> Result<CatalogSnapshot> {
    anyhow::bail!("PostgreSQL support not enabled. Rebuild with --features postgres")
}
