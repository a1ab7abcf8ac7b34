//! Archischema CLI - import a schema, lay it out and export it again

use anyhow::{Context, Result};
use archischema_core::core::auto_layout::{LayoutConfig, LayoutMode, auto_layout_with_config};
use archischema_core::core::config::{Config, LOG_VAR};
use archischema_core::core::validation::find_dangling_references;
use archischema_core::core::{
    ExportOptions, SchemaExporter, SchemaFormat, SchemaModel, SqlDialect, derive_edges,
    import_schema, layout_missing,
};
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Archischema - convert database schemas between SQL DDL, Prisma and JSON
#[derive(Parser)]
#[command(name = "archischema")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Schema file to import (use - for stdin)
    input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input format (sql|prisma); detected when omitted
    #[arg(long)]
    format: Option<SchemaFormat>,

    /// SQL dialect for tokenizing and export (generic|mysql|postgresql|sqlite)
    #[arg(long)]
    dialect: Option<SqlDialect>,

    /// Which tables get positions computed
    #[arg(long, value_enum, default_value_t = LayoutChoice::Missing)]
    layout: LayoutChoice,

    /// Use the wider export spacing instead of the canvas spacing
    #[arg(long)]
    export_mode: bool,

    /// What to write
    #[arg(long, value_enum, default_value_t = Emit::Json)]
    emit: Emit,

    /// Start SQL output with DROP TABLE statements
    #[arg(long)]
    drop_tables: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum LayoutChoice {
    /// Keep positions as imported
    None,
    /// Place only tables without a position
    Missing,
    /// Re-layout every table
    All,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum Emit {
    Json,
    Sql,
    Prisma,
    /// Derived foreign-key edges as JSON
    Edges,
}

/// `RUST_LOG` first, then `ARCHISCHEMA_LOG`, then `info`
fn init_logging() {
    let fallback = std::env::var(LOG_VAR).unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn apply_layout_choice(model: &mut SchemaModel, choice: LayoutChoice, config: &LayoutConfig) {
    match choice {
        LayoutChoice::None => {}
        LayoutChoice::Missing => {
            layout_missing(model, config);
        }
        LayoutChoice::All => auto_layout_with_config(model, config),
    }
}

fn render(model: &SchemaModel, cli: &Cli, dialect: SqlDialect) -> Result<String> {
    let options = ExportOptions {
        sql_dialect: dialect,
        include_drop_statements: cli.drop_tables,
        ..ExportOptions::default()
    };
    let text = match cli.emit {
        Emit::Json => SchemaExporter::export_json(model, &options)?,
        Emit::Sql => SchemaExporter::export_sql(model, &options),
        Emit::Prisma => SchemaExporter::export_prisma(model),
        Emit::Edges => serde_json::to_string_pretty(&derive_edges(&model.tables))?,
    };
    Ok(text)
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let mut options = config.parse_options();
    if let Some(dialect) = cli.dialect {
        options.dialect = dialect;
    }

    let text = read_input(&cli.input)?;
    let outcome = import_schema(&text, cli.format, &options)?;
    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }
    let mut model = outcome.model;
    for dangling in find_dangling_references(&model) {
        tracing::warn!("{}", dangling);
    }

    let mode = if cli.export_mode {
        LayoutMode::Export
    } else {
        config.layout_mode
    };
    apply_layout_choice(&mut model, cli.layout, &LayoutConfig::for_mode(mode));

    tracing::info!(
        tables = model.tables.len(),
        columns = model.column_count(),
        edges = derive_edges(&model.tables).len(),
        "Schema imported"
    );

    let rendered = render(&model, &cli, options.dialect)?;
    match &cli.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    init_logging();
    let config = Config::from_env();

    let cli = Cli::parse();
    if let Err(e) = run(cli, config) {
        tracing::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
