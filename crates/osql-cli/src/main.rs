// crates/osql-cli/src/main.rs
// ============================================================================
// Module: osql CLI Entry Point
// Description: Command dispatcher for SQL queries over built-in tables.
// Purpose: Run queries and column type resolution from the command line.
// Dependencies: clap, osql-config, osql-core, osql-sqlite, serde_json, tracing-subscriber
// ============================================================================

//! ## Overview
//! `osql` loads `osql.toml`, installs a stderr log subscriber, and builds a
//! connection pool over the built-in tables. Each invocation runs a single
//! command and closes the pool before exiting.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use osql_cli::builtin_registry;
use osql_config::LoggingConfig;
use osql_config::OsqlConfig;
use osql_core::ColumnType;
use osql_core::QueryData;
use osql_core::SqlError;
use osql_core::TableColumns;
use osql_sqlite::AttachReport;
use osql_sqlite::SqliteDbManager;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable overriding the configured log filter.
const LOG_ENV_VAR: &str = "OSQL_LOG";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "osql", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `OSQL_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a SQL statement and print its rows.
    Query(QueryCommand),
    /// Print the result columns of a SQL statement with their types.
    Columns(ColumnsCommand),
    /// List the built-in tables and their attachment status.
    Tables,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `query`.
#[derive(Args, Debug)]
struct QueryCommand {
    /// SQL statement to execute.
    sql: String,
    /// Row output format.
    #[arg(long, value_enum, default_value_t = RowFormat::Json)]
    format: RowFormat,
    /// Print pool counters to stderr after the query.
    #[arg(long)]
    stats: bool,
}

/// Arguments for `columns`.
#[derive(Args, Debug)]
struct ColumnsCommand {
    /// SQL statement to inspect.
    sql: String,
    /// Print the full resolution as JSON, keeping unresolved columns.
    #[arg(long)]
    json: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration and exit.
    Validate,
}

/// Row output formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum RowFormat {
    /// A single JSON array.
    Json,
    /// One JSON object per line.
    Lines,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = OsqlConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Query(command) => command_query(&config, &command),
        Commands::Columns(command) => command_columns(&config, &command),
        Commands::Tables => command_tables(&config),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate => command_config_validate(&config),
        },
    }
}

// ============================================================================
// SECTION: Query Commands
// ============================================================================

/// Executes `query`.
fn command_query(config: &OsqlConfig, command: &QueryCommand) -> CliResult<ExitCode> {
    let manager = open_manager(config)?;
    let rows = {
        let instance = manager.acquire().map_err(sql_error)?;
        instance.query(&command.sql).map_err(sql_error)?
    };
    for line in render_rows(&rows, command.format)? {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    if command.stats {
        let stats = serde_json::to_string(&manager.stats())
            .map_err(|err| CliError::new(format!("failed to encode stats: {err}")))?;
        write_stderr_line(&stats).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    close_manager(manager)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `columns`.
fn command_columns(config: &OsqlConfig, command: &ColumnsCommand) -> CliResult<ExitCode> {
    let manager = open_manager(config)?;
    let resolution = {
        let instance = manager.acquire().map_err(sql_error)?;
        instance.query_columns(&command.sql).map_err(sql_error)?
    };
    if !resolution.status.is_complete() {
        warn!(sql = %command.sql, "some result column types could not be inferred");
    }
    if command.json {
        let encoded = serde_json::to_string(&resolution)
            .map_err(|err| CliError::new(format!("failed to encode columns: {err}")))?;
        write_stdout_line(&encoded).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    } else {
        for line in render_columns(&resolution.columns) {
            write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    close_manager(manager)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `tables`.
fn command_tables(config: &OsqlConfig) -> CliResult<ExitCode> {
    let manager = open_manager(config)?;
    let report = manager.acquire().map_err(sql_error)?.attach_report().clone();
    for line in render_attach_report(&report) {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    close_manager(manager)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`.
fn command_config_validate(config: &OsqlConfig) -> CliResult<ExitCode> {
    config.validate().map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let source = config
        .source_path
        .as_ref()
        .map_or_else(|| "built-in defaults".to_string(), |path| path.display().to_string());
    write_stdout_line(&format!("config ok ({source})"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Pool Helpers
// ============================================================================

/// Builds a connection pool over the built-in tables.
fn open_manager(config: &OsqlConfig) -> CliResult<SqliteDbManager> {
    SqliteDbManager::new(config.sqlite.clone(), Arc::new(builtin_registry()))
        .map_err(|err| CliError::new(format!("failed to create sqlite pool: {err}")))
}

/// Closes the pool, surfacing engine close failures.
fn close_manager(manager: SqliteDbManager) -> CliResult<()> {
    manager.close().map_err(|err| CliError::new(format!("failed to close sqlite pool: {err}")))
}

/// Formats a SQL failure with its stable kind label.
fn sql_error(error: SqlError) -> CliError {
    CliError::new(format!("sql error [{}]: {error}", error.kind().as_str()))
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Returns the filter directive: `OSQL_LOG` when set, else the config value.
fn resolve_log_directive(env_value: Option<&str>, config: &LoggingConfig) -> String {
    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => config.filter.trim().to_string(),
    }
}

/// Installs the stderr log subscriber.
fn init_logging(config: &LoggingConfig) -> CliResult<()> {
    let env_value = env::var(LOG_ENV_VAR).ok();
    let directive = resolve_log_directive(env_value.as_deref(), config);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|err| CliError::new(format!("invalid log filter {directive}: {err}")))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|err| CliError::new(format!("failed to install logger: {err}")))
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Returns the type label shown for a column; unresolved columns read as text.
const fn render_column_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Unknown => ColumnType::Text.as_str(),
        known => known.as_str(),
    }
}

/// Renders one `name<TAB>TYPE` line per column.
fn render_columns(columns: &TableColumns) -> Vec<String> {
    columns
        .iter()
        .map(|column| format!("{}\t{}", column.name, render_column_type(column.column_type)))
        .collect()
}

/// Renders query rows in the requested format.
fn render_rows(rows: &QueryData, format: RowFormat) -> CliResult<Vec<String>> {
    let encode_error = |err: serde_json::Error| CliError::new(format!("failed to encode rows: {err}"));
    match format {
        RowFormat::Json => Ok(vec![serde_json::to_string(rows).map_err(encode_error)?]),
        RowFormat::Lines => rows
            .iter()
            .map(|row| serde_json::to_string(row).map_err(encode_error))
            .collect(),
    }
}

/// Renders one `name<TAB>status` line per table in the report.
fn render_attach_report(report: &AttachReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .attached
        .iter()
        .map(|name| format!("{name}\tattached"))
        .chain(report.disabled.iter().map(|name| format!("{name}\tdisabled")))
        .chain(
            report
                .failed
                .iter()
                .map(|failure| format!("{}\tfailed: {}", failure.table, failure.reason)),
        )
        .collect();
    lines.sort();
    lines
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
