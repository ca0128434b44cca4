//! migrate_all CLI - SQL Server to PostgreSQL schema and data migration.

use clap::Parser;
use migrate_all::error::EXIT_SUCCESS;
use migrate_all::pgloader::{render_load_files, write_load_files};
use migrate_all::{
    resolve, Config, DriverOptions, MigrateError, MigrationDriver, MigrationMode, MssqlCatalog,
    NoopWriter, PgWriter, SelectionRequest, SourceCatalog, TargetWriter,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "migrate_all")]
#[command(about = "Migrate SQL Server tables (schema and data) into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Show the DDL that would run without touching the target
    #[arg(long)]
    dry_run: bool,

    /// Directory for intermediate exported files (created if absent)
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Comma-separated [schema.]table list; overrides schema filters
    #[arg(long)]
    tables: Option<String>,

    /// Comma-separated source schemas (legacy form of --source-schema)
    #[arg(long)]
    schema: Option<String>,

    /// Comma-separated source schemas to migrate
    #[arg(long)]
    source_schema: Option<String>,

    /// Target PostgreSQL schema [default: PG_SCHEMA, then public]
    #[arg(long)]
    target_schema: Option<String>,

    /// Comma-separated [schema.]table list to create without copying data
    #[arg(long)]
    create_only: Option<String>,

    /// Path to the env file holding connection settings
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Output JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.env_file)?;
    info!("Loaded configuration from {:?}", cli.env_file);
    if !cli.dry_run {
        config.validate_target()?;
    }

    // Selection input is validated before any connection is opened
    let target_schema = config.target_schema(cli.target_schema.as_deref());
    let request = SelectionRequest::from_args(
        cli.tables.as_deref(),
        cli.schema.as_deref(),
        cli.source_schema.as_deref(),
        cli.create_only.as_deref(),
        &target_schema,
    )?;

    let export_dir = config.export_dir(cli.export_dir.as_deref());
    prepare_export_dir(&export_dir).await?;

    let cancel_token = setup_signal_handler();

    let max_connections = config.migration.max_connections;
    let source: Arc<dyn SourceCatalog> =
        Arc::new(MssqlCatalog::new(config.source.clone(), max_connections as u32).await?);

    let selection = match resolve(&request, source.as_ref()).await {
        Ok(selection) => selection,
        Err(e) => {
            source.close().await;
            return Err(e);
        }
    };
    if selection.is_empty() {
        warn!("No tables found to migrate");
    }

    if config.migration.mode == MigrationMode::Pgloader {
        source.close().await;
        info!("USE_PGLOADER is set; rendering pgloader load files instead of copying");
        let files = render_load_files(&config.source, &config.target, &selection, cli.dry_run);
        let written = write_load_files(&files, &export_dir, cli.dry_run).await?;
        for path in &written {
            println!("pgloader {}", path.display());
        }
        return Ok(EXIT_SUCCESS);
    }

    let target: Arc<dyn TargetWriter> = if cli.dry_run {
        Arc::new(NoopWriter)
    } else {
        match PgWriter::new(&config.target, max_connections).await {
            Ok(writer) => Arc::new(writer),
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        }
    };

    let driver = MigrationDriver::new(
        source,
        target,
        DriverOptions {
            dry_run: cli.dry_run,
            batch_size: config.migration.batch_size,
            export_dir: Some(export_dir),
        },
    );
    let report = driver.run(&selection, cancel_token).await;
    driver.close().await;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        println!("\n{}", report.render_text());
        println!("  Run ID: {}", report.run_id);
    }

    Ok(report.exit_code())
}

/// Create the export directory if absent. Dry runs create it too; nothing is
/// staged into it until a real copy runs.
async fn prepare_export_dir(dir: &Path) -> Result<(), MigrateError> {
    tokio::fs::create_dir_all(dir).await?;
    info!("Export directory: {}", dir.display());
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only the report
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
/// The table in progress finishes; no new table is started.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to set up {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Finishing the current table, then stopping...", name);
            token.cancel();
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to set up Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing the current table, then stopping...");
        token.cancel();
    });

    cancel_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_export_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let export_dir = dir.path().join("exports").join("run");

        prepare_export_dir(&export_dir).await.unwrap();
        assert!(export_dir.is_dir());

        // Existing directory is fine
        prepare_export_dir(&export_dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_export_dir_over_file_is_io_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = prepare_export_dir(file.path()).await.unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
