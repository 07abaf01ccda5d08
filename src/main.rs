// src/main.rs
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use db_script_exporter::config::{FileFormat, SelectionFile};
use db_script_exporter::db::accessors::*;
use db_script_exporter::db::snapshot::SnapshotAccessor;
use db_script_exporter::export::confirm::{AutoInclude, ClosureConfirmation, PromptConfirmation};
use db_script_exporter::export::report::{ExportReport, ReportExporter};
use db_script_exporter::logging::{self, LoggingConfig};
use db_script_exporter::{ExportError, ExportOutcome, ScriptExporter};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Export database schema and data as a portable SQL script", long_about = None)]
struct Args {
    /// postgres, mysql, sqlite or snapshot
    #[arg(long)]
    db_type: String,
    /// Connection URL, or the snapshot file path for --db-type snapshot
    #[arg(long)]
    connection_string: String,
    #[arg(long)]
    schema_or_database: Option<String>,
    #[arg(long, default_value = "export.sql")]
    output_file: PathBuf,
    /// Tables to export (comma-separated). Defaults to every table.
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,
    /// Tables whose rows are exported as INSERT statements (comma-separated)
    #[arg(long, value_delimiter = ',')]
    upload: Vec<String>,
    /// Export rows of every table whose name starts with this prefix (repeatable)
    #[arg(long = "upload-prefix")]
    upload_prefixes: Vec<String>,
    /// YAML or JSON file with export, upload and upload_prefixes lists
    #[arg(long)]
    selection: Option<PathBuf>,
    /// Include referenced tables without asking
    #[arg(short = 'y', long, default_value_t = false)]
    yes: bool,
    /// Write a run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
    /// Report format
    #[arg(long, value_enum, default_value_t = FileFormat::Json)]
    format: FileFormat,
    /// Also write log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

async fn open_source(args: &Args) -> Result<Box<dyn SourceDatabase>> {
    let schema = args.schema_or_database.as_deref();
    let source: Box<dyn SourceDatabase> = match args.db_type.to_lowercase().as_str() {
        "postgres" | "postgresql" => {
            tracing::info!("Initializing PostgreSQL accessor...");
            Box::new(PostgresAccessor::new(&args.connection_string, schema).await?)
        }
        "mysql" | "mariadb" => {
            tracing::info!("Initializing MySQL accessor...");
            Box::new(MySqlAccessor::new(&args.connection_string, schema).await?)
        }
        "sqlite" => {
            tracing::info!("Initializing SQLite accessor...");
            Box::new(SqliteAccessor::new(&args.connection_string).await?)
        }
        "snapshot" => {
            tracing::info!("Loading snapshot...");
            Box::new(SnapshotAccessor::from_file(Path::new(&args.connection_string))?)
        }
        other => {
            return Err(anyhow!(
                "Unsupported database type: '{}'. Supported types: postgres, mysql, sqlite, snapshot",
                other
            ));
        }
    };
    Ok(source)
}

fn report_access_denied(err: &ExportError) {
    if let ExportError::ProviderAccessDenied { context, message } = err {
        eprintln!();
        eprintln!("The source database refused access while {}.", context);
        eprintln!("  {}", message);
        eprintln!("Grant the exporting account read access to the system catalog and the selected tables, then retry.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&LoggingConfig {
        log_file: args.log_file.clone(),
        ..LoggingConfig::default()
    })?;

    println!("--- Database SQL Script Export ---");
    println!("Database Type: {}", args.db_type);
    println!("Connection: [REDACTED]");
    if let Some(schema_or_db) = &args.schema_or_database {
        println!("Schema/DB Filter: {}", schema_or_db);
    }
    println!("Script Output: {}", args.output_file.display());
    println!("----------------------------------");

    let mut source = match open_source(&args).await {
        Ok(source) => source,
        Err(e) => {
            if let Some(export_err) = e.downcast_ref::<ExportError>() {
                report_access_denied(export_err);
            }
            return Err(e);
        }
    };

    let all_tables: Vec<String> = match source.list_tables().await {
        Ok(tables) => tables.into_iter().map(|t| t.name).collect(),
        Err(e) => {
            report_access_denied(&e);
            return Err(e).context("Failed to list source tables");
        }
    };
    let selection_file = match &args.selection {
        Some(path) => SelectionFile::load(path)?,
        None => SelectionFile::default(),
    };
    let selection = selection_file
        .merge(&args.tables, &args.upload, &args.upload_prefixes)
        .into_selection(&all_tables);
    for table in selection.uploads_outside_export() {
        tracing::warn!(table, "Upload table is not in the export selection");
    }
    tracing::info!(export = %selection.to_export, upload = %selection.to_upload, "Selection ready");

    let confirmation: Box<dyn ClosureConfirmation> = if args.yes || !std::io::stdin().is_terminal() {
        Box::new(AutoInclude)
    } else {
        Box::new(PromptConfirmation)
    };
    let mut exporter = ScriptExporter::new(&args.output_file, confirmation);

    let summary = match exporter.export(source.as_mut(), &selection).await {
        Ok(ExportOutcome::Completed(summary)) => summary,
        Ok(ExportOutcome::Declined { added }) => {
            println!("Export cancelled; referenced tables not included: {}", added);
            return Ok(());
        }
        Err(e) => {
            report_access_denied(&e);
            return Err(e).context("Export failed");
        }
    };

    if let Some(report_path) = &args.report {
        let report = ExportReport::from_summary(&summary, &args.db_type);
        ReportExporter.export_report_to_file(&report, report_path, args.format)?;
        println!("Report Output: {}", report_path.display());
    }

    println!("----------------------------------");
    println!(
        "Exported {} table(s) ({} added by reference), {} row(s) to {}",
        summary.resolved.len(),
        summary.added.len(),
        summary.rows_written,
        summary.output_path.display()
    );
    println!("Process completed successfully!");
    Ok(())
}
