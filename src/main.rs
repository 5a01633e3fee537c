//! datastore-csv - Datastore backup to CSV exporter
//!
//! Entry point for the CLI application.

use anyhow::{bail, Context, Result};
use clap::Parser;
use datastore_csv::config::{CliArgs, ExportConfig};
use datastore_csv::discovery::discover_tables;
use datastore_csv::export::ExportCoordinator;
use datastore_csv::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Validate and create config
    let config = ExportConfig::from_args(args).context("Invalid configuration")?;

    // Setup logging
    setup_logging(config.verbose)?;

    // Map the backup tree to tables before scheduling anything
    let tables = discover_tables(&config.input_dir).context("Table discovery failed")?;
    info!(tables = tables.len(), "Tables discovered");

    // Print header
    if config.show_progress {
        print_header(
            &config.input_dir,
            &config.output_dir,
            config.worker_count.min(tables.len()).max(1),
            tables.len(),
        );
    }

    let mut coordinator = ExportCoordinator::new(config.clone());
    if config.show_progress {
        coordinator = coordinator.with_progress(ProgressReporter::new(tables.len()));
    }

    // Run the export
    let summary = coordinator.run(tables).context("Export failed")?;

    // Print summary
    print_summary(&summary, &config.output_dir);

    for failed in &summary.failed {
        error!(table = %failed.table, error = %failed.error, "Table not exported");
    }

    if !summary.failed.is_empty() {
        bail!(
            "{} of {} tables failed to export",
            summary.failed.len(),
            summary.tables_processed()
        );
    }
    if !summary.is_success() {
        bail!("{} workers did not finish cleanly", summary.worker_errors.len());
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("datastore_csv=debug,warn")
    } else {
        EnvFilter::new("datastore_csv=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
