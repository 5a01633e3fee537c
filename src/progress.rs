//! Progress reporting for the table export
//!
//! Provides a table-count progress bar plus one console line per table,
//! printed above the bar.

use crate::error::JobError;
use crate::export::{ExportSummary, JobMetrics};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter shared by every worker
#[derive(Clone)]
pub struct ProgressReporter {
    /// Progress bar, one step per table
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter for `tables` tables
    pub fn new(tables: usize) -> Self {
        let bar = ProgressBar::new(tables as u64);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tables {msg}")
                .expect("Invalid progress template")
                .progress_chars("=> ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Hidden reporter, used when output is not a terminal
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// A worker picked up a table
    pub fn table_started(&self, table: &str) {
        self.bar.suspend(|| {
            println!("  {} {}", style("Exporting").cyan(), table);
        });
    }

    /// A table was written
    pub fn table_finished(&self, metrics: &JobMetrics) {
        let per_record = metrics
            .time_per_record()
            .map(|t| format!(", {:.3} ms/record", t.as_secs_f64() * 1000.0))
            .unwrap_or_default();

        self.bar.suspend(|| {
            println!(
                "  {} {} ({} rows, {}, {:.1}s{})",
                style("Exported").green(),
                metrics.table,
                format_number(metrics.records),
                format_size(metrics.bytes_written, BINARY),
                metrics.elapsed.as_secs_f64(),
                per_record,
            );
        });
        self.bar.inc(1);
    }

    /// A table's job failed
    pub fn table_failed(&self, table: &str, error: &JobError) {
        self.bar.suspend(|| {
            println!("  {} {}: {}", style("Failed").red().bold(), table, error);
        });
        self.bar.inc(1);
    }

    /// Finish and clear the progress display
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the export run
pub fn print_summary(summary: &ExportSummary, output: &Path) {
    let duration_secs = summary.elapsed.as_secs_f64();

    println!();
    if summary.is_success() {
        println!("{}", style("Export Complete").green().bold());
    } else {
        println!("{}", style("Export Finished With Errors").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Tables:").bold(),
        format_number(summary.converted.len() as u64)
    );
    println!(
        "  {} {}",
        style("Records:").bold(),
        format_number(summary.total_records())
    );
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.total_bytes(), BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} records/sec)",
        style("Duration:").bold(),
        duration_secs,
        summary.records_per_second()
    );
    if let Some(per_record) = summary.average_time_per_record() {
        println!(
            "  {} {:.3} ms",
            style("Per Record:").bold(),
            per_record.as_secs_f64() * 1000.0
        );
    }
    if !summary.failed.is_empty() {
        println!(
            "  {} {}",
            style("Failed:").red().bold(),
            format_number(summary.failed.len() as u64)
        );
        for failed in &summary.failed {
            println!("    {} {}", style(&failed.table).bold(), failed.error);
        }
    }
    for error in &summary.worker_errors {
        println!("  {} {}", style("Worker:").red().bold(), error);
    }
    println!("  {} {}", style("Output:").bold(), output.display());
    println!();
}

/// Print a header at the start of the export
pub fn print_header(input: &Path, output: &Path, workers: usize, tables: usize) {
    println!();
    println!(
        "{} {}",
        style("datastore-csv").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input.display());
    println!("  {} {}", style("Output:").bold(), output.display());
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Tables:").bold(), format_number(tables as u64));
    println!();
}
