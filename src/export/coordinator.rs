//! Export coordinator - runs one job per table on a fixed worker pool
//!
//! The coordinator is responsible for:
//! - Creating the output directory
//! - Feeding table units to the workers through a bounded queue
//! - Joining every worker before any result is reported
//! - Building the run summary

use crate::config::ExportConfig;
use crate::discovery::TableUnit;
use crate::error::{Result, WorkerError};
use crate::export::job::{ExportContext, JobMetrics};
use crate::export::worker::{aggregate_stats, JobOutcome, Worker};
use crate::progress::ProgressReporter;
use crossbeam_channel::{bounded, unbounded};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A table whose job did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

/// Result of a completed export run
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Converted tables, sorted by name
    pub converted: Vec<JobMetrics>,

    /// Failed tables, sorted by name
    pub failed: Vec<FailedTable>,

    /// Workers that did not finish cleanly
    pub worker_errors: Vec<String>,

    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ExportSummary {
    /// Tables that went through a job, converted or not
    pub fn tables_processed(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn total_records(&self) -> u64 {
        self.converted.iter().map(|m| m.records).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.converted.iter().map(|m| m.bytes_written).sum()
    }

    /// Sum of per-table processing times
    pub fn total_processing_time(&self) -> Duration {
        self.converted.iter().map(|m| m.elapsed).sum()
    }

    /// Average processing time per record, `None` when nothing was written
    pub fn average_time_per_record(&self) -> Option<Duration> {
        let records = self.total_records();
        if records == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total_processing_time().as_secs_f64() / records as f64,
        ))
    }

    /// Records per second of wall-clock time
    pub fn records_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_records() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.worker_errors.is_empty()
    }
}

/// Coordinates the parallel table export
pub struct ExportCoordinator {
    /// Configuration
    config: Arc<ExportConfig>,

    /// Decoder and encoder shared by every job
    context: Arc<ExportContext>,

    /// Console progress, absent in quiet mode
    progress: Option<ProgressReporter>,
}

impl ExportCoordinator {
    /// Create a coordinator using the bundled record format
    pub fn new(config: ExportConfig) -> Self {
        Self::with_context(config, ExportContext::bundled())
    }

    /// Create a coordinator with custom collaborators
    pub fn with_context(config: ExportConfig, context: ExportContext) -> Self {
        Self {
            config: Arc::new(config),
            context: Arc::new(context),
            progress: None,
        }
    }

    /// Report per-table progress on the console
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Export every table; per-table failures land in the summary
    pub fn run(self, tables: Vec<TableUnit>) -> Result<ExportSummary> {
        let started = Instant::now();
        std::fs::create_dir_all(&self.config.output_dir)?;

        let pool_size = self.config.worker_count.min(tables.len()).max(1);
        info!(
            tables = tables.len(),
            workers = pool_size,
            output = %self.config.output_dir.display(),
            "Starting export"
        );

        let (job_tx, job_rx) = bounded::<TableUnit>(pool_size * 2);
        let (result_tx, result_rx) = unbounded::<JobOutcome>();

        let mut workers = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let worker = Worker::spawn(
                id,
                self.config.output_dir.clone(),
                Arc::clone(&self.context),
                job_rx.clone(),
                result_tx.clone(),
                self.progress.clone(),
            )?;
            workers.push(worker);
        }
        drop(job_rx);
        drop(result_tx);

        for unit in tables {
            job_tx
                .send(unit)
                .map_err(|_| WorkerError::QueueSendFailed)?;
        }
        drop(job_tx);

        let worker_errors = join_workers(&mut workers);

        let (completed, failed, records) = aggregate_stats(&workers);
        let mut summary = ExportSummary {
            worker_errors,
            ..ExportSummary::default()
        };
        for outcome in result_rx.iter() {
            match outcome.result {
                Ok(metrics) => summary.converted.push(metrics),
                Err(e) => summary.failed.push(FailedTable {
                    table: outcome.table,
                    error: e.to_string(),
                }),
            }
        }
        summary.converted.sort_by(|a, b| a.table.cmp(&b.table));
        summary.failed.sort_by(|a, b| a.table.cmp(&b.table));
        summary.elapsed = started.elapsed();

        if let Some(ref progress) = self.progress {
            progress.finish();
        }

        info!(
            converted = completed,
            failed = failed,
            records = records,
            duration_ms = summary.elapsed.as_millis() as u64,
            "Export completed"
        );

        Ok(summary)
    }
}

/// Join every worker; returns one message per worker that did not finish cleanly
fn join_workers(workers: &mut [Worker]) -> Vec<String> {
    let mut errors = Vec::new();
    for worker in workers.iter_mut() {
        if let Err(e) = worker.join() {
            warn!(error = %e, "Worker failed to join cleanly");
            errors.push(e.to_string());
        }
    }
    errors
}
