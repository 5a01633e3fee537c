//! Worker thread logic for parallel table export
//!
//! Each worker:
//! - Pulls table units from the shared job queue
//! - Runs one export job per table, start to finish
//! - Reports every job outcome on the results channel
//!
//! A job is never split across workers, so rows of different tables can not
//! interleave in one output file.

use crate::discovery::TableUnit;
use crate::error::{JobResult, WorkerError};
use crate::export::job::{ExportContext, JobMetrics, TableExportJob};
use crate::progress::ProgressReporter;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Result of one table's job
#[derive(Debug)]
pub struct JobOutcome {
    pub table: String,
    pub result: JobResult<JobMetrics>,
}

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Tables exported successfully
    pub jobs_completed: AtomicU64,

    /// Tables whose job failed
    pub jobs_failed: AtomicU64,

    /// Rows written across completed tables
    pub records_written: AtomicU64,
}

impl WorkerStats {
    fn record_success(&self, records: u64) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// A worker thread that runs table export jobs
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        output_dir: PathBuf,
        context: Arc<ExportContext>,
        jobs: Receiver<TableUnit>,
        results: Sender<JobOutcome>,
        progress: Option<ProgressReporter>,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("export-{}", id))
            .spawn(move || {
                worker_loop(id, output_dir, context, jobs, results, progress, stats_clone)
            })
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to drain the queue
    pub fn join(&mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|panic| WorkerError::Panicked {
                id: self.id,
                message: panic_message(panic.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Main worker loop; returns once the job queue is closed and empty
fn worker_loop(
    id: usize,
    output_dir: PathBuf,
    context: Arc<ExportContext>,
    jobs: Receiver<TableUnit>,
    results: Sender<JobOutcome>,
    progress: Option<ProgressReporter>,
    stats: Arc<WorkerStats>,
) {
    debug!(worker = id, "Worker starting");

    for unit in jobs.iter() {
        let table = unit.name.clone();
        if let Some(ref progress) = progress {
            progress.table_started(&table);
        }

        let mut job = TableExportJob::new(unit, &output_dir, Arc::clone(&context));
        let result = job.run();

        match &result {
            Ok(metrics) => {
                stats.record_success(metrics.records);
                if let Some(ref progress) = progress {
                    progress.table_finished(metrics);
                }
            }
            Err(e) => {
                stats.record_failure();
                if let Some(ref progress) = progress {
                    progress.table_failed(&table, e);
                }
            }
        }

        if results.send(JobOutcome { table, result }).is_err() {
            warn!(worker = id, "Result channel closed, stopping");
            break;
        }
    }

    info!(
        worker = id,
        completed = stats.jobs_completed.load(Ordering::Relaxed),
        failed = stats.jobs_failed.load(Ordering::Relaxed),
        "Worker shutting down"
    );
}

/// Aggregate statistics from multiple workers: (completed, failed, records)
pub fn aggregate_stats(workers: &[Worker]) -> (u64, u64, u64) {
    let mut completed = 0u64;
    let mut failed = 0u64;
    let mut records = 0u64;

    for worker in workers {
        completed += worker.stats().jobs_completed.load(Ordering::Relaxed);
        failed += worker.stats().jobs_failed.load(Ordering::Relaxed);
        records += worker.stats().records_written.load(Ordering::Relaxed);
    }

    (completed, failed, records)
}
