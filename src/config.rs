//! Configuration types for datastore-csv
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Export a datastore backup to one CSV file per table
#[derive(Parser, Debug, Clone)]
#[command(
    name = "datastore-csv",
    version,
    about = "Export a datastore backup to one CSV file per table",
    long_about = "Walks a datastore backup directory, groups record files by table and\n\
                  writes <OUTPUT_DIR>/<table>.csv for every table.\n\n\
                  Each table is converted by one worker: a first pass infers the columns,\n\
                  a second pass writes the rows.",
    after_help = "EXAMPLES:\n    \
        datastore-csv ./backup ./csv\n    \
        datastore-csv ./backup ./csv -w 8\n    \
        datastore-csv ./backup ./csv -q"
)]
pub struct CliArgs {
    /// Backup directory to read
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving one CSV file per table
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    // Jobs are CPU bound (decode + encode), one worker per core
    num_cpus::get()
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Backup root
    pub input_dir: PathBuf,

    /// CSV destination, created if missing
    pub output_dir: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl ExportConfig {
    /// Create configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate input directory
        if !args.input_dir.exists() {
            return Err(ConfigError::InvalidInputDir {
                path: args.input_dir,
                reason: "Directory does not exist".to_string(),
            });
        }
        if !args.input_dir.is_dir() {
            return Err(ConfigError::InvalidInputDir {
                path: args.input_dir,
                reason: "Not a directory".to_string(),
            });
        }

        // Validate output directory (created later if missing)
        if args.output_dir.exists() && !args.output_dir.is_dir() {
            return Err(ConfigError::InvalidOutputDir {
                path: args.output_dir,
                reason: "Exists and is not a directory".to_string(),
            });
        }

        Ok(Self {
            input_dir: args.input_dir,
            output_dir: args.output_dir,
            worker_count: args.workers,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Unvalidated configuration with defaults, for library callers
    pub fn new(input_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            worker_count: default_workers(),
            show_progress: false,
            verbose: false,
        }
    }
}
