//! datastore-csv - Datastore backup to CSV exporter
//!
//! Converts a datastore backup (a directory tree of framed record files, one
//! group of files per entity table) into one CSV file per table.
//!
//! # Features
//!
//! - **Schema inference**: records of one table may carry different
//!   properties. The column set is the union of every property name, in
//!   first-seen order, computed by a full pass before any row is written.
//!
//! - **Identifier recovery**: string values that are really serialized entity
//!   keys (URL-safe key tokens, pairs of tokens, a token followed by free
//!   text) are rewritten to the readable `Kind@id` form. Unrecognized layouts
//!   fail the table instead of being exported verbatim.
//!
//! - **Parallel export**: one job per table on a fixed pool of worker
//!   threads. A job is never split, so output files never interleave.
//!
//! - **Atomic output**: rows are written to a temporary file that replaces
//!   `<table>.csv` only when the job succeeds.
//!
//! # Architecture
//!
//! ```text
//!   backup dir ──► discovery ──► TableUnit per table
//!                                      │
//!                                      ▼
//!                        ┌──────────────────────────┐
//!                        │       Job Queue          │
//!                        │  (crossbeam bounded)     │
//!                        └────────────┬─────────────┘
//!                 ┌───────────────────┼───────────────────┐
//!                 ▼                   ▼                   ▼
//!           ┌──────────┐        ┌──────────┐        ┌──────────┐
//!           │ Worker 1 │        │ Worker 2 │  ...   │ Worker N │
//!           │ 1. infer │        │ 1. infer │        │ 1. infer │
//!           │ 2. write │        │ 2. write │        │ 2. write │
//!           └────┬─────┘        └────┬─────┘        └────┬─────┘
//!                ▼                   ▼                   ▼
//!            Foo.csv             Bar.csv              Baz.csv
//! ```
//!
//! # Example
//!
//! ```bash
//! datastore-csv ./backup ./csv -w 8
//! ```

pub mod backup;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod progress;

pub use config::{CliArgs, ExportConfig};
pub use discovery::{discover_tables, TableUnit};
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportSummary, JobMetrics};
