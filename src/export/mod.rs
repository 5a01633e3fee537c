//! Table export: identifier recovery, schema inference and the job pool
//!
//! Every table is converted by exactly one [`TableExportJob`] running on one
//! worker thread. The [`ExportCoordinator`] feeds tables to a fixed pool of
//! workers and collects an [`ExportSummary`] once every worker has joined.

pub mod coordinator;
pub mod job;
pub mod key_codec;
pub mod schema;
pub mod value;
pub mod worker;

pub use coordinator::{ExportCoordinator, ExportSummary, FailedTable};
pub use job::{ExportContext, JobMetrics, JobState, TableExportJob};
pub use key_codec::{canonicalize_value, decode_identifier, encode_identifier, KeyCodec};
pub use schema::{infer_schema, Schema, ID_COLUMN};
pub use value::{CellError, CsvRow, ValueEncoder};
pub use worker::{JobOutcome, Worker, WorkerStats};
