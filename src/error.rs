//! Error types for datastore-csv
//!
//! This module defines the error hierarchy that covers:
//! - Table discovery errors (fatal before any job is scheduled)
//! - Record framing and entity decoding errors
//! - Identifier recovery errors
//! - Per-table job errors
//! - Configuration and worker pool errors
//!
//! Library code returns these structured errors; the binary adds context with
//! anyhow at the top level.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the export run
#[derive(Error, Debug)]
pub enum ExportError {
    /// Table discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Worker pool errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors outside of any job
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while mapping the input tree to tables
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// No path segment precedes a numeric shard directory
    #[error("Could not find table name in path '{path}'")]
    NoTableName { path: PathBuf },

    /// Directory listing failed
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while splitting a file into records or decoding one record
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Fragment checksum does not match its payload
    #[error("Checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// Fragment header or fragment sequence is invalid
    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    /// File ended in the middle of a record
    #[error("Truncated record at end of file (offset {offset})")]
    Truncated { offset: u64 },

    /// Record bytes do not describe an entity
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Underlying read failed
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Identifier encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A string looks like a serialized identifier but matches no known layout
    #[error("Malformed identifier string '{value}'")]
    MalformedIdentifierString { value: String },
}

/// Failure of one table export job
#[derive(Error, Debug)]
pub enum JobError {
    /// File open/read/write failure
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be decoded
    #[error("Failed to decode record {record} of '{file}': {source}")]
    Deserialization {
        file: PathBuf,
        record: u64,
        #[source]
        source: DecodeError,
    },

    /// A property value carried an unrecognized identifier layout
    #[error("Row {record} (entity {entity}), property '{property}': {source}")]
    MalformedIdentifier {
        record: u64,
        entity: String,
        property: String,
        #[source]
        source: KeyError,
    },

    /// CSV serialization failed
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Input directory missing or not a directory
    #[error("Invalid input directory '{path}': {reason}")]
    InvalidInputDir { path: PathBuf, reason: String },

    /// Output directory cannot be used
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidOutputDir { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Work queue send failed
    #[error("Failed to send job: queue closed")]
    QueueSendFailed,

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Result type alias for ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

/// Result type alias for DecodeError
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Result type alias for JobError
pub type JobResult<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = DiscoveryError::NoTableName {
            path: PathBuf::from("/backup/misc"),
        };
        let export_err: ExportError = err.into();
        assert!(matches!(export_err, ExportError::Discovery(_)));
    }

    #[test]
    fn test_malformed_identifier_message() {
        let err = JobError::MalformedIdentifier {
            record: 7,
            entity: "Foo@1".into(),
            property: "owner".into(),
            source: KeyError::MalformedIdentifierString {
                value: "ahXYZ".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 7"));
        assert!(msg.contains("Foo@1"));
        assert!(msg.contains("owner"));
    }
}
