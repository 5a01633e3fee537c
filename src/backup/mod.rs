//! Backup file access
//!
//! Everything that knows about the upstream backup format lives here:
//!
//! - `records`: the framed-record container (32 KiB blocks of checksummed
//!   fragments) read by [`RecordReader`]
//! - `types`: the decoded entity model
//! - `decoder`: the bundled JSON entity decoder
//! - `reference`: parser/encoder for serialized key tokens
//!
//! The export pipeline only sees the two traits below, so a different entity
//! encoding can be plugged in without touching the export code.

pub mod decoder;
pub mod records;
pub mod reference;
pub mod types;

pub use decoder::JsonEntityDecoder;
pub use records::{RecordReader, RecordWriter};
pub use reference::{encode_reference, ReferenceTokenParser};
pub use types::{DecodedEntity, EntityKey, LocalId, PropertyValue, KEY_SEPARATOR};

use crate::error::DecodeResult;

/// Turns one raw record into an entity
pub trait EntityDecoder: Send + Sync {
    fn decode(&self, record: &[u8]) -> DecodeResult<DecodedEntity>;
}

/// Parses one serialized identifier token
///
/// Returns `None` when the token is not a well-formed serialized identifier.
pub trait KeyTokenParser: Send + Sync {
    fn parse_token(&self, token: &str) -> Option<EntityKey>;
}
