//! Framed-record container
//!
//! Backup files are a sequence of 32 KiB blocks. Each block holds fragments
//! with a 7-byte header:
//!
//! ```text
//! +----------------+------------+---------+------------------+
//! | masked crc32c  | length u16 | type u8 | payload (length) |
//! |   (4 bytes LE) |   (LE)     |         |                  |
//! +----------------+------------+---------+------------------+
//! ```
//!
//! A record that fits in the rest of a block is written as one FULL fragment;
//! otherwise it is split into FIRST, MIDDLE..., LAST. A block tail shorter than
//! a header is zero-filled and skipped by readers.

use crate::error::{DecodeError, DecodeResult};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Block size of the container
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Fragment header size: checksum (4) + length (2) + type (1)
pub const HEADER_SIZE: usize = 7;

const ZERO_TYPE: u8 = 0;
const FULL_TYPE: u8 = 1;
const FIRST_TYPE: u8 = 2;
const MIDDLE_TYPE: u8 = 3;
const LAST_TYPE: u8 = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

fn masked_checksum(kind: u8, payload: &[u8]) -> u32 {
    let crc = crc32c::crc32c_append(crc32c::crc32c(&[kind]), payload);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// One physical fragment
struct Fragment {
    kind: u8,
    offset: u64,
    data: Vec<u8>,
}

/// Streams records out of a framed file
///
/// Yields one `Vec<u8>` per logical record. After the first error the
/// iterator is exhausted.
pub struct RecordReader<R> {
    inner: R,
    block: Vec<u8>,
    pos: usize,
    block_offset: u64,
    eof: bool,
    failed: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open a framed file read-only
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(BLOCK_SIZE, file)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block: Vec::with_capacity(BLOCK_SIZE),
            pos: 0,
            block_offset: 0,
            eof: false,
            failed: false,
        }
    }

    /// Load the next block; returns false at end of input
    fn fill_block(&mut self) -> DecodeResult<bool> {
        self.block_offset += self.block.len() as u64;
        self.block.clear();
        self.block.resize(BLOCK_SIZE, 0);

        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.inner.read(&mut self.block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.block.truncate(filled);
        self.pos = 0;
        if filled < BLOCK_SIZE {
            self.eof = true;
        }
        Ok(filled > 0)
    }

    fn read_fragment(&mut self) -> DecodeResult<Option<Fragment>> {
        loop {
            if self.block.len() - self.pos < HEADER_SIZE {
                if self.eof || !self.fill_block()? {
                    return Ok(None);
                }
                continue;
            }

            let offset = self.block_offset + self.pos as u64;
            let header = &self.block[self.pos..self.pos + HEADER_SIZE];
            let expected = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let kind = header[6];

            // Zero-filled tail of a preallocated block
            if kind == ZERO_TYPE && length == 0 {
                self.pos = self.block.len();
                continue;
            }

            let start = self.pos + HEADER_SIZE;
            let end = start + length;
            if end > self.block.len() {
                if self.eof {
                    return Err(DecodeError::Truncated { offset });
                }
                return Err(DecodeError::CorruptRecord {
                    offset,
                    reason: format!("fragment of {} bytes crosses block boundary", length),
                });
            }

            let data = self.block[start..end].to_vec();
            let actual = masked_checksum(kind, &data);
            if actual != expected {
                return Err(DecodeError::ChecksumMismatch {
                    offset,
                    expected,
                    actual,
                });
            }

            self.pos = end;
            return Ok(Some(Fragment { kind, offset, data }));
        }
    }

    fn next_record(&mut self) -> DecodeResult<Option<Vec<u8>>> {
        let mut pending: Option<(u64, Vec<u8>)> = None;

        loop {
            let Some(fragment) = self.read_fragment()? else {
                return match pending {
                    Some((offset, _)) => Err(DecodeError::Truncated { offset }),
                    None => Ok(None),
                };
            };

            match fragment.kind {
                FULL_TYPE if pending.is_none() => return Ok(Some(fragment.data)),
                FIRST_TYPE if pending.is_none() => {
                    pending = Some((fragment.offset, fragment.data));
                }
                FULL_TYPE | FIRST_TYPE => {
                    return Err(DecodeError::CorruptRecord {
                        offset: fragment.offset,
                        reason: "record started before previous record ended".into(),
                    });
                }
                MIDDLE_TYPE | LAST_TYPE => {
                    let Some((_, buf)) = pending.as_mut() else {
                        return Err(DecodeError::CorruptRecord {
                            offset: fragment.offset,
                            reason: "continuation fragment without a first fragment".into(),
                        });
                    };
                    buf.extend_from_slice(&fragment.data);
                    if fragment.kind == LAST_TYPE {
                        return Ok(pending.map(|(_, buf)| buf));
                    }
                }
                other => {
                    return Err(DecodeError::CorruptRecord {
                        offset: fragment.offset,
                        reason: format!("unknown fragment type {}", other),
                    });
                }
            }
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = DecodeResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes records in the framed container format
pub struct RecordWriter<W: Write> {
    inner: W,
    block_offset: usize,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a framed file
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            block_offset: 0,
        }
    }

    /// Append one record, fragmenting across blocks as needed
    pub fn write_record(&mut self, data: &[u8]) -> io::Result<()> {
        let mut remaining = data;
        let mut first = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                self.inner.write_all(&[0u8; HEADER_SIZE][..leftover])?;
                self.block_offset = 0;
            }

            let available = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let len = remaining.len().min(available);
            let last = len == remaining.len();

            let kind = match (first, last) {
                (true, true) => FULL_TYPE,
                (true, false) => FIRST_TYPE,
                (false, true) => LAST_TYPE,
                (false, false) => MIDDLE_TYPE,
            };

            self.emit(kind, &remaining[..len])?;
            remaining = &remaining[len..];
            first = false;

            if last {
                return Ok(());
            }
        }
    }

    fn emit(&mut self, kind: u8, payload: &[u8]) -> io::Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&masked_checksum(kind, payload).to_le_bytes());
        header[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        header[6] = kind;

        self.inner.write_all(&header)?;
        self.inner.write_all(payload)?;
        self.block_offset += HEADER_SIZE + payload.len();
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
