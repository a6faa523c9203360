//! Error taxonomy for archive reading.
//!
//! Structural failures ([`DecodeError`], [`DecompressionError`]) are candidate
//! rejections while a boundary scan is running and fatal everywhere else.
//! [`ArcError`] is what a split reader surfaces, always with the byte offset
//! where it stopped.

use std::io;
use thiserror::Error;

/// A decompressed member that does not have the ARC record layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The first line has fewer than five tokens or a bad content length.
    #[error("malformed ARC header line: {0}")]
    MalformedHeaderLine(String),

    /// No `\r\n\r\n` after the header lines.
    #[error("header block is not terminated by CRLF CRLF")]
    MissingHeaderTerminator,

    /// The bytes after the header terminator disagree with the declared length.
    #[error("payload length mismatch: declared {declared} bytes, found {actual}")]
    PayloadLengthMismatch { declared: u64, actual: u64 },

    /// Member 0 is not a `filedesc://` version block.
    #[error("first member is not an ARC file manifest")]
    InvalidManifest,
}

/// Bytes at an offset that are not one complete gzip member.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecompressionError {
    #[error("missing gzip magic bytes")]
    BadMagic,

    #[error("unsupported gzip header (method {method}, flags {flags:#04x})")]
    BadHeader { method: u8, flags: u8 },

    #[error("corrupt gzip member: {0}")]
    Corrupt(String),

    #[error("gzip member is truncated")]
    Truncated,

    #[error("gzip member exceeds {limit} compressed bytes")]
    TooLarge { limit: usize },
}

/// Why a member could not be turned into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordFault {
    #[error(transparent)]
    Decompression(#[from] DecompressionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors surfaced by member streams and split readers.
#[derive(Debug, Error)]
pub enum ArcError {
    /// The member starting at `offset` is not a valid record.
    #[error("corrupt record at offset {offset}: {fault}")]
    CorruptRecord {
        offset: u64,
        #[source]
        fault: RecordFault,
    },

    /// Reading the underlying bytes failed.
    #[error("I/O error at offset {offset}: {source}")]
    Io { offset: u64, source: io::Error },

    /// The reader already failed and will not produce more records.
    #[error("reader previously failed at offset {offset}")]
    ReaderFailed { offset: u64 },
}

impl ArcError {
    pub(crate) fn corrupt(offset: u64, fault: impl Into<RecordFault>) -> Self {
        ArcError::CorruptRecord {
            offset,
            fault: fault.into(),
        }
    }

    /// Byte offset at which reading stopped.
    pub fn offset(&self) -> u64 {
        match self {
            ArcError::CorruptRecord { offset, .. }
            | ArcError::Io { offset, .. }
            | ArcError::ReaderFailed { offset } => *offset,
        }
    }

    /// True for failures caused by the archive's content rather than I/O.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, ArcError::CorruptRecord { .. })
    }
}

/// A convenience `Result` type alias using [`ArcError`].
pub type Result<T> = std::result::Result<T, ArcError>;
