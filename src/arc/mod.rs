//! ARC archive reading over arbitrary byte-range splits.
//!
//! ## Archive layout
//!
//! An ARC file is a concatenation of independently gzip-compressed members:
//!
//! ```text
//! [member 0: manifest] [member 1: record] ... [member N: record]
//! ```
//!
//! There is no table of contents. Member boundaries are found by inflating
//! members one after another, or, from an arbitrary offset, by scanning for
//! gzip magic bytes and test-decoding each candidate.
//!
//! ## Architecture
//!
//! - [`record`]: the record and manifest codec for one decompressed member
//! - [`member`]: [`MemberStream`], one gzip member at a time with exact spans
//! - [`scanner`]: [`BoundaryScanner`], resynchronization inside a split
//! - [`split_reader`]: [`SplitReader`], the per-split state machine
//! - [`input`]: split planning and the [`SplitSource`] / [`RecordReader`] traits
//!
//! ## Ownership rule
//!
//! A record belongs to the split containing the first byte of its member.
//! Split planning is therefore size-only, and any set of contiguous splits
//! covering a file yields every record exactly once.

pub mod input;
pub mod member;
pub mod record;
pub mod scanner;
pub mod split_reader;

#[cfg(test)]
pub(crate) mod testing;

pub use input::{
    ArchiveInputSource, RecordReader, SplitRange, SplitSource, UrlInputSource, plan_splits,
};
pub use member::{GZIP_MAGIC, GzipHeader, Member, MemberSpan, MemberStream};
pub use record::{ArcManifest, CaptureRecord, HEADER_TERMINATOR};
pub use scanner::BoundaryScanner;
pub use split_reader::{ReaderState, SplitReader};
