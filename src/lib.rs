//! # arcsplit
//!
//! Split-parallel reading of ARC web archives.
//!
//! An ARC file stores every capture record as its own gzip member, back to
//! back, with no index. This crate cuts archives into byte ranges purely by
//! size and gives each range a reader that emits exactly the records whose
//! members start inside it. Readers resynchronize from any offset by
//! test-decoding gzip candidates, so no split ever needs to know where
//! another one ends.
//!
//! ## Features
//!
//! - Read archives from the local filesystem or over HTTP Range requests
//! - Exactly-once record coverage for any contiguous split layout
//! - Raw URL keys, never re-encoded
//! - Typed errors that carry the byte offset where a reader stopped
//!
//! ## Example
//!
//! ```no_run
//! use arcsplit::{ArchiveInputSource, RecordReader, SplitConfig, SplitSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = ArchiveInputSource::new("crawl/")
//!         .with_split_config(SplitConfig::with_split_size(16 * 1024 * 1024));
//!
//!     for split in source.list_splits().await? {
//!         let mut reader = source.open_reader(&split).await?;
//!         while let Some((url, value)) = reader.next_record().await? {
//!             println!("{} ({} bytes)", String::from_utf8_lossy(&url), value.len());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod arc;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;

pub use arc::{
    ArcManifest, ArchiveInputSource, CaptureRecord, RecordReader, SplitRange, SplitReader,
    SplitSource, UrlInputSource,
};
pub use cli::Cli;
pub use config::{ReaderConfig, SplitConfig};
pub use error::{ArcError, DecodeError, DecompressionError, RecordFault};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
