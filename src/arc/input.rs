//! Split planning and the driver-facing source/reader capabilities.
//!
//! Splits are cut by size alone. Record ownership inside each split is
//! settled by [`SplitReader`], so the planner never reads archive contents.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{ReaderConfig, SplitConfig};
use crate::error::ArcError;
use crate::io::{HttpRangeReader, LocalFileReader, ReadAt};

use super::split_reader::SplitReader;

/// The last split may run this much past `split_size` instead of leaving a sliver.
const SPLIT_SLOP: f64 = 1.1;

/// Half-open byte range `[start, start + length)` of one archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitRange {
    /// Local file path or URL of the archive.
    pub path: String,
    pub start: u64,
    pub length: u64,
}

impl SplitRange {
    pub fn new(path: impl Into<String>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
        }
    }

    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// The split at offset 0 also owns the manifest.
    pub fn is_leader(&self) -> bool {
        self.start == 0
    }
}

impl fmt::Display for SplitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}, {})", self.path, self.start, self.end())
    }
}

/// Cut `[0, file_len)` into contiguous splits of about `split_size` bytes.
pub fn plan_splits(path: &str, file_len: u64, split_size: u64) -> Vec<SplitRange> {
    let split_size = split_size.max(1);
    let mut splits = Vec::new();
    let mut remaining = file_len;

    while remaining as f64 / split_size as f64 > SPLIT_SLOP {
        splits.push(SplitRange::new(path, file_len - remaining, split_size));
        remaining -= split_size;
    }
    if remaining > 0 {
        splits.push(SplitRange::new(path, file_len - remaining, remaining));
    }
    splits
}

/// Pulls `(key, value)` records out of one split.
#[async_trait]
pub trait RecordReader: Send {
    /// Next `(raw url, header block + CRLF CRLF + payload)` pair, or `None` when done.
    async fn next_record(&mut self) -> std::result::Result<Option<(Vec<u8>, Vec<u8>)>, ArcError>;

    /// Records produced so far.
    fn records_read(&self) -> u64;

    /// Fraction of the split consumed, in `[0, 1]`.
    fn progress(&self) -> f32;

    /// Release the underlying byte source.
    fn close(&mut self);
}

/// Enumerates splits and opens an independent reader for each.
#[async_trait]
pub trait SplitSource: Send + Sync {
    type Reader: RecordReader + 'static;

    async fn list_splits(&self) -> Result<Vec<SplitRange>>;

    async fn open_reader(&self, split: &SplitRange) -> Result<Self::Reader>;
}

#[async_trait]
impl<R: ReadAt> RecordReader for SplitReader<R> {
    async fn next_record(&mut self) -> std::result::Result<Option<(Vec<u8>, Vec<u8>)>, ArcError> {
        self.next_key_value().await
    }

    fn records_read(&self) -> u64 {
        SplitReader::records_read(self)
    }

    fn progress(&self) -> f32 {
        SplitReader::progress(self)
    }

    fn close(&mut self) {
        SplitReader::close(self)
    }
}

/// Archives on the local filesystem: one file, or every file in a directory.
#[derive(Debug, Clone)]
pub struct ArchiveInputSource {
    root: PathBuf,
    split_config: SplitConfig,
    reader_config: ReaderConfig,
}

impl ArchiveInputSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            split_config: SplitConfig::default(),
            reader_config: ReaderConfig::default(),
        }
    }

    pub fn with_split_config(mut self, config: SplitConfig) -> Self {
        self.split_config = config;
        self
    }

    pub fn with_reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config;
        self
    }

    /// Archive files with their sizes, in name order.
    ///
    /// Directory entries starting with `.` or `_` are skipped, as are
    /// subdirectories.
    pub async fn list_files(&self) -> Result<Vec<(PathBuf, u64)>> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("cannot stat input {}", self.root.display()))?;
        if meta.is_file() {
            return Ok(vec![(self.root.clone(), meta.len())]);
        }

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("cannot list input directory {}", self.root.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name.starts_with('_') {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push((entry.path(), meta.len()));
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl SplitSource for ArchiveInputSource {
    type Reader = SplitReader<LocalFileReader>;

    async fn list_splits(&self) -> Result<Vec<SplitRange>> {
        let mut splits = Vec::new();
        for (path, len) in self.list_files().await? {
            let planned = plan_splits(&path.to_string_lossy(), len, self.split_config.split_size);
            debug!(path = %path.display(), len, splits = planned.len(), "planned splits");
            splits.extend(planned);
        }
        Ok(splits)
    }

    async fn open_reader(&self, split: &SplitRange) -> Result<Self::Reader> {
        let reader = LocalFileReader::new(Path::new(&split.path))?;
        Ok(SplitReader::new(reader, split.clone(), self.reader_config.clone()))
    }
}

/// One remote archive read with HTTP Range requests.
#[derive(Debug, Clone)]
pub struct UrlInputSource {
    url: String,
    split_config: SplitConfig,
    reader_config: ReaderConfig,
}

impl UrlInputSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            split_config: SplitConfig::default(),
            reader_config: ReaderConfig::default(),
        }
    }

    pub fn with_split_config(mut self, config: SplitConfig) -> Self {
        self.split_config = config;
        self
    }

    pub fn with_reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config;
        self
    }
}

#[async_trait]
impl SplitSource for UrlInputSource {
    type Reader = SplitReader<HttpRangeReader>;

    async fn list_splits(&self) -> Result<Vec<SplitRange>> {
        let probe = HttpRangeReader::new(self.url.clone())
            .await
            .with_context(|| format!("cannot open {}", self.url))?;
        Ok(plan_splits(&self.url, probe.size(), self.split_config.split_size))
    }

    async fn open_reader(&self, split: &SplitRange) -> Result<Self::Reader> {
        let reader = HttpRangeReader::new(split.path.clone())
            .await
            .with_context(|| format!("cannot open {}", split.path))?;
        Ok(SplitReader::new(reader, split.clone(), self.reader_config.clone()))
    }
}
