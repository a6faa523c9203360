//! Resynchronizing on a record start from an arbitrary byte offset.
//!
//! Gzip magic bytes show up inside compressed data too, so a magic match is
//! only a candidate. A candidate is accepted when the member there inflates
//! cleanly (checksum included) and decodes as an ARC record. Data that passes
//! both checks by accident would still be accepted; the format has no index
//! to rule that out.

use tracing::debug;

use crate::config::ReaderConfig;
use crate::error::{ArcError, Result};
use crate::io::{ReadAt, read_window};

use super::member::{GZIP_MAGIC, MemberSpan, MemberStream};
use super::record::CaptureRecord;

/// Finds the first valid record start inside a byte range.
#[derive(Debug, Clone)]
pub struct BoundaryScanner {
    chunk_size: usize,
}

impl BoundaryScanner {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            chunk_size: config.scan_chunk_size.max(1),
        }
    }

    /// First record starting in `[from, limit)`, with the span of its member.
    ///
    /// The record comes back already decoded, so the caller emits it without
    /// fetching the member a second time. `Ok(None)` means no record starts
    /// in the range; that is an empty split, not a failure. Only I/O errors
    /// are returned as errors.
    pub async fn find_record_start<R: ReadAt>(
        &self,
        stream: &MemberStream<R>,
        from: u64,
        limit: u64,
    ) -> Result<Option<(MemberSpan, CaptureRecord)>> {
        let limit = limit.min(stream.size());
        let mut base = from;
        let mut rejected = 0u32;

        while base < limit {
            // one byte past the chunk so a magic pair straddling it is seen
            let want = (limit - base).min(self.chunk_size as u64) as usize + 1;
            let chunk = read_window(stream.reader(), base, want)
                .await
                .map_err(|source| ArcError::Io {
                    offset: base,
                    source,
                })?;
            if chunk.len() < GZIP_MAGIC.len() {
                break;
            }

            for (i, pair) in chunk.windows(2).enumerate() {
                let candidate = base + i as u64;
                if candidate >= limit {
                    break;
                }
                if pair != GZIP_MAGIC {
                    continue;
                }
                if let Some(found) = self.accept(stream, candidate).await? {
                    debug!(from, candidate, rejected, "found record start");
                    return Ok(Some(found));
                }
                rejected += 1;
            }

            base += (chunk.len() - 1) as u64;
        }

        debug!(from, limit, rejected, "no record start in range");
        Ok(None)
    }

    async fn accept<R: ReadAt>(
        &self,
        stream: &MemberStream<R>,
        candidate: u64,
    ) -> Result<Option<(MemberSpan, CaptureRecord)>> {
        let member = match stream.member_at(candidate).await {
            Ok(member) => member,
            Err(e @ ArcError::CorruptRecord { .. }) => {
                debug!(candidate, error = %e, "rejected candidate");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match CaptureRecord::decode(&member.data) {
            Ok(record) => Ok(Some((member.span, record))),
            Err(e) => {
                debug!(candidate, error = %e, "candidate is not a record");
                Ok(None)
            }
        }
    }
}
