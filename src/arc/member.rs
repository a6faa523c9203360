//! One-member-at-a-time gzip decoding over a [`ReadAt`] source.
//!
//! An archive is a plain concatenation of gzip members with no index, so the
//! only way to learn where a member ends is to inflate it and count the
//! compressed bytes the decoder consumed.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::bufread::GzDecoder;
use std::io::{self, Cursor, Read};
use tracing::trace;

use crate::config::ReaderConfig;
use crate::error::{ArcError, DecompressionError, Result};
use crate::io::{ReadAt, read_window};

/// Magic bytes opening every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fixed leading part of a gzip member header - 10 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipHeader {
    pub method: u8,
    pub flags: u8,
    pub mtime: u32,
    pub extra_flags: u8,
    pub os: u8,
}

impl GzipHeader {
    pub const SIZE: usize = 10;
    pub const METHOD_DEFLATE: u8 = 8;
    const RESERVED_FLAGS: u8 = 0xe0;

    pub fn from_bytes(data: &[u8]) -> std::result::Result<Self, DecompressionError> {
        if data.len() < GZIP_MAGIC.len() {
            return Err(DecompressionError::Truncated);
        }
        if data[..2] != GZIP_MAGIC {
            return Err(DecompressionError::BadMagic);
        }
        if data.len() < Self::SIZE {
            return Err(DecompressionError::Truncated);
        }

        let mut cursor = Cursor::new(&data[2..Self::SIZE]);
        let header = Self {
            method: cursor.read_u8().map_err(truncated)?,
            flags: cursor.read_u8().map_err(truncated)?,
            mtime: cursor.read_u32::<LittleEndian>().map_err(truncated)?,
            extra_flags: cursor.read_u8().map_err(truncated)?,
            os: cursor.read_u8().map_err(truncated)?,
        };

        if header.method != Self::METHOD_DEFLATE || header.flags & Self::RESERVED_FLAGS != 0 {
            return Err(DecompressionError::BadHeader {
                method: header.method,
                flags: header.flags,
            });
        }
        Ok(header)
    }
}

fn truncated(_: io::Error) -> DecompressionError {
    DecompressionError::Truncated
}

/// Physical extent `[start, end)` of one gzip member in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberSpan {
    pub start: u64,
    pub end: u64,
}

impl MemberSpan {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A decompressed member and where it sits in the file.
#[derive(Debug, Clone)]
pub struct Member {
    pub span: MemberSpan,
    pub data: Vec<u8>,
}

/// Cursor over the gzip members of one archive.
///
/// Each split reader owns its own stream, so the cursor is never shared.
pub struct MemberStream<R: ReadAt> {
    reader: R,
    position: u64,
    config: ReaderConfig,
}

impl<R: ReadAt> MemberStream<R> {
    /// Position a new stream at `offset`.
    pub fn open_at(reader: R, offset: u64, config: ReaderConfig) -> Self {
        Self {
            reader,
            position: offset,
            config,
        }
    }

    /// File offset the next member is read from.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, offset: u64) {
        self.position = offset;
    }

    /// Total size of the underlying archive.
    pub fn size(&self) -> u64 {
        self.reader.size()
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Decompress the member at the cursor and advance past it.
    ///
    /// Returns `Ok(None)` once the cursor reaches the end of the archive.
    pub async fn next_member(&mut self) -> Result<Option<Member>> {
        if self.position >= self.size() {
            return Ok(None);
        }
        let member = self.member_at(self.position).await?;
        self.position = member.span.end;
        Ok(Some(member))
    }

    /// Decompress the member starting at `offset` without moving the cursor.
    ///
    /// # Errors
    ///
    /// * [`ArcError::CorruptRecord`] when the bytes at `offset` are not one
    ///   complete, checksum-valid gzip member.
    /// * [`ArcError::Io`] when the source cannot be read.
    pub async fn member_at(&self, offset: u64) -> Result<Member> {
        let remaining = self.size().saturating_sub(offset);
        let max_window = self.config.max_member_size.max(GzipHeader::SIZE);
        let mut window = self.config.initial_window.clamp(GzipHeader::SIZE, max_window);

        loop {
            let buf = read_window(&self.reader, offset, window)
                .await
                .map_err(|source| ArcError::Io { offset, source })?;

            GzipHeader::from_bytes(&buf).map_err(|fault| ArcError::corrupt(offset, fault))?;

            match inflate_member(&buf) {
                Ok((data, consumed)) => {
                    let span = MemberSpan {
                        start: offset,
                        end: offset + consumed as u64,
                    };
                    trace!(
                        start = span.start,
                        end = span.end,
                        inflated = data.len(),
                        "decoded member"
                    );
                    return Ok(Member { span, data });
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    if buf.len() as u64 >= remaining {
                        return Err(ArcError::corrupt(offset, DecompressionError::Truncated));
                    }
                    if window >= max_window {
                        return Err(ArcError::corrupt(
                            offset,
                            DecompressionError::TooLarge { limit: max_window },
                        ));
                    }
                    window = window.saturating_mul(2).min(max_window);
                }
                Err(e) => {
                    return Err(ArcError::corrupt(
                        offset,
                        DecompressionError::Corrupt(e.to_string()),
                    ));
                }
            }
        }
    }
}

/// Inflate exactly one gzip member from the front of `compressed`.
///
/// Returns the decompressed bytes and how many compressed bytes the member
/// occupied. Input that ends mid-member fails with `UnexpectedEof`.
fn inflate_member(compressed: &[u8]) -> io::Result<(Vec<u8>, usize)> {
    let mut decoder = GzDecoder::new(compressed);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    let rest = decoder.into_inner();
    Ok((data, compressed.len() - rest.len()))
}
