//! ARC record layout inside one decompressed gzip member.
//!
//! ```text
//! <url> <ip> <capture-date> <content-type> <content-length>\n
//! <Header-Name>: <value>\r\n      (zero or more lines)
//! \r\n
//! <payload, exactly content-length bytes>
//! ```
//!
//! Version 2 header lines carry extra fields between the content type and the
//! length; the length is always the last field.

use std::borrow::Cow;

use crate::error::DecodeError;

/// Ends the header block and separates it from the payload.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// URL scheme of the file manifest that opens every archive.
pub const MANIFEST_SCHEME: &[u8] = b"filedesc://";

const CRLF: &[u8] = b"\r\n";

/// Version line and field legend written by [`ArcManifest::new`].
const DEFAULT_VERSION_BLOCK: &[u8] =
    b"1 0 InternetArchive\nURL IP-address Archive-date Content-type Archive-length\n";
const MIN_FIELDS: usize = 5;

/// One decoded capture record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Raw URL bytes exactly as stored; never re-encoded.
    pub url: Vec<u8>,
    pub ip_address: String,
    pub capture_date: String,
    pub content_type: String,
    pub content_length: u64,
    /// `name: value` lines joined by CRLF, without the terminator.
    pub header_block: Vec<u8>,
    pub payload: Vec<u8>,
}

impl CaptureRecord {
    /// Build a record with an empty header block.
    pub fn new(
        url: impl Into<Vec<u8>>,
        ip_address: impl Into<String>,
        capture_date: impl Into<String>,
        content_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            url: url.into(),
            ip_address: ip_address.into(),
            capture_date: capture_date.into(),
            content_type: content_type.into(),
            content_length: payload.len() as u64,
            header_block: Vec::new(),
            payload,
        }
    }

    /// Append a `name: value` line to the header block.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if !self.header_block.is_empty() {
            self.header_block.extend_from_slice(CRLF);
        }
        self.header_block.extend_from_slice(name.as_bytes());
        self.header_block.extend_from_slice(b": ");
        self.header_block.extend_from_slice(value.as_bytes());
        self
    }

    /// Parse one decompressed member.
    ///
    /// # Errors
    ///
    /// * [`DecodeError::MalformedHeaderLine`] if the first line is missing,
    ///   has fewer than five fields, or its length field is not a
    ///   non-negative integer.
    /// * [`DecodeError::MissingHeaderTerminator`] if no `\r\n\r\n` follows.
    /// * [`DecodeError::PayloadLengthMismatch`] if the payload is not exactly
    ///   the declared length.
    pub fn decode(member: &[u8]) -> Result<Self, DecodeError> {
        let (line, rest) = split_first_line(member)?;
        let fields = HeaderLine::parse(line)?;

        let (header_block, payload) = if rest.starts_with(CRLF) {
            (&rest[..0], &rest[CRLF.len()..])
        } else {
            let end = find(rest, HEADER_TERMINATOR).ok_or(DecodeError::MissingHeaderTerminator)?;
            (&rest[..end], &rest[end + HEADER_TERMINATOR.len()..])
        };

        if payload.len() as u64 != fields.content_length {
            return Err(DecodeError::PayloadLengthMismatch {
                declared: fields.content_length,
                actual: payload.len() as u64,
            });
        }

        Ok(Self {
            url: fields.url.to_vec(),
            ip_address: lossy(fields.ip_address),
            capture_date: lossy(fields.capture_date),
            content_type: lossy(fields.content_type),
            content_length: fields.content_length,
            header_block: header_block.to_vec(),
            payload: payload.to_vec(),
        })
    }

    /// Serialize into the uncompressed member layout accepted by [`decode`](Self::decode).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.url.len() + self.header_block.len() + self.payload.len() + 96,
        );
        out.extend_from_slice(&self.url);
        for field in [&self.ip_address, &self.capture_date, &self.content_type] {
            out.push(b' ');
            out.extend_from_slice(field.as_bytes());
        }
        out.push(b' ');
        out.extend_from_slice(self.payload.len().to_string().as_bytes());
        out.push(b'\n');

        if self.header_block.is_empty() {
            out.extend_from_slice(CRLF);
        } else {
            out.extend_from_slice(&self.header_block);
            out.extend_from_slice(HEADER_TERMINATOR);
        }
        out.extend_from_slice(&self.payload);
        out
    }

    /// Header lines that carry a `name: value` pair.
    pub fn headers(&self) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
        self.header_block
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter_map(|line| {
                let colon = line.iter().position(|b| *b == b':')?;
                let name = String::from_utf8_lossy(&line[..colon]);
                let value = String::from_utf8_lossy(line[colon + 1..].trim_ascii());
                Some((name, value))
            })
    }

    /// Header block, terminator and payload as one buffer.
    pub fn value(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(
            self.header_block.len() + HEADER_TERMINATOR.len() + self.payload.len(),
        );
        value.extend_from_slice(&self.header_block);
        value.extend_from_slice(HEADER_TERMINATOR);
        value.extend_from_slice(&self.payload);
        value
    }

    /// Split into the `(key, value)` pair handed to consumers.
    pub fn into_key_value(self) -> (Vec<u8>, Vec<u8>) {
        let value = self.value();
        (self.url, value)
    }
}

/// Decoded member 0: file-level metadata, never emitted as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcManifest {
    /// Bytes after `filedesc://` in the URL field.
    pub archive_name: Vec<u8>,
    pub ip_address: String,
    pub creation_date: String,
    pub content_type: String,
    pub version_block: Vec<u8>,
}

impl ArcManifest {
    pub fn new(archive_name: impl Into<Vec<u8>>, creation_date: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            ip_address: "0.0.0.0".to_string(),
            creation_date: creation_date.into(),
            content_type: "text/plain".to_string(),
            version_block: DEFAULT_VERSION_BLOCK.to_vec(),
        }
    }

    pub fn parse(member: &[u8]) -> Result<Self, DecodeError> {
        let (line, rest) = split_first_line(member)?;
        let fields = HeaderLine::parse(line)?;
        let archive_name = fields
            .url
            .strip_prefix(MANIFEST_SCHEME)
            .ok_or(DecodeError::InvalidManifest)?;

        Ok(Self {
            archive_name: archive_name.to_vec(),
            ip_address: lossy(fields.ip_address),
            creation_date: lossy(fields.capture_date),
            content_type: lossy(fields.content_type),
            version_block: rest.to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.archive_name.len() + self.version_block.len() + 64,
        );
        out.extend_from_slice(MANIFEST_SCHEME);
        out.extend_from_slice(&self.archive_name);
        for field in [&self.ip_address, &self.creation_date, &self.content_type] {
            out.push(b' ');
            out.extend_from_slice(field.as_bytes());
        }
        out.push(b' ');
        out.extend_from_slice(self.version_block.len().to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&self.version_block);
        out
    }

    /// Major format version from the version block, if it has one.
    pub fn version(&self) -> Option<u32> {
        self.version_block
            .split(|b| b.is_ascii_whitespace())
            .next()
            .and_then(|token| std::str::from_utf8(token).ok())
            .and_then(|token| token.parse().ok())
    }
}

/// Fields of the first line of a member.
struct HeaderLine<'a> {
    url: &'a [u8],
    ip_address: &'a [u8],
    capture_date: &'a [u8],
    content_type: &'a [u8],
    content_length: u64,
}

impl<'a> HeaderLine<'a> {
    fn parse(line: &'a [u8]) -> Result<Self, DecodeError> {
        let fields: Vec<&[u8]> = line
            .split(|b| *b == b' ' || *b == b'\t')
            .filter(|field| !field.is_empty())
            .collect();

        if fields.len() < MIN_FIELDS {
            return Err(DecodeError::MalformedHeaderLine(format!(
                "expected at least {} fields, found {}",
                MIN_FIELDS,
                fields.len()
            )));
        }

        let raw_length = fields[fields.len() - 1];
        let content_length = std::str::from_utf8(raw_length)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                DecodeError::MalformedHeaderLine(format!(
                    "invalid content length {:?}",
                    String::from_utf8_lossy(raw_length)
                ))
            })?;

        Ok(Self {
            url: fields[0],
            ip_address: fields[1],
            capture_date: fields[2],
            content_type: fields[3],
            content_length,
        })
    }
}

/// Split off the `\n`-terminated first line, dropping a trailing `\r`.
fn split_first_line(member: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    let newline = member
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| DecodeError::MalformedHeaderLine("missing line terminator".to_string()))?;
    let line = &member[..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok((line, &member[newline + 1..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
