//! Per-split record reader.
//!
//! A record belongs to the split whose range contains the first byte of its
//! gzip member. The split starting at offset 0 skips the manifest and reads
//! every record that starts before its end; any other split scans forward to
//! the first record start inside its range. Together the splits of a file
//! emit each record exactly once, wherever their boundaries fall.

use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::error::{ArcError, Result};
use crate::io::ReadAt;

use super::input::SplitRange;
use super::member::{MemberSpan, MemberStream};
use super::record::{ArcManifest, CaptureRecord};
use super::scanner::BoundaryScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Constructed, nothing read yet.
    Init,
    /// Skipping the manifest or scanning for the first owned record.
    Locating,
    Streaming,
    Done,
    /// Stopped at `offset`; the split's output is incomplete.
    Failed { offset: u64 },
}

/// Reads the records owned by one [`SplitRange`].
pub struct SplitReader<R: ReadAt> {
    split: SplitRange,
    stream: Option<MemberStream<R>>,
    scanner: BoundaryScanner,
    state: ReaderState,
    manifest: Option<ArcManifest>,
    /// Record the scan already decoded, emitted before reading on.
    pending: Option<(MemberSpan, CaptureRecord)>,
    records_read: u64,
    position: u64,
}

impl<R: ReadAt> SplitReader<R> {
    pub fn new(reader: R, split: SplitRange, config: ReaderConfig) -> Self {
        let scanner = BoundaryScanner::new(&config);
        let stream = MemberStream::open_at(reader, split.start, config);
        Self {
            position: split.start,
            split,
            stream: Some(stream),
            scanner,
            state: ReaderState::Init,
            manifest: None,
            pending: None,
            records_read: 0,
        }
    }

    pub fn split(&self) -> &SplitRange {
        &self.split
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The archive manifest, once a leader split has read past it.
    pub fn manifest(&self) -> Option<&ArcManifest> {
        self.manifest.as_ref()
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// File offset of the next member this reader would look at.
    pub fn position(&self) -> u64 {
        self.stream.as_ref().map_or(self.position, |s| s.position())
    }

    /// Fraction of the split's range consumed, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.state == ReaderState::Done || self.split.length == 0 {
            return 1.0;
        }
        let consumed = self.position().saturating_sub(self.split.start);
        (consumed as f64 / self.split.length as f64).min(1.0) as f32
    }

    /// Next record owned by this split, with the span of its member.
    pub async fn next_capture(&mut self) -> Result<Option<(MemberSpan, CaptureRecord)>> {
        loop {
            match self.state {
                ReaderState::Init => {
                    debug!(split = %self.split, "locating first record");
                    self.state = ReaderState::Locating;
                }
                ReaderState::Locating => {
                    if let Err(e) = self.locate().await {
                        return Err(self.fail(e));
                    }
                }
                ReaderState::Streaming => {
                    return match self.stream_next().await {
                        Ok(next) => Ok(next),
                        Err(e) => Err(self.fail(e)),
                    };
                }
                ReaderState::Done => return Ok(None),
                ReaderState::Failed { offset } => return Err(ArcError::ReaderFailed { offset }),
            }
        }
    }

    /// Next `(url, header block + CRLF CRLF + payload)` pair.
    pub async fn next_key_value(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .next_capture()
            .await?
            .map(|(_, record)| record.into_key_value()))
    }

    /// Release the underlying source. Later calls return no records.
    pub fn close(&mut self) {
        self.release();
        if !matches!(self.state, ReaderState::Failed { .. }) {
            self.state = ReaderState::Done;
        }
    }

    async fn locate(&mut self) -> Result<()> {
        let (start, end) = (self.split.start, self.split.end());
        let Some(stream) = self.stream.as_mut() else {
            self.finish();
            return Ok(());
        };

        if self.split.is_leader() {
            let Some(member) = stream.next_member().await? else {
                self.finish();
                return Ok(());
            };
            let manifest = ArcManifest::parse(&member.data)
                .map_err(|e| ArcError::corrupt(member.span.start, e))?;
            debug!(
                archive = %String::from_utf8_lossy(&manifest.archive_name),
                end = member.span.end,
                "skipped manifest"
            );
            self.manifest = Some(manifest);
            self.state = ReaderState::Streaming;
            return Ok(());
        }

        let found = self.scanner.find_record_start(stream, start, end).await?;
        match found {
            Some((span, record)) => {
                stream.seek(span.end);
                self.pending = Some((span, record));
                self.state = ReaderState::Streaming;
            }
            None => {
                debug!(split = %self.split, "no record starts in split");
                self.finish();
            }
        }
        Ok(())
    }

    async fn stream_next(&mut self) -> Result<Option<(MemberSpan, CaptureRecord)>> {
        if let Some(found) = self.pending.take() {
            self.records_read += 1;
            return Ok(Some(found));
        }

        let end = self.split.end();
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        // the member starting here belongs to the next split
        if stream.position() >= end {
            self.finish();
            return Ok(None);
        }

        let Some(member) = stream.next_member().await? else {
            self.finish();
            return Ok(None);
        };
        let record = CaptureRecord::decode(&member.data)
            .map_err(|e| ArcError::corrupt(member.span.start, e))?;

        self.records_read += 1;
        Ok(Some((member.span, record)))
    }

    fn finish(&mut self) {
        self.release();
        self.state = ReaderState::Done;
        info!(split = %self.split, records = self.records_read, "split finished");
    }

    fn fail(&mut self, err: ArcError) -> ArcError {
        let offset = err.offset();
        self.release();
        self.state = ReaderState::Failed { offset };
        warn!(
            split = %self.split,
            offset,
            records = self.records_read,
            error = %err,
            "split reader failed"
        );
        err
    }

    fn release(&mut self) {
        self.pending = None;
        if let Some(stream) = self.stream.take() {
            self.position = stream.position();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::testing::{TestArchive, build_archive, gzip, sample_records};
    use crate::error::{DecodeError, RecordFault};
    use crate::io::MemoryReader;
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn reader_for(archive: &TestArchive, start: u64, length: u64) -> SplitReader<MemoryReader> {
        SplitReader::new(
            MemoryReader::new(archive.bytes.clone()),
            SplitRange::new("mem.arc.gz", start, length),
            ReaderConfig::default(),
        )
    }

    async fn drain<R: ReadAt>(reader: &mut SplitReader<R>) -> Vec<CaptureRecord> {
        let mut records = Vec::new();
        while let Some((_, record)) = reader.next_capture().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn whole_file_split_reads_every_record() {
        let archive = build_archive(&sample_records(5));
        let mut reader = reader_for(&archive, 0, archive.bytes.len() as u64);

        assert_eq!(drain(&mut reader).await, archive.records);
        assert_eq!(reader.state(), ReaderState::Done);
        assert_eq!(reader.records_read(), 5);
        assert_eq!(reader.progress(), 1.0);
        assert_eq!(reader.manifest().unwrap().archive_name, b"test.arc");
    }

    #[tokio::test]
    async fn leader_never_emits_manifest() {
        let archive = build_archive(&sample_records(3));
        // ends inside the manifest: nothing of its own to emit
        let mut reader = reader_for(&archive, 0, 4);
        assert!(drain(&mut reader).await.is_empty());
        assert_eq!(reader.state(), ReaderState::Done);
        assert!(reader.manifest().is_some());
    }

    #[tokio::test]
    async fn leader_keeps_records_that_start_in_range() {
        let archive = build_archive(&sample_records(4));
        // ends one byte into record 1's member
        let end = archive.spans[2].start + 1;
        let mut reader = reader_for(&archive, 0, end);
        let records = drain(&mut reader).await;
        assert_eq!(records, archive.records[..2]);
        assert_eq!(reader.position(), archive.spans[3].start);
    }

    #[tokio::test]
    async fn split_inside_one_member_is_empty() {
        let archive = build_archive(&sample_records(3));
        let span = archive.spans[2];
        let mut reader = reader_for(&archive, span.start + 1, span.len() - 1);
        assert!(reader.next_capture().await.unwrap().is_none());
        assert_eq!(reader.state(), ReaderState::Done);
        assert!(reader.next_capture().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mid_file_split_starts_at_next_record() {
        let archive = build_archive(&sample_records(6));
        let start = archive.spans[2].start + 3;
        let length = archive.spans[5].start - start;
        let mut reader = reader_for(&archive, start, length);
        let records = drain(&mut reader).await;
        assert_eq!(records, archive.records[2..4]);
    }

    #[tokio::test]
    async fn replay_is_identical() {
        let archive = build_archive(&sample_records(6));
        let start = archive.spans[1].start + 10;
        let length = archive.bytes.len() as u64 - start;

        let first = drain(&mut reader_for(&archive, start, length)).await;
        let second = drain(&mut reader_for(&archive, start, length)).await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn corrupt_member_mid_stream_fails_with_offset() {
        let records = sample_records(3);
        let archive = build_archive(&records);
        let bad_start = archive.spans[2].start;

        let mut bytes = archive.bytes[..bad_start as usize].to_vec();
        bytes.extend_from_slice(&gzip(
            b"http://broken.example/ 1.2.3.4 20240101000000 text/plain 99\n\r\nshort",
        ));
        bytes.extend_from_slice(&archive.bytes[archive.spans[2].end as usize..]);

        let len = bytes.len() as u64;
        let mut reader = SplitReader::new(
            MemoryReader::new(bytes),
            SplitRange::new("mem.arc.gz", 0, len),
            ReaderConfig::default(),
        );

        let (_, first) = reader.next_capture().await.unwrap().unwrap();
        assert_eq!(first, records[0]);

        match reader.next_capture().await {
            Err(ArcError::CorruptRecord { offset, fault }) => {
                assert_eq!(offset, bad_start);
                assert!(matches!(
                    fault,
                    RecordFault::Decode(DecodeError::PayloadLengthMismatch { declared: 99, .. })
                ));
            }
            other => panic!(
                "expected corrupt record, got {:?}",
                other.map(|r| r.map(|(s, _)| s))
            ),
        }
        assert_eq!(reader.state(), ReaderState::Failed { offset: bad_start });

        let err = reader.next_capture().await.unwrap_err();
        assert!(matches!(err, ArcError::ReaderFailed { offset } if offset == bad_start));
    }

    #[tokio::test]
    async fn damaged_compressed_bytes_fail_the_leader() {
        let archive = build_archive(&sample_records(2));
        let mut bytes = archive.bytes.clone();
        let middle = (archive.spans[1].start + archive.spans[1].len() / 2) as usize;
        bytes[middle] ^= 0x55;

        let len = bytes.len() as u64;
        let mut reader = SplitReader::new(
            MemoryReader::new(bytes),
            SplitRange::new("mem.arc.gz", 0, len),
            ReaderConfig::default(),
        );
        let err = reader.next_capture().await.unwrap_err();
        assert!(err.is_corrupt_record());
        assert_eq!(err.offset(), archive.spans[1].start);
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal() {
        let records = sample_records(2);
        let mut bytes = Vec::new();
        for record in &records {
            bytes.extend_from_slice(&gzip(&record.encode()));
        }
        let len = bytes.len() as u64;
        let mut reader = SplitReader::new(
            MemoryReader::new(bytes),
            SplitRange::new("mem.arc.gz", 0, len),
            ReaderConfig::default(),
        );
        match reader.next_capture().await {
            Err(ArcError::CorruptRecord { offset: 0, fault }) => {
                assert_eq!(fault, RecordFault::Decode(DecodeError::InvalidManifest));
            }
            other => panic!(
                "expected manifest failure, got {:?}",
                other.map(|r| r.is_some())
            ),
        }
    }

    struct BrokenDisk {
        size: u64,
    }

    #[async_trait]
    impl ReadAt for BrokenDisk {
        async fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }

        fn size(&self) -> u64 {
            self.size
        }
    }

    /// Logs the offset of every read before passing it on.
    struct RecordingReader {
        inner: MemoryReader,
        reads: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl ReadAt for RecordingReader {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.lock().unwrap().push(offset);
            self.inner.read_at(offset, buf).await
        }

        fn size(&self) -> u64 {
            self.inner.size()
        }
    }

    #[tokio::test]
    async fn scanned_record_is_fetched_once() {
        let archive = build_archive(&sample_records(4));
        let start = archive.spans[1].start + 1;
        let reads = Arc::new(Mutex::new(Vec::new()));
        let source = RecordingReader {
            inner: MemoryReader::new(archive.bytes.clone()),
            reads: reads.clone(),
        };
        let length = archive.bytes.len() as u64 - start;
        let split = SplitRange::new("mem.arc.gz", start, length);
        let mut reader = SplitReader::new(source, split, ReaderConfig::default());

        let (span, record) = reader.next_capture().await.unwrap().unwrap();
        assert_eq!(span, archive.spans[2]);
        assert_eq!(record, archive.records[1]);
        assert_eq!(reader.records_read(), 1);

        assert_eq!(drain(&mut reader).await, archive.records[2..]);
        let reads = reads.lock().unwrap();
        assert_eq!(reads.iter().filter(|&&o| o == span.start).count(), 1);
    }

    #[tokio::test]
    async fn io_errors_are_fatal_and_carry_offset() {
        let mut reader = SplitReader::new(
            BrokenDisk { size: 4096 },
            SplitRange::new("broken.arc.gz", 1024, 1024),
            ReaderConfig::default(),
        );
        let err = reader.next_capture().await.unwrap_err();
        assert!(matches!(err, ArcError::Io { offset: 1024, .. }));
        assert_eq!(reader.state(), ReaderState::Failed { offset: 1024 });
    }

    #[tokio::test]
    async fn close_stops_reading() {
        let archive = build_archive(&sample_records(3));
        let mut reader = reader_for(&archive, 0, archive.bytes.len() as u64);
        assert!(reader.next_key_value().await.unwrap().is_some());
        reader.close();
        assert_eq!(reader.state(), ReaderState::Done);
        assert!(reader.next_key_value().await.unwrap().is_none());
    }
}
