//! Shared fixtures: ARC archives written the way crawlers lay them out.

#![allow(dead_code)]

use arcsplit::{ArcManifest, CaptureRecord};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BASIC_TEST_RECORD_COUNT: usize = 10;

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Deterministic pseudo-random bytes.
pub fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_add(0x2545_f491_4f6c_dd1d);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

/// Records whose URLs contain bytes that are not valid UTF-8.
pub fn build_test_records(file_id: usize, count: usize) -> Vec<CaptureRecord> {
    (0..count)
        .map(|i| {
            let mut url = format!("http://test{}.example.org/{}?q=", file_id, i).into_bytes();
            url.extend_from_slice(&[0xff, 0xc0, 0x80, b'x', 0xed, 0xa0, 0x80]);

            let payload = if i % 3 == 0 {
                format!("<html><body>record {} of file {}</body></html>", i, file_id)
                    .repeat(20)
                    .into_bytes()
            } else {
                let mut payload = noise((file_id * 1000 + i) as u64, 200 + i * 131);
                // a complete gzip member buried in the payload
                payload.extend_from_slice(&gzip(b"nested gzip data"));
                payload.extend_from_slice(&noise(i as u64, 40));
                payload
            };

            CaptureRecord::new(url, "192.168.1.1", "20240515103000", "text/html", payload)
                .with_header("Content-Type", "text/html")
                .with_header("Content-Length", &(200 + i).to_string())
        })
        .collect()
}

pub fn build_archive(name: &str, records: &[CaptureRecord]) -> Vec<u8> {
    let mut bytes = gzip(&ArcManifest::new(name, "20240515103000").encode());
    for record in records {
        bytes.extend_from_slice(&gzip(&record.encode()));
    }
    bytes
}

/// Write `count` archives named `0.arc.gz`, `1.arc.gz`, ... into `dir`.
pub fn build_test_files(dir: &Path, count: usize) -> Vec<(PathBuf, Vec<CaptureRecord>)> {
    (0..count)
        .map(|file_id| {
            let records = build_test_records(file_id, BASIC_TEST_RECORD_COUNT);
            let name = format!("{}.arc.gz", file_id);
            let path = dir.join(&name);
            std::fs::write(&path, build_archive(&name, &records)).unwrap();
            (path, records)
        })
        .collect()
}

/// Offset just past the first CRLF CRLF in `value`, if any.
pub fn header_end(value: &[u8]) -> Option<usize> {
    value
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
}
