//! Archive fixtures for unit tests.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

use super::member::MemberSpan;
use super::record::{ArcManifest, CaptureRecord};

pub(crate) struct TestArchive {
    pub bytes: Vec<u8>,
    /// Records in file order (the manifest is not included).
    pub records: Vec<CaptureRecord>,
    /// Member spans in file order; index 0 is the manifest.
    pub spans: Vec<MemberSpan>,
}

pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Deterministic, mostly incompressible bytes.
pub(crate) fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as u8
        })
        .collect()
}

/// Records with non-UTF-8 URLs and payloads that carry stray gzip members.
pub(crate) fn sample_records(count: usize) -> Vec<CaptureRecord> {
    (0..count)
        .map(|i| {
            let mut url = format!("http://www.example.com/{}/", i).into_bytes();
            url.extend_from_slice(b"\xc3\x28\xff");

            let mut payload = noise(i as u64, 300 + i * 97);
            if i % 2 == 1 {
                payload.extend_from_slice(&gzip(b"decoy member, not a record"));
                payload.extend_from_slice(&noise(i as u64 + 1000, 64));
            }

            CaptureRecord::new(
                url,
                "10.0.0.1",
                "20240301120000",
                "application/octet-stream",
                payload,
            )
            .with_header("Content-Type", "application/octet-stream")
            .with_header("X-Record", &i.to_string())
        })
        .collect()
}

pub(crate) fn build_archive(records: &[CaptureRecord]) -> TestArchive {
    let mut bytes = gzip(&ArcManifest::new("test.arc", "20240301120000").encode());
    let mut spans = vec![MemberSpan {
        start: 0,
        end: bytes.len() as u64,
    }];

    for record in records {
        let start = bytes.len() as u64;
        bytes.extend_from_slice(&gzip(&record.encode()));
        spans.push(MemberSpan {
            start,
            end: bytes.len() as u64,
        });
    }

    TestArchive {
        bytes,
        records: records.to_vec(),
        spans,
    }
}
