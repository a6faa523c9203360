//! Tunables for split planning and member decoding.

/// Default planned split size (64 MiB).
pub const DEFAULT_SPLIT_SIZE: u64 = 64 * 1024 * 1024;

/// How split readers fetch and decode gzip members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Compressed bytes fetched on the first attempt at a member.
    pub initial_window: usize,
    /// Largest compressed member accepted; the fetch window doubles up to this.
    pub max_member_size: usize,
    /// Bytes read per step while scanning for a record start.
    pub scan_chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            initial_window: 64 * 1024,
            max_member_size: 128 * 1024 * 1024,
            scan_chunk_size: 64 * 1024,
        }
    }
}

/// How archive files are cut into splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    /// Target length of each split in bytes.
    pub split_size: u64,
}

impl SplitConfig {
    pub fn with_split_size(split_size: u64) -> Self {
        Self {
            split_size: split_size.max(1),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            split_size: DEFAULT_SPLIT_SIZE,
        }
    }
}
