use clap::Parser;

use crate::config::{DEFAULT_SPLIT_SIZE, ReaderConfig, SplitConfig};

#[derive(Parser, Debug)]
#[command(name = "arcsplit")]
#[command(version)]
#[command(about = "Read ARC web archives split by byte range", long_about = None)]
#[command(after_help = "Examples:\n  \
  arcsplit -l crawl/                       list the planned splits of every archive in crawl/\n  \
  arcsplit -s 1048576 -k crawl/a.arc.gz    read 1 MiB splits and print every record URL\n  \
  arcsplit https://example.com/a.arc.gz    count records of a remote archive")]
pub struct Cli {
    /// Archive file, directory of archives, or HTTP URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// List planned splits without reading them
    #[arg(short = 'l')]
    pub list: bool,

    /// Split size in bytes
    #[arg(
        short = 's',
        long = "split-size",
        value_name = "BYTES",
        default_value_t = DEFAULT_SPLIT_SIZE
    )]
    pub split_size: u64,

    /// Number of splits read concurrently
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    /// Print the URL of every record
    #[arg(short = 'k', long = "keys")]
    pub keys: bool,

    /// Largest compressed member accepted, in bytes
    #[arg(long = "max-member-size", value_name = "BYTES")]
    pub max_member_size: Option<usize>,

    /// Bytes read per step while scanning for a record start
    #[arg(long = "scan-chunk-size", value_name = "BYTES")]
    pub scan_chunk_size: Option<usize>,

    /// Log split progress to stderr
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig::with_split_size(self.split_size)
    }

    pub fn reader_config(&self) -> ReaderConfig {
        let mut config = ReaderConfig::default();
        if let Some(max) = self.max_member_size {
            config.max_member_size = max;
        }
        if let Some(chunk) = self.scan_chunk_size {
            config.scan_chunk_size = chunk;
        }
        config
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "arcsplit=info"
        } else if self.is_very_quiet() {
            "error"
        } else {
            "warn"
        }
    }
}
