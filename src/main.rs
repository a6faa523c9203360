//! Main entry point for the arcsplit CLI application.
//!
//! Plans byte-range splits for local or remote ARC archives and reads them
//! concurrently, the way a batch framework would hand splits to workers.

use anyhow::{Result, bail};
use clap::Parser;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use arcsplit::{ArchiveInputSource, Cli, RecordReader, SplitRange, SplitSource, UrlInputSource};

/// Application entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.is_http_url() {
        let source = UrlInputSource::new(cli.path.clone())
            .with_split_config(cli.split_config())
            .with_reader_config(cli.reader_config());
        process_archives(Arc::new(source), &cli).await
    } else {
        let source = ArchiveInputSource::new(&cli.path)
            .with_split_config(cli.split_config())
            .with_reader_config(cli.reader_config());
        process_archives(Arc::new(source), &cli).await
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// What one split produced.
struct SplitOutcome {
    index: usize,
    split: SplitRange,
    records: u64,
    value_bytes: u64,
    error: Option<anyhow::Error>,
}

/// Plan splits, then either list them (`-l`) or read them all.
///
/// Splits are read by up to `--jobs` tasks at once. Each task opens its own
/// reader, so tasks share nothing but the archive itself.
async fn process_archives<S: SplitSource + 'static>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let splits = source.list_splits().await?;

    if cli.list {
        list_splits(&splits);
        return Ok(());
    }

    let semaphore = Arc::new(Semaphore::new(cli.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, split) in splits.into_iter().enumerate() {
        let source = source.clone();
        let semaphore = semaphore.clone();
        let print_keys = cli.keys;

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            Ok::<_, anyhow::Error>(read_split(source.as_ref(), index, split, print_keys).await)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined??);
    }
    outcomes.sort_by_key(|outcome| outcome.index);

    report(&outcomes, cli)
}

/// Drain one split, optionally echoing each raw URL to stdout.
async fn read_split<S: SplitSource>(
    source: &S,
    index: usize,
    split: SplitRange,
    print_keys: bool,
) -> SplitOutcome {
    let mut outcome = SplitOutcome {
        index,
        split,
        records: 0,
        value_bytes: 0,
        error: None,
    };

    let mut reader = match source.open_reader(&outcome.split).await {
        Ok(reader) => reader,
        Err(e) => {
            outcome.error = Some(e);
            return outcome;
        }
    };

    let mut stdout = tokio::io::stdout();
    loop {
        match reader.next_record().await {
            Ok(Some((key, value))) => {
                outcome.value_bytes += value.len() as u64;
                if print_keys {
                    // keys are raw bytes; write them untouched
                    let mut line = key;
                    line.push(b'\n');
                    if let Err(e) = stdout.write_all(&line).await {
                        outcome.error = Some(e.into());
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                outcome.error = Some(e.into());
                break;
            }
        }
    }

    outcome.records = reader.records_read();
    reader.close();
    outcome
}

fn list_splits(splits: &[SplitRange]) {
    println!("{:>12}  {:>12}  Path", "Start", "Length");
    println!("{}", "-".repeat(70));
    for split in splits {
        println!("{:>12}  {:>12}  {}", split.start, split.length, split.path);
    }
    println!("{}", "-".repeat(70));
    let total: u64 = splits.iter().map(|s| s.length).sum();
    println!("{:>12}  {:>12}  {} splits", "", total, splits.len());
}

/// Print per-split counts and fail if any split did not complete.
fn report(outcomes: &[SplitOutcome], cli: &Cli) -> Result<()> {
    let mut total_records = 0u64;
    let mut total_bytes = 0u64;
    let mut failed = 0usize;

    for outcome in outcomes {
        total_records += outcome.records;
        total_bytes += outcome.value_bytes;

        if let Some(ref e) = outcome.error {
            failed += 1;
            eprintln!("error: {}: {:#}", outcome.split, e);
        } else if !cli.is_quiet() && !cli.keys {
            println!("{:>10} records  {}", outcome.records, outcome.split);
        }
    }

    if !cli.is_very_quiet() {
        eprintln!(
            "\n{} records, {} of record data from {} splits",
            total_records,
            format_size(total_bytes),
            outcomes.len()
        );
    }

    if failed > 0 {
        bail!("{} of {} splits failed", failed, outcomes.len());
    }
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
