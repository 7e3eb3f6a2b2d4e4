use anyhow::{Context, Result};
use binparse::stream::{RecordSink, StreamParser};
use binparse::tail::{tail_growing_file, TailEvent, TailOptions};
use binparse::{FormatConfig, Record, RecordCodec, DEFAULT_RECORD_SIZE};
use clap::Parser;
use crossbeam_channel::bounded;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Follow a growing DMA log and parse records as they are written")]
struct Args {
    /// Capture file to follow
    path: PathBuf,

    /// Bytes per record
    #[arg(long, env = "BINPARSE_RECORD_SIZE", default_value_t = DEFAULT_RECORD_SIZE)]
    record_size: usize,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,

    /// Read chunk size in bytes
    #[arg(long, default_value_t = 1 << 20)]
    read_chunk: usize,

    /// Exit after this many milliseconds without new data (0 = follow forever)
    #[arg(long, default_value_t = 5000)]
    inactivity_timeout_ms: u64,

    /// Print every decoded record
    #[arg(long, default_value_t = false)]
    print: bool,
}

const MIB: u64 = 1 << 20;

/// Owned form of [`TailEvent`] shipped to the parsing thread.
enum Chunk {
    Bytes(Vec<u8>),
    Reopened,
}

/// First MiB boundary strictly above `bytes_fed`.
fn next_report_after(bytes_fed: u64) -> u64 {
    (bytes_fed / MIB + 1) * MIB
}

struct Printer {
    enabled: bool,
}

impl RecordSink for Printer {
    fn on_record(&mut self, index: u64, record: &Record, _raw: &[u8]) {
        if !self.enabled {
            return;
        }
        let fields = record
            .fields()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("[{index}] {} {fields}", record.label());
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    let args = Args::parse();

    let codec = RecordCodec::new(FormatConfig::new(args.record_size).context("invalid --record-size")?);
    let opts = TailOptions {
        read_chunk: args.read_chunk,
        poll: Duration::from_millis(args.poll_ms),
        inactivity_timeout: (args.inactivity_timeout_ms > 0).then(|| Duration::from_millis(args.inactivity_timeout_ms)),
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)).context("install Ctrl-C handler")?;
    }

    eprintln!("Reading and parsing file: {}", args.path.display());
    let (tx, rx) = bounded::<Chunk>(64);
    let reader = {
        let path = args.path.clone();
        let stop = stop.clone();
        std::thread::spawn(move || {
            tail_growing_file(&path, &opts, &stop, |ev| {
                let chunk = match ev {
                    TailEvent::Bytes(bytes) => Chunk::Bytes(bytes.to_vec()),
                    TailEvent::Reopened => Chunk::Reopened,
                };
                // parser thread gone: nothing left to do with the bytes
                let _ = tx.send(chunk);
            })
        })
    };

    let t_start = Instant::now();
    let mut parser = StreamParser::new(codec, Printer { enabled: args.print });
    let mut next_report = MIB;
    for chunk in rx {
        let bytes = match chunk {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Reopened => {
                let dropped = parser.reset();
                if dropped > 0 {
                    tracing::warn!(dropped, "file reopened; discarding partial record");
                }
                continue;
            }
        };
        parser.feed(&bytes).context("decode record")?;
        if parser.bytes_fed() >= next_report {
            next_report = next_report_after(parser.bytes_fed());
            eprint!(
                "[Progress] {:.1} MB read, {} lines parsed, time elapsed: {} ms\r",
                parser.bytes_fed() as f64 / 1e6,
                parser.records_seen(),
                t_start.elapsed().as_millis()
            );
        }
    }

    let summary = match reader.join() {
        Ok(res) => res.with_context(|| format!("follow {}", args.path.display()))?,
        Err(panic) => std::panic::resume_unwind(panic),
    };
    let pending = parser.pending();
    let hist = *parser.histogram();
    let lines = parser.records_seen();
    if let Err(e) = parser.finish() {
        tracing::warn!("{e}");
    }

    eprintln!("\n\n=== Parsing summary ===");
    eprintln!("Total bytes read   : {} bytes", summary.bytes);
    eprintln!("Total lines parsed : {lines}");
    for (label, count) in hist.entries() {
        eprintln!("{label:<19}: {count}");
    }
    eprintln!("Trailing bytes     : {pending}");
    eprintln!("File reopened      : {}", summary.reopened);
    eprintln!("Stopped by         : {:?}", summary.stop);
    eprintln!("Elapsed time       : {} ms", t_start.elapsed().as_millis());
    eprintln!("=======================");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_skips_to_next_boundary() {
        assert_eq!(next_report_after(0), MIB);
        assert_eq!(next_report_after(MIB), 2 * MIB);
        assert_eq!(next_report_after(MIB + 1), 2 * MIB);
        // one large chunk jumps past several boundaries at once
        assert_eq!(next_report_after(5 * MIB + 17), 6 * MIB);
    }
}
