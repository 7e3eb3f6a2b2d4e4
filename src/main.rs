use anyhow::{bail, Context, Result};
use binparse::{FormatConfig, ScanEngine, ScanOutcome, DEFAULT_RECORD_SIZE};
use clap::Parser;
use memmap2::Mmap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Count record types in a DMA log and preview the first lines")]
struct Args {
    /// Binary log file to scan
    #[arg(default_value = "data/2025_09_25_cru_dma_log_example")]
    path: PathBuf,

    /// Preview first N lines with parsed fields
    #[arg(long, short = 'n', env = "BINPARSE_PREVIEW", default_value_t = 3)]
    preview: usize,

    /// Bytes per record
    #[arg(long, env = "BINPARSE_RECORD_SIZE", default_value_t = DEFAULT_RECORD_SIZE)]
    record_size: usize,

    /// Worker threads for counting (1 = sequential, Ctrl-C cancels)
    #[arg(long, short = 'j', env = "BINPARSE_THREADS", default_value_t = 1)]
    threads: usize,

    /// Print decoded fields in hex
    #[arg(long, default_value_t = false)]
    hex: bool,

    /// Emit counts and preview as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let config = FormatConfig::new(args.record_size).context("invalid --record-size")?;
    let engine = ScanEngine::new(config);

    let file = File::open(&args.path).with_context(|| format!("File not found: {}", args.path.display()))?;
    let size = file.metadata().with_context(|| format!("stat {}", args.path.display()))?.len();
    if size == 0 {
        bail!("File is empty.");
    }
    // SAFETY: the mapping is read-only and the capture is not modified while we scan it.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", args.path.display()))?;
    let buf: &[u8] = &mmap;
    let total_lines = engine.record_count(buf).context("cannot frame file into records")?;

    if !args.json {
        println!("Parsing file: {}", args.path.display());
        println!("File size: {size} bytes ({total_lines} lines @ {}B/line)", engine.record_size());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)).context("install Ctrl-C handler")?;
    }

    let t0 = Instant::now();
    let outcome = if args.threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build()
            .context("build counting thread pool")?;
        ScanOutcome::Complete(pool.install(|| engine.count_by_type_sharded(buf, args.threads))?)
    } else {
        engine.count_by_type_cancellable(buf, &cancel)?
    };
    let elapsed = t0.elapsed().as_secs_f64();
    let mib = size as f64 / (1024.0 * 1024.0);
    let mibps = if elapsed > 0.0 { mib / elapsed } else { f64::INFINITY };

    let n_preview = args.preview.min(total_lines);
    let preview = engine.preview(buf, n_preview)?;

    if args.json {
        let records: Vec<_> = preview
            .iter()
            .map(|r| {
                let fields: serde_json::Map<String, serde_json::Value> =
                    r.fields().into_iter().map(|(k, v)| (k.to_string(), v.as_u64().into())).collect();
                serde_json::json!({ "type": r.label(), "fields": fields })
            })
            .collect();
        let doc = serde_json::json!({
            "complete": outcome.is_complete(),
            "counts": outcome.histogram(),
            "preview": records,
            "elapsed_s": elapsed,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("\n=== Result ===");
    if let ScanOutcome::Cancelled { scanned, .. } = outcome {
        println!("(interrupted: partial counts over {scanned} of {total_lines} lines)");
    }
    println!("{}", serde_json::to_string_pretty(outcome.histogram())?);

    println!("\n=== Timing ===");
    println!("Elapsed time    : {elapsed:.6} s");
    println!("Throughput      : {mibps:.2} MiB/s");

    if n_preview > 0 {
        println!("\n=== Preview first {n_preview} lines ===");
        for (i, rec) in preview.iter().enumerate() {
            println!("[{:03}] Type={}", i + 1, rec.label());
            let fields = rec.fields();
            if fields.is_empty() {
                println!("    (no detail)");
            }
            for (k, v) in fields {
                if args.hex {
                    println!("    {k:<20}: {v:x}");
                } else {
                    println!("    {k:<20}: {v}");
                }
            }
        }
    }
    Ok(())
}
