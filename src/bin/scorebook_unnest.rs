//! scorebook-unnest: normalize a directory of match JSON files into tables
//!
//! Usage:
//!   # Extract ./json into ./tables with the default batch size
//!   scorebook-unnest ./json --output-dir ./tables
//!
//!   # Smaller batches, registries folded from the first 5000 files only
//!   scorebook-unnest ./json -o ./tables --batch-size 200 --registry-scan-limit 5000

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::Parser;
use scorebook::{unnest_directory, ExtractConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scorebook-unnest")]
#[command(about = "Normalize nested match documents into relational tables", long_about = None)]
struct Args {
    /// Directory of per-match JSON files
    #[arg(value_name = "DIR")]
    input: String,

    /// Directory for the .jsonl table files
    #[arg(long, short = 'o', default_value = "tables")]
    output_dir: String,

    /// Documents held in memory at once (default: 500)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Only fold player registries from the first N documents
    #[arg(long)]
    registry_scan_limit: Option<usize>,

    /// Prefix for locally minted player ids (default: "SYNTH_")
    #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    synthetic_prefix: Option<String>,

    /// File extension to pick up from the input directory (default: "json")
    #[arg(long)]
    extension: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build config
    let mut config = ExtractConfig::default();
    if let Some(size) = args.batch_size {
        config.batch_size = size;
    }
    config.registry_scan_limit = args.registry_scan_limit;
    if let Some(prefix) = args.synthetic_prefix {
        config.synthetic_prefix = prefix;
    }
    if let Some(ext) = args.extension {
        config.file_extension = ext;
    }

    let run = unnest_directory(&args.input, &args.output_dir, config)?;

    for failure in &run.report.unit_failures {
        warn!(unit = %failure.location.display(), error = %failure.error, "unit skipped");
    }
    for failure in &run.report.batch_failures {
        warn!(batch = failure.batch, units = failure.unit_count, error = %failure.message, "batch failed");
    }
    for load in &run.report.tables_loaded {
        if load.duplicates_dropped > 0 {
            warn!(
                table = load.kind.name(),
                dropped = load.duplicates_dropped,
                "rows sharing a primary key were not written"
            );
        }
        info!(table = load.kind.name(), rows = load.rows, "written");
    }
    info!(
        synthetic_ids = run.report.synthetic_ids,
        output = %args.output_dir,
        "done"
    );

    Ok(())
}
