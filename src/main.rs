use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use skudex::constants::*;
use skudex::utils::{format_bytes, format_millis, records_per_second, setup_logging};
use skudex::{BuildConfig, BuildPipeline, RangeLookup};

#[derive(Parser)]
#[command(name = "skudex")]
#[command(about = "Skudex - sorts huge key,value,rank files and serves ranked lookups by key")]
#[command(version)]
struct Args {
    #[arg(short, long, global = true, help = "Verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Only log errors")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sort the input and build the index
    Build {
        #[arg(short, long, help = "Unsorted key,value,rank input file")]
        input: PathBuf,

        #[arg(short, long, help = "Sorted output file")]
        sorted: PathBuf,

        #[arg(short = 'x', long, help = "Index output file")]
        index: PathBuf,

        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, help = "Configuration file")]
        config: PathBuf,

        #[arg(long, help = "Records per partition (0 derives it from available memory)")]
        batch_size: Option<usize>,

        #[arg(long, help = "Expected byte width of every record line including the newline")]
        record_width: Option<usize>,

        #[arg(long, help = "Directory under which the skudex_partitions/ scratch directory is created")]
        temp_dir: Option<PathBuf>,

        #[arg(long, help = "Accept an unsorted file and let later index entries win")]
        lenient_index: bool,
    },

    /// Look up one key
    Lookup {
        #[arg(short, long)]
        sorted: PathBuf,

        #[arg(short = 'x', long)]
        index: PathBuf,

        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value_t = DEFAULT_RANK_THRESHOLD, help = "Only ranks strictly above this")]
        rank: f64,
    },

    /// Serve lookups over HTTP
    Serve {
        #[arg(short, long)]
        sorted: PathBuf,

        #[arg(short = 'x', long)]
        index: PathBuf,

        #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let verbosity = if args.verbose {
        VERBOSITY_VERBOSE
    } else if args.quiet {
        VERBOSITY_SILENT
    } else {
        VERBOSITY_NORMAL
    };
    setup_logging(verbosity)?;

    match args.command {
        Command::Build {
            input,
            sorted,
            index,
            config,
            batch_size,
            record_width,
            temp_dir,
            lenient_index,
        } => {
            let mut config = load_config(&config)?;
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if record_width.is_some() {
                config.record_width = record_width;
            }
            if let Some(temp_dir) = temp_dir {
                config.temp_directory = temp_dir;
            }
            if lenient_index {
                config.strict_index = false;
            }

            tokio::task::spawn_blocking(move || run_build(config, &input, &sorted, &index)).await??;
        }
        Command::Lookup {
            sorted,
            index,
            key,
            rank,
        } => {
            let lookup = RangeLookup::open(&sorted, &index)?;
            let results = lookup.lookup(&key, rank)?;
            println!("{}", serde_json::to_string(&results)?);
        }
        Command::Serve {
            sorted,
            index,
            listen,
        } => {
            let lookup = tokio::task::spawn_blocking(move || RangeLookup::open(&sorted, &index)).await??;
            skudex::server::serve(Arc::new(lookup), listen).await?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<BuildConfig> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        BuildConfig::from_file(path)
    } else {
        Ok(BuildConfig::default())
    }
}

fn run_build(config: BuildConfig, input: &Path, sorted: &Path, index: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let input_size = std::fs::metadata(input)?.len();
    println!("🔍 Input: {} ({})", input.display(), format_bytes(input_size));
    println!("📝 Sorted file: {}", sorted.display());
    println!("🗂️ Index file: {}", index.display());

    let start_time = Instant::now();
    let pipeline = BuildPipeline::new(config)?;
    let stats = pipeline.run(input, sorted, index)?;
    pipeline.cleanup()?;
    let total_ms = start_time.elapsed().as_millis() as u64;

    println!("\n🎉 Build completed successfully! 🎉");
    println!("=======================================");
    println!("📊 Total records: {}", stats.total_records);
    println!("📦 Partitions created: {}", stats.partitions_created);
    println!("🔑 Distinct keys: {}", stats.distinct_keys);
    println!("📏 Record width: {} bytes", stats.record_width);
    println!(
        "⏱️ Split {}, merge {}, index {} (total {})",
        format_millis(stats.split_time_ms),
        format_millis(stats.merge_time_ms),
        format_millis(stats.index_time_ms),
        format_millis(total_ms)
    );
    println!(
        "🔄 Throughput: {:.0} records/sec",
        records_per_second(stats.total_records, total_ms)
    );

    Ok(())
}
