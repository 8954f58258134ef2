use clap::Parser;
use std::time::Instant;
use log::{info, error};

use deduper::dedup::{dedup_stream, log_summary};
use deduper::io::{get_reader, get_writer};
use deduper::UmiWhitelist;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remove PCR duplicates from a chromosome-sorted SAM file using UMIs")]
struct Args {
    /// Input SAM file sorted by chromosome (use "-" to read from standard input, .gz accepted)
    #[arg(short = 'f', long = "file")]
    file: String,

    /// Output deduplicated SAM file (use "-" to write to standard output, .gz compresses)
    #[arg(short = 'o', long = "outfile")]
    outfile: String,

    /// File listing the known UMIs, one per line
    #[arg(short = 'u', long = "umi")]
    umi: String,

    /// Number of threads; above 1, chromosomes are deduplicated in parallel
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[arg(short, long, default_value = "0")]
    verbose: u8,
}

fn main() {
    // Parse command-line arguments.
    let args = Args::parse();
    setup_logger(args.verbose);

    if args.threads > 1 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
        {
            error!("Failed to build a thread pool with {} threads: {}", args.threads, e);
            std::process::exit(1);
        }
    }

    let start = Instant::now();
    info!("Loading UMIs from {}", args.umi);
    let whitelist = match UmiWhitelist::from_path(&args.umi) {
        Ok(whitelist) => whitelist,
        Err(e) => {
            error!("Failed to load UMI whitelist '{}': {}", args.umi, e);
            std::process::exit(1);
        }
    };
    info!("Loaded {} UMIs", whitelist.len());

    let reader = match get_reader(&args.file) {
        Ok(reader) => reader,
        Err(e) => {
            error!("Failed to open '{}': {}", args.file, e);
            std::process::exit(1);
        }
    };
    let mut writer = match get_writer(&args.outfile) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Failed to create '{}': {}", args.outfile, e);
            std::process::exit(1);
        }
    };

    info!("Deduplicating {} into {} ({} thread(s))", args.file, args.outfile, args.threads);
    let counters = match dedup_stream(reader, &mut writer, &whitelist, args.threads) {
        Ok(counters) => counters,
        Err(e) => {
            error!("{}", e);
            // Flush records written before the failure.
            let _ = writer.finish();
            std::process::exit(1);
        }
    };
    if let Err(e) = writer.finish() {
        error!("Failed to finish '{}': {}", args.outfile, e);
        std::process::exit(1);
    }

    // Report number of header lines, invalid UMIs, unique reads, and removed duplicates
    eprint!("{}", counters);
    log_summary(&counters, start.elapsed());
}

/// Initialize logger based on verbosity
fn setup_logger(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(match verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
}
