//! CLI entry point for treepack

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use treepack::{
    CancelToken, EntryOrder, FilterConfig, Format, PackError, Pipeline, RunContext, SkipPolicy,
    load_filter_config, parse_size, print_report, print_report_json,
};

/// Exit status for a run stopped by Ctrl-C or `--timeout`
const EXIT_CANCELLED: u8 = 130;

/// Color output mode
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and environment
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Determine whether the stats report should be colored.
fn should_use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // https://no-color.org/
            if std::env::var_os("NO_COLOR").is_some() {
                return false;
            }
            if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
                return false;
            }
            // The report goes to stderr
            io::stderr().is_terminal()
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "treepack")]
#[command(about = "Pack a directory tree into a single JSON, YAML or Markdown document")]
#[command(version)]
struct Args {
    /// Directory to pack
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output format: json, yaml (yml) or markdown (md)
    #[arg(short = 'f', long = "format", default_value = "json", value_parser = parse_format)]
    format: Format,

    /// Write the document to FILE instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of worker threads (default: available parallelism)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,

    /// Only include files with this extension (can be used multiple times)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Exclude files with this extension (can be used multiple times)
    #[arg(short = 'x', long = "exclude-ext", value_name = "EXT")]
    exclude_extensions: Vec<String>,

    /// Ignore files matching pattern (can be used multiple times)
    #[arg(short = 'I', long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Record files larger than SIZE as skipped (e.g. 500K, 2M; default 1MB)
    #[arg(long = "max-file-size", value_name = "SIZE", value_parser = parse_size_arg)]
    max_file_size: Option<u64>,

    /// Leave files larger than SIZE out of the document entirely
    #[arg(long = "skip-larger-than", value_name = "SIZE", value_parser = parse_size_arg)]
    skip_larger_than: Option<u64>,

    /// Include everything (ignore .gitignore filtering)
    #[arg(short, long)]
    all: bool,

    /// Include hidden files and directories
    #[arg(long)]
    hidden: bool,

    /// Only include files tracked by git
    #[arg(long = "tracked-only")]
    tracked_only: bool,

    /// Leave skipped files out of the document instead of recording them
    #[arg(long = "omit-skipped")]
    omit_skipped: bool,

    /// Emit entries in traversal order rather than completion order
    #[arg(long)]
    sorted: bool,

    /// Cancel the run after DURATION (e.g. 30s, 2m)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Load filter settings from a YAML or JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a run report to stderr
    #[arg(long, conflicts_with = "stats_json")]
    stats: bool,

    /// Print the run report to stderr as JSON
    #[arg(long = "stats-json")]
    stats_json: bool,

    /// Control color output of the report: auto, always, never
    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse().map_err(|e: treepack::ValidationError| e.to_string())
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<PackError>() {
            Some(PackError::Cancelled {
                dispatched,
                written,
            }) => {
                eprintln!(
                    "treepack: cancelled after writing {} of {} dispatched files",
                    written, dispatched
                );
                ExitCode::from(EXIT_CANCELLED)
            }
            _ => {
                eprintln!("treepack: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let filter = build_filter(&args)?;

    let cancel = match args.timeout {
        Some(timeout) => CancelToken::with_timeout(timeout),
        None => CancelToken::new(),
    };
    let flag = cancel.flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let jobs = args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let ctx = RunContext::new(args.path.clone(), args.format, jobs)
        .context("Invalid configuration")?
        .with_skip_policy(if args.omit_skipped {
            SkipPolicy::Omit
        } else {
            SkipPolicy::Record
        })
        .with_order(if args.sorted {
            EntryOrder::Collection
        } else {
            EntryOrder::Arrival
        })
        .with_cancel(cancel);

    let pipeline = Pipeline::new(ctx, filter)
        .with_context(|| format!("Cannot pack '{}'", args.path.display()))?;

    let output: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Cannot create output '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let outcome = pipeline.run(output)?;

    if args.stats || args.stats_json {
        let report = pipeline.report(&outcome);
        if args.stats_json {
            print_report_json(&report).context("Failed to print report")?;
        } else {
            print_report(&report, should_use_color(args.color)).context("Failed to print report")?;
        }
    }

    Ok(())
}

/// Start from the config file (if any) and layer CLI flags on top.
fn build_filter(args: &Args) -> Result<FilterConfig> {
    let mut filter = match &args.config {
        Some(path) => load_filter_config(path)
            .with_context(|| format!("Cannot load config '{}'", path.display()))?,
        None => FilterConfig::default(),
    };

    filter.extensions.extend(args.extensions.iter().cloned());
    filter
        .exclude_extensions
        .extend(args.exclude_extensions.iter().cloned());
    filter.ignore.extend(args.ignore.iter().cloned());
    if let Some(size) = args.max_file_size {
        filter.max_file_size = size;
    }
    if args.skip_larger_than.is_some() {
        filter.skip_larger_than = args.skip_larger_than;
    }
    filter.hidden |= args.hidden;
    filter.tracked_only |= args.tracked_only;
    if args.all {
        filter.respect_gitignore = false;
    }

    Ok(filter)
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "treepack=debug,warn"
    } else {
        "treepack=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .with_thread_names(verbose)
        .init();
}
