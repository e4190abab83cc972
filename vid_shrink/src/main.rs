use clap::Parser;
use shrink_core::report::print_summary;
use shrink_core::tools::{check_tools, install_instructions, tool_version};
use shrink_core::{
    install_ctrlc_handler, init_logging, BatchOrchestrator, BatchSummary, CancelPolicy,
    CancelToken, LogConfig, OutputFormat, QualityMode, ShrinkConfig,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn, Level};
use vid_shrink::cli_runner::{build_config, build_settings, exit_code, resolve_inputs, ConfigOverrides};

#[derive(Parser)]
#[command(name = "vid-shrink")]
#[command(version, about = "Shrink videos to a target file size with two-pass ffmpeg encoding", long_about = None)]
struct Cli {
    /// Video files and/or directories
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Target size in MB for every file
    #[arg(short, long, value_name = "MB")]
    target_mb: Option<f64>,

    /// audio | video | balanced
    #[arg(short, long, default_value = "audio")]
    mode: QualityMode,

    /// Output container (defaults to the source's)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// JSON file with settings per input (overrides --target-mb/--mode/--format)
    #[arg(long, value_name = "JSON")]
    per_file: Option<PathBuf>,

    #[arg(long)]
    history_file: Option<PathBuf>,

    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// JSON config (tool paths, bitrate policy, progress tuning)
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// After Ctrl+C, move on to the next file instead of stopping
    #[arg(long)]
    continue_on_cancel: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Plan and report without encoding
    #[arg(short, long)]
    dry_run: bool,
}

/// ffprobe is always needed; ffmpeg only when encoding.
fn tools_ready(config: &ShrinkConfig, dry_run: bool) -> bool {
    let mut ready = true;
    for status in check_tools(&config.ffmpeg_path, &config.ffprobe_path) {
        if status.name == "ffmpeg" && dry_run {
            continue;
        }
        match &status.resolved {
            Some(path) => {
                debug!(tool = status.name, path = %path.display(), version = ?tool_version(path), "Tool found");
            }
            None => {
                eprintln!(
                    "❌ {} not found ({})",
                    status.name,
                    status.requested.display()
                );
                ready = false;
            }
        }
    }
    if !ready {
        eprintln!("\n{}", install_instructions());
    }
    ready
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = build_config(
        cli.config.as_deref(),
        ConfigOverrides {
            history_file: cli.history_file.clone(),
            log_dir: cli.log_dir.clone(),
        },
    )?;

    let (level, stderr_level) = if cli.verbose {
        (Level::DEBUG, LevelFilter::DEBUG)
    } else if cli.quiet {
        (Level::INFO, LevelFilter::ERROR)
    } else {
        (Level::INFO, LevelFilter::WARN)
    };
    if let Err(e) = init_logging(
        "vid_shrink",
        LogConfig::new()
            .with_log_dir(&config.log_dir)
            .with_level(level)
            .with_stderr_level(stderr_level),
    ) {
        eprintln!("⚠️  Could not set up logging: {:#}", e);
    }

    let inputs = resolve_inputs(&cli.inputs, cli.recursive)?;
    let settings = build_settings(
        cli.target_mb,
        cli.mode,
        cli.format,
        cli.per_file.as_deref(),
        &inputs,
    )?;

    if !tools_ready(&config, cli.dry_run) {
        std::process::exit(1);
    }

    let cancel = CancelToken::new();
    if let Err(e) = install_ctrlc_handler(&cancel) {
        warn!(error = %e, "Ctrl+C handler not installed");
    }

    let policy = if cli.continue_on_cancel {
        CancelPolicy::Continue
    } else {
        CancelPolicy::Halt
    };

    info!(
        files = inputs.len(),
        dry_run = cli.dry_run,
        history = %config.history_file.display(),
        "vid-shrink started"
    );

    let started = Instant::now();
    let mut batch = BatchOrchestrator::from_config(config, cancel)
        .with_cancel_policy(policy)
        .with_dry_run(cli.dry_run)
        .with_quiet(cli.quiet);
    let outcomes = batch.process(&inputs, &settings)?;

    let summary = BatchSummary::from_outcomes(&outcomes, started.elapsed());
    if !cli.quiet && summary.total > 1 {
        print_summary(&summary, cli.dry_run);
    }

    let code = exit_code(&outcomes);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
