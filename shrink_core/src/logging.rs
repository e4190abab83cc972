//! Logging Module
//!
//! tracing-based diagnostics shared by the library and the CLI:
//! - daily rolled log file in a configurable directory (system temp by default)
//! - stderr layer whose verbosity follows `--verbose` / `--quiet`
//! - pruning of old log files
//! - structured records of every ffmpeg / ffprobe invocation
//!
//! # Examples
//!
//! ```no_run
//! use shrink_core::logging::{init_logging, LogConfig};
//!
//! init_logging("vid_shrink", LogConfig::default()).expect("logging");
//! tracing::info!("Program started");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant, SystemTime};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Crates whose events are recorded unless `RUST_LOG` says otherwise.
const LOGGED_TARGETS: &[&str] = &["vid_shrink", "shrink_core"];

/// Lines of a failed tool's output kept in the log record.
const TOOL_OUTPUT_TAIL_LINES: usize = 12;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Number of rolled log files kept
    pub max_files: usize,
    /// Level written to the log file
    pub level: Level,
    /// Level echoed to stderr
    pub stderr_level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
            stderr_level: LevelFilter::WARN,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_stderr_level(mut self, level: LevelFilter) -> Self {
        self.stderr_level = level;
        self
    }
}

fn default_filter(level: Level) -> EnvFilter {
    let directives = LOGGED_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

/// Install the global subscriber. Log file: `{log_dir}/{program_name}.log.<date>`.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let log_file_name = format!("{}.log", program_name);
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &log_file_name);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false)
        .with_filter(config.stderr_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        program = program_name,
        log_dir = ?config.log_dir,
        log_file = log_file_name,
        max_files = config.max_files,
        level = ?config.level,
        "Logging system initialized"
    );

    let pruned = prune_logs(&config.log_dir, program_name, config.max_files)?;
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned old log files");
    }

    Ok(())
}

/// Delete all but the `keep` newest `{program_name}.log*` files. Returns how many were removed.
fn prune_logs(log_dir: &Path, program_name: &str, keep: usize) -> Result<usize> {
    let prefix = format!("{}.log", program_name);

    let mut rolled: Vec<(SystemTime, PathBuf)> = std::fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|m| m.is_file())?;
            Some((meta.modified().ok()?, entry.path()))
        })
        .collect();

    if rolled.len() <= keep {
        return Ok(0);
    }
    rolled.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in rolled.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = ?path, error = %e, "Could not prune log file"),
        }
    }
    Ok(removed)
}

/// Last `n` non-empty lines of a tool's output; ffmpeg puts the cause of a failure at the end.
fn output_tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Record one finished ffmpeg / ffprobe invocation.
pub fn log_external_tool(
    tool: &str,
    args: &[String],
    output: &str,
    exit_code: Option<i32>,
    duration: Duration,
) {
    let command = format!("{} {}", tool, args.join(" "));
    let secs = duration.as_secs_f64();

    if exit_code == Some(0) {
        tracing::info!(tool, command = %command, duration_secs = secs, "Tool finished");
        tracing::trace!(tool, output = %output, "Tool output");
    } else {
        tracing::error!(
            tool,
            command = %command,
            duration_secs = secs,
            exit_code = ?exit_code,
            output_tail = %output_tail(output, TOOL_OUTPUT_TAIL_LINES),
            "Tool failed"
        );
    }
}

/// Captured result of a short-lived tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `program` to completion and log the invocation. Only a failure to
/// start the program is an error; a non-zero exit is reported in the output.
pub fn run_tool(program: &Path, args: &[String]) -> Result<ToolOutput> {
    let started = Instant::now();
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to start {}", program.display()))?;

    let result = ToolOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration: started.elapsed(),
    };
    log_external_tool(
        &program.display().to_string(),
        args,
        &result.stderr,
        result.exit_code,
        result.duration,
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.max_files, 5);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.stderr_level, LevelFilter::WARN);
    }

    #[test]
    fn test_log_config_builder() {
        let temp_dir = TempDir::new().unwrap();
        let config = LogConfig::new()
            .with_log_dir(temp_dir.path())
            .with_max_files(3)
            .with_level(Level::DEBUG)
            .with_stderr_level(LevelFilter::OFF);

        assert_eq!(config.log_dir, temp_dir.path());
        assert_eq!(config.max_files, 3);
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.stderr_level, LevelFilter::OFF);
    }

    #[test]
    fn test_default_filter_covers_both_crates() {
        let filter = default_filter(Level::DEBUG).to_string();
        assert!(filter.contains("vid_shrink=debug"));
        assert!(filter.contains("shrink_core=debug"));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();

        for day in 1..=8 {
            let path = temp_dir.path().join(format!("vid_shrink.log.2024-01-{:02}", day));
            fs::write(&path, format!("day {}", day)).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }
        fs::write(temp_dir.path().join("unrelated.txt"), "keep").unwrap();
        fs::write(temp_dir.path().join("other_tool.log"), "keep").unwrap();

        assert_eq!(prune_logs(temp_dir.path(), "vid_shrink", 3).unwrap(), 5);

        let mut remaining: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("vid_shrink"))
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "vid_shrink.log.2024-01-06",
                "vid_shrink.log.2024-01-07",
                "vid_shrink.log.2024-01-08"
            ]
        );
        assert!(temp_dir.path().join("unrelated.txt").exists());
        assert!(temp_dir.path().join("other_tool.log").exists());

        // nothing left to prune
        assert_eq!(prune_logs(temp_dir.path(), "vid_shrink", 3).unwrap(), 0);
    }

    #[test]
    fn test_output_tail() {
        let output = "banner\n\nstream info\nError while decoding\nConversion failed!\n";
        assert_eq!(output_tail(output, 2), "Error while decoding\nConversion failed!");
        assert_eq!(output_tail(output, 10).lines().count(), 4);
        assert_eq!(output_tail("", 3), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_captures_output() {
        let result = run_tool(Path::new("echo"), &["hello".to_string()]).unwrap();
        assert!(result.success());
        assert!(result.stdout.contains("hello"));

        let failed = run_tool(Path::new("sh"), &["-c".to_string(), "exit 3".to_string()]).unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert!(!failed.success());
    }

    #[test]
    fn test_run_tool_missing_program() {
        assert!(run_tool(Path::new("nonexistent_command_xyz"), &[]).is_err());
    }
}
