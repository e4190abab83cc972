//! Two-pass encode pipeline
//!
//! Pass 1 analyses the video into a statistics file and throws the frames
//! away; pass 2 reads those statistics and writes the real output at the
//! planned bitrate. The statistics live in a scoped temp directory and the
//! output file is guarded until pass 2 succeeds, so neither survives a
//! failed or cancelled run.

use crate::bitrate::{estimate_quality, plan_bitrates, BitratePlan, QualityEstimate};
use crate::cancel::CancelToken;
use crate::config::FileSettings;
use crate::errors::{Result, ShrinkError};
use crate::ffmpeg_process::{describe_failure, FfmpegProcess};
use crate::ffprobe::MediaInfo;
use crate::formats::{check_input_extension, OutputFormat};
use crate::logging::log_external_tool;
use crate::output_name::{output_path_for, unique_output_path};
use crate::progress::{OverallProgress, PassWeights, ProgressMonitor, DEFAULT_ETA_SMOOTHING};
use crate::quality_mode::{QualityMode, QualityPolicy};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_FFMPEG: &str = "ffmpeg";
const PASSLOG_PREFIX: &str = "ffmpeg2pass";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn null_device() -> &'static str {
    if cfg!(windows) {
        "NUL"
    } else {
        "/dev/null"
    }
}

// ═══════════════════════════════════════════════════════════════
// EncodePlan
// ═══════════════════════════════════════════════════════════════

/// Everything needed to run one two-pass encode. Only constructed for
/// feasible targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodePlan {
    pub source: PathBuf,
    pub output: PathBuf,
    pub target_size_mb: f64,
    pub target_size_bytes: u64,
    pub current_size_bytes: u64,
    pub duration: f64,
    pub mode: QualityMode,
    pub format: OutputFormat,
    pub bitrates: BitratePlan,
    pub quality: QualityEstimate,
}

impl EncodePlan {
    pub fn build(
        info: &MediaInfo,
        settings: &FileSettings,
        policy: &QualityPolicy,
        timestamp: NaiveDateTime,
    ) -> Result<Self> {
        check_input_extension(&info.path)?;
        let format = OutputFormat::resolve(settings.output_format, &info.path)?;
        settings.validate()?;

        let target_size_bytes = (settings.target_size_mb * BYTES_PER_MB).round() as u64;
        let bitrates = plan_bitrates(
            target_size_bytes,
            info.size,
            info.duration,
            settings.quality_mode,
            policy,
        )?;

        let output = unique_output_path(&output_path_for(
            &info.path,
            settings.target_size_mb,
            timestamp,
            format.extension(),
        ));

        Ok(Self {
            source: info.path.clone(),
            output,
            target_size_mb: settings.target_size_mb,
            target_size_bytes,
            current_size_bytes: info.size,
            duration: info.duration,
            mode: settings.quality_mode,
            format,
            quality: estimate_quality(bitrates.video_bitrate, info.height),
            bitrates,
        })
    }

    pub fn video_bitrate(&self) -> u64 {
        self.bitrates.video_bitrate
    }

    pub fn audio_bitrate(&self) -> u64 {
        self.bitrates.audio_bitrate
    }

    /// ffmpeg arguments for `pass` (1 or 2), using `passlog` as statistics prefix.
    pub fn pass_args(&self, pass: u8, passlog: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-y".into(),
            "-i".into(),
            self.source.display().to_string(),
            "-c:v".into(),
            self.format.video_codec().into(),
            "-b:v".into(),
            self.video_bitrate().to_string(),
            "-pass".into(),
            pass.to_string(),
            "-passlogfile".into(),
            passlog.display().to_string(),
            "-progress".into(),
            "pipe:1".into(),
            "-nostats".into(),
        ];

        if pass == 1 {
            args.extend(["-an".into(), "-f".into(), "null".into(), null_device().into()]);
        } else {
            args.extend([
                "-c:a".into(),
                self.format.audio_codec().into(),
                "-b:a".into(),
                self.audio_bitrate().to_string(),
            ]);
            if matches!(self.format, OutputFormat::Mp4 | OutputFormat::Mov) {
                args.extend(["-movflags".into(), "+faststart".into()]);
            }
            args.push(self.output.display().to_string());
        }
        args
    }
}

// ═══════════════════════════════════════════════════════════════
// Encoder backend
// ═══════════════════════════════════════════════════════════════

/// Outcome of one encoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PassResult {
    pub pass: u8,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub stderr: String,
    /// Stopped because the line callback asked it to
    pub terminated: bool,
}

impl PassResult {
    pub fn success(&self) -> bool {
        !self.terminated && self.exit_code == Some(0)
    }
}

/// Runs a single encoder invocation, reporting every stdout line to
/// `on_line`. When `on_line` breaks, the backend stops the encoder and
/// returns with `terminated` set.
pub trait EncoderBackend {
    fn run_pass(
        &mut self,
        pass: u8,
        args: &[String],
        on_line: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<PassResult>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

impl EncoderBackend for FfmpegEncoder {
    fn run_pass(
        &mut self,
        pass: u8,
        args: &[String],
        on_line: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<PassResult> {
        let started = Instant::now();
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        // own process group: the terminal's SIGINT goes to us, and the
        // encoder is stopped through the cancel token instead
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let mut process = FfmpegProcess::spawn(&mut cmd).map_err(|e| ShrinkError::EncodePassFailed {
            pass,
            exit_code: None,
            message: format!("{:#}", e),
        })?;

        let mut terminated = false;
        while let Some(line) = process.next_line() {
            if on_line(&line).is_break() {
                debug!(pass, pid = process.id(), "Stopping encoder");
                if let Err(e) = process.terminate() {
                    warn!(pass, error = %e, "Failed to stop encoder");
                }
                terminated = true;
                break;
            }
        }

        let (status, stderr) = process
            .wait_with_output()
            .map_err(|e| ShrinkError::Io(std::io::Error::other(format!("{:#}", e))))?;
        let elapsed = started.elapsed();

        log_external_tool(
            &self.binary.display().to_string(),
            args,
            &stderr,
            status.code(),
            elapsed,
        );

        Ok(PassResult {
            pass,
            exit_code: status.code(),
            elapsed,
            stderr,
            terminated,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Output guard
// ═══════════════════════════════════════════════════════════════

/// Deletes the output file on drop unless [`OutputGuard::commit`] was called.
pub struct OutputGuard {
    path: PathBuf,
    committed: bool,
}

impl OutputGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            committed: false,
        }
    }

    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed || !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial output"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial output"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    pub output: PathBuf,
    pub output_size: u64,
    pub passes: [PassResult; 2],
    pub elapsed: Duration,
}

pub struct EncodePipeline<B> {
    backend: B,
    weights: PassWeights,
    eta_smoothing: f64,
}

impl<B: EncoderBackend> EncodePipeline<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            weights: PassWeights::default(),
            eta_smoothing: DEFAULT_ETA_SMOOTHING,
        }
    }

    pub fn with_weights(mut self, weights: PassWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_eta_smoothing(mut self, smoothing: f64) -> Self {
        self.eta_smoothing = smoothing;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn run(
        &mut self,
        plan: &EncodePlan,
        on_progress: &mut dyn FnMut(OverallProgress),
        cancel: &CancelToken,
    ) -> Result<EncodeResult> {
        if cancel.is_cancelled() {
            return Err(ShrinkError::Cancelled);
        }

        let started = Instant::now();
        let stats_dir = tempfile::Builder::new()
            .prefix("vid-shrink-2pass-")
            .tempdir()?;
        let passlog = stats_dir.path().join(PASSLOG_PREFIX);

        info!(
            source = %plan.source.display(),
            output = %plan.output.display(),
            video_bitrate = plan.video_bitrate(),
            audio_bitrate = plan.audio_bitrate(),
            "Starting two-pass encode"
        );

        let first = self.run_pass(1, plan, &passlog, on_progress, cancel)?;

        if cancel.is_cancelled() {
            return Err(ShrinkError::Cancelled);
        }

        let guard = OutputGuard::new(&plan.output);
        let second = self.run_pass(2, plan, &passlog, on_progress, cancel)?;

        let output_size = match std::fs::metadata(&plan.output) {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(ShrinkError::EncodePassFailed {
                    pass: 2,
                    exit_code: second.exit_code,
                    message: "encoder reported success but wrote no output file".to_string(),
                })
            }
        };
        let output = guard.commit();

        info!(
            output = %output.display(),
            output_size,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Two-pass encode finished"
        );

        Ok(EncodeResult {
            output,
            output_size,
            passes: [first, second],
            elapsed: started.elapsed(),
        })
    }

    fn run_pass(
        &mut self,
        pass: u8,
        plan: &EncodePlan,
        passlog: &Path,
        on_progress: &mut dyn FnMut(OverallProgress),
        cancel: &CancelToken,
    ) -> Result<PassResult> {
        let args = plan.pass_args(pass, passlog);
        let weights = self.weights;
        let mut monitor = ProgressMonitor::with_smoothing(plan.duration, self.eta_smoothing);
        let started = Instant::now();

        let mut on_line = |line: &str| {
            if let Some(sample) = monitor.observe_at(line, started.elapsed()) {
                on_progress(OverallProgress::from_sample(pass, &sample, &weights));
            }
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        debug!(pass, "Running encoder pass");
        let result = self.backend.run_pass(pass, &args, &mut on_line)?;

        // a Ctrl+C can reach the encoder before the token is set; the exit
        // status then reflects the signal, not a real failure
        if result.terminated || (!result.success() && cancel.is_cancelled()) {
            info!(pass, exit_code = ?result.exit_code, "Encode cancelled");
            return Err(ShrinkError::Cancelled);
        }
        if !result.success() {
            return Err(ShrinkError::EncodePassFailed {
                pass,
                exit_code: result.exit_code,
                message: describe_failure(&result.stderr),
            });
        }

        on_progress(OverallProgress {
            pass,
            pass_fraction: 1.0,
            overall: weights.overall(pass, 1.0),
            eta: None,
        });
        Ok(result)
    }
}
