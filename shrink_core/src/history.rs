//! History log
//!
//! One line per processed input, appended to `~/.video-compressor/history.log`:
//!
//! ```text
//! 2024-03-09 14:05:07 - INFO - Compressed: trip.mp4 -> trip--compressed--50.0MB--....mp4, mode: Balanced, ...
//! ```
//!
//! Each record is formatted completely and written with a single `write_all`
//! on an append-mode handle, so concurrent writers never interleave lines.

use crate::bitrate::QualityEstimate;
use crate::encode::{EncodePlan, EncodeResult};
use crate::errors::{ErrorKind, Result, ShrinkError};
use crate::progress::{format_eta, format_megabytes};
use crate::quality_mode::QualityMode;
use chrono::{Local, NaiveDateTime};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Succeeded,
    Simulated,
    Skipped { reason: String },
    Failed { kind: ErrorKind, reason: String },
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Simulated => "simulated",
            OutcomeStatus::Skipped { .. } => "skipped",
            OutcomeStatus::Failed { .. } => "failed",
        }
    }
}

/// Final record of one input. Built once, never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub timestamp: NaiveDateTime,
    pub mode: Option<QualityMode>,
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub current_size: Option<u64>,
    pub target_size: Option<u64>,
    pub actual_size: Option<u64>,
    pub video_bitrate: Option<u64>,
    pub audio_bitrate: Option<u64>,
    pub quality: Option<QualityEstimate>,
    pub processing_time: Duration,
    pub status: OutcomeStatus,
}

impl RunOutcome {
    fn new(source: &Path, status: OutcomeStatus) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            mode: None,
            source: source.to_path_buf(),
            output: None,
            current_size: None,
            target_size: None,
            actual_size: None,
            video_bitrate: None,
            audio_bitrate: None,
            quality: None,
            processing_time: Duration::ZERO,
            status,
        }
    }

    fn with_plan(mut self, plan: &EncodePlan) -> Self {
        self.mode = Some(plan.mode);
        self.output = Some(plan.output.clone());
        self.current_size = Some(plan.current_size_bytes);
        self.target_size = Some(plan.target_size_bytes);
        self.video_bitrate = Some(plan.video_bitrate());
        self.audio_bitrate = Some(plan.audio_bitrate());
        self.quality = Some(plan.quality);
        self
    }

    pub fn succeeded(plan: &EncodePlan, result: &EncodeResult, elapsed: Duration) -> Self {
        let mut outcome = Self::new(&plan.source, OutcomeStatus::Succeeded).with_plan(plan);
        outcome.output = Some(result.output.clone());
        outcome.actual_size = Some(result.output_size);
        outcome.processing_time = elapsed;
        outcome
    }

    pub fn simulated(plan: &EncodePlan, elapsed: Duration) -> Self {
        let mut outcome = Self::new(&plan.source, OutcomeStatus::Simulated).with_plan(plan);
        outcome.processing_time = elapsed;
        outcome
    }

    pub fn skipped(source: &Path, reason: impl Into<String>) -> Self {
        Self::new(
            source,
            OutcomeStatus::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn failed(
        source: &Path,
        mode: Option<QualityMode>,
        error: &ShrinkError,
        elapsed: Duration,
    ) -> Self {
        let mut outcome = Self::new(
            source,
            OutcomeStatus::Failed {
                kind: error.kind(),
                reason: error.to_string(),
            },
        );
        outcome.mode = mode;
        outcome.processing_time = elapsed;
        outcome
    }

    /// Sizes known before the failure happened (probe result, requested target).
    pub fn with_sizes(mut self, current: Option<u64>, target: Option<u64>) -> Self {
        self.current_size = current.or(self.current_size);
        self.target_size = target.or(self.target_size);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Succeeded | OutcomeStatus::Simulated
        )
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            OutcomeStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Absolute distance between the produced and the requested size.
    pub fn difference(&self) -> Option<u64> {
        Some(self.actual_size?.abs_diff(self.target_size?))
    }

    /// Percentage saved relative to the source; uses the target when nothing was produced.
    pub fn compression_ratio(&self) -> Option<f64> {
        let current = self.current_size.filter(|c| *c > 0)?;
        let result = self.actual_size.or(self.target_size)?;
        Some((1.0 - result as f64 / current as f64) * 100.0)
    }

    pub fn level(&self) -> &'static str {
        match self.status {
            OutcomeStatus::Succeeded | OutcomeStatus::Simulated => "INFO",
            OutcomeStatus::Skipped { .. } => "WARN",
            OutcomeStatus::Failed { .. } => "ERROR",
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// The `<message>` part of a history line.
    pub fn message(&self) -> String {
        let source = Self::file_name(&self.source);
        let mut parts = match &self.status {
            OutcomeStatus::Succeeded => {
                let output = self
                    .output
                    .as_deref()
                    .map(Self::file_name)
                    .unwrap_or_default();
                vec![format!("Compressed: {} -> {}", source, output)]
            }
            OutcomeStatus::Simulated => vec![format!("Dry run: {}", source)],
            OutcomeStatus::Skipped { reason } => vec![format!("Skipped: {} ({})", source, reason)],
            OutcomeStatus::Failed { kind, reason } => {
                vec![format!("Failed: {}, error: {}: {}", source, kind, reason)]
            }
        };

        if let Some(mode) = self.mode {
            parts.push(format!("mode: {}", mode.label()));
        }
        if let Some(current) = self.current_size {
            parts.push(format!("current: {}", format_megabytes(current)));
        }
        if let Some(target) = self.target_size {
            parts.push(format!("target: {}", format_megabytes(target)));
        }
        if let Some(actual) = self.actual_size {
            parts.push(format!("actual: {}", format_megabytes(actual)));
        }
        if let Some(diff) = self.difference() {
            parts.push(format!("diff: {}", format_megabytes(diff)));
        }
        if let Some(ratio) = self.compression_ratio() {
            parts.push(format!("ratio: {:.1}%", ratio));
        }
        if let Some(video) = self.video_bitrate {
            parts.push(format!("video: {}kbps", video / 1000));
        }
        if let Some(audio) = self.audio_bitrate {
            parts.push(format!("audio: {}kbps", audio / 1000));
        }
        if let Some(quality) = self.quality {
            parts.push(format!("quality: {}", quality));
        }
        if !matches!(self.status, OutcomeStatus::Skipped { .. }) {
            parts.push(format!("time: {}", format_eta(self.processing_time)));
        }

        parts.join(", ")
    }
}

/// `YYYY-MM-DD HH:MM:SS - LEVEL - message`, no trailing newline.
pub fn format_line(outcome: &RunOutcome) -> String {
    let message = outcome.message().replace(['\r', '\n'], " ");
    format!(
        "{} - {} - {}",
        outcome.timestamp.format(LINE_TIMESTAMP_FORMAT),
        outcome.level(),
        message
    )
}

#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    path: PathBuf,
}

impl HistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, outcome: &RunOutcome) -> Result<()> {
        let mut line = format_line(outcome);
        line.push('\n');

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())
        };

        write().map_err(|source| ShrinkError::HistoryWriteFailed {
            path: self.path.clone(),
            source,
        })
    }
}
