//! Error types
//!
//! Every per-file failure is a [`ShrinkError`]; [`ErrorKind`] is its stable
//! name in outcomes and the history log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::progress::format_megabytes;

/// Why a target size cannot be planned.
#[derive(Debug, Clone, PartialEq)]
pub enum Infeasibility {
    NonPositiveDuration { duration: f64 },
    NotSmaller { target: u64, current: u64 },
    AudioExceedsTarget { audio: u64, target: u64 },
    BelowFloor { bitrate: u64, floor: u64 },
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::NonPositiveDuration { duration } => {
                write!(f, "duration {:.2}s is not positive", duration)
            }
            Infeasibility::NotSmaller { target, current } => write!(
                f,
                "target {} ≥ current {}, nothing to compress",
                format_megabytes(*target),
                format_megabytes(*current)
            ),
            Infeasibility::AudioExceedsTarget { audio, target } => write!(
                f,
                "audio alone needs {} but target is {} (short by {})",
                format_megabytes(*audio),
                format_megabytes(*target),
                format_megabytes(audio.saturating_sub(*target))
            ),
            Infeasibility::BelowFloor { bitrate, floor } => write!(
                f,
                "video bitrate {}kbps is below the usable floor of {}kbps",
                bitrate / 1000,
                floor / 1000
            ),
        }
    }
}

/// Which side of the conversion an extension was rejected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDirection {
    Input,
    Output,
}

impl fmt::Display for FormatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatDirection::Input => write!(f, "input"),
            FormatDirection::Output => write!(f, "output"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("Probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Infeasible target: {0}")]
    InfeasibleTarget(Infeasibility),

    #[error("Unsupported {direction} format: .{extension}")]
    UnsupportedFormat {
        extension: String,
        direction: FormatDirection,
    },

    #[error("Encode pass {pass} failed{}: {message}", exit_suffix(.exit_code))]
    EncodePassFailed {
        pass: u8,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("Cancelled by user")]
    Cancelled,

    #[error("History write failed for {path}: {source}")]
    HistoryWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShrinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShrinkError::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            ShrinkError::InfeasibleTarget(_) => ErrorKind::InfeasibleTarget,
            ShrinkError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ShrinkError::EncodePassFailed { .. } => ErrorKind::EncodePassFailed,
            ShrinkError::Cancelled => ErrorKind::Cancelled,
            ShrinkError::HistoryWriteFailed { .. } => ErrorKind::HistoryWriteFailed,
            ShrinkError::InvalidSettings(_) => ErrorKind::InvalidSettings,
            ShrinkError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ShrinkError::ProbeFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Stable error names, written into outcomes and the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ProbeFailed,
    InfeasibleTarget,
    UnsupportedFormat,
    EncodePassFailed,
    Cancelled,
    HistoryWriteFailed,
    InvalidSettings,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProbeFailed => "ProbeFailed",
            ErrorKind::InfeasibleTarget => "InfeasibleTarget",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::EncodePassFailed => "EncodePassFailed",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::HistoryWriteFailed => "HistoryWriteFailed",
            ErrorKind::InvalidSettings => "InvalidSettings",
            ErrorKind::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {})", c))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ShrinkError>;
