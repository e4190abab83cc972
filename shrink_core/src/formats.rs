//! Container Formats Module
//!
//! Supported input/output extensions and the codec pair used for each
//! output container.

use crate::errors::{FormatDirection, Result, ShrinkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "flv", "wmv", "webm", "m4v", "mpeg", "mpg",
];

pub const SUPPORTED_OUTPUT_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv"];

pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

/// Reject a source whose extension the encoder pipeline does not accept.
pub fn check_input_extension(path: &Path) -> Result<()> {
    if has_extension(path, SUPPORTED_INPUT_EXTENSIONS) {
        Ok(())
    } else {
        Err(ShrinkError::UnsupportedFormat {
            extension: get_extension_lowercase(path),
            direction: FormatDirection::Input,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Mov,
    Avi,
    Mkv,
    Webm,
    Flv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Mp4,
        OutputFormat::Mov,
        OutputFormat::Avi,
        OutputFormat::Mkv,
        OutputFormat::Webm,
        OutputFormat::Flv,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Avi => "avi",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Webm => "webm",
            OutputFormat::Flv => "flv",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "MP4 (H.264)",
            OutputFormat::Mov => "MOV (QuickTime)",
            OutputFormat::Avi => "AVI",
            OutputFormat::Mkv => "MKV (Matroska)",
            OutputFormat::Webm => "WebM (VP9)",
            OutputFormat::Flv => "FLV (Flash Video)",
        }
    }

    /// ffmpeg video encoder for this container.
    pub fn video_codec(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "libvpx-vp9",
            _ => "libx264",
        }
    }

    /// ffmpeg audio encoder for this container.
    pub fn audio_codec(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "libopus",
            _ => "aac",
        }
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        let normalized = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == normalized)
            .ok_or(ShrinkError::UnsupportedFormat {
                extension: normalized,
                direction: FormatDirection::Output,
            })
    }

    /// Requested format, or the source's own container when none was asked for.
    pub fn resolve(requested: Option<OutputFormat>, source: &Path) -> Result<Self> {
        match requested {
            Some(format) => Ok(format),
            None => Self::from_extension(&get_extension_lowercase(source)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ShrinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
    }
}
