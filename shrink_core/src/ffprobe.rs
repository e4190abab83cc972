//! FFprobe wrapper module
//!
//! Reads the duration, size and (when there is a video stream) the frame
//! dimensions of a source file. The [`MediaProber`] trait is the seam the
//! batch orchestrator probes through, so tests can substitute canned values.

use crate::errors::{Result, ShrinkError};
use crate::formats::get_extension_lowercase;
use crate::logging::run_tool;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FFPROBE: &str = "ffprobe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size: u64,
    /// Seconds
    pub duration: f64,
    /// Lowercase container extension without the dot
    pub extension: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaInfo {
    pub fn resolution_label(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

pub trait MediaProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// Production prober backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(DEFAULT_FFPROBE)
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        probe_media(path, &self.binary)
    }
}

/// Probe with the `ffprobe` found on PATH.
pub fn probe(path: &Path) -> Result<MediaInfo> {
    probe_media(path, Path::new(DEFAULT_FFPROBE))
}

pub fn probe_media(path: &Path, ffprobe: &Path) -> Result<MediaInfo> {
    if !path.exists() {
        return Err(ShrinkError::probe(path, "file not found"));
    }
    if !path.is_file() {
        return Err(ShrinkError::probe(path, "not a file (is it a directory?)"));
    }

    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        "--".to_string(),
        path.display().to_string(),
    ];

    let result = run_tool(ffprobe, &args).map_err(|e| {
        ShrinkError::probe(path, format!("could not run {}: {:#}", ffprobe.display(), e))
    })?;

    if !result.success() {
        let stderr = result.stderr.trim();
        let reason = if stderr.is_empty() {
            format!("ffprobe exited with {:?}", result.exit_code)
        } else {
            stderr.to_string()
        };
        return Err(ShrinkError::probe(path, reason));
    }

    let fs_size = std::fs::metadata(path).map(|m| m.len()).ok();
    parse_probe_output(path, &result.stdout, fs_size)
}

fn parse_number<T: std::str::FromStr>(value: &serde_json::Value) -> Option<T> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Build [`MediaInfo`] from `ffprobe -print_format json` output.
///
/// Duration is mandatory and must be positive; size falls back to
/// `fs_size` when the container does not report one.
pub fn parse_probe_output(path: &Path, json: &str, fs_size: Option<u64>) -> Result<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ShrinkError::probe(path, format!("unparsable ffprobe output: {}", e)))?;

    let format = &json["format"];

    let duration: f64 = parse_number(&format["duration"])
        .ok_or_else(|| ShrinkError::probe(path, "no duration reported"))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ShrinkError::probe(
            path,
            format!("invalid duration {}", duration),
        ));
    }

    let size = parse_number::<u64>(&format["size"])
        .filter(|s| *s > 0)
        .or(fs_size)
        .ok_or_else(|| ShrinkError::probe(path, "file size unavailable"))?;

    let video_stream = json["streams"].as_array().and_then(|streams| {
        streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("video"))
    });

    let dimension = |key: &str| {
        video_stream
            .and_then(|s| s[key].as_u64())
            .filter(|v| *v > 0)
            .map(|v| v as u32)
    };

    Ok(MediaInfo {
        path: path.to_path_buf(),
        size,
        duration,
        extension: get_extension_lowercase(path),
        width: dimension("width"),
        height: dimension("height"),
    })
}
