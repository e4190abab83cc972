//! Runtime configuration
//!
//! [`ShrinkConfig`] is built once per invocation (JSON file, then CLI
//! overrides) and handed to the orchestrator; nothing in the core reads
//! global state.

use crate::errors::{Result, ShrinkError};
use crate::formats::OutputFormat;
use crate::progress::{PassWeights, DEFAULT_ETA_SMOOTHING};
use crate::quality_mode::{QualityMode, QualityPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the home folder holding the history log.
pub const HISTORY_DIR_NAME: &str = ".video-compressor";
pub const HISTORY_FILE_NAME: &str = "history.log";

/// What to do with one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSettings {
    pub target_size_mb: f64,
    #[serde(default)]
    pub quality_mode: QualityMode,
    /// `None` keeps the source container
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

impl FileSettings {
    pub fn new(target_size_mb: f64, quality_mode: QualityMode) -> Self {
        Self {
            target_size_mb,
            quality_mode,
            output_format: None,
        }
    }

    pub fn with_format(mut self, format: Option<OutputFormat>) -> Self {
        self.output_format = format;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_size_mb.is_finite() || self.target_size_mb <= 0.0 {
            return Err(ShrinkError::InvalidSettings(format!(
                "target size must be a positive number of MB, got {}",
                self.target_size_mb
            )));
        }
        Ok(())
    }
}

pub fn default_history_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(HISTORY_DIR_NAME)
        .join(HISTORY_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShrinkConfig {
    pub policy: QualityPolicy,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub history_file: PathBuf,
    pub log_dir: PathBuf,
    /// Weight of the newest ETA estimate (1.0 = no smoothing)
    pub eta_smoothing: f64,
    pub pass_weights: PassWeights,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            policy: QualityPolicy::default(),
            ffmpeg_path: PathBuf::from(crate::encode::DEFAULT_FFMPEG),
            ffprobe_path: PathBuf::from(crate::ffprobe::DEFAULT_FFPROBE),
            history_file: default_history_file(),
            log_dir: std::env::temp_dir(),
            eta_smoothing: DEFAULT_ETA_SMOOTHING,
            pass_weights: PassWeights::default(),
        }
    }
}

impl ShrinkConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ShrinkConfig = serde_json::from_str(&text).map_err(|e| {
            ShrinkError::InvalidSettings(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate().map_err(ShrinkError::InvalidSettings)?;
        self.pass_weights
            .validate()
            .map_err(ShrinkError::InvalidSettings)?;
        if !(self.eta_smoothing > 0.0 && self.eta_smoothing <= 1.0) {
            return Err(ShrinkError::InvalidSettings(format!(
                "eta_smoothing must be in (0, 1], got {}",
                self.eta_smoothing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ShrinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!(config.history_file.ends_with(".video-compressor/history.log"));
        assert_eq!(config.eta_smoothing, 0.3);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"ffmpeg_path": "/opt/ffmpeg/bin/ffmpeg", "policy": {"safety_margin": 0.9}}"#,
        )
        .unwrap();

        let config = ShrinkConfig::load(&path).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.policy.safety_margin, 0.9);
        assert_eq!(config.policy.balanced_kbps, 160);
        assert_eq!(config.pass_weights, PassWeights::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"eta_smoothing": 0}"#).unwrap();
        assert_eq!(
            ShrinkConfig::load(&path).unwrap_err().kind(),
            ErrorKind::InvalidSettings
        );

        std::fs::write(&path, r#"{"pass_weights": {"analysis": 0.9, "encode": 0.9}}"#).unwrap();
        assert_eq!(
            ShrinkConfig::load(&path).unwrap_err().kind(),
            ErrorKind::InvalidSettings
        );

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(
            ShrinkConfig::load(&path).unwrap_err().kind(),
            ErrorKind::InvalidSettings
        );
    }

    #[test]
    fn test_file_settings_json() {
        let settings: FileSettings =
            serde_json::from_str(r#"{"target_size_mb": 25, "quality_mode": "video_priority", "output_format": "webm"}"#)
                .unwrap();
        assert_eq!(settings.target_size_mb, 25.0);
        assert_eq!(settings.quality_mode, QualityMode::VideoPriority);
        assert_eq!(settings.output_format, Some(OutputFormat::Webm));

        let minimal: FileSettings = serde_json::from_str(r#"{"target_size_mb": 10.5}"#).unwrap();
        assert_eq!(minimal.quality_mode, QualityMode::AudioPriority);
        assert_eq!(minimal.output_format, None);
    }

    #[test]
    fn test_file_settings_validation() {
        assert!(FileSettings::new(1.0, QualityMode::Balanced).validate().is_ok());
        assert!(FileSettings::new(0.0, QualityMode::Balanced).validate().is_err());
        assert!(FileSettings::new(f64::INFINITY, QualityMode::Balanced).validate().is_err());
    }
}
