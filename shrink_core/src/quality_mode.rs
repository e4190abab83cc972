//! Quality Mode Policy
//!
//! A quality mode fixes the audio bitrate; whatever is left of the size
//! budget goes to video. The kbps constants, the safety margin and the video
//! floor are tuning knobs, so they live in [`QualityPolicy`] rather than in
//! the planner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default audio bitrate per mode (kbps).
pub const AUDIO_PRIORITY_KBPS: u32 = 192;
pub const VIDEO_PRIORITY_KBPS: u32 = 128;
pub const BALANCED_KBPS: u32 = 160;

/// Fraction of the video budget actually requested from the encoder.
/// Absorbs container overhead and rate-control overshoot.
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.95;

/// Lowest video bitrate (bps) the planner will hand to the encoder.
pub const DEFAULT_MIN_VIDEO_BITRATE: u64 = 64_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    #[default]
    AudioPriority,
    VideoPriority,
    Balanced,
}

impl QualityMode {
    pub const ALL: [QualityMode; 3] = [
        QualityMode::AudioPriority,
        QualityMode::VideoPriority,
        QualityMode::Balanced,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QualityMode::AudioPriority => "Audio priority",
            QualityMode::VideoPriority => "Video priority",
            QualityMode::Balanced => "Balanced",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QualityMode::AudioPriority => {
                "Keeps audio at high quality and fits video to the rest (music, talks, ASMR)"
            }
            QualityMode::VideoPriority => {
                "Keeps audio minimal so video gets the budget (animation, films, gameplay)"
            }
            QualityMode::Balanced => "Even trade-off between audio and video (general videos)",
        }
    }

    /// Name used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityMode::AudioPriority => "audio",
            QualityMode::VideoPriority => "video",
            QualityMode::Balanced => "balanced",
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" | "audio_priority" | "audio-priority" | "1" => Ok(QualityMode::AudioPriority),
            "video" | "video_priority" | "video-priority" | "2" => Ok(QualityMode::VideoPriority),
            "balanced" | "balance" | "3" => Ok(QualityMode::Balanced),
            other => Err(format!(
                "unknown quality mode '{}' (expected audio, video or balanced)",
                other
            )),
        }
    }
}

/// Tunable planning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    pub audio_priority_kbps: u32,
    pub video_priority_kbps: u32,
    pub balanced_kbps: u32,
    pub safety_margin: f64,
    pub min_video_bitrate: u64,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            audio_priority_kbps: AUDIO_PRIORITY_KBPS,
            video_priority_kbps: VIDEO_PRIORITY_KBPS,
            balanced_kbps: BALANCED_KBPS,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            min_video_bitrate: DEFAULT_MIN_VIDEO_BITRATE,
        }
    }
}

impl QualityPolicy {
    pub fn audio_kbps(&self, mode: QualityMode) -> u32 {
        match mode {
            QualityMode::AudioPriority => self.audio_priority_kbps,
            QualityMode::VideoPriority => self.video_priority_kbps,
            QualityMode::Balanced => self.balanced_kbps,
        }
    }

    /// Audio bitrate in bits per second.
    pub fn audio_bitrate(&self, mode: QualityMode) -> u64 {
        self.audio_kbps(mode) as u64 * 1000
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.safety_margin > 0.0 && self.safety_margin <= 1.0) {
            return Err(format!(
                "safety_margin must be in (0, 1], got {}",
                self.safety_margin
            ));
        }
        for mode in QualityMode::ALL {
            if self.audio_kbps(mode) == 0 {
                return Err(format!("{} audio bitrate must be positive", mode.as_str()));
            }
        }
        if self.min_video_bitrate == 0 {
            return Err("min_video_bitrate must be positive".to_string());
        }
        Ok(())
    }
}
