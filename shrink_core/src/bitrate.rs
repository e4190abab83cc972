//! Bitrate Planner
//!
//! Derives the video bitrate that makes a two-pass encode land on a target
//! file size:
//!
//! ```text
//! audio_size  = audio_bitrate * duration / 8
//! video_bps   = (target - audio_size) * 8 / duration * margin
//! ```
//!
//! Every way the target can be unreachable is reported as
//! [`ShrinkError::InfeasibleTarget`] with the numbers involved; the planner
//! never returns a plan it knows the encoder cannot honour.

use crate::errors::{Infeasibility, Result, ShrinkError};
use crate::quality_mode::{QualityMode, QualityPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output of [`plan_bitrates`]. All bitrates in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitratePlan {
    pub video_bitrate: u64,
    pub audio_bitrate: u64,
    pub audio_size_bytes: u64,
    pub video_budget_bytes: u64,
}

impl BitratePlan {
    pub fn video_kbps(&self) -> u64 {
        self.video_bitrate / 1000
    }

    pub fn audio_kbps(&self) -> u64 {
        self.audio_bitrate / 1000
    }
}

pub fn plan_bitrates(
    target_size_bytes: u64,
    current_size_bytes: u64,
    duration_secs: f64,
    mode: QualityMode,
    policy: &QualityPolicy,
) -> Result<BitratePlan> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(ShrinkError::InfeasibleTarget(
            Infeasibility::NonPositiveDuration {
                duration: duration_secs,
            },
        ));
    }

    if target_size_bytes >= current_size_bytes {
        return Err(ShrinkError::InfeasibleTarget(Infeasibility::NotSmaller {
            target: target_size_bytes,
            current: current_size_bytes,
        }));
    }

    let audio_bitrate = policy.audio_bitrate(mode);
    let audio_size = audio_bitrate as f64 * duration_secs / 8.0;

    if target_size_bytes as f64 <= audio_size {
        return Err(ShrinkError::InfeasibleTarget(
            Infeasibility::AudioExceedsTarget {
                audio: audio_size.ceil() as u64,
                target: target_size_bytes,
            },
        ));
    }

    let video_budget = target_size_bytes as f64 - audio_size;
    let video_bitrate = (video_budget * 8.0 / duration_secs * policy.safety_margin) as u64;

    if video_bitrate < policy.min_video_bitrate {
        return Err(ShrinkError::InfeasibleTarget(Infeasibility::BelowFloor {
            bitrate: video_bitrate,
            floor: policy.min_video_bitrate,
        }));
    }

    Ok(BitratePlan {
        video_bitrate,
        audio_bitrate,
        audio_size_bytes: audio_size.round() as u64,
        video_budget_bytes: video_budget.round() as u64,
    })
}

/// Rough visual quality to expect from a video bitrate at a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityEstimate {
    Excellent,
    Good,
    Acceptable,
    Low,
    Unknown,
}

impl QualityEstimate {
    pub fn description(&self) -> &'static str {
        match self {
            QualityEstimate::Excellent => "Excellent (near lossless)",
            QualityEstimate::Good => "Good (minor degradation)",
            QualityEstimate::Acceptable => "Acceptable (visible but tolerable)",
            QualityEstimate::Low => "Low (clearly degraded)",
            QualityEstimate::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for QualityEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// (excellent, good, acceptable) thresholds in kbps for a frame height.
fn quality_thresholds_kbps(height: u32) -> (u64, u64, u64) {
    match height {
        h if h >= 2160 => (35_000, 20_000, 13_000),
        h if h >= 1440 => (16_000, 10_000, 6_000),
        h if h >= 1080 => (8_000, 5_000, 3_000),
        h if h >= 720 => (5_000, 2_500, 1_500),
        h if h >= 480 => (2_500, 1_000, 500),
        _ => (1_000, 500, 250),
    }
}

pub fn estimate_quality(video_bitrate: u64, height: Option<u32>) -> QualityEstimate {
    let Some(height) = height.filter(|h| *h > 0) else {
        return QualityEstimate::Unknown;
    };

    let kbps = video_bitrate / 1000;
    let (excellent, good, acceptable) = quality_thresholds_kbps(height);

    if kbps >= excellent {
        QualityEstimate::Excellent
    } else if kbps >= good {
        QualityEstimate::Good
    } else if kbps >= acceptable {
        QualityEstimate::Acceptable
    } else {
        QualityEstimate::Low
    }
}
