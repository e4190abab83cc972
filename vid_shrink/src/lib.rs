//! vid-shrink - shrink videos to a target file size
//!
//! Two-pass ffmpeg encoding at a bitrate computed from the requested size,
//! the clip duration and a quality mode that decides how much of the budget
//! goes to audio.
//!
//! ```rust,ignore
//! use vid_shrink::cli_runner::{build_settings, resolve_inputs};
//! use vid_shrink::QualityMode;
//!
//! let inputs = resolve_inputs(&[PathBuf::from("clips/")], false)?;
//! let settings = build_settings(Some(50.0), QualityMode::Balanced, None, None, &inputs)?;
//! ```

pub mod cli_runner;

pub use shrink_core::{
    BatchOrchestrator, BatchSettings, BatchSummary, CancelPolicy, CancelToken, FileSettings,
    OutputFormat, QualityMode, RunOutcome, ShrinkConfig,
};
