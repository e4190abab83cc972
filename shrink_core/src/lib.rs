//! Core of vid-shrink
//!
//! Everything between "this file, this target size" and "a smaller file on
//! disk plus a history line":
//! - Bitrate planning from target size, duration and quality mode
//! - Two-pass ffmpeg encoding with progress, ETA and cancellation
//! - Batch orchestration with per-file failure isolation
//! - Output naming, history log and terminal reports
//!
//! ```rust,ignore
//! use shrink_core::{BatchOrchestrator, BatchSettings, CancelToken, FileSettings, QualityMode, ShrinkConfig};
//!
//! let mut batch = BatchOrchestrator::from_config(ShrinkConfig::default(), CancelToken::new());
//! let settings = BatchSettings::Uniform(FileSettings::new(50.0, QualityMode::Balanced));
//! let outcomes = batch.process(&[PathBuf::from("trip.mp4")], &settings)?;
//! ```

pub mod batch;
pub mod bitrate;
pub mod cancel;
pub mod config;
pub mod encode;
pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod formats;
pub mod history;
pub mod logging;
pub mod output_name;
pub mod progress;
pub mod quality_mode;
pub mod report;
pub mod tools;

pub use batch::{collect_files, BatchOrchestrator, BatchSettings, BatchSummary, CancelPolicy};
pub use bitrate::{estimate_quality, plan_bitrates, BitratePlan, QualityEstimate};
pub use cancel::{install_ctrlc_handler, CancelToken, INTERRUPTED_EXIT_CODE};
pub use config::{FileSettings, ShrinkConfig};
pub use encode::{
    EncodePipeline, EncodePlan, EncodeResult, EncoderBackend, FfmpegEncoder, PassResult,
};
pub use errors::{ErrorKind, Infeasibility, Result, ShrinkError};
pub use ffprobe::{probe, FfprobeProber, MediaInfo, MediaProber};
pub use formats::{OutputFormat, SUPPORTED_INPUT_EXTENSIONS, SUPPORTED_OUTPUT_EXTENSIONS};
pub use history::{HistoryRecorder, OutcomeStatus, RunOutcome};
pub use logging::{init_logging, LogConfig};
pub use progress::{
    format_bytes, format_duration, format_eta, format_megabytes, OverallProgress, PassWeights,
    ProgressMonitor, ProgressSample,
};
pub use quality_mode::{QualityMode, QualityPolicy};
pub use tools::{check_tools, install_instructions, ToolStatus};
