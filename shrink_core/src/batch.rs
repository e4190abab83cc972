//! Batch Processing Module
//!
//! Runs probe → plan → encode → history for each input in order. A failure
//! in one file becomes that file's [`RunOutcome`]; it never stops the batch.
//! Only a user cancellation can end a batch early, and only when the
//! [`CancelPolicy`] says so.

use crate::cancel::CancelToken;
use crate::config::{FileSettings, ShrinkConfig};
use crate::encode::{EncodePipeline, EncodePlan, EncoderBackend, FfmpegEncoder};
use crate::errors::{ErrorKind, Result, ShrinkError};
use crate::ffprobe::{FfprobeProber, MediaInfo, MediaProber};
use crate::formats::{has_extension, SUPPORTED_INPUT_EXTENSIONS};
use crate::history::{HistoryRecorder, OutcomeStatus, RunOutcome};
use crate::progress::{OverallProgress, PassProgressBar};
use crate::report;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub const SKIPPED_BY_SETTINGS: &str = "skipped by per-file settings";
pub const BATCH_CANCELLED: &str = "batch cancelled";

/// Supported video files in `dir`, sorted by path.
pub fn collect_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), SUPPORTED_INPUT_EXTENSIONS))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

// ═══════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum BatchSettings {
    /// Same target for every file
    Uniform(FileSettings),
    /// One entry per input, in input order; `None` skips that file
    PerFile(Vec<Option<FileSettings>>),
}

impl BatchSettings {
    pub fn for_index(&self, index: usize) -> Option<&FileSettings> {
        match self {
            BatchSettings::Uniform(settings) => Some(settings),
            BatchSettings::PerFile(list) => list.get(index).and_then(Option::as_ref),
        }
    }

    /// Reject settings that do not line up with `input_count` files.
    pub fn validate(&self, input_count: usize) -> Result<()> {
        match self {
            BatchSettings::Uniform(settings) => settings.validate(),
            BatchSettings::PerFile(list) => {
                if list.len() != input_count {
                    return Err(ShrinkError::InvalidSettings(format!(
                        "{} per-file settings given for {} input files",
                        list.len(),
                        input_count
                    )));
                }
                list.iter().flatten().try_for_each(FileSettings::validate)
            }
        }
    }
}

/// What a cancelled file means for the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Remaining files are recorded as skipped
    #[default]
    Halt,
    /// Clear the cancellation and go on with the next file
    Continue,
}

// ═══════════════════════════════════════════════════════════════
// Summary
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub simulated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub elapsed: Duration,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &RunOutcome) {
        self.total += 1;
        match &outcome.status {
            OutcomeStatus::Succeeded => {
                self.succeeded += 1;
                self.input_bytes += outcome.current_size.unwrap_or(0);
                self.output_bytes += outcome.actual_size.unwrap_or(0);
            }
            OutcomeStatus::Simulated => self.simulated += 1,
            OutcomeStatus::Skipped { .. } => self.skipped += 1,
            OutcomeStatus::Failed { reason, .. } => {
                self.failed += 1;
                self.errors.push((outcome.source.clone(), reason.clone()));
            }
        }
    }

    pub fn from_outcomes(outcomes: &[RunOutcome], elapsed: Duration) -> Self {
        let mut summary = Self::new();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary.elapsed = elapsed;
        summary
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            ((self.succeeded + self.simulated) as f64 / self.total as f64) * 100.0
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

// ═══════════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════════

pub struct BatchOrchestrator<P, B> {
    prober: P,
    pipeline: EncodePipeline<B>,
    config: ShrinkConfig,
    history: HistoryRecorder,
    cancel: CancelToken,
    cancel_policy: CancelPolicy,
    dry_run: bool,
    quiet: bool,
}

impl BatchOrchestrator<FfprobeProber, FfmpegEncoder> {
    /// Orchestrator driving the real ffprobe / ffmpeg binaries named in `config`.
    pub fn from_config(config: ShrinkConfig, cancel: CancelToken) -> Self {
        let prober = FfprobeProber::new(&config.ffprobe_path);
        let encoder = FfmpegEncoder::new(&config.ffmpeg_path);
        Self::new(prober, encoder, config, cancel)
    }
}

impl<P: MediaProber, B: EncoderBackend> BatchOrchestrator<P, B> {
    pub fn new(prober: P, backend: B, config: ShrinkConfig, cancel: CancelToken) -> Self {
        let pipeline = EncodePipeline::new(backend)
            .with_weights(config.pass_weights)
            .with_eta_smoothing(config.eta_smoothing);
        let history = HistoryRecorder::new(&config.history_file);
        Self {
            prober,
            pipeline,
            config,
            history,
            cancel,
            cancel_policy: CancelPolicy::default(),
            dry_run: false,
            quiet: false,
        }
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Suppress reports and progress bars.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn config(&self) -> &ShrinkConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        self.pipeline.backend()
    }

    fn say(&self, text: &str) {
        if !self.quiet && !text.is_empty() {
            print!("{}", text);
        }
    }

    fn plan(&self, info: &MediaInfo, settings: &FileSettings) -> Result<EncodePlan> {
        EncodePlan::build(
            info,
            settings,
            &self.config.policy,
            Local::now().naive_local(),
        )
    }

    /// Probe and plan; on failure the outcome carries whatever sizes were known.
    fn prepare(
        &self,
        path: &Path,
        settings: &FileSettings,
        started: Instant,
    ) -> std::result::Result<(MediaInfo, EncodePlan), RunOutcome> {
        let info = self
            .prober
            .probe(path)
            .map_err(|e| self.failed(path, settings, None, &e, started))?;
        let plan = self
            .plan(&info, settings)
            .map_err(|e| self.failed(path, settings, Some(&info), &e, started))?;
        Ok((info, plan))
    }

    fn failed(
        &self,
        path: &Path,
        settings: &FileSettings,
        info: Option<&MediaInfo>,
        error: &ShrinkError,
        started: Instant,
    ) -> RunOutcome {
        match error.kind() {
            ErrorKind::Cancelled => warn!(file = %path.display(), "Cancelled"),
            kind => error!(file = %path.display(), kind = %kind, error = %error, "File failed"),
        }
        let target = (settings.target_size_mb * 1024.0 * 1024.0).round() as u64;
        RunOutcome::failed(path, Some(settings.quality_mode), error, started.elapsed())
            .with_sizes(info.map(|i| i.size), Some(target))
    }

    /// Plan `path` exactly as [`run_file`](Self::run_file) would, without encoding.
    pub fn simulate_file(&mut self, path: &Path, settings: &FileSettings) -> RunOutcome {
        self.simulate_indexed(path, settings, 0, 1)
    }

    fn simulate_indexed(
        &mut self,
        path: &Path,
        settings: &FileSettings,
        index: usize,
        total: usize,
    ) -> RunOutcome {
        let started = Instant::now();
        if self.cancel.is_cancelled() {
            return self.failed(path, settings, None, &ShrinkError::Cancelled, started);
        }
        match self.prepare(path, settings, started) {
            Ok((info, plan)) => {
                info!(
                    file = %path.display(),
                    resolution = ?info.resolution_label(),
                    video_bitrate = plan.video_bitrate(),
                    audio_bitrate = plan.audio_bitrate(),
                    quality = %plan.quality,
                    "Dry run planned"
                );
                self.say(&report::format_dry_run(&plan, index, total));
                RunOutcome::simulated(&plan, started.elapsed())
            }
            Err(outcome) => outcome,
        }
    }

    /// Probe, plan and two-pass encode one file.
    pub fn run_file(&mut self, path: &Path, settings: &FileSettings) -> RunOutcome {
        self.run_indexed(path, settings, 0, 1)
    }

    fn run_indexed(
        &mut self,
        path: &Path,
        settings: &FileSettings,
        index: usize,
        total: usize,
    ) -> RunOutcome {
        let started = Instant::now();
        let (info, plan) = match self.prepare(path, settings, started) {
            Ok(planned) => planned,
            Err(outcome) => return outcome,
        };

        info!(
            file = %path.display(),
            output = %plan.output.display(),
            mode = plan.mode.as_str(),
            current_size = plan.current_size_bytes,
            target_size = plan.target_size_bytes,
            video_bitrate = plan.video_bitrate(),
            audio_bitrate = plan.audio_bitrate(),
            "Compression started"
        );
        self.say(&report::format_plan(&plan, index, total));

        let bar_label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bar = PassProgressBar::new(&bar_label, self.quiet);
        let result = self
            .pipeline
            .run(&plan, &mut |progress: OverallProgress| bar.update(&progress), &self.cancel);
        bar.finish();

        match result {
            Ok(result) => {
                info!(
                    file = %path.display(),
                    output = %result.output.display(),
                    output_size = result.output_size,
                    elapsed_secs = result.elapsed.as_secs_f64(),
                    "Compression finished"
                );
                RunOutcome::succeeded(&plan, &result, started.elapsed())
            }
            Err(e) => self.failed(path, settings, Some(&info), &e, started),
        }
    }

    fn record(&self, outcome: &RunOutcome) {
        if let Err(e) = self.history.append(outcome) {
            warn!(error = %e, "History not recorded");
        }
        self.say(&report::format_outcome(outcome));
    }

    /// Process `inputs` in order; returns exactly one outcome per input.
    pub fn process(
        &mut self,
        inputs: &[PathBuf],
        settings: &BatchSettings,
    ) -> Result<Vec<RunOutcome>> {
        settings.validate(inputs.len())?;

        info!(
            files = inputs.len(),
            dry_run = self.dry_run,
            "Batch started"
        );

        let mut outcomes = Vec::with_capacity(inputs.len());
        let mut halted = false;

        for (index, path) in inputs.iter().enumerate() {
            let outcome = if halted {
                RunOutcome::skipped(path, BATCH_CANCELLED)
            } else {
                match settings.for_index(index) {
                    None => {
                        info!(file = %path.display(), "Skipped by settings");
                        RunOutcome::skipped(path, SKIPPED_BY_SETTINGS)
                    }
                    Some(file_settings) if self.dry_run => {
                        self.simulate_indexed(path, file_settings, index, inputs.len())
                    }
                    Some(file_settings) => {
                        self.run_indexed(path, file_settings, index, inputs.len())
                    }
                }
            };

            if outcome.error_kind() == Some(ErrorKind::Cancelled) {
                match self.cancel_policy {
                    CancelPolicy::Halt => halted = true,
                    CancelPolicy::Continue => self.cancel.reset(),
                }
            }

            self.record(&outcome);
            outcomes.push(outcome);
        }

        info!(
            files = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.error_kind().is_some()).count(),
            "Batch finished"
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::PassResult;
    use crate::quality_mode::QualityMode;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ops::ControlFlow;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    /// Prober answering from a table; unknown paths fail.
    struct TableProber {
        media: HashMap<PathBuf, MediaInfo>,
        probed: RefCell<Vec<PathBuf>>,
    }

    impl MediaProber for TableProber {
        fn probe(&self, path: &Path) -> Result<MediaInfo> {
            self.probed.borrow_mut().push(path.to_path_buf());
            self.media
                .get(path)
                .cloned()
                .ok_or_else(|| ShrinkError::probe(path, "unreadable"))
        }
    }

    /// Encoder that "succeeds" by writing a fixed-size output on pass 2.
    #[derive(Default)]
    struct FakeEncoder {
        calls: Vec<u8>,
        cancel_on_call: Option<(usize, CancelToken)>,
    }

    impl EncoderBackend for FakeEncoder {
        fn run_pass(
            &mut self,
            pass: u8,
            args: &[String],
            on_line: &mut dyn FnMut(&str) -> ControlFlow<()>,
        ) -> Result<PassResult> {
            self.calls.push(pass);
            if let Some((n, token)) = &self.cancel_on_call {
                if *n == self.calls.len() {
                    token.cancel();
                }
            }
            let terminated = on_line("out_time_us=1000000").is_break();
            if pass == 2 && !terminated {
                std::fs::write(args.last().unwrap(), vec![0u8; 4096]).unwrap();
            }
            Ok(PassResult {
                pass,
                exit_code: if terminated { None } else { Some(0) },
                elapsed: Duration::from_millis(1),
                stderr: String::new(),
                terminated,
            })
        }
    }

    struct Fixture {
        dir: TempDir,
        inputs: Vec<PathBuf>,
        media: HashMap<PathBuf, MediaInfo>,
    }

    impl Fixture {
        /// `names` are created on disk; every name not in `unprobeable` gets media info.
        fn new(names: &[&str], unprobeable: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            let mut inputs = Vec::new();
            let mut media = HashMap::new();
            for name in names {
                let path = dir.path().join(name);
                std::fs::write(&path, b"video").unwrap();
                if !unprobeable.contains(name) {
                    media.insert(
                        path.clone(),
                        MediaInfo {
                            path: path.clone(),
                            size: 100 * MIB,
                            duration: 60.0,
                            extension: "mp4".to_string(),
                            width: Some(1920),
                            height: Some(1080),
                        },
                    );
                }
                inputs.push(path);
            }
            Self { dir, inputs, media }
        }

        fn config(&self) -> ShrinkConfig {
            ShrinkConfig {
                history_file: self.dir.path().join("history.log"),
                ..ShrinkConfig::default()
            }
        }

        fn orchestrator(
            &self,
            encoder: FakeEncoder,
            cancel: CancelToken,
        ) -> BatchOrchestrator<TableProber, FakeEncoder> {
            let prober = TableProber {
                media: self.media.clone(),
                probed: RefCell::new(Vec::new()),
            };
            BatchOrchestrator::new(prober, encoder, self.config(), cancel).with_quiet(true)
        }

        fn history_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("history.log"))
                .unwrap_or_default()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    fn uniform(mb: f64) -> BatchSettings {
        BatchSettings::Uniform(FileSettings::new(mb, QualityMode::Balanced))
    }

    #[test]
    fn test_unreadable_media_is_isolated() {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"], &["b.mp4"]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, OutcomeStatus::Succeeded);
        assert_eq!(outcomes[1].error_kind(), Some(ErrorKind::ProbeFailed));
        assert_eq!(outcomes[2].status, OutcomeStatus::Succeeded);
        for (outcome, input) in outcomes.iter().zip(&fx.inputs) {
            assert_eq!(&outcome.source, input);
        }
        // two files, two passes each
        assert_eq!(orch.backend().calls, vec![1, 2, 1, 2]);

        let history = fx.history_lines();
        assert_eq!(history.len(), 3);
        assert!(history[1].contains(" - ERROR - Failed: b.mp4, error: ProbeFailed"));
        assert!(outcomes[0].output.as_ref().unwrap().exists());
    }

    #[test]
    fn test_infeasible_target_keeps_going() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"], &[]);
        let settings = BatchSettings::PerFile(vec![
            Some(FileSettings::new(500.0, QualityMode::Balanced)),
            Some(FileSettings::new(10.0, QualityMode::Balanced)),
        ]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());

        let outcomes = orch.process(&fx.inputs, &settings).unwrap();

        assert_eq!(outcomes[0].error_kind(), Some(ErrorKind::InfeasibleTarget));
        assert_eq!(outcomes[0].current_size, Some(100 * MIB));
        assert_eq!(outcomes[1].status, OutcomeStatus::Succeeded);
    }

    #[test]
    fn test_per_file_none_is_skipped() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"], &[]);
        let settings = BatchSettings::PerFile(vec![
            None,
            Some(FileSettings::new(10.0, QualityMode::VideoPriority)),
        ]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());

        let outcomes = orch.process(&fx.inputs, &settings).unwrap();

        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Skipped {
                reason: SKIPPED_BY_SETTINGS.to_string()
            }
        );
        assert_eq!(outcomes[1].status, OutcomeStatus::Succeeded);
        assert_eq!(outcomes[1].mode, Some(QualityMode::VideoPriority));
        assert!(fx.history_lines()[0].contains(" - WARN - Skipped: a.mp4"));
    }

    #[test]
    fn test_settings_count_mismatch_touches_nothing() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"], &[]);
        let settings = BatchSettings::PerFile(vec![Some(FileSettings::new(
            10.0,
            QualityMode::Balanced,
        ))]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());

        let err = orch.process(&fx.inputs, &settings).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSettings);
        assert!(orch.backend().calls.is_empty());
        assert!(orch.prober.probed.borrow().is_empty());
        assert!(fx.history_lines().is_empty());
    }

    #[test]
    fn test_dry_run_matches_real_plan_and_writes_nothing() {
        let fx = Fixture::new(&["a.mp4"], &[]);
        let settings = FileSettings::new(10.0, QualityMode::AudioPriority);

        let mut dry = fx
            .orchestrator(FakeEncoder::default(), CancelToken::new())
            .with_dry_run(true);
        let simulated = dry.process(&fx.inputs, &BatchSettings::Uniform(settings.clone())).unwrap();
        assert_eq!(simulated[0].status, OutcomeStatus::Simulated);
        assert!(dry.backend().calls.is_empty());
        assert!(!simulated[0].output.as_ref().unwrap().exists());

        let mut real = fx.orchestrator(FakeEncoder::default(), CancelToken::new());
        let done = real.run_file(&fx.inputs[0], &settings);
        assert_eq!(done.status, OutcomeStatus::Succeeded);
        assert_eq!(done.video_bitrate, simulated[0].video_bitrate);
        assert_eq!(done.audio_bitrate, simulated[0].audio_bitrate);
        assert_eq!(done.target_size, simulated[0].target_size);
    }

    #[test]
    fn test_simulate_reports_same_errors() {
        let fx = Fixture::new(&["a.mp4"], &[]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());
        let outcome = orch.simulate_file(&fx.inputs[0], &FileSettings::new(200.0, QualityMode::Balanced));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InfeasibleTarget));
    }

    #[test]
    fn test_cancel_halts_remaining_files() {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"], &[]);
        let token = CancelToken::new();
        let encoder = FakeEncoder {
            calls: Vec::new(),
            // pass 2 of the first file
            cancel_on_call: Some((2, token.clone())),
        };
        let mut orch = fx.orchestrator(encoder, token.clone());

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].error_kind(), Some(ErrorKind::Cancelled));
        for outcome in &outcomes[1..] {
            assert_eq!(
                outcome.status,
                OutcomeStatus::Skipped {
                    reason: BATCH_CANCELLED.to_string()
                }
            );
        }
        assert_eq!(orch.backend().calls, vec![1, 2]);
        // no partial output left next to the source
        let leftovers: Vec<_> = std::fs::read_dir(fx.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("--compressed--"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_dry_run_honours_cancellation() {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"], &[]);
        let token = CancelToken::new();
        token.cancel();
        let mut orch = fx
            .orchestrator(FakeEncoder::default(), token.clone())
            .with_dry_run(true);

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();

        assert_eq!(outcomes[0].error_kind(), Some(ErrorKind::Cancelled));
        for outcome in &outcomes[1..] {
            assert_eq!(
                outcome.status,
                OutcomeStatus::Skipped {
                    reason: BATCH_CANCELLED.to_string()
                }
            );
        }
        assert!(orch.prober.probed.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_cancel_continue_policy_resumes() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"], &[]);
        let token = CancelToken::new();
        token.cancel();
        let mut orch = fx
            .orchestrator(FakeEncoder::default(), token.clone())
            .with_dry_run(true)
            .with_cancel_policy(CancelPolicy::Continue);

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();

        assert_eq!(outcomes[0].error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(outcomes[1].status, OutcomeStatus::Simulated);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_continue_policy_resumes() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"], &[]);
        let token = CancelToken::new();
        let encoder = FakeEncoder {
            calls: Vec::new(),
            cancel_on_call: Some((1, token.clone())),
        };
        let mut orch = fx
            .orchestrator(encoder, token.clone())
            .with_cancel_policy(CancelPolicy::Continue);

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();

        assert_eq!(outcomes[0].error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(outcomes[1].status, OutcomeStatus::Succeeded);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_history_failure_does_not_change_outcome() {
        let fx = Fixture::new(&["a.mp4"], &[]);
        let config = ShrinkConfig {
            // a directory cannot be appended to
            history_file: fx.dir.path().to_path_buf(),
            ..ShrinkConfig::default()
        };
        let prober = TableProber {
            media: fx.media.clone(),
            probed: RefCell::new(Vec::new()),
        };
        let mut orch = BatchOrchestrator::new(prober, FakeEncoder::default(), config, CancelToken::new())
            .with_quiet(true);

        let outcomes = orch.process(&fx.inputs, &uniform(10.0)).unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::Succeeded);
    }

    #[test]
    fn test_summary_counts() {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"], &["b.mp4"]);
        let settings = BatchSettings::PerFile(vec![
            Some(FileSettings::new(10.0, QualityMode::Balanced)),
            Some(FileSettings::new(10.0, QualityMode::Balanced)),
            None,
        ]);
        let mut orch = fx.orchestrator(FakeEncoder::default(), CancelToken::new());
        let outcomes = orch.process(&fx.inputs, &settings).unwrap();

        let summary = BatchSummary::from_outcomes(&outcomes, Duration::from_secs(5));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.input_bytes, 100 * MIB);
        assert_eq!(summary.output_bytes, 4096);
        assert_eq!(summary.errors.len(), 1);
        assert!(!summary.all_succeeded());
        assert!((summary.success_rate() - 33.33).abs() < 0.01);
    }

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.MKV"), b"").unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.webm"), b"").unwrap();

        let flat = collect_files(dir.path(), false);
        assert_eq!(flat, vec![dir.path().join("a.mp4"), dir.path().join("b.MKV")]);

        let deep = collect_files(dir.path(), true);
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&dir.path().join("sub").join("c.webm")));
    }

    #[test]
    fn test_batch_settings_validation() {
        assert!(uniform(1.0).validate(10).is_ok());
        assert!(uniform(-1.0).validate(1).is_err());
        let per_file = BatchSettings::PerFile(vec![None, Some(FileSettings::new(0.0, QualityMode::Balanced))]);
        assert_eq!(per_file.validate(2).unwrap_err().kind(), ErrorKind::InvalidSettings);
        assert!(BatchSettings::PerFile(vec![None, None]).validate(2).is_ok());
    }
}
