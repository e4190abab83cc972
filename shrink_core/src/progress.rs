//! Progress Module
//!
//! Turns the encoder's progress stream into completion fractions and an ETA:
//! - `-progress pipe:1` key/value lines (`out_time=`, `out_time_us=`, `out_time_ms=`)
//! - classic stats lines with `time=HH:MM:SS.ff` anywhere in the line
//!
//! Fractions never go backwards within a pass. Pass fractions are folded into
//! one overall figure with [`PassWeights`] and rendered by [`PassProgressBar`].

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Weight of the newest ETA estimate in the moving average.
pub const DEFAULT_ETA_SMOOTHING: f64 = 0.3;

// ═══════════════════════════════════════════════════════════════
// Elapsed-time parsing
// ═══════════════════════════════════════════════════════════════

/// Parse `HH:MM:SS.ffffff` into seconds.
pub fn parse_clock(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total.is_finite() && total >= 0.0).then_some(total)
}

fn parse_micros(value: &str) -> Option<f64> {
    let micros: i64 = value.trim().parse().ok()?;
    (micros >= 0).then(|| micros as f64 / 1_000_000.0)
}

/// Elapsed encoder time (seconds) reported by one line of encoder output.
///
/// Returns `None` for lines without a time marker, `N/A` values, negative
/// times (ffmpeg reports those before the first packet) and garbage.
pub fn parse_elapsed(line: &str) -> Option<f64> {
    for token in line.split_whitespace() {
        // ffmpeg reports out_time_ms in microseconds as well
        if let Some(v) = token
            .strip_prefix("out_time_us=")
            .or_else(|| token.strip_prefix("out_time_ms="))
        {
            if let Some(secs) = parse_micros(v) {
                return Some(secs);
            }
        } else if let Some(v) = token
            .strip_prefix("out_time=")
            .or_else(|| token.strip_prefix("time="))
        {
            if let Some(secs) = parse_clock(v) {
                return Some(secs);
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════
// ProgressMonitor
// ═══════════════════════════════════════════════════════════════

/// One observation of a running pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub elapsed_secs: f64,
    pub total_secs: f64,
    /// 0.0..=1.0, non-decreasing within a pass
    pub fraction: f64,
    pub eta: Option<Duration>,
}

/// Per-pass progress state. Create a fresh one for every encoder invocation.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    total_secs: f64,
    last_elapsed: f64,
    smoothing: f64,
    smoothed_eta: Option<f64>,
}

impl ProgressMonitor {
    pub fn new(total_secs: f64) -> Self {
        Self::with_smoothing(total_secs, DEFAULT_ETA_SMOOTHING)
    }

    /// `smoothing` is the weight of the newest estimate; 1.0 disables smoothing.
    pub fn with_smoothing(total_secs: f64, smoothing: f64) -> Self {
        let smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.01, 1.0)
        } else {
            1.0
        };
        Self {
            total_secs,
            last_elapsed: 0.0,
            smoothing,
            smoothed_eta: None,
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total_secs > 0.0 {
            (self.last_elapsed / self.total_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Feed one line; `wall_elapsed` is the wall-clock time since the pass started.
    pub fn observe_at(&mut self, line: &str, wall_elapsed: Duration) -> Option<ProgressSample> {
        let elapsed = parse_elapsed(line)?;
        if elapsed > self.last_elapsed {
            self.last_elapsed = elapsed;
        }

        let fraction = self.fraction();
        let eta = self.update_eta(fraction, wall_elapsed);

        Some(ProgressSample {
            elapsed_secs: self.last_elapsed,
            total_secs: self.total_secs,
            fraction,
            eta,
        })
    }

    fn update_eta(&mut self, fraction: f64, wall_elapsed: Duration) -> Option<Duration> {
        if fraction <= 0.0 {
            return None;
        }
        if fraction >= 1.0 {
            self.smoothed_eta = Some(0.0);
            return Some(Duration::ZERO);
        }

        let raw = (1.0 - fraction) * (wall_elapsed.as_secs_f64() / fraction);
        let smoothed = match self.smoothed_eta {
            Some(prev) => self.smoothing * raw + (1.0 - self.smoothing) * prev,
            None => raw,
        };
        self.smoothed_eta = Some(smoothed);
        Some(Duration::from_secs_f64(smoothed.max(0.0)))
    }

    /// Lazily map encoder output lines to samples, timing against the wall clock.
    pub fn samples<I, S>(self, lines: I) -> ProgressSamples<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ProgressSamples {
            monitor: self,
            lines: lines.into_iter(),
            started: Instant::now(),
        }
    }
}

/// Iterator returned by [`ProgressMonitor::samples`]. Lines without a time
/// marker are consumed silently.
pub struct ProgressSamples<I> {
    monitor: ProgressMonitor,
    lines: I,
    started: Instant,
}

impl<I, S> Iterator for ProgressSamples<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = ProgressSample;

    fn next(&mut self) -> Option<ProgressSample> {
        for line in self.lines.by_ref() {
            if let Some(sample) = self
                .monitor
                .observe_at(line.as_ref(), self.started.elapsed())
            {
                return Some(sample);
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════
// Two-pass weighting
// ═══════════════════════════════════════════════════════════════

/// Share of the overall bar each pass occupies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassWeights {
    pub analysis: f64,
    pub encode: f64,
}

impl Default for PassWeights {
    fn default() -> Self {
        Self {
            analysis: 0.4,
            encode: 0.6,
        }
    }
}

impl PassWeights {
    pub fn overall(&self, pass: u8, fraction: f64) -> f64 {
        let fraction = fraction.clamp(0.0, 1.0);
        let overall = match pass {
            1 => self.analysis * fraction,
            _ => self.analysis + self.encode * fraction,
        };
        overall.clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.analysis < 0.0 || self.encode < 0.0 {
            return Err("pass weights must not be negative".to_string());
        }
        if ((self.analysis + self.encode) - 1.0).abs() > 1e-6 {
            return Err(format!(
                "pass weights must sum to 1.0, got {:.3}",
                self.analysis + self.encode
            ));
        }
        Ok(())
    }
}

/// Progress of a whole two-pass encode, as handed to pipeline observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallProgress {
    pub pass: u8,
    pub pass_fraction: f64,
    pub overall: f64,
    pub eta: Option<Duration>,
}

impl OverallProgress {
    pub fn from_sample(pass: u8, sample: &ProgressSample, weights: &PassWeights) -> Self {
        Self {
            pass,
            pass_fraction: sample.fraction,
            overall: weights.overall(pass, sample.fraction),
            eta: sample.eta,
        }
    }

    pub fn pass_label(&self) -> &'static str {
        match self.pass {
            1 => "Pass 1/2 (analysis)",
            _ => "Pass 2/2 (encode)",
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Terminal bar
// ═══════════════════════════════════════════════════════════════

const PASS_TEMPLATE: &str =
    "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {percent:>3}% • ⏱️ {elapsed_precise} • {msg}";
const PROGRESS_CHARS: &str = "█▓░";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const BAR_SCALE: u64 = 1000;

/// indicatif bar showing overall progress of one file's encode.
pub struct PassProgressBar {
    bar: ProgressBar,
}

impl PassProgressBar {
    pub fn new(prefix: &str, hidden: bool) -> Self {
        let bar = ProgressBar::new(BAR_SCALE);

        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template(PASS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(PROGRESS_CHARS)
                .tick_chars(SPINNER_CHARS);
            bar.set_style(style);
            bar.set_prefix(prefix.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self { bar }
    }

    pub fn update(&self, progress: &OverallProgress) {
        self.bar
            .set_position((progress.overall * BAR_SCALE as f64).round() as u64);
        let eta = progress
            .eta
            .map(format_eta)
            .unwrap_or_else(|| "--:--:--".to_string());
        self.bar
            .set_message(format!("{} • ETA {}", progress.pass_label(), eta));
    }

    pub fn println(&self, msg: &str) {
        self.bar.println(msg);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for PassProgressBar {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Formatting
// ═══════════════════════════════════════════════════════════════

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Always in MB, the unit sizes are requested in.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / 1024.0 / 1024.0)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// `HH:MM:SS`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
