//! Report Module
//!
//! Human-readable output: the plan before an encode, the dry-run report,
//! per-file completion and the batch summary box.

use crate::batch::BatchSummary;
use crate::encode::EncodePlan;
use crate::history::{OutcomeStatus, RunOutcome};
use crate::progress::{format_bytes, format_duration, format_eta, format_megabytes};
use console::style;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

const RULE: &str = "════════════════════════════════════════════════════════════";

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn counter(index: usize, total: usize) -> String {
    if total > 1 {
        format!("[{}/{}] ", index + 1, total)
    } else {
        String::new()
    }
}

/// Bitrates and expected quality, printed before encoding starts.
pub fn format_plan(plan: &EncodePlan, index: usize, total: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}{} {}",
        counter(index, total),
        style("📊 Plan for").cyan().bold(),
        file_name(&plan.source)
    );
    let _ = writeln!(out, "  Quality mode:   {}", plan.mode.label());
    let _ = writeln!(out, "  Video bitrate:  {} kbps ({})", plan.bitrates.video_kbps(), plan.format.video_codec());
    let _ = writeln!(out, "  Audio bitrate:  {} kbps ({})", plan.bitrates.audio_kbps(), plan.format.audio_codec());
    let _ = writeln!(out, "  Output:         {}", plan.output.display());
    out
}

/// Full dry-run report: what a real run would do, without doing it.
pub fn format_dry_run(plan: &EncodePlan, index: usize, total: usize) -> String {
    let ratio = (1.0 - plan.target_size_bytes as f64 / plan.current_size_bytes as f64) * 100.0;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}{}",
        counter(index, total),
        style(format!("📋 Dry run: {}", file_name(&plan.source))).cyan().bold()
    );
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Input file:       {}", file_name(&plan.source));
    let _ = writeln!(out, "Current size:     {}", format_megabytes(plan.current_size_bytes));
    let _ = writeln!(out, "Target size:      {}", format_megabytes(plan.target_size_bytes));
    let _ = writeln!(out, "Compression:      {:.1}%", ratio);
    let _ = writeln!(out, "Duration:         {}", format_eta(Duration::from_secs_f64(plan.duration)));
    let _ = writeln!(out);
    let _ = writeln!(out, "Quality mode");
    let _ = writeln!(out, "  {}: {}", plan.mode.label(), plan.mode.description());
    let _ = writeln!(out);
    let _ = writeln!(out, "Encoding");
    let _ = writeln!(out, "  Video bitrate:  {} kbps ({})", plan.bitrates.video_kbps(), plan.format.video_codec());
    let _ = writeln!(out, "  Audio bitrate:  {} kbps ({})", plan.bitrates.audio_kbps(), plan.format.audio_codec());
    let _ = writeln!(out, "  Container:      {}", plan.format.description());
    let _ = writeln!(out);
    let _ = writeln!(out, "Expected quality");
    let _ = writeln!(out, "  {}", plan.quality);
    let _ = writeln!(out);
    let _ = writeln!(out, "Output file");
    let _ = writeln!(
        out,
        "  Name:           {}",
        plan.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let _ = writeln!(out, "  Location:       {}", plan.output.display());
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Result block for one finished (or failed / skipped) file.
pub fn format_outcome(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    match &outcome.status {
        OutcomeStatus::Succeeded => {
            let _ = writeln!(out, "\n{}", RULE);
            let _ = writeln!(out, "{}", style("✅ Compression finished, output saved").green().bold());
            let _ = writeln!(out, "{}", RULE);
            if let Some(mode) = outcome.mode {
                let _ = writeln!(out, "Quality mode:     {}", mode.label());
            }
            if let Some(output) = &outcome.output {
                let _ = writeln!(out, "File name:        {}", file_name(output));
                let _ = writeln!(out, "Location:         {}", output.display());
            }
            if let Some(target) = outcome.target_size {
                let _ = writeln!(out, "Target size:      {}", format_megabytes(target));
            }
            if let Some(actual) = outcome.actual_size {
                let _ = writeln!(out, "Actual size:      {}", format_megabytes(actual));
            }
            if let Some(diff) = outcome.difference() {
                let _ = writeln!(out, "Difference:       {}", format_megabytes(diff));
            }
            if let Some(ratio) = outcome.compression_ratio() {
                let _ = writeln!(out, "Compression:      {:.1}%", ratio);
            }
            let _ = writeln!(out, "Processing time:  {}", format_eta(outcome.processing_time));
            let _ = writeln!(out, "{}", RULE);
        }
        OutcomeStatus::Simulated => {}
        OutcomeStatus::Skipped { reason } => {
            let _ = writeln!(
                out,
                "{} {} ({})",
                style("⏭️  Skipped:").yellow(),
                file_name(&outcome.source),
                reason
            );
        }
        OutcomeStatus::Failed { reason, .. } => {
            let _ = writeln!(
                out,
                "{} {}: {}",
                style("❌ Failed:").red().bold(),
                file_name(&outcome.source),
                reason
            );
        }
    }
    out
}

pub fn format_summary(summary: &BatchSummary, dry_run: bool) -> String {
    let title = if dry_run { "Dry Run Summary" } else { "Compression Summary" };
    let reduction = if summary.input_bytes > 0 {
        (1.0 - summary.output_bytes as f64 / summary.input_bytes as f64) * 100.0
    } else {
        0.0
    };

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "╔{}╗", RULE);
    let _ = writeln!(out, "║  📊 {:<54}║", title);
    let _ = writeln!(out, "╠{}╣", RULE);
    let _ = writeln!(out, "║  📁 Files:            {:>10}                           ║", summary.total);
    if dry_run {
        let _ = writeln!(out, "║  📋 Planned:          {:>10}                           ║", summary.simulated);
    } else {
        let _ = writeln!(out, "║  ✅ Succeeded:        {:>10}                           ║", summary.succeeded);
    }
    let _ = writeln!(out, "║  ❌ Failed:           {:>10}                           ║", summary.failed);
    let _ = writeln!(out, "║  ⏭️  Skipped:          {:>10}                           ║", summary.skipped);
    let _ = writeln!(out, "║  📈 Success Rate:     {:>9.1}%                           ║", summary.success_rate());
    if !dry_run {
        let _ = writeln!(out, "╠{}╣", RULE);
        let _ = writeln!(out, "║  💾 Input Size:       {:>10}                           ║", format_bytes(summary.input_bytes));
        let _ = writeln!(out, "║  💾 Output Size:      {:>10}                           ║", format_bytes(summary.output_bytes));
        let _ = writeln!(out, "║  📉 Size Reduction:   {:>9.1}%                           ║", reduction);
    }
    let _ = writeln!(out, "╠{}╣", RULE);
    let _ = writeln!(out, "║  ⏱️  Total Time:       {:>10}                           ║", format_duration(summary.elapsed));
    let _ = writeln!(out, "╚{}╝", RULE);

    if !summary.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("❌ Errors encountered:").red().bold());
        for (path, error) in &summary.errors {
            let _ = writeln!(out, "   {} → {}", path.display(), error);
        }
    }
    out
}

pub fn print_summary(summary: &BatchSummary, dry_run: bool) {
    print!("{}", format_summary(summary, dry_run));
}
