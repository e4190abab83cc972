//! Output naming
//!
//! `<stem>--compressed--<MB>MB--<yyyy-mm-dd-HH-MM-SS>.<ext>`, written next to
//! the source. The name itself is a pure function of its inputs; only
//! [`unique_output_path`] looks at the filesystem.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const COMPRESSED_MARKER: &str = "--compressed--";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

pub fn output_file_name(
    stem: &str,
    target_size_mb: f64,
    timestamp: NaiveDateTime,
    extension: &str,
) -> String {
    format!(
        "{}{}{:.1}MB--{}.{}",
        stem,
        COMPRESSED_MARKER,
        target_size_mb,
        timestamp.format(TIMESTAMP_FORMAT),
        extension.trim_start_matches('.')
    )
}

/// Destination path for `source` in its own directory.
pub fn output_path_for(
    source: &Path,
    target_size_mb: f64,
    timestamp: NaiveDateTime,
    extension: &str,
) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    dir.join(output_file_name(&stem, target_size_mb, timestamp, extension))
}

/// `candidate` itself if free, otherwise the first free `<stem>-N.<ext>`.
pub fn unique_output_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let dir = candidate.parent().unwrap_or_else(|| Path::new(""));

    (1u32..)
        .map(|n| dir.join(format!("{}-{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| candidate.to_path_buf())
}
