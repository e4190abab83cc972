//! Glue between parsed flags and the core: input discovery, settings and
//! config assembly, exit status.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use shrink_core::batch::{collect_files, BatchSettings};
use shrink_core::config::{FileSettings, ShrinkConfig};
use shrink_core::formats::{has_extension, OutputFormat, SUPPORTED_INPUT_EXTENSIONS};
use shrink_core::history::RunOutcome;
use shrink_core::quality_mode::QualityMode;
use shrink_core::{ErrorKind, INTERRUPTED_EXIT_CODE};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Strip whitespace and the quotes a terminal adds to dragged-in paths.
pub fn trim_path_quotes(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed);
    PathBuf::from(unquoted)
}

/// Expand directories into their video files; files pass through in the order given.
pub fn resolve_inputs(raw_inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for raw in raw_inputs {
        let path = trim_path_quotes(&raw.to_string_lossy());
        if path.is_dir() {
            let found = collect_files(&path, recursive);
            info!(dir = %path.display(), count = found.len(), recursive, "Scanned directory");
            if found.is_empty() {
                warn!(dir = %path.display(), "No video files in directory");
            }
            files.extend(found);
        } else if path.is_file() {
            if !has_extension(&path, SUPPORTED_INPUT_EXTENSIONS) {
                debug!(file = %path.display(), "Unsupported extension, planning will reject it");
            }
            files.push(path);
        } else {
            bail!("❌ Input not found: {}", path.display());
        }
    }

    if files.is_empty() {
        bail!(
            "❌ No video files to process\n💡 Supported video formats: {}",
            SUPPORTED_INPUT_EXTENSIONS.join(", ")
        );
    }
    Ok(files)
}

/// `--per-file` JSON: either a list in input order (`null` skips a file) or
/// an object keyed by file name or path (absent files are skipped).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PerFileDocument {
    Ordered(Vec<Option<FileSettings>>),
    Keyed(HashMap<String, FileSettings>),
}

pub fn parse_per_file(json: &str, inputs: &[PathBuf]) -> Result<BatchSettings> {
    let document: PerFileDocument =
        serde_json::from_str(json).context("Invalid per-file settings JSON")?;

    let list = match document {
        PerFileDocument::Ordered(list) => list,
        PerFileDocument::Keyed(map) => {
            let name_of = |input: &PathBuf| {
                input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            };
            let mut name_counts: HashMap<String, usize> = HashMap::new();
            for input in inputs {
                *name_counts.entry(name_of(input)).or_default() += 1;
            }

            let mut used: HashSet<&str> = HashSet::new();
            let mut list = Vec::with_capacity(inputs.len());
            for input in inputs {
                let full = input.display().to_string();
                let name = name_of(input);
                let entry = if let Some((key, settings)) = map.get_key_value(&full) {
                    used.insert(key);
                    Some(settings.clone())
                } else if let Some((key, settings)) = map.get_key_value(&name) {
                    if name_counts.get(&name).copied().unwrap_or(0) > 1 {
                        bail!(
                            "❌ Per-file entry '{}' matches several inputs\n💡 Key those files by full path",
                            name
                        );
                    }
                    used.insert(key);
                    Some(settings.clone())
                } else {
                    None
                };
                list.push(entry);
            }

            for unknown in map.keys().filter(|k| !used.contains(k.as_str())) {
                warn!(entry = %unknown, "Per-file entry matches no input");
            }
            list
        }
    };
    Ok(BatchSettings::PerFile(list))
}

pub fn load_per_file(path: &Path, inputs: &[PathBuf]) -> Result<BatchSettings> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read per-file settings: {}", path.display()))?;
    parse_per_file(&json, inputs)
        .with_context(|| format!("Per-file settings: {}", path.display()))
}

/// Settings for the whole batch: the per-file document wins over uniform flags.
pub fn build_settings(
    target_mb: Option<f64>,
    mode: QualityMode,
    format: Option<OutputFormat>,
    per_file: Option<&Path>,
    inputs: &[PathBuf],
) -> Result<BatchSettings> {
    let settings = match (per_file, target_mb) {
        (Some(path), _) => load_per_file(path, inputs)?,
        (None, Some(mb)) => {
            BatchSettings::Uniform(FileSettings::new(mb, mode).with_format(format))
        }
        (None, None) => bail!("❌ Either --target-mb or --per-file is required"),
    };
    settings.validate(inputs.len())?;
    Ok(settings)
}

/// Values given on the command line; `None` keeps the config file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub history_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

pub fn build_config(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<ShrinkConfig> {
    let mut config = match config_file {
        Some(path) => ShrinkConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ShrinkConfig::default(),
    };
    if let Some(history_file) = overrides.history_file {
        config.history_file = history_file;
    }
    if let Some(log_dir) = overrides.log_dir {
        config.log_dir = log_dir;
    }
    Ok(config)
}

/// 130 when the user cancelled, 1 when any file failed, 0 otherwise.
pub fn exit_code(outcomes: &[RunOutcome]) -> i32 {
    if outcomes
        .iter()
        .any(|o| o.error_kind() == Some(ErrorKind::Cancelled))
    {
        INTERRUPTED_EXIT_CODE
    } else if outcomes.iter().any(|o| o.error_kind().is_some()) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrink_core::errors::ShrinkError;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_trim_path_quotes() {
        assert_eq!(trim_path_quotes("  \"/v/my trip.mp4\" "), PathBuf::from("/v/my trip.mp4"));
        assert_eq!(trim_path_quotes("'/v/a.mp4'"), PathBuf::from("/v/a.mp4"));
        assert_eq!(trim_path_quotes("/v/a.mp4"), PathBuf::from("/v/a.mp4"));
        // unbalanced quotes are left alone
        assert_eq!(trim_path_quotes("\"/v/a.mp4"), PathBuf::from("\"/v/a.mp4"));
    }

    #[test]
    fn test_resolve_inputs_mixes_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let clips = dir.path().join("clips");
        fs::create_dir(&clips).unwrap();
        fs::write(clips.join("b.mov"), b"").unwrap();
        fs::write(clips.join("a.mkv"), b"").unwrap();
        fs::write(clips.join("readme.md"), b"").unwrap();
        let single = dir.path().join("z.mp4");
        fs::write(&single, b"").unwrap();

        let files = resolve_inputs(&[single.clone(), clips.clone()], false).unwrap();
        assert_eq!(files, vec![single, clips.join("a.mkv"), clips.join("b.mov")]);
    }

    #[test]
    fn test_resolve_inputs_errors() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_inputs(&[dir.path().join("missing.mp4")], false).is_err());
        // directory without videos
        assert!(resolve_inputs(&[dir.path().to_path_buf()], false).is_err());
    }

    #[test]
    fn test_per_file_ordered_list() {
        let inputs = vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.mp4")];
        let settings = parse_per_file(
            r#"[{"target_size_mb": 20, "quality_mode": "balanced"}, null]"#,
            &inputs,
        )
        .unwrap();
        assert_eq!(settings.for_index(0).unwrap().target_size_mb, 20.0);
        assert!(settings.for_index(1).is_none());
    }

    #[test]
    fn test_per_file_keyed_by_name_or_path() {
        let inputs = vec![
            PathBuf::from("/v/a.mp4"),
            PathBuf::from("/v/b.mp4"),
            PathBuf::from("/v/c.mp4"),
        ];
        let settings = parse_per_file(
            r#"{"a.mp4": {"target_size_mb": 10}, "/v/c.mp4": {"target_size_mb": 5, "output_format": "webm"}}"#,
            &inputs,
        )
        .unwrap();
        assert_eq!(settings.for_index(0).unwrap().target_size_mb, 10.0);
        assert!(settings.for_index(1).is_none());
        assert_eq!(
            settings.for_index(2).unwrap().output_format,
            Some(OutputFormat::Webm)
        );
        assert!(parse_per_file("not json", &inputs).is_err());
    }

    #[test]
    fn test_per_file_shared_name_needs_full_paths() {
        let inputs = vec![PathBuf::from("/day1/clip.mp4"), PathBuf::from("/day2/clip.mp4")];

        let err = parse_per_file(r#"{"clip.mp4": {"target_size_mb": 10}}"#, &inputs).unwrap_err();
        assert!(err.to_string().contains("matches several inputs"));

        let settings = parse_per_file(
            r#"{"/day1/clip.mp4": {"target_size_mb": 10}, "/day2/clip.mp4": {"target_size_mb": 20}}"#,
            &inputs,
        )
        .unwrap();
        assert_eq!(settings.for_index(0).unwrap().target_size_mb, 10.0);
        assert_eq!(settings.for_index(1).unwrap().target_size_mb, 20.0);
    }

    #[test]
    fn test_build_settings() {
        let inputs = vec![PathBuf::from("a.mp4")];
        let uniform = build_settings(
            Some(25.0),
            QualityMode::VideoPriority,
            Some(OutputFormat::Mkv),
            None,
            &inputs,
        )
        .unwrap();
        assert_eq!(
            uniform,
            BatchSettings::Uniform(
                FileSettings::new(25.0, QualityMode::VideoPriority)
                    .with_format(Some(OutputFormat::Mkv))
            )
        );

        assert!(build_settings(None, QualityMode::default(), None, None, &inputs).is_err());
        assert!(build_settings(Some(-3.0), QualityMode::default(), None, None, &inputs).is_err());

        let dir = TempDir::new().unwrap();
        let per_file = dir.path().join("per_file.json");
        fs::write(&per_file, r#"[null, null]"#).unwrap();
        // two entries for one input
        assert!(build_settings(None, QualityMode::default(), None, Some(&per_file), &inputs).is_err());
    }

    #[test]
    fn test_build_config_overrides() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.json");
        fs::write(&file, r#"{"history_file": "/from/file.log", "log_dir": "/from/logs"}"#).unwrap();

        let config = build_config(
            Some(&file),
            ConfigOverrides {
                history_file: Some(PathBuf::from("/from/cli.log")),
                log_dir: None,
            },
        )
        .unwrap();
        assert_eq!(config.history_file, PathBuf::from("/from/cli.log"));
        assert_eq!(config.log_dir, PathBuf::from("/from/logs"));

        assert!(build_config(Some(&dir.path().join("missing.json")), ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_exit_code() {
        let ok = RunOutcome::skipped(Path::new("a.mp4"), "skipped by per-file settings");
        let failed = RunOutcome::failed(
            Path::new("b.mp4"),
            None,
            &ShrinkError::probe("b.mp4", "unreadable"),
            Duration::ZERO,
        );
        let cancelled = RunOutcome::failed(Path::new("c.mp4"), None, &ShrinkError::Cancelled, Duration::ZERO);

        assert_eq!(exit_code(&[ok.clone()]), 0);
        assert_eq!(exit_code(&[ok.clone(), failed.clone()]), 1);
        assert_eq!(exit_code(&[failed, cancelled]), 130);
        assert_eq!(exit_code(&[]), 0);
    }
}
