//! External tool discovery
//!
//! ffmpeg and ffprobe must be reachable before anything is encoded. Paths
//! may be bare names (looked up on PATH) or explicit locations from the
//! config file.

use crate::logging::run_tool;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub requested: PathBuf,
    pub resolved: Option<PathBuf>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

pub fn locate(name: &'static str, requested: &Path) -> ToolStatus {
    ToolStatus {
        name,
        requested: requested.to_path_buf(),
        resolved: which::which(requested).ok(),
    }
}

/// Status of ffmpeg and ffprobe, in that order.
pub fn check_tools(ffmpeg: &Path, ffprobe: &Path) -> [ToolStatus; 2] {
    [locate("ffmpeg", ffmpeg), locate("ffprobe", ffprobe)]
}

/// First line of `<tool> -version`, e.g. `ffmpeg version 6.1.1 ...`.
pub fn tool_version(tool: &Path) -> Option<String> {
    let result = run_tool(tool, &["-version".to_string()]).ok()?;
    if !result.success() {
        return None;
    }
    result
        .stdout
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// How to install ffmpeg on `os` (values of `std::env::consts::OS`).
pub fn install_instructions_for(os: &str) -> &'static str {
    match os {
        "macos" => "Install it with Homebrew:\n  brew install ffmpeg",
        "windows" => {
            "Install it with one of:\n\
             \n\
             Chocolatey (recommended)\n  choco install ffmpeg\n\
             \n\
             Scoop\n  scoop install ffmpeg\n\
             \n\
             Manual\n  \
             1. Download ffmpeg-release-essentials.zip from https://www.gyan.dev/ffmpeg/builds/\n  \
             2. Extract it to C:\\ffmpeg\n  \
             3. Add C:\\ffmpeg\\bin to the PATH environment variable"
        }
        _ => {
            "Install it with your package manager:\n\
             \n\
             Ubuntu/Debian\n  sudo apt update && sudo apt install ffmpeg\n\
             \n\
             Fedora\n  sudo dnf install ffmpeg\n\
             \n\
             Arch\n  sudo pacman -S ffmpeg"
        }
    }
}

pub fn install_instructions() -> &'static str {
    install_instructions_for(std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_reported() {
        let [ffmpeg, ffprobe] = check_tools(
            Path::new("/nonexistent/ffmpeg-xyz"),
            Path::new("definitely-not-a-real-ffprobe-xyz"),
        );
        assert_eq!(ffmpeg.name, "ffmpeg");
        assert!(!ffmpeg.is_available());
        assert!(!ffprobe.is_available());
        assert_eq!(ffprobe.requested, PathBuf::from("definitely-not-a-real-ffprobe-xyz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_on_path_is_found() {
        let status = locate("sh", Path::new("sh"));
        assert!(status.is_available());
    }

    #[test]
    fn test_version_of_missing_tool() {
        assert!(tool_version(Path::new("/nonexistent/ffmpeg-xyz")).is_none());
    }

    #[test]
    fn test_install_instructions_per_platform() {
        assert!(install_instructions_for("macos").contains("brew install ffmpeg"));
        assert!(install_instructions_for("windows").contains("choco install ffmpeg"));
        assert!(install_instructions_for("windows").contains("scoop install ffmpeg"));
        assert!(install_instructions_for("linux").contains("apt install ffmpeg"));
        assert!(install_instructions_for("freebsd").contains("pacman"));
        assert!(!install_instructions().is_empty());
    }
}
