//! FFmpeg process management
//!
//! Encoder progress is read from stdout (`-progress pipe:1`) while stderr is
//! drained on its own thread. Reading only one of two piped streams
//! deadlocks as soon as the other fills its pipe buffer (~64KB), and ffmpeg
//! is chatty on stderr.
//!
//! ```ignore
//! let mut process = FfmpegProcess::spawn(&mut cmd)?;
//! while let Some(line) = process.next_line() {
//!     // feed a ProgressMonitor
//! }
//! let (status, stderr) = process.wait_with_output()?;
//! ```

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Lines};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a terminated encoder gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_thread: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawn `cmd` with both output streams piped and stderr drained in the background.
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        info!(command = ?cmd, "Executing FFmpeg command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn FFmpeg process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());

        Ok(Self {
            child,
            stdout,
            stderr_thread: Some(stderr_thread),
        })
    }

    /// Next stdout line; `None` once the encoder closed its output.
    pub fn next_line(&mut self) -> Option<String> {
        let line = self.stdout.as_mut()?.next();
        match line {
            Some(Ok(line)) => Some(line),
            Some(Err(e)) => {
                debug!(error = %e, "FFmpeg stdout read failed");
                self.stdout = None;
                None
            }
            None => {
                self.stdout = None;
                None
            }
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Ask the encoder to stop (SIGTERM on unix), killing it if it lingers.
    pub fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            // SAFETY: the pid belongs to our own un-reaped child
            let rc = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!(pid = self.child.id(), "SIGTERM failed, killing FFmpeg");
                return self.kill();
            }

            let deadline = Instant::now() + TERMINATE_GRACE;
            while Instant::now() < deadline {
                if self.child.try_wait()?.is_some() {
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(50));
            }
            warn!(pid = self.child.id(), "FFmpeg ignored SIGTERM, killing");
        }

        self.kill()
    }

    pub fn kill(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // already exited
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e).context("Failed to kill FFmpeg process"),
        }
    }

    /// Wait for exit and collect everything written to stderr.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String)> {
        // close our end so a blocked writer cannot hold up the wait
        self.stdout = None;
        let status = self.child.wait().context("Failed to wait for FFmpeg")?;
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();

        if status.success() {
            debug!(exit_code = status.code(), "FFmpeg process completed");
        } else {
            debug!(exit_code = status.code(), "FFmpeg process exited with failure");
        }

        Ok((status, stderr))
    }
}

// ═══════════════════════════════════════════════════════════════
// Error extraction
// ═══════════════════════════════════════════════════════════════

/// Status and progress chatter that never explains a failure.
fn is_progress_noise(line: &str) -> bool {
    const PREFIXES: &[&str] = &["frame=", "fps=", "size=", "out_time", "progress=", "bitrate=", "speed="];
    PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Most meaningful line of an ffmpeg stderr dump: the last line mentioning an
/// error, else the last line that is not progress output.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    let meaningful = || {
        stderr
            .lines()
            .rev()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !is_progress_noise(l))
    };

    meaningful()
        .find(|l| l.to_ascii_lowercase().contains("error"))
        .or_else(|| meaningful().next())
        .unwrap_or("Unknown FFmpeg error")
        .to_string()
}

/// Actionable hint for well-known ffmpeg failure patterns.
pub fn get_error_suggestion(stderr: &str) -> Option<&'static str> {
    const PATTERNS: &[(&str, &str)] = &[
        ("No such file or directory", "check that the input path is correct"),
        ("Invalid data found", "the input file may be corrupt"),
        ("Unknown encoder", "install an ffmpeg build with the required encoder"),
        ("Encoder not found", "install an ffmpeg build with the required encoder"),
        ("Permission denied", "check read/write permissions on the input and output folder"),
        ("No space left on device", "free some disk space and retry"),
        ("Output file is empty", "the target may be too small for this video"),
        ("moov atom not found", "the MP4 file is incomplete; re-download or remux it"),
        ("Too many packets buffered", "the source has broken timestamps; remux it first"),
        ("Could not write header", "the chosen container may not support these codecs"),
    ];

    PATTERNS
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| *suggestion)
}

/// One-line failure description with the suggestion appended when known.
pub fn describe_failure(stderr: &str) -> String {
    let message = format_ffmpeg_error(stderr);
    match get_error_suggestion(stderr) {
        Some(hint) => format!("{} (hint: {})", message, hint),
        None => message,
    }
}
