//! Cancellation
//!
//! A [`CancelToken`] is a shared flag polled by the encode pipeline between
//! progress lines. [`install_ctrlc_handler`] wires it to Ctrl+C; a second
//! Ctrl+C while a cancellation is already pending exits immediately with 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when the user interrupts twice.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next file can run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Set the flag, returning whether it was already set.
    fn cancel_again(&self) -> bool {
        self.flag.swap(true, Ordering::SeqCst)
    }
}

/// Route Ctrl+C to `token`. Can only be installed once per process.
pub fn install_ctrlc_handler(token: &CancelToken) -> Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        if token.cancel_again() {
            eprintln!("\nInterrupted again, exiting.");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        eprintln!("\nCancelling after the current step... (Ctrl+C again to force quit)");
    })
}
