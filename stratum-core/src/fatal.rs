//! Invariant violations.
//!
//! A broken scheduling invariant means the chunk system can no longer be
//! trusted, so it stops the thread. With pausing enabled the thread parks
//! forever instead, leaving the process alive for a debugger.

use std::env;
use std::thread;
use std::time::Duration;

/// Set to any value to pause on invariant violations regardless of config.
pub const PAUSE_ENV: &str = "STRATUM_PAUSE_ON_FATAL";

#[must_use]
pub fn pause_requested(configured: bool) -> bool {
    configured || env::var_os(PAUSE_ENV).is_some()
}

/// Logs `message` and never returns.
#[cold]
pub fn fatal_invariant(pause_on_fatal: bool, message: &str) -> ! {
    log::error!("Invariant violated: {message}");
    if pause_requested(pause_on_fatal) {
        log::error!(
            "Pausing {:?} for a debugger to attach",
            thread::current().name().unwrap_or("<unnamed>")
        );
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
    panic!("{message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "holder missing")]
    fn panics_without_pause() {
        fatal_invariant(false, "holder missing at [0, 0]");
    }
}
