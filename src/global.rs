//! sde-profile global module.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enables or disables reporting of stage progress.
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::Relaxed);
}

/// Returns true if stage progress should be reported.
pub fn verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Logs a stage progress message at `info` level when `--verbose` is on.
macro_rules! progress {
    ($($arg:tt)+) => {
        if $crate::global::verbose() {
            tracing::info!($($arg)+)
        }
    };
}

pub(crate) use progress;
