//! Logging facade over `tracing`.
//!
//! Call sites use the small function API (`logging::info(...)`) so message
//! formatting stays at the caller and verbosity is decided in one place.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static INIT: Once = Once::new();

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_FILTER_ENV: &str = "VECTOR_WAVE_LOG";

/// Install the stderr subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    set_verbose(verbose);
    INIT.call_once(|| {
        let default = if verbose { "info" } else { "warn" };
        let filter =
            EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default));
        // Another subscriber may already be installed (tests, embedding apps).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

#[must_use]
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!("{}", message.as_ref());
}

/// Informational messages are only emitted in verbose mode.
pub fn info(message: impl AsRef<str>) {
    if is_verbose() {
        tracing::info!("{}", message.as_ref());
    }
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    tracing::error!("{}", message.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(false);
        init(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }
}
