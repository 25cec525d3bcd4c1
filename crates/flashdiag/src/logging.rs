//! Logging setup for flashdiag.
//!
//! Initializes the tracing subscriber used by the diagnostics pipeline.
//! Embedding applications that already install their own subscriber can
//! skip this entirely; the crate only emits `tracing` events.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// The tracing level this verbosity maps to.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Initialize the logging system.
///
/// Call once at application startup. `RUST_LOG` takes precedence over the
/// `verbosity` parameter when set. Repeated calls are harmless; only the
/// first installs a subscriber.
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("flashdiag={}", verbosity.level());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}

/// Initialize logging for tests: warnings and errors only, routed through
/// the test writer so output stays attached to the owning test.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
