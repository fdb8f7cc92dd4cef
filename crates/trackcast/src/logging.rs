//! Logging setup for trackcast.
//!
//! Installs a `tracing` subscriber whose default filter covers this crate and
//! keeps the HTTP stack quiet unless tracing everything.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above; shows per-track staleness decisions and store trims.
    Verbose,
    /// Everything, including the HTTP client's own spans.
    Trace,
}

impl Verbosity {
    /// Derive verbosity from the `-q` flag and the number of `-v` flags.
    ///
    /// `quiet` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// The tracing level this verbosity enables for trackcast itself.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_directives(&self) -> String {
        let own = self.level();
        let http = if *self == Self::Trace {
            Level::TRACE
        } else {
            Level::WARN
        };
        format!("trackcast={own},reqwest={http},hyper={http}")
    }
}

/// Initialize the logging system.
///
/// Call once at startup. `RUST_LOG` overrides the verbosity-derived filter.
///
/// ```no_run
/// use trackcast::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(verbosity != Verbosity::Normal)
            .with_writer(std::io::stderr),
    );

    // A subscriber may already be installed (tests, embedding apps)
    let _ = subscriber.try_init();
}

/// Route warnings from tests through the test writer.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("trackcast=warn")
        .with_test_writer()
        .try_init();
}
