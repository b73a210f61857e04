//! Logging setup for the collective engine.
//!
//! The library itself only emits records through the `log` facade. Binaries
//! and tests call [`init_logging`] to install an `env_logger` backend.

use log::LevelFilter;
use std::sync::Once;

/// Logging levels keyed by integer verbosity.
/// Higher values indicate more verbose logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Only unrecoverable errors
    Fatal = -1,
    /// Warnings and errors
    Warning = 0,
    /// General information messages
    Info = 1,
    /// Per-round ring traces
    Debug = 2,
}

impl From<i32> for LogLevel {
    fn from(verbosity: i32) -> Self {
        match verbosity {
            i if i < 0 => LogLevel::Fatal,
            0 => LogLevel::Warning,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl LogLevel {
    /// Matching `log` level filter.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Fatal => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

static LOGGER_INIT: Once = Once::new();

/// Install an `env_logger` backend filtered at `verbosity`.
///
/// `RUST_LOG`, when set, takes precedence over `verbosity`. Only the first
/// call installs a logger; later calls just adjust the global max level.
pub fn init_logging(verbosity: i32) {
    let level = LogLevel::from(verbosity).to_level_filter();
    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        // A logger installed elsewhere (e.g. by a host application) wins.
        let _ = builder.try_init();
    });
    if std::env::var("RUST_LOG").is_err() {
        log::set_max_level(level);
    }
}
