//! Generic logger utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Records go to stdout and to the session's log file, each tagged with the last segment of
/// its target module so that `nav_lib::nav_ctrl::state` reads as `state`. Debug and trace
/// records carry the full target.
///
/// # Notes
///
/// - `min_level` must be at least `log::Level::Info`, per-tick diagnostics are logged at info
///   and must not be filtered out.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let target = match record.level() > log::Level::Info {
                true => record.target(),
                false => short_target(record.target()),
            };

            out.finish(format_args!(
                "{:>10.3}s {} {:<12} {}",
                session::get_elapsed_seconds(),
                level_to_str(record.level()),
                target,
                message
            ))
        })
        .level(min_level)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!(
        "Logging at {} to {:?}, session epoch {:?}",
        min_level,
        session.log_file_path,
        session::get_epoch()
    );

    Ok(())
}

/// Parse a log level name as given on the command line (`info`, `debug`, `trace`, ...).
pub fn parse_level(s: &str) -> Option<LevelFilter> {
    s.parse().ok()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Coloured level tag
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "trace".dimmed(),
        log::Level::Debug => "debug".dimmed(),
        log::Level::Info  => " info".green(),
        log::Level::Warn  => " warn".yellow().bold(),
        log::Level::Error => "error".red().bold()
    }
}

/// Last `::` separated segment of a log target.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}
