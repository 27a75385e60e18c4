//! Logger initialisation
//!
//! Log lines are written both to stdout, with coloured level tags, and to the session's log file
//! without colour codes. Each line is stamped with the seconds elapsed since the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::Colorize;
use log::{info, Level};
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
    #[error("The minimum log level must be INFO or more verbose, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

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
/// `min_level` must be `Info` or more verbose, so that operator prompts are never hidden.
///
/// This may only be called once per process, later calls fail with `FernInitError`.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let stdout = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!(
            "{}",
            format_line(record.level(), record.target(), message, true)
        )))
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!(
            "{}",
            format_line(record.level(), record.target(), message, false)
        )))
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .level_for("zmq", LevelFilter::Info)
        .chain(stdout)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Format a single log line.
///
/// The target is only included for debug and trace messages.
fn format_line(
    level: Level,
    target: &str,
    message: &std::fmt::Arguments,
    coloured: bool
) -> String {
    let tag = if coloured {
        level_tag_coloured(level)
    }
    else {
        level_tag(level).to_string()
    };

    let elapsed = session::get_elapsed_seconds();

    match level > Level::Info {
        true => format!("[{:10.6} {}] {}: {}", elapsed, tag, target, message),
        false => format!("[{:10.6} {}] {}", elapsed, tag, message)
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

fn level_tag_coloured(level: Level) -> String {
    let tag = level_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold()
    }.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line(Level::Info, "nav_lib::runner", &format_args!("hello"), false);
        assert!(line.ends_with(" INF] hello"), "{}", line);

        let line = format_line(Level::Debug, "nav_lib::runner", &format_args!("hello"), false);
        assert!(line.ends_with(" DBG] nav_lib::runner: hello"), "{}", line);
    }

    #[test]
    fn test_plain_tags_have_no_escapes() {
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error].iter() {
            assert!(!level_tag(*level).contains('\u{1b}'));
        }
    }
}
