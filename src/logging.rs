use log::{error, info, log_enabled, warn, Level, LevelFilter};
use std::str::FromStr;

/// Initializes the logger with the `env_logger` crate.
///
/// The level comes from `RUST_LOG`, e.g. `RUST_LOG=mwcan_rs=debug` to see every
/// frame on the bus.
pub fn init_logger() {
    env_logger::init();
}

/// Initializes the logger with a fixed default level.
///
/// `RUST_LOG` still wins when set. Calling this twice is harmless.
///
/// # Examples
/// ```rust
/// use log::LevelFilter;
/// use mwcan_rs::logging::init_logger_with_level;
///
/// init_logger_with_level(LevelFilter::Info);
/// log::info!("Session starting");
/// ```
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .try_init();
}

/// Maps the numeric levels of the classic Python-style logging configuration
/// (50 critical ... 10 debug, 0 unset) onto `log` filters.
pub fn level_from_number(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Trace,
        1..=10 => LevelFilter::Debug,
        11..=20 => LevelFilter::Info,
        21..=30 => LevelFilter::Warn,
        _ => LevelFilter::Error,
    }
}

/// Parses a level given either by name (`"debug"`) or by its numeric value
/// (`"10"`), as accepted on the command line.
pub fn parse_level(text: &str) -> Result<LevelFilter, String> {
    let text = text.trim();
    match text.parse::<u8>() {
        Ok(number) => Ok(level_from_number(number)),
        Err(_) => LevelFilter::from_str(text).map_err(|_| format!("unknown log level '{text}'")),
    }
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
