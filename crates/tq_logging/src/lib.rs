#![deny(missing_docs)]
//! Shared logging utilities for the transcode queue workspace.
//!
//! This crate provides the `tq_*` logging macros used across the codebase,
//! the sink that re-emits server-side log lines through the global logger,
//! and a minimal test initializer.

/// Log target used for lines that originate on the conversion server.
pub const SERVER_LOG_TARGET: &str = "server";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! tq_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! tq_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! tq_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! tq_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! tq_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Maps a server level label (`info`, `warning`, `error`, ...) onto a log level.
///
/// Unknown or missing labels fall back to `Info`.
pub fn server_level(label: Option<&str>) -> log::Level {
    match label.map(str::trim) {
        Some(l) if l.eq_ignore_ascii_case("error") => log::Level::Error,
        Some(l) if l.eq_ignore_ascii_case("warning") || l.eq_ignore_ascii_case("warn") => {
            log::Level::Warn
        }
        Some(l) if l.eq_ignore_ascii_case("debug") => log::Level::Debug,
        Some(l) if l.eq_ignore_ascii_case("trace") => log::Level::Trace,
        _ => log::Level::Info,
    }
}

/// Re-emits a server log line under [`SERVER_LOG_TARGET`].
///
/// Empty messages are dropped; returns whether the line was emitted.
pub fn forward_server_log(label: Option<&str>, message: &str) -> bool {
    let message = message.trim_end();
    if message.is_empty() {
        return false;
    }
    log::log!(target: SERVER_LOG_TARGET, server_level(label), "{}", message);
    true
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_levels_map_to_log_levels() {
        assert_eq!(server_level(Some("error")), log::Level::Error);
        assert_eq!(server_level(Some("warning")), log::Level::Warn);
        assert_eq!(server_level(Some("WARN")), log::Level::Warn);
        assert_eq!(server_level(Some("debug")), log::Level::Debug);
        assert_eq!(server_level(Some("info")), log::Level::Info);
        assert_eq!(server_level(Some("chatty")), log::Level::Info);
        assert_eq!(server_level(None), log::Level::Info);
    }

    #[test]
    fn empty_server_lines_are_dropped() {
        initialize_for_tests();
        assert!(!forward_server_log(Some("info"), ""));
        assert!(!forward_server_log(None, "   \n"));
        assert!(forward_server_log(Some("warning"), "Task cancelled: 42"));
    }
}
