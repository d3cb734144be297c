//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. The message is only
//! formatted when the level passes the logger's threshold, and the module path
//! of the call site is recorded as the caller function.
//!
//! # Examples
//!
//! ```
//! use rust_fanout_logger::prelude::*;
//! use rust_fanout_logger::info;
//!
//! let logger = Logger::builder().with_stdout("console").build().unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a formatted message at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_stdout("json").build().unwrap();
/// use rust_fanout_logger::log;
/// log!(logger, LogLevel::Info, "fan-out ready");
/// log!(logger, LogLevel::Error, "{} destinations failed", 2);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_fmt($level, format_args!($($arg)+), Some(module_path!()))
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_level(LogLevel::Debug).with_stdout("json").build().unwrap();
/// use rust_fanout_logger::debug;
/// debug!(logger, "record encoded");
/// debug!(logger, "backup {} compressed", 1);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_stdout("json").build().unwrap();
/// use rust_fanout_logger::info;
/// info!(logger, "logger configured");
/// info!(logger, "opened {} destinations", 3);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_stdout("json").build().unwrap();
/// use rust_fanout_logger::warn;
/// warn!(logger, "rotation skipped");
/// warn!(logger, "destination {} flushed late by {}ms", "file", 40);
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_stdout("json").build().unwrap();
/// use rust_fanout_logger::error;
/// error!(logger, "agent connection refused");
/// error!(logger, "write to {} failed: {}", "gcp", "timeout");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message, then run the logger's exit handler.
///
/// # Examples
///
/// ```no_run
/// # use rust_fanout_logger::prelude::*;
/// # let logger = Logger::builder().with_stdout("json").build().unwrap();
/// use rust_fanout_logger::fatal;
/// fatal!(logger, "cannot open log directory {}", "/var/log/app");
/// ```
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
