//! Destination trait for log output targets

use super::{error::Result, log_level::LogLevel, record::LogRecord};

/// One configured output target for log records
///
/// Destinations are shared by every thread that logs through the owning
/// logger, so all methods take `&self`. Implementations serialize access to
/// their own sink: a single `emit` call must reach the sink as one unit.
///
/// # Example
///
/// ```
/// use rust_fanout_logger::core::{Destination, LogLevel, LogRecord, Result};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counting(AtomicUsize);
///
/// impl Destination for Counting {
///     fn name(&self) -> &str {
///         "counting"
///     }
///
///     fn min_level(&self) -> LogLevel {
///         LogLevel::Debug
///     }
///
///     fn emit(&self, _record: &LogRecord) -> Result<()> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
///
///     fn flush(&self) -> Result<()> {
///         Ok(())
///     }
///
///     fn release(&self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    /// Lowest level this destination was configured for
    fn min_level(&self) -> LogLevel;

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    /// Hand one record to the sink
    ///
    /// Errors are reserved for sink failures. Encoding problems are absorbed.
    fn emit(&self, record: &LogRecord) -> Result<()>;

    /// Drain anything buffered
    fn flush(&self) -> Result<()>;

    /// Free owned resources; a second call must be a no-op
    fn release(&self) -> Result<()>;
}
