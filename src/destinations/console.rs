//! Console destination

use crate::core::{Destination, Encoder, LogLevel, LogRecord, LoggerError, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Name reported by the stdout destination
pub const CONSOLE_DESTINATION: &str = "stdout";

/// Writes encoded records to standard output
///
/// The stream is shared with the rest of the process and is never closed.
///
/// # Example
///
/// ```
/// use rust_fanout_logger::destinations::ConsoleDestination;
/// use rust_fanout_logger::core::{Encoder, LogLevel};
///
/// let destination = ConsoleDestination::new()
///     .with_encoder(Encoder::console().with_colors(true))
///     .with_min_level(LogLevel::Info);
/// ```
pub struct ConsoleDestination {
    encoder: Encoder,
    min_level: LogLevel,
    released: AtomicBool,
}

impl ConsoleDestination {
    pub fn new() -> Self {
        Self {
            encoder: Encoder::json(),
            min_level: LogLevel::Debug,
            released: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn encoder(&self) -> Encoder {
        self.encoder
    }
}

impl Default for ConsoleDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for ConsoleDestination {
    fn name(&self) -> &str {
        CONSOLE_DESTINATION
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(LoggerError::Released(self.name().to_string()));
        }

        let line = self.encoder.encode(record);
        // The stdout lock keeps one record in one piece
        let mut out = std::io::stdout().lock();
        out.write_all(&line)
            .map_err(|e| LoggerError::io_operation("writing to stdout", "write failed", e))
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout()
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing stdout", "flush failed", e))
    }

    fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::Release);
        Ok(())
    }
}
