//! Destination over a caller-supplied byte sink

use crate::core::{Destination, Encoder, LogLevel, LogRecord, LoggerError, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writes encoded records to any `Write` implementation
///
/// The sink belongs to the caller: release stops further writes but does not
/// close it. Each record reaches the sink through a single `write_all` call.
pub struct WriterDestination {
    name: String,
    sink: Mutex<Box<dyn Write + Send>>,
    encoder: Encoder,
    min_level: LogLevel,
    released: AtomicBool,
}

impl WriterDestination {
    pub fn new<W: Write + Send + 'static>(sink: W, encoder: Encoder) -> Self {
        Self {
            name: "writer".to_string(),
            sink: Mutex::new(Box::new(sink)),
            encoder,
            min_level: LogLevel::Debug,
            released: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }
}

impl Destination for WriterDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(LoggerError::Released(self.name.clone()));
        }

        let line = self.encoder.encode(record);
        self.sink
            .lock()
            .write_all(&line)
            .map_err(|e| LoggerError::io_operation("writing log record", self.name.clone(), e))
    }

    fn flush(&self) -> Result<()> {
        self.sink
            .lock()
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing writer", self.name.clone(), e))
    }

    fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::Release);
        Ok(())
    }
}

/// In-memory sink that can be cloned and inspected while a logger writes to it
///
/// # Example
///
/// ```
/// use rust_fanout_logger::destinations::SharedBuffer;
/// use std::io::Write;
///
/// let buffer = SharedBuffer::new();
/// let mut handle = buffer.clone();
/// handle.write_all(b"one\ntwo\n").unwrap();
///
/// assert_eq!(buffer.lines(), vec!["one", "two"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Field;

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }
    }

    #[test]
    fn test_writer_emits_one_line_per_record() {
        let buffer = SharedBuffer::new();
        let destination = WriterDestination::new(buffer.clone(), Encoder::json());

        destination
            .emit(&LogRecord::new(LogLevel::Info, "first").with_fields([Field::int("n", 1)]))
            .unwrap();
        destination
            .emit(&LogRecord::new(LogLevel::Warn, "second"))
            .unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""msg":"first""#));
        assert!(lines[0].contains(r#""n":1"#));
        assert!(lines[1].contains(r#""level":"warn""#));
    }

    #[test]
    fn test_writer_sink_error_propagates() {
        let destination = WriterDestination::new(FailingSink, Encoder::json());
        let err = destination
            .emit(&LogRecord::new(LogLevel::Info, "lost"))
            .unwrap_err();

        assert_eq!(err.io_source().map(|e| e.kind()), Some(io::ErrorKind::BrokenPipe));
        assert!(destination.flush().is_err());
    }

    #[test]
    fn test_release_does_not_close_sink() {
        let buffer = SharedBuffer::new();
        let destination = WriterDestination::new(buffer.clone(), Encoder::console()).with_name("buf");

        destination.emit(&LogRecord::new(LogLevel::Info, "kept")).unwrap();
        destination.release().unwrap();
        destination.release().unwrap();

        assert!(matches!(
            destination.emit(&LogRecord::new(LogLevel::Info, "dropped")),
            Err(LoggerError::Released(ref name)) if name == "buf"
        ));

        // The caller can still use the sink
        let mut handle = buffer.clone();
        handle.write_all(b"after\n").unwrap();
        assert_eq!(buffer.lines().len(), 2);
    }
}
