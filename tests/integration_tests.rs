//! Integration tests for the fan-out logger
//!
//! These tests verify:
//! - Log injection prevention
//! - Delivery to every destination, in order, for any number of them
//! - Atomic construction and exactly-once teardown
//! - Configuration errors before any resource is touched
//! - Field rendering across encoders and destinations

use parking_lot::Mutex;
use rust_fanout_logger::core::{
    Destination, DestinationSpec, Encoder, Field, LogLevel, LogRecord, Logger, LoggerConfig,
    LoggerError, Result,
};
use rust_fanout_logger::destinations::{
    CloudConnector, CloudLogClient, CloudLogEntry, Severity, SharedBuffer, CONSOLE_DESTINATION,
};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Counters {
    emitted: AtomicUsize,
    flushed: AtomicUsize,
    released: AtomicUsize,
}

/// Destination that counts calls and can be told to fail
struct CountingDestination {
    name: &'static str,
    counters: Arc<Counters>,
    emit_error: bool,
    flush_error: Option<i32>,
}

impl CountingDestination {
    fn new(counters: Arc<Counters>) -> Self {
        Self {
            name: "counting",
            counters,
            emit_error: false,
            flush_error: None,
        }
    }
}

impl Destination for CountingDestination {
    fn name(&self) -> &str {
        self.name
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn emit(&self, _record: &LogRecord) -> Result<()> {
        self.counters.emitted.fetch_add(1, Ordering::SeqCst);
        if self.emit_error {
            return Err(LoggerError::writer("emit refused"));
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.counters.flushed.fetch_add(1, Ordering::SeqCst);
        match self.flush_error {
            Some(code) => Err(io::Error::from_raw_os_error(code).into()),
            None => Ok(()),
        }
    }

    fn release(&self) -> Result<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn counting_spec(counters: &Arc<Counters>) -> DestinationSpec {
    let counters = Arc::clone(counters);
    DestinationSpec::custom("counting", move |_| {
        Ok(Box::new(CountingDestination::new(Arc::clone(&counters))) as Box<dyn Destination>)
    })
}

#[derive(Default)]
struct CloudRecorder {
    entries: Mutex<Vec<CloudLogEntry>>,
    closed: AtomicUsize,
}

struct RecorderClient(Arc<CloudRecorder>);

impl CloudLogClient for RecorderClient {
    fn write(&mut self, entry: CloudLogEntry) -> Result<()> {
        self.0.entries.lock().push(entry);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.0.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RecorderConnector(Arc<CloudRecorder>);

impl CloudConnector for RecorderConnector {
    fn connect(&self, _project_id: &str, _log_name: &str) -> Result<Box<dyn CloudLogClient>> {
        Ok(Box::new(RecorderClient(Arc::clone(&self.0))))
    }
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection_test.log");

    let logger = Logger::builder()
        .with_file(&log_file, 0, 0, 0, false)
        .build()
        .expect("Failed to build logger");

    let malicious_message = "User login\nERROR [2024-10-17] Fake error injected\nINFO Continuation";
    logger.info(malicious_message, &[]);
    logger.close().expect("Failed to close");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("\\n"));
    assert!(!content.contains("\nERROR [2024-10-17] Fake error injected\n"));

    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1, "Log should be a single line, not multiple");
}

#[test]
fn test_fan_out_reaches_every_destination() {
    for n in 0..=4 {
        let counters: Vec<Arc<Counters>> = (0..n).map(|_| Arc::new(Counters::default())).collect();
        let config = counters
            .iter()
            .fold(LoggerConfig::new(LogLevel::Info), |config, c| {
                config.with_destination(counting_spec(c))
            });

        let logger = match Logger::from_config(&config) {
            Ok(logger) => logger,
            Err(LoggerError::NoDestinations) if n == 0 => continue,
            Err(e) => panic!("unexpected error for {} destinations: {}", n, e),
        };
        assert_eq!(logger.destination_count(), n);

        logger.info("one", &[]);
        logger.warn("two", &[]);
        logger.debug("filtered", &[]);
        logger.close().unwrap();

        for c in &counters {
            assert_eq!(c.emitted.load(Ordering::SeqCst), 2);
            assert_eq!(c.released.load(Ordering::SeqCst), 1);
        }
    }
}

#[test]
fn test_same_record_in_every_kind_of_destination() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("app.log");
    let buffer = SharedBuffer::new();
    let recorder = Arc::new(CloudRecorder::default());

    let logger = Logger::builder()
        .with_writer(buffer.clone(), Encoder::console())
        .with_file(&log_file, 1, 2, 0, false)
        .with_cloud_connector("demo", "app", Arc::new(RecorderConnector(Arc::clone(&recorder))))
        .build()
        .unwrap();

    logger.warn("cache miss", &[Field::string("key", "user:1")]);
    logger.close().unwrap();

    let console = buffer.contents();
    assert!(console.contains("WARN\t"));
    assert!(console.contains("cache miss"));

    let file_line: serde_json::Value =
        serde_json::from_str(fs::read_to_string(&log_file).unwrap().trim_end()).unwrap();
    assert_eq!(file_line["msg"], "cache miss");
    assert_eq!(file_line["key"], "user:1");

    let entries = recorder.entries.lock();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Warning);
    assert_eq!(entries[0].message(), Some("cache miss"));
    assert_eq!(entries[0].json_payload["key"], "user:1");
    assert!(entries[0].json_payload.contains_key("source_file"));
    assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_partial_construction_releases_opened_destinations() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("first.log");
    // A regular file where a directory is expected
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let third_opened = Arc::new(AtomicUsize::new(0));
    let opener_calls_seen = Arc::clone(&third_opened);

    let result = Logger::builder()
        .with_file(&log_file, 0, 0, 0, false)
        .with_file(blocker.join("second.log"), 0, 0, 0, false)
        .with_destination("third", move |_| {
            opener_calls_seen.fetch_add(1, Ordering::SeqCst);
            Err(LoggerError::other("third destination must not be opened"))
        })
        .build();

    match result {
        Err(LoggerError::DestinationInit { kind, .. }) => assert_eq!(kind, "file"),
        other => panic!("expected DestinationInit, got {:?}", other.map(|_| ())),
    }
    assert_eq!(third_opened.load(Ordering::SeqCst), 0);

    // The first file was opened, then released: its handle is closed and
    // nothing was written through it
    assert!(log_file.exists());
    assert_eq!(fs::metadata(&log_file).unwrap().len(), 0);
    fs::remove_file(&log_file).expect("released file must be removable");
}

#[test]
fn test_partial_construction_releases_custom_destinations() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let first = Arc::new(Counters::default());
    let result = Logger::builder()
        .with_spec(counting_spec(&first))
        .with_file(blocker.join("app.log"), 0, 0, 0, false)
        .build();

    assert!(matches!(result, Err(LoggerError::DestinationInit { .. })));
    assert_eq!(first.released.load(Ordering::SeqCst), 1);
    assert_eq!(first.emitted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_configuration_errors_open_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("logs").join("app.log");

    let opened = Arc::new(AtomicUsize::new(0));
    let opener_calls_seen = Arc::clone(&opened);
    let result = Logger::builder()
        .with_destination("unopened", move |_| {
            opener_calls_seen.fetch_add(1, Ordering::SeqCst);
            Err(LoggerError::other("should not be opened"))
        })
        .with_file(&log_file, 10, -3, 0, false)
        .build();

    let err = result.err().expect("negative backups must fail");
    assert!(err.is_configuration());
    assert!(err
        .to_string()
        .contains("rotation parameters must be non-negative"));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
    assert!(!log_file.parent().unwrap().exists());
}

#[test]
fn test_unsupported_encoder_rejected() {
    let err = Logger::builder().with_stdout("xml").build().err().unwrap();
    assert!(matches!(err, LoggerError::UnsupportedEncoder { .. }));
    assert!(err.to_string().contains("unsupported encoder type"));
}

#[test]
fn test_close_and_drop_release_once() {
    let counters = Arc::new(Counters::default());
    let logger = Logger::builder()
        .with_spec(counting_spec(&counters))
        .build()
        .unwrap();

    logger.info("hello", &[]);
    logger.close().unwrap();
    logger.close().unwrap();
    drop(logger);

    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    assert_eq!(counters.flushed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_closes_logger() {
    let counters = Arc::new(Counters::default());
    {
        let logger = Logger::builder()
            .with_spec(counting_spec(&counters))
            .build()
            .unwrap();
        logger.info("scoped", &[]);
    }
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_emit_failure_isolated_and_reported_on_flush() {
    let failing = Arc::new(Counters::default());
    let healthy = Arc::new(Counters::default());
    let mut broken = CountingDestination::new(Arc::clone(&failing));
    broken.emit_error = true;

    let logger = Logger::with_destinations(
        LogLevel::Info,
        vec![
            Box::new(broken),
            Box::new(CountingDestination::new(Arc::clone(&healthy))),
        ],
    )
    .unwrap();

    logger.info("one", &[]);
    logger.info("two", &[]);

    assert_eq!(healthy.emitted.load(Ordering::SeqCst), 2);
    assert_eq!(logger.metrics().failed_emits(), 2);
    assert!(logger.flush().unwrap_err().to_string().contains("emit refused"));
    assert!(logger.flush().is_ok());
}

#[test]
fn test_close_ignores_unsyncable_stream() {
    let counters = Arc::new(Counters::default());
    let mut tty = CountingDestination::new(Arc::clone(&counters));
    tty.name = CONSOLE_DESTINATION;
    tty.flush_error = Some(libc::ENOTTY);

    let logger = Logger::with_destinations(LogLevel::Info, vec![Box::new(tty)]).unwrap();

    assert!(logger.flush().is_err());
    assert!(logger.close().is_ok());
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_reports_einval_from_non_console_destination() {
    let counters = Arc::new(Counters::default());
    let mut sink = CountingDestination::new(Arc::clone(&counters));
    sink.name = "writer";
    sink.flush_error = Some(libc::EINVAL);

    let logger = Logger::with_destinations(LogLevel::Info, vec![Box::new(sink)]).unwrap();

    let err = logger.close().unwrap_err();
    match err {
        LoggerError::Flush { ref destination, .. } => assert_eq!(destination, "writer"),
        ref other => panic!("expected Flush, got {:?}", other),
    }
    assert_eq!(err.io_source().and_then(|e| e.raw_os_error()), Some(libc::EINVAL));
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_reports_real_flush_failure() {
    let counters = Arc::new(Counters::default());
    let mut disk = CountingDestination::new(Arc::clone(&counters));
    disk.flush_error = Some(libc::EIO);

    let logger = Logger::with_destinations(LogLevel::Info, vec![Box::new(disk)]).unwrap();

    let err = logger.close().unwrap_err();
    assert!(matches!(err, LoggerError::Flush { .. }));
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    assert!(logger.close().is_ok());
}

#[test]
fn test_duration_rendering() {
    let json = SharedBuffer::new();
    let console = SharedBuffer::new();
    let logger = Logger::builder()
        .with_writer(json.clone(), Encoder::json())
        .with_writer(console.clone(), Encoder::console())
        .build()
        .unwrap();

    logger.info("timed", &[Field::duration("elapsed", Duration::from_millis(5))]);

    assert!(json.contents().contains(r#""elapsed":"5ms""#));
    assert!(console.contents().contains(r#""elapsed":"5ms""#));
}

#[test]
fn test_from_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("configured.log");
    let json = format!(
        r#"{{
            "level": "WARN",
            "destinations": [
                {{ "kind": "file", "path": {}, "max_size_mb": 5, "max_backups": 2 }}
            ]
        }}"#,
        serde_json::to_string(&log_file).unwrap()
    );

    let logger = Logger::from_config(&LoggerConfig::from_json(&json).unwrap()).unwrap();
    logger.info("dropped", &[]);
    logger.error("kept", &[Field::bool("retry", false)]);
    logger.close().unwrap();

    let content = fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains(r#""retry":false"#));
}

#[test]
fn test_error_field() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder()
        .with_writer(buffer.clone(), Encoder::json())
        .build()
        .unwrap();

    let err = io::Error::new(io::ErrorKind::NotFound, "config missing");
    logger.error("startup failed", &[Field::error(&err)]);

    let line: serde_json::Value = serde_json::from_str(&buffer.lines()[0]).unwrap();
    assert_eq!(line["error"], "config missing");
}
