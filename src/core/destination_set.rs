//! Fan-out over an ordered, immutable list of destinations
//!
//! The set owns every destination of a logger. It delivers records in
//! registration order, isolates destinations from each other's failures and
//! panics, and tears everything down exactly once.

use super::{
    config::DestinationSpec,
    destination::Destination,
    error::{LoggerError, Result},
    log_level::LogLevel,
    record::LogRecord,
};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct DestinationSet {
    destinations: Vec<Box<dyn Destination>>,
    released: AtomicBool,
    /// First emit failure since the last flush
    pending_error: Mutex<Option<LoggerError>>,
}

impl DestinationSet {
    /// Build a set from already opened destinations
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::NoDestinations`] when `destinations` is empty.
    pub fn new(destinations: Vec<Box<dyn Destination>>) -> Result<Self> {
        if destinations.is_empty() {
            return Err(LoggerError::NoDestinations);
        }
        Ok(Self {
            destinations,
            released: AtomicBool::new(false),
            pending_error: Mutex::new(None),
        })
    }

    /// Open every destination in order
    ///
    /// Construction is atomic: if one destination fails to open, the ones
    /// opened before it are released and the original error is returned,
    /// wrapped with the failing destination kind.
    pub fn open(specs: &[DestinationSpec], level: LogLevel) -> Result<Self> {
        if specs.is_empty() {
            return Err(LoggerError::NoDestinations);
        }
        for spec in specs {
            spec.validate()?;
        }

        let mut opened: Vec<Box<dyn Destination>> = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec.open(level) {
                Ok(destination) => opened.push(destination),
                Err(e) => {
                    if let Some(cleanup_err) = release_all(&opened) {
                        eprintln!(
                            "[LOGGER ERROR] Cleanup after failed {} destination: {}",
                            spec.kind(),
                            cleanup_err
                        );
                    }
                    return Err(LoggerError::destination_init(spec.kind(), e));
                }
            }
        }

        Self::new(opened)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Names of the destinations, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.destinations.iter().map(|d| d.name()).collect()
    }

    /// Deliver a record to every destination
    ///
    /// Returns the number of destinations that failed. Failures never stop
    /// delivery to the remaining destinations; the first one is kept and
    /// reported by the next [`flush`](Self::flush) or [`close`](Self::close).
    pub fn emit(&self, record: &LogRecord) -> usize {
        if self.is_released() {
            return 0;
        }

        let mut failures = 0;
        for (idx, destination) in self.destinations.iter().enumerate() {
            if !destination.enabled(record.level) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| destination.emit(record)));

            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(panic_info) => LoggerError::DestinationPanicked {
                    destination: destination.name().to_string(),
                    message: panic_message(panic_info.as_ref()),
                },
            };

            eprintln!(
                "[LOGGER ERROR] Destination #{} ({}) failed: {}",
                idx,
                destination.name(),
                err
            );
            failures += 1;
            self.remember(err);
        }
        failures
    }

    /// Flush every destination
    ///
    /// All destinations are attempted. Returns the pending emit error if
    /// there is one, otherwise the first flush error.
    pub fn flush(&self) -> Result<()> {
        self.flush_filtered(&|e| Some(e))
    }

    fn flush_filtered(&self, filter: &dyn Fn(LoggerError) -> Option<LoggerError>) -> Result<()> {
        let mut first = self.pending_error.lock().take();

        for destination in &self.destinations {
            let result = catch_unwind(AssertUnwindSafe(|| destination.flush()));
            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => LoggerError::flush(destination.name(), e),
                Err(panic_info) => LoggerError::DestinationPanicked {
                    destination: destination.name().to_string(),
                    message: panic_message(panic_info.as_ref()),
                },
            };
            if let Some(err) = filter(err) {
                first.get_or_insert(err);
            }
        }

        first.map_or(Ok(()), Err)
    }

    /// Flush, then release every destination, exactly once
    pub fn close(&self) -> Result<()> {
        self.close_with(|e| Some(e))
    }

    /// [`close`](Self::close) with a filter applied to flush errors
    ///
    /// The filter returns `None` for errors that should not be reported.
    /// Release errors are never filtered.
    pub fn close_with<F>(&self, flush_filter: F) -> Result<()>
    where
        F: Fn(LoggerError) -> Option<LoggerError>,
    {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first = self.flush_filtered(&flush_filter).err();
        if let Some(err) = release_all(&self.destinations) {
            first.get_or_insert(err);
        }

        first.map_or(Ok(()), Err)
    }

    fn remember(&self, err: LoggerError) {
        self.pending_error.lock().get_or_insert(err);
    }
}

impl std::fmt::Debug for DestinationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationSet")
            .field("destinations", &self.names())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Release in order, returning the first error
fn release_all(destinations: &[Box<dyn Destination>]) -> Option<LoggerError> {
    let mut first = None;
    for destination in destinations {
        let result = catch_unwind(AssertUnwindSafe(|| destination.release()));
        let err = match result {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => LoggerError::release(destination.name(), e),
            Err(panic_info) => LoggerError::DestinationPanicked {
                destination: destination.name().to_string(),
                message: panic_message(panic_info.as_ref()),
            },
        };
        if first.is_some() {
            eprintln!("[LOGGER ERROR] {}", err);
        }
        first.get_or_insert(err);
    }
    first
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct CallCounts {
        emitted: AtomicUsize,
        flushed: AtomicUsize,
        released: AtomicUsize,
    }

    struct StubDestination {
        name: &'static str,
        counts: Arc<CallCounts>,
        fail_emit: bool,
        fail_flush: bool,
        fail_release: bool,
        panic_on_emit: bool,
    }

    impl StubDestination {
        fn new(name: &'static str, counts: Arc<CallCounts>) -> Self {
            Self {
                name,
                counts,
                fail_emit: false,
                fail_flush: false,
                fail_release: false,
                panic_on_emit: false,
            }
        }
    }

    impl Destination for StubDestination {
        fn name(&self) -> &str {
            self.name
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }

        fn emit(&self, _record: &LogRecord) -> Result<()> {
            if self.panic_on_emit {
                panic!("boom");
            }
            self.counts.emitted.fetch_add(1, Ordering::SeqCst);
            if self.fail_emit {
                return Err(LoggerError::writer(format!("{} emit failed", self.name)));
            }
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.counts.flushed.fetch_add(1, Ordering::SeqCst);
            if self.fail_flush {
                return Err(LoggerError::writer(format!("{} flush failed", self.name)));
            }
            Ok(())
        }

        fn release(&self) -> Result<()> {
            self.counts.released.fetch_add(1, Ordering::SeqCst);
            if self.fail_release {
                return Err(LoggerError::writer(format!("{} release failed", self.name)));
            }
            Ok(())
        }
    }

    fn record() -> LogRecord {
        LogRecord::new(LogLevel::Info, "hello")
    }

    #[test]
    fn test_empty_set_is_rejected() {
        assert!(matches!(
            DestinationSet::new(Vec::new()),
            Err(LoggerError::NoDestinations)
        ));
        assert!(matches!(
            DestinationSet::open(&[], LogLevel::Info),
            Err(LoggerError::NoDestinations)
        ));
    }

    #[test]
    fn test_failure_does_not_stop_fan_out() {
        let first = Arc::new(CallCounts::default());
        let second = Arc::new(CallCounts::default());

        let mut failing = StubDestination::new("failing", Arc::clone(&first));
        failing.fail_emit = true;
        let set = DestinationSet::new(vec![
            Box::new(failing),
            Box::new(StubDestination::new("healthy", Arc::clone(&second))),
        ])
        .unwrap();

        assert_eq!(set.emit(&record()), 1);
        assert_eq!(second.emitted.load(Ordering::SeqCst), 1);

        // The emit failure surfaces on the next flush, then is cleared
        let err = set.flush().unwrap_err();
        assert!(err.to_string().contains("failing emit failed"));
        assert!(set.flush().is_ok());
    }

    #[test]
    fn test_panicking_destination_is_isolated() {
        let counts = Arc::new(CallCounts::default());
        let mut panicking = StubDestination::new("panicky", Arc::new(CallCounts::default()));
        panicking.panic_on_emit = true;

        let set = DestinationSet::new(vec![
            Box::new(panicking),
            Box::new(StubDestination::new("healthy", Arc::clone(&counts))),
        ])
        .unwrap();

        assert_eq!(set.emit(&record()), 1);
        assert_eq!(counts.emitted.load(Ordering::SeqCst), 1);
        assert!(matches!(
            set.flush(),
            Err(LoggerError::DestinationPanicked { .. })
        ));
    }

    #[test]
    fn test_flush_attempts_every_destination() {
        let counts: Vec<Arc<CallCounts>> = (0..3).map(|_| Arc::new(CallCounts::default())).collect();
        let mut first = StubDestination::new("first", Arc::clone(&counts[0]));
        first.fail_flush = true;
        let mut second = StubDestination::new("second", Arc::clone(&counts[1]));
        second.fail_flush = true;

        let set = DestinationSet::new(vec![
            Box::new(first),
            Box::new(second),
            Box::new(StubDestination::new("third", Arc::clone(&counts[2]))),
        ])
        .unwrap();

        let err = set.flush().unwrap_err();
        assert!(err.to_string().contains("first flush failed"));
        for counts in &counts {
            assert_eq!(counts.flushed.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let counts = Arc::new(CallCounts::default());
        let set = DestinationSet::new(vec![
            Box::new(StubDestination::new("a", Arc::clone(&counts))),
            Box::new(StubDestination::new("b", Arc::clone(&counts))),
        ])
        .unwrap();

        assert!(set.close().is_ok());
        assert!(set.close().is_ok());
        assert_eq!(counts.released.load(Ordering::SeqCst), 2);
        assert!(set.is_released());

        // Emit after close touches nothing
        assert_eq!(set.emit(&record()), 0);
        assert_eq!(counts.emitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_releases_all_and_reports_first_error() {
        let counts = Arc::new(CallCounts::default());
        let mut a = StubDestination::new("a", Arc::clone(&counts));
        a.fail_release = true;
        let mut b = StubDestination::new("b", Arc::clone(&counts));
        b.fail_release = true;

        let set = DestinationSet::new(vec![Box::new(a), Box::new(b)]).unwrap();
        let err = set.close().unwrap_err();

        assert!(matches!(err, LoggerError::Release { ref destination, .. } if destination == "a"));
        assert_eq!(counts.released.load(Ordering::SeqCst), 2);
        assert!(set.close().is_ok());
    }

    #[test]
    fn test_close_filter_drops_flush_errors_only() {
        let counts = Arc::new(CallCounts::default());
        let mut a = StubDestination::new("a", Arc::clone(&counts));
        a.fail_flush = true;

        let set = DestinationSet::new(vec![Box::new(a)]).unwrap();
        assert!(set.close_with(|_| None).is_ok());
        assert_eq!(counts.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_close_releases_once() {
        let counts = Arc::new(CallCounts::default());
        let set = Arc::new(
            DestinationSet::new(vec![Box::new(StubDestination::new("a", Arc::clone(&counts)))])
                .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.close())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        assert_eq!(counts.released.load(Ordering::SeqCst), 1);
    }
}
