//! Main logger implementation

use super::{
    config::{DestinationSpec, LoggerConfig},
    context::RequestContext,
    destination::Destination,
    destination_set::DestinationSet,
    encoder::Encoder,
    error::{LoggerError, Result},
    field::{pair_keys_and_values, Field, FieldValue, PairedFields},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    record::{CallerInfo, LogRecord},
};
use crate::destinations::{CloudConnector, CONSOLE_DESTINATION};
use std::fmt;
use std::io::Write;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

/// Called with the exit code after a Fatal record has been written
pub type ExitHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Exit code passed to the [`ExitHandler`] after a Fatal record
pub const FATAL_EXIT_CODE: i32 = 1;

const DANGLING_KEY_MESSAGE: &str = "Ignored key without a value.";
const NON_STRING_KEYS_MESSAGE: &str = "Ignored key-value pairs with non-string keys.";

/// Drop flush errors that only mean the console cannot be synced
///
/// A terminal or pipe on stdout reports `ENOTTY` or `EINVAL` when asked to
/// sync. Those are not failures of the logger and are filtered out when it
/// closes. The same errors from any other destination, and every other
/// error, are returned unchanged.
pub fn ignore_flush_error(err: LoggerError) -> Option<LoggerError> {
    let benign = match &err {
        LoggerError::Flush { destination, source } if destination == CONSOLE_DESTINATION => {
            source.io_source().is_some_and(|io| {
                io.kind() == std::io::ErrorKind::Unsupported
                    || matches!(io.raw_os_error(), Some(code) if code == libc::ENOTTY || code == libc::EINVAL)
            })
        }
        _ => false,
    };
    if benign {
        None
    } else {
        Some(err)
    }
}

/// Structured logger writing every record to all of its destinations
///
/// The threshold is fixed at construction. Records below it are counted
/// and discarded before any formatting or allocation.
pub struct Logger {
    destinations: DestinationSet,
    level: LogLevel,
    metrics: LoggerMetrics,
    on_fatal: ExitHandler,
}

impl Logger {
    /// Open every destination of `config` in order
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before anything is opened. If a
    /// destination fails to open, those opened before it are released.
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        let destinations = DestinationSet::open(&config.destinations, config.level)?;
        Ok(Self::from_set(destinations, config.level))
    }

    /// Wrap already opened destinations
    pub fn with_destinations(level: LogLevel, destinations: Vec<Box<dyn Destination>>) -> Result<Self> {
        Ok(Self::from_set(DestinationSet::new(destinations)?, level))
    }

    fn from_set(destinations: DestinationSet, level: LogLevel) -> Self {
        Self {
            destinations,
            level,
            metrics: LoggerMetrics::new(),
            on_fatal: Arc::new(|code| std::process::exit(code)),
        }
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_fanout_logger::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .with_level(LogLevel::Debug)
    ///     .with_stdout("console")
    ///     .build()
    ///     .unwrap();
    /// assert!(logger.enabled(LogLevel::Debug));
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether a record at `level` would be delivered
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level.passes(self.level)
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_closed(&self) -> bool {
        self.destinations.is_released()
    }

    #[inline]
    fn admit(&self, level: LogLevel) -> bool {
        if self.enabled(level) {
            true
        } else {
            self.metrics.record_filtered();
            false
        }
    }

    fn dispatch(&self, record: LogRecord) {
        let level = record.level;
        self.metrics.record_accepted();

        let failed = self.destinations.emit(&record);
        if failed > 0 {
            self.metrics.record_failed_emits(failed);
        }

        if level == LogLevel::Fatal {
            self.terminate();
        }
    }

    fn terminate(&self) {
        if let Err(e) = self.destinations.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush before exit: {}", e);
        }
        (self.on_fatal)(FATAL_EXIT_CODE);
    }

    fn record_at(
        level: LogLevel,
        message: &str,
        fields: Vec<Field>,
        caller: CallerInfo,
    ) -> LogRecord {
        let mut record = LogRecord::new(level, message).with_caller(caller);
        record.fields = fields;
        record
    }

    /// Log `message` with `fields` at `level`
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>, fields: &[Field]) {
        if !self.admit(level) {
            return;
        }
        let caller = CallerInfo::from_location(Location::caller());
        self.dispatch(Self::record_at(level, message.as_ref(), fields.to_vec(), caller));
    }

    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>, fields: &[Field]) {
        self.log(LogLevel::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>, fields: &[Field]) {
        self.log(LogLevel::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>, fields: &[Field]) {
        self.log(LogLevel::Warn, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>, fields: &[Field]) {
        self.log(LogLevel::Error, message, fields);
    }

    /// Log at Fatal, flush every destination, then run the exit handler
    #[track_caller]
    pub fn fatal(&self, message: impl AsRef<str>, fields: &[Field]) {
        self.log(LogLevel::Fatal, message, fields);
    }

    /// Formatted entry point used by the logging macros
    ///
    /// `function` is the module path of the call site when known.
    #[track_caller]
    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>, function: Option<&str>) {
        if !self.admit(level) {
            return;
        }
        let mut caller = CallerInfo::from_location(Location::caller());
        if let Some(function) = function {
            caller = caller.with_function(function);
        }
        let message = match args.as_str() {
            Some(s) => s.to_string(),
            None => args.to_string(),
        };
        self.dispatch(Self::record_at(level, &message, Vec::new(), caller));
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Debug, args, None);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Info, args, None);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Warn, args, None);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Error, args, None);
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Fatal, args, None);
    }

    /// Log with an alternating key/value list: `k1, v1, k2, v2, ...`
    ///
    /// Malformed lists are reported rather than dropped. A trailing key with
    /// no value is kept under `"ignored"`, pairs whose key is not a string
    /// under `"invalid"`, and an extra Error record describes the problem.
    ///
    /// ```
    /// use rust_fanout_logger::prelude::*;
    /// use rust_fanout_logger::destinations::SharedBuffer;
    ///
    /// let buffer = SharedBuffer::new();
    /// let logger = Logger::builder()
    ///     .with_writer(buffer.clone(), Encoder::json())
    ///     .build()
    ///     .unwrap();
    ///
    /// logger.infow("request done", &["status".into(), 200.into(), "path".into(), "/".into()]);
    /// assert!(buffer.contents().contains(r#""status":200"#));
    /// ```
    #[track_caller]
    pub fn logw(&self, level: LogLevel, message: &str, keys_and_values: &[FieldValue]) {
        if !self.admit(level) {
            return;
        }
        let caller = CallerInfo::from_location(Location::caller());

        let PairedFields {
            mut fields,
            invalid,
            dangling,
        } = pair_keys_and_values(keys_and_values);

        if !invalid.is_empty() {
            let pairs: Vec<serde_json::Value> = invalid
                .iter()
                .map(|(key, value)| {
                    serde_json::json!({
                        "key": key.to_json_value(),
                        "value": value.to_json_value(),
                    })
                })
                .collect();
            let field = Field::new("invalid", serde_json::Value::Array(pairs));
            self.report_malformed(NON_STRING_KEYS_MESSAGE, field.clone(), &caller);
            fields.push(field);
        }

        if let Some(key) = dangling {
            let field = Field::new("ignored", key);
            self.report_malformed(DANGLING_KEY_MESSAGE, field.clone(), &caller);
            fields.push(field);
        }

        self.dispatch(Self::record_at(level, message, fields, caller));
    }

    fn report_malformed(&self, message: &str, field: Field, caller: &CallerInfo) {
        if self.admit(LogLevel::Error) {
            self.dispatch(Self::record_at(
                LogLevel::Error,
                message,
                vec![field],
                caller.clone(),
            ));
        }
    }

    #[track_caller]
    pub fn debugw(&self, message: &str, keys_and_values: &[FieldValue]) {
        self.logw(LogLevel::Debug, message, keys_and_values);
    }

    #[track_caller]
    pub fn infow(&self, message: &str, keys_and_values: &[FieldValue]) {
        self.logw(LogLevel::Info, message, keys_and_values);
    }

    #[track_caller]
    pub fn warnw(&self, message: &str, keys_and_values: &[FieldValue]) {
        self.logw(LogLevel::Warn, message, keys_and_values);
    }

    #[track_caller]
    pub fn errorw(&self, message: &str, keys_and_values: &[FieldValue]) {
        self.logw(LogLevel::Error, message, keys_and_values);
    }

    #[track_caller]
    pub fn fatalw(&self, message: &str, keys_and_values: &[FieldValue]) {
        self.logw(LogLevel::Fatal, message, keys_and_values);
    }

    /// Log with the identifiers of `context` prepended to `fields`
    #[track_caller]
    pub fn log_ctx(
        &self,
        level: LogLevel,
        message: impl AsRef<str>,
        context: &RequestContext,
        fields: &[Field],
    ) {
        if !self.admit(level) {
            return;
        }
        let caller = CallerInfo::from_location(Location::caller());
        let mut all = context.fields();
        all.extend_from_slice(fields);
        self.dispatch(Self::record_at(level, message.as_ref(), all, caller));
    }

    #[track_caller]
    pub fn debug_ctx(&self, message: impl AsRef<str>, context: &RequestContext, fields: &[Field]) {
        self.log_ctx(LogLevel::Debug, message, context, fields);
    }

    #[track_caller]
    pub fn info_ctx(&self, message: impl AsRef<str>, context: &RequestContext, fields: &[Field]) {
        self.log_ctx(LogLevel::Info, message, context, fields);
    }

    #[track_caller]
    pub fn warn_ctx(&self, message: impl AsRef<str>, context: &RequestContext, fields: &[Field]) {
        self.log_ctx(LogLevel::Warn, message, context, fields);
    }

    #[track_caller]
    pub fn error_ctx(&self, message: impl AsRef<str>, context: &RequestContext, fields: &[Field]) {
        self.log_ctx(LogLevel::Error, message, context, fields);
    }

    /// Flush every destination
    ///
    /// Reports the first emit failure since the previous flush, otherwise the
    /// first flush failure.
    pub fn flush(&self) -> Result<()> {
        self.destinations.flush()
    }

    /// Flush and release every destination
    ///
    /// Only the first call does any work. Flush errors that just mean the
    /// stream cannot be synced are ignored, see [`ignore_flush_error`].
    pub fn close(&self) -> Result<()> {
        self.destinations.close_with(ignore_flush_error)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("destinations", &self.destinations)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.destinations.is_released() {
            return;
        }
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close during shutdown: {}", e);
        }
    }
}

/// Builder for constructing Logger with a fluent API
///
/// Destinations are opened by [`build`](LoggerBuilder::build), in the order
/// they were added.
///
/// # Example
/// ```no_run
/// use rust_fanout_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .with_level(LogLevel::Info)
///     .with_stdout("json")
///     .with_file("logs/app.log", 10, 5, 30, true)
///     .with_gcp("my-project", "app")
///     .build()
///     .expect("logger");
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    on_fatal: Option<ExitHandler>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            on_fatal: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: LoggerConfig) -> Self {
        Self {
            config,
            on_fatal: None,
        }
    }

    /// Set the logger-wide threshold (default: Info)
    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Add standard output with the named encoder (`"json"` or `"console"`)
    #[must_use = "builder methods return a new value"]
    pub fn with_stdout(self, encoder: impl Into<String>) -> Self {
        self.with_spec(DestinationSpec::stdout(encoder))
    }

    /// Add a caller-owned byte sink
    #[must_use = "builder methods return a new value"]
    pub fn with_writer<W: Write + Send + 'static>(self, sink: W, encoder: Encoder) -> Self {
        self.with_spec(DestinationSpec::writer(sink, encoder))
    }

    /// Add a size-rotated JSON file
    ///
    /// Sizes are in MiB and ages in days. Zero selects the default; negative
    /// values make [`build`](Self::build) fail without touching the disk.
    #[must_use = "builder methods return a new value"]
    pub fn with_file(
        self,
        path: impl Into<PathBuf>,
        max_size_mb: i64,
        max_backups: i64,
        max_age_days: i64,
        compress: bool,
    ) -> Self {
        self.with_spec(DestinationSpec::file(
            path,
            max_size_mb,
            max_backups,
            max_age_days,
            compress,
        ))
    }

    /// Add the cloud logging service through the local agent
    ///
    /// Entries are not sent to the Cloud Logging API directly. They go as
    /// JSON lines over TCP to a logging agent on `127.0.0.1:5170`, which
    /// forwards them. Use [`with_cloud_connector`](Self::with_cloud_connector)
    /// for any other transport.
    #[must_use = "builder methods return a new value"]
    pub fn with_gcp(self, project_id: impl Into<String>, log_name: impl Into<String>) -> Self {
        self.with_spec(DestinationSpec::gcp(project_id, log_name))
    }

    /// Add the cloud logging service through a custom transport
    #[must_use = "builder methods return a new value"]
    pub fn with_cloud_connector(
        self,
        project_id: impl Into<String>,
        log_name: impl Into<String>,
        connector: Arc<dyn CloudConnector>,
    ) -> Self {
        self.with_spec(DestinationSpec::gcp_with_connector(
            project_id, log_name, connector,
        ))
    }

    /// Add a destination opened by `opener`, which receives the threshold
    #[must_use = "builder methods return a new value"]
    pub fn with_destination<F>(self, name: impl Into<String>, opener: F) -> Self
    where
        F: Fn(LogLevel) -> Result<Box<dyn Destination>> + Send + Sync + 'static,
    {
        self.with_spec(DestinationSpec::custom(name, opener))
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_spec(mut self, spec: DestinationSpec) -> Self {
        self.config.destinations.push(spec);
        self
    }

    /// Replace what happens after a Fatal record, `std::process::exit` by default
    #[must_use = "builder methods return a new value"]
    pub fn on_fatal<F>(mut self, handler: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.on_fatal = Some(Arc::new(handler));
        self
    }

    /// Open every destination and build the Logger
    pub fn build(self) -> Result<Logger> {
        let mut logger = Logger::from_config(&self.config)?;
        if let Some(handler) = self.on_fatal {
            logger.on_fatal = handler;
        }
        Ok(logger)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
