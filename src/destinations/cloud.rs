//! Cloud logging destination
//!
//! Records become structured entries in the Cloud Logging `LogEntry` shape:
//! the fields are flattened into a JSON payload next to the message and the
//! source location, and the level maps onto a service severity.
//!
//! The transport sits behind [`CloudConnector`] and [`CloudLogClient`]. The
//! default connector forwards entries to a local logging agent, see
//! [`AgentConnector`](super::AgentConnector).

use crate::core::{fields_to_map, Destination, LogLevel, LogRecord, LoggerError, Result};
use chrono::SecondsFormat;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const MESSAGE_KEY: &str = "message";
pub const SOURCE_FILE_KEY: &str = "source_file";
pub const SOURCE_LINE_KEY: &str = "source_line";
pub const SOURCE_FUNCTION_KEY: &str = "source_function";

/// Severity levels understood by the logging service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warning,
            LogLevel::Error => Severity::Error,
            LogLevel::Fatal => Severity::Emergency,
        }
    }
}

/// One entry as handed to a [`CloudLogClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudLogEntry {
    /// `projects/<project>/logs/<log name>`
    pub log_name: String,
    /// RFC 3339 with nanosecond precision
    pub timestamp: String,
    pub severity: Severity,
    pub json_payload: serde_json::Map<String, serde_json::Value>,
}

impl CloudLogEntry {
    pub fn message(&self) -> Option<&str> {
        self.json_payload.get(MESSAGE_KEY).and_then(|v| v.as_str())
    }
}

/// Client side of one open connection to the logging service
pub trait CloudLogClient: Send {
    fn write(&mut self, entry: CloudLogEntry) -> Result<()>;

    /// Push out anything buffered
    fn flush(&mut self) -> Result<()>;

    /// Close the connection; the client is not used afterwards
    fn close(&mut self) -> Result<()>;
}

/// Opens clients for a project and log name
pub trait CloudConnector: Send + Sync {
    fn connect(&self, project_id: &str, log_name: &str) -> Result<Box<dyn CloudLogClient>>;
}

/// Build the full resource name of a log
pub fn full_log_name(project_id: &str, log_name: &str) -> String {
    format!("projects/{}/logs/{}", project_id, log_name)
}

pub struct CloudDestination {
    project_id: String,
    log_name: String,
    min_level: LogLevel,
    client: Mutex<Option<Box<dyn CloudLogClient>>>,
}

impl CloudDestination {
    /// Connect to the service through `connector`
    ///
    /// # Errors
    ///
    /// Fails if the project id or log name is empty, or if the connector
    /// cannot open a client.
    pub fn connect(
        project_id: impl Into<String>,
        log_name: impl Into<String>,
        min_level: LogLevel,
        connector: &dyn CloudConnector,
    ) -> Result<Self> {
        let project_id = project_id.into();
        let log_name = log_name.into();

        if project_id.trim().is_empty() {
            return Err(LoggerError::config("gcp", "project id must not be empty"));
        }
        if log_name.trim().is_empty() {
            return Err(LoggerError::config("gcp", "log name must not be empty"));
        }

        let client = connector.connect(&project_id, &log_name).map_err(|e| {
            LoggerError::cloud(&project_id, format!("failed to create client: {}", e))
        })?;

        Ok(Self {
            log_name: full_log_name(&project_id, &log_name),
            project_id,
            min_level,
            client: Mutex::new(Some(client)),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Full resource name, `projects/<project>/logs/<name>`
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    /// Translate a record into a service entry
    pub fn entry_for(&self, record: &LogRecord) -> CloudLogEntry {
        let mut payload = fields_to_map(&record.fields);
        payload.insert(
            MESSAGE_KEY.to_string(),
            serde_json::Value::String(record.message.clone()),
        );

        if let Some(ref caller) = record.caller {
            payload.insert(
                SOURCE_FILE_KEY.to_string(),
                serde_json::Value::String(caller.file.clone()),
            );
            payload.insert(SOURCE_LINE_KEY.to_string(), caller.line.into());
            if let Some(ref function) = caller.function {
                payload.insert(
                    SOURCE_FUNCTION_KEY.to_string(),
                    serde_json::Value::String(function.clone()),
                );
            }
        }

        CloudLogEntry {
            log_name: self.log_name.clone(),
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
            severity: record.level.into(),
            json_payload: payload,
        }
    }
}

impl Destination for CloudDestination {
    fn name(&self) -> &str {
        "gcp"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }

        let entry = self.entry_for(record);
        match self.client.lock().as_mut() {
            Some(client) => client.write(entry),
            None => Err(LoggerError::Released(self.name().to_string())),
        }
    }

    fn flush(&self) -> Result<()> {
        match self.client.lock().as_mut() {
            Some(client) => client.flush(),
            None => Ok(()),
        }
    }

    fn release(&self) -> Result<()> {
        let Some(mut client) = self.client.lock().take() else {
            return Ok(());
        };

        let flushed = client.flush();
        client
            .close()
            .map_err(|e| LoggerError::cloud(&self.project_id, format!("error closing client: {}", e)))?;
        flushed
    }
}
