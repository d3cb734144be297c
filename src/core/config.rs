//! Logger configuration
//!
//! A [`LoggerConfig`] is an ordered list of [`DestinationSpec`]s plus the
//! logger-wide threshold. It can be built in code or loaded from JSON:
//!
//! ```
//! use rust_fanout_logger::core::{LoggerConfig, LogLevel};
//!
//! let config = LoggerConfig::from_json(r#"{
//!     "level": "WARN",
//!     "destinations": [
//!         { "kind": "stdout", "encoder": "console" },
//!         { "kind": "file", "path": "logs/app.log", "max_size_mb": 10, "max_backups": 3 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.level, LogLevel::Warn);
//! assert_eq!(config.destinations.len(), 2);
//! ```

use super::{
    destination::Destination,
    encoder::{build_encoder, Encoder, JSON_ENCODER},
    error::{LoggerError, Result},
    log_level::LogLevel,
};
use crate::destinations::{
    AgentConnector, CloudConnector, CloudDestination, ConsoleDestination,
    RotatingFileDestination, RotationPolicy, WriterDestination,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens a destination for a given minimum level
pub type DestinationOpener =
    Arc<dyn Fn(LogLevel) -> Result<Box<dyn Destination>> + Send + Sync>;

fn default_encoder_name() -> String {
    JSON_ENCODER.to_string()
}

/// Description of one destination, opened when the logger is built
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationSpec {
    /// Standard output
    Stdout {
        #[serde(default = "default_encoder_name")]
        encoder: String,
        #[serde(default)]
        colors: bool,
    },

    /// Size-rotated JSON file
    ///
    /// Settings are signed so that negative values from configuration are
    /// reported rather than silently wrapped. Zero selects the default.
    File {
        path: PathBuf,
        #[serde(default)]
        max_size_mb: i64,
        #[serde(default)]
        max_backups: i64,
        #[serde(default)]
        max_age_days: i64,
        #[serde(default)]
        compress: bool,
    },

    /// Cloud logging service
    Gcp {
        project_id: String,
        log_name: String,
        /// Address of the local logging agent for the default transport
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_addr: Option<String>,
        /// Transport override; the agent connector is used when absent
        #[serde(skip)]
        connector: Option<Arc<dyn CloudConnector>>,
    },

    /// Any destination, opened by a caller-supplied function
    #[serde(skip)]
    Custom {
        name: String,
        opener: DestinationOpener,
    },
}

impl DestinationSpec {
    pub fn stdout(encoder: impl Into<String>) -> Self {
        DestinationSpec::Stdout {
            encoder: encoder.into(),
            colors: false,
        }
    }

    pub fn file(
        path: impl Into<PathBuf>,
        max_size_mb: i64,
        max_backups: i64,
        max_age_days: i64,
        compress: bool,
    ) -> Self {
        DestinationSpec::File {
            path: path.into(),
            max_size_mb,
            max_backups,
            max_age_days,
            compress,
        }
    }

    /// Cloud logging through the local agent at
    /// [`DEFAULT_AGENT_ADDR`](crate::destinations::DEFAULT_AGENT_ADDR)
    pub fn gcp(project_id: impl Into<String>, log_name: impl Into<String>) -> Self {
        DestinationSpec::Gcp {
            project_id: project_id.into(),
            log_name: log_name.into(),
            agent_addr: None,
            connector: None,
        }
    }

    pub fn gcp_with_connector(
        project_id: impl Into<String>,
        log_name: impl Into<String>,
        connector: Arc<dyn CloudConnector>,
    ) -> Self {
        DestinationSpec::Gcp {
            project_id: project_id.into(),
            log_name: log_name.into(),
            agent_addr: None,
            connector: Some(connector),
        }
    }

    pub fn custom<F>(name: impl Into<String>, opener: F) -> Self
    where
        F: Fn(LogLevel) -> Result<Box<dyn Destination>> + Send + Sync + 'static,
    {
        DestinationSpec::Custom {
            name: name.into(),
            opener: Arc::new(opener),
        }
    }

    /// A caller-owned byte sink
    ///
    /// The sink moves into the first logger built from this spec. Opening the
    /// spec a second time fails.
    pub fn writer<W: Write + Send + 'static>(sink: W, encoder: Encoder) -> Self {
        let sink = Mutex::new(Some(sink));
        Self::custom("writer", move |level| {
            let sink = sink.lock().take().ok_or_else(|| {
                LoggerError::config("writer", "sink already handed to another logger")
            })?;
            Ok(Box::new(WriterDestination::new(sink, encoder).with_min_level(level))
                as Box<dyn Destination>)
        })
    }

    /// Short name of the destination kind, used in error messages
    pub fn kind(&self) -> &str {
        match self {
            DestinationSpec::Stdout { .. } => "stdout",
            DestinationSpec::File { .. } => "file",
            DestinationSpec::Gcp { .. } => "gcp",
            DestinationSpec::Custom { name, .. } => name.as_str(),
        }
    }

    /// Check settings without acquiring any resource
    pub fn validate(&self) -> Result<()> {
        match self {
            DestinationSpec::Stdout { encoder, .. } => {
                build_encoder(encoder)?;
            }
            DestinationSpec::File {
                path,
                max_size_mb,
                max_backups,
                max_age_days,
                compress,
            } => {
                RotationPolicy::from_signed(*max_size_mb, *max_backups, *max_age_days, *compress)?;
                if path.as_os_str().is_empty() {
                    return Err(LoggerError::config("file", "path must not be empty"));
                }
            }
            DestinationSpec::Gcp {
                project_id,
                log_name,
                ..
            } => {
                if project_id.trim().is_empty() {
                    return Err(LoggerError::config("gcp", "project id must not be empty"));
                }
                if log_name.trim().is_empty() {
                    return Err(LoggerError::config("gcp", "log name must not be empty"));
                }
            }
            DestinationSpec::Custom { .. } => {}
        }
        Ok(())
    }

    /// Acquire the destination's resources
    pub fn open(&self, level: LogLevel) -> Result<Box<dyn Destination>> {
        match self {
            DestinationSpec::Stdout { encoder, colors } => {
                let encoder = build_encoder(encoder)?.with_colors(*colors);
                Ok(Box::new(
                    ConsoleDestination::new()
                        .with_encoder(encoder)
                        .with_min_level(level),
                ))
            }
            DestinationSpec::File {
                path,
                max_size_mb,
                max_backups,
                max_age_days,
                compress,
            } => {
                let policy = RotationPolicy::from_signed(
                    *max_size_mb,
                    *max_backups,
                    *max_age_days,
                    *compress,
                )?;
                Ok(Box::new(
                    RotatingFileDestination::open(path, policy)?.with_min_level(level),
                ))
            }
            DestinationSpec::Gcp {
                project_id,
                log_name,
                agent_addr,
                connector,
            } => {
                let destination = match connector {
                    Some(connector) => {
                        CloudDestination::connect(project_id, log_name, level, connector.as_ref())?
                    }
                    None => {
                        let agent = agent_addr
                            .as_deref()
                            .map(AgentConnector::new)
                            .unwrap_or_default();
                        CloudDestination::connect(project_id, log_name, level, &agent)?
                    }
                };
                Ok(Box::new(destination))
            }
            DestinationSpec::Custom { opener, .. } => opener(level),
        }
    }
}

impl fmt::Debug for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationSpec::Stdout { encoder, colors } => f
                .debug_struct("Stdout")
                .field("encoder", encoder)
                .field("colors", colors)
                .finish(),
            DestinationSpec::File {
                path,
                max_size_mb,
                max_backups,
                max_age_days,
                compress,
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("max_size_mb", max_size_mb)
                .field("max_backups", max_backups)
                .field("max_age_days", max_age_days)
                .field("compress", compress)
                .finish(),
            DestinationSpec::Gcp {
                project_id,
                log_name,
                agent_addr,
                connector,
            } => f
                .debug_struct("Gcp")
                .field("project_id", project_id)
                .field("log_name", log_name)
                .field("agent_addr", agent_addr)
                .field("custom_connector", &connector.is_some())
                .finish(),
            DestinationSpec::Custom { name, .. } => {
                f.debug_struct("Custom").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

/// Threshold plus ordered destinations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub destinations: Vec<DestinationSpec>,
}

impl LoggerConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            destinations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_destination(mut self, spec: DestinationSpec) -> Self {
        self.destinations.push(spec);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every destination without acquiring any resource
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(LoggerError::NoDestinations);
        }
        self.destinations.iter().try_for_each(DestinationSpec::validate)
    }
}
