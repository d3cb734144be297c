//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A logger was configured without any destination
    #[error("no destinations specified")]
    NoDestinations,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Encoder kind not recognized
    #[error("unsupported encoder type '{requested}'")]
    UnsupportedEncoder { requested: String },

    /// One destination failed to open while building a logger
    #[error("failed to initialise {kind} destination: {source}")]
    DestinationInit {
        kind: String,
        #[source]
        source: Box<LoggerError>,
    },

    /// Flushing a destination failed
    #[error("sync error in {destination} destination: {source}")]
    Flush {
        destination: String,
        #[source]
        source: Box<LoggerError>,
    },

    /// Releasing a destination failed
    #[error("close error in {destination} destination: {source}")]
    Release {
        destination: String,
        #[source]
        source: Box<LoggerError>,
    },

    /// A destination panicked while handling a record
    #[error("{destination} destination panicked: {message}")]
    DestinationPanicked { destination: String, message: String },

    /// Destination used after release
    #[error("{0} destination already released")]
    Released(String),

    /// File destination error with path
    #[error("File destination error for '{path}': {message}")]
    FileDestinationError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Cloud logging client error
    #[error("cloud logging error for project '{project_id}': {message}")]
    CloudError { project_id: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Wrap the failure of one destination during logger construction
    pub fn destination_init(kind: impl Into<String>, source: LoggerError) -> Self {
        LoggerError::DestinationInit {
            kind: kind.into(),
            source: Box::new(source),
        }
    }

    pub fn flush(destination: impl Into<String>, source: LoggerError) -> Self {
        LoggerError::Flush {
            destination: destination.into(),
            source: Box::new(source),
        }
    }

    pub fn release(destination: impl Into<String>, source: LoggerError) -> Self {
        LoggerError::Release {
            destination: destination.into(),
            source: Box::new(source),
        }
    }

    /// Create a file destination error
    pub fn file_destination(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileDestinationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cloud logging error
    pub fn cloud(project_id: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::CloudError {
            project_id: project_id.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// The innermost IO error, looking through the destination wrappers
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            LoggerError::IoOperation { source, .. } => Some(source),
            LoggerError::IoError(source) => Some(source),
            LoggerError::DestinationInit { source, .. }
            | LoggerError::Flush { source, .. }
            | LoggerError::Release { source, .. } => source.io_source(),
            _ => None,
        }
    }

    /// Whether this error was raised before any resource was acquired
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LoggerError::NoDestinations
                | LoggerError::InvalidConfiguration { .. }
                | LoggerError::UnsupportedEncoder { .. }
        )
    }
}
