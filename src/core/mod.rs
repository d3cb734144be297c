//! Core logger types and traits

pub mod config;
pub mod context;
pub mod destination;
pub mod destination_set;
pub mod encoder;
pub mod error;
pub mod field;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod record;

pub use config::{DestinationOpener, DestinationSpec, LoggerConfig};
pub use context::RequestContext;
pub use destination::Destination;
pub use destination_set::DestinationSet;
pub use encoder::{
    build_encoder, fields_to_map, Encoder, EncoderKind, UnsupportedEncoder, CONSOLE_ENCODER,
    JSON_ENCODER,
};
pub use error::{LoggerError, Result};
pub use field::{
    any_field, duration_field, error_field, float64_field, format_duration, int_field,
    string_field, Field, FieldValue, ERROR_KEY,
};
pub use log_level::LogLevel;
pub use logger::{ignore_flush_error, ExitHandler, Logger, LoggerBuilder, FATAL_EXIT_CODE};
pub use metrics::LoggerMetrics;
pub use record::{CallerInfo, LogRecord};
