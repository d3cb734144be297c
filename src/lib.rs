//! # Rust Fanout Logger
//!
//! A structured logging facade that writes every record to several
//! destinations at once behind one API.
//!
//! ## Features
//!
//! - **Fan-out**: console, any `Write` sink, size-rotated files and a cloud
//!   logging service in the same logger
//! - **Isolation**: a failing or panicking destination never stops the others
//! - **Clean shutdown**: destinations are flushed and released exactly once
//! - **Structured fields**: typed key/value attributes, JSON or console output
//!
//! ```
//! use rust_fanout_logger::prelude::*;
//! use rust_fanout_logger::destinations::SharedBuffer;
//! use rust_fanout_logger::info;
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder()
//!     .with_level(LogLevel::Info)
//!     .with_writer(buffer.clone(), Encoder::json())
//!     .build()
//!     .unwrap();
//!
//! logger.info("server started", &[Field::int("port", 8080)]);
//! info!(logger, "{} workers ready", 4);
//! logger.close().unwrap();
//!
//! assert_eq!(buffer.lines().len(), 2);
//! ```

pub mod core;
pub mod destinations;
pub mod macros;

pub mod prelude {
    pub use crate::core::{
        Destination, DestinationSpec, Encoder, Field, FieldValue, LogLevel, LogRecord, Logger,
        LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, RequestContext, Result,
    };
}

pub use core::{
    Destination, DestinationSpec, Encoder, Field, FieldValue, LogLevel, LogRecord, Logger,
    LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, RequestContext, Result,
};
