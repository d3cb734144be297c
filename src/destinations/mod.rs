//! Destination implementations

pub mod agent;
pub mod cloud;
pub mod console;
pub mod rotating_file;
pub mod writer;

pub use agent::{AgentClient, AgentConnector, DEFAULT_AGENT_ADDR};
pub use cloud::{CloudConnector, CloudDestination, CloudLogClient, CloudLogEntry, Severity};
pub use console::{ConsoleDestination, CONSOLE_DESTINATION};
pub use rotating_file::{RotatingFileDestination, RotationPolicy};
pub use writer::{SharedBuffer, WriterDestination};

pub use crate::core::Destination;
