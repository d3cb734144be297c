//! Default cloud transport: a local logging agent over TCP
//!
//! Each [`CloudLogEntry`] is sent as one JSON line. Agents such as the Ops
//! Agent or fluent-bit can be configured to accept this and forward entries
//! to the logging service with the host credentials.

use super::cloud::{CloudConnector, CloudLogClient, CloudLogEntry};
use crate::core::{LoggerError, Result};
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Where the agent listens unless configured otherwise
pub const DEFAULT_AGENT_ADDR: &str = "127.0.0.1:5170";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to a logging agent
///
/// # Example
///
/// ```no_run
/// use rust_fanout_logger::destinations::{AgentConnector, CloudDestination};
/// use rust_fanout_logger::LogLevel;
///
/// let connector = AgentConnector::new("127.0.0.1:24224");
/// let destination = CloudDestination::connect("my-project", "app", LogLevel::Info, &connector)
///     .expect("agent not reachable");
/// ```
#[derive(Debug, Clone)]
pub struct AgentConnector {
    addr: String,
    timeout: Duration,
    reconnect_on_error: bool,
}

impl AgentConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_TIMEOUT,
            reconnect_on_error: true,
        }
    }

    /// Connect and write timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable one reconnect attempt after a failed write
    ///
    /// Default: enabled
    #[must_use]
    pub fn with_reconnect(mut self, enable: bool) -> Self {
        self.reconnect_on_error = enable;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Default for AgentConnector {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_ADDR)
    }
}

impl CloudConnector for AgentConnector {
    fn connect(&self, _project_id: &str, _log_name: &str) -> Result<Box<dyn CloudLogClient>> {
        let stream = open_stream(&self.addr, self.timeout)?;
        Ok(Box::new(AgentClient {
            stream: Some(stream),
            addr: self.addr.clone(),
            timeout: self.timeout,
            reconnect_on_error: self.reconnect_on_error,
        }))
    }
}

fn open_stream(addr: &str, timeout: Duration) -> Result<TcpStream> {
    use std::net::ToSocketAddrs;

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| LoggerError::io_operation("resolving agent address", addr, e))?
        .next()
        .ok_or_else(|| LoggerError::config("gcp", format!("agent address '{}' did not resolve", addr)))?;

    let stream = TcpStream::connect_timeout(&socket_addr, timeout)
        .map_err(|e| LoggerError::io_operation("connecting to logging agent", addr, e))?;

    // Keep a stalled agent from hanging the caller
    stream.set_write_timeout(Some(timeout))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;

    Ok(stream)
}

/// Open connection to a logging agent
pub struct AgentClient {
    stream: Option<TcpStream>,
    addr: String,
    timeout: Duration,
    reconnect_on_error: bool,
}

impl AgentClient {
    fn reconnect(&mut self) -> Result<()> {
        self.stream = Some(open_stream(&self.addr, self.timeout)?);
        Ok(())
    }
}

impl CloudLogClient for AgentClient {
    fn write(&mut self, entry: CloudLogEntry) -> Result<()> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let result = match self.stream.as_mut() {
            Some(stream) => stream.write_all(&line),
            None => return Err(LoggerError::writer("Agent stream not connected")),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stream = None;

                if !self.reconnect_on_error {
                    return Err(LoggerError::io_operation("sending entry to agent", &self.addr, e));
                }

                match self.reconnect() {
                    Ok(()) => {
                        if let Some(ref mut stream) = self.stream {
                            stream.write_all(&line)?;
                        }
                        Ok(())
                    }
                    Err(reconnect_err) => Err(LoggerError::writer(format!(
                        "Failed to send entry and reconnect: {} (reconnect: {})",
                        e, reconnect_err
                    ))),
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut stream) = self.stream {
            stream.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                // The agent already hung up
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::cloud::Severity;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn entry(message: &str) -> CloudLogEntry {
        let mut payload = serde_json::Map::new();
        payload.insert("message".to_string(), message.into());
        CloudLogEntry {
            log_name: "projects/demo/logs/app".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            severity: Severity::Info,
            json_payload: payload,
        }
    }

    #[test]
    fn test_connect_refused() {
        // Grab a free port, then stop listening on it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let connector = AgentConnector::new(format!("127.0.0.1:{}", port))
            .with_timeout(Duration::from_millis(500));
        assert!(connector.connect("demo", "app").is_err());
    }

    #[test]
    fn test_entries_sent_as_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            BufReader::new(socket)
                .lines()
                .map(|line| line.unwrap())
                .collect::<Vec<_>>()
        });

        let connector = AgentConnector::new(addr.to_string());
        let mut client = connector.connect("demo", "app").unwrap();
        client.write(entry("first")).unwrap();
        client.write(entry("second")).unwrap();
        client.flush().unwrap();
        client.close().unwrap();
        client.close().unwrap();

        let lines = server.join().unwrap();
        assert_eq!(lines.len(), 2);
        let parsed: CloudLogEntry = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parsed.message(), Some("second"));
        assert_eq!(parsed.severity, Severity::Info);
    }

    #[test]
    fn test_write_after_close_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let connector = AgentConnector::new(listener.local_addr().unwrap().to_string());

        let mut client = connector.connect("demo", "app").unwrap();
        client.close().unwrap();
        assert!(client.write(entry("late")).is_err());
    }

    #[test]
    fn test_default_address() {
        assert_eq!(AgentConnector::default().addr(), DEFAULT_AGENT_ADDR);
    }
}
