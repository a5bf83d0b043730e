//! Serial transport abstraction
//!
//! Scanning needs two primitives from the platform: list the ports that
//! currently exist and open one at a given baud rate. [`SystemTransport`]
//! provides them over the operating system's serial devices; tests substitute
//! an in-memory implementation.

use std::time::Duration;

use serialport::available_ports;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::error::DetectError;

/// Driver-level read timeout configured on newly opened ports
pub const OPEN_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Access to serial ports, abstracted for testability
pub trait SerialTransport {
    /// Connected port type returned by [`open`](SerialTransport::open)
    type Port: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// List the identifiers of all currently available ports
    ///
    /// A [`DetectError::EnumerationFailed`] is recoverable (callers may treat
    /// it as "no ports right now"); [`DetectError::EnumerationBroken`] means
    /// the transport cannot be used at all.
    fn list_ports(&self) -> Result<Vec<String>, DetectError>;

    /// Open a port at the given baud rate
    fn open(&self, port: &str, baud_rate: u32) -> Result<Self::Port, DetectError>;
}

/// Transport backed by the operating system's serial devices
#[derive(Debug, Clone)]
pub struct SystemTransport {
    /// Skip ports whose name contains one of these patterns
    skip_patterns: Vec<String>,
}

impl SystemTransport {
    /// Create a transport with the default skip list
    pub fn new() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
        }
    }

    /// Create a transport with a custom skip list
    pub fn with_skip_patterns(skip_patterns: Vec<String>) -> Self {
        Self { skip_patterns }
    }

    fn should_skip(&self, port: &str) -> bool {
        self.skip_patterns.iter().any(|p| port.contains(p))
    }
}

impl Default for SystemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport for SystemTransport {
    type Port = SerialStream;

    fn list_ports(&self) -> Result<Vec<String>, DetectError> {
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let names: Vec<String> = ports
            .into_iter()
            .map(|p| p.port_name)
            .filter(|name| !self.should_skip(name))
            .collect();

        debug!("Found {} serial port(s)", names.len());
        Ok(names)
    }

    fn open(&self, port: &str, baud_rate: u32) -> Result<SerialStream, DetectError> {
        tokio_serial::new(port, baud_rate)
            .timeout(OPEN_READ_TIMEOUT)
            .open_native_async()
            .map_err(|e| DetectError::OpenFailed {
                port: port.to_string(),
                reason: e.to_string(),
            })
    }
}
