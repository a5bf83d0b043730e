//! Simulated Serial Transport
//!
//! This crate provides an in-memory [`SerialTransport`] implementation with
//! scripted devices behind each port, so the probe and the scan loop can be
//! exercised without physical hardware. Ports can be added and removed while
//! a scan is running, opens are exclusive like real serial ports, and
//! enumeration failures can be injected.
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_detect::SerialTransport;
//! use scout_sim::{SimDevice, SimTransport};
//!
//! let transport = SimTransport::new();
//! transport.add_port("sim-1", SimDevice::answering("ID?", "METER-OK"));
//! assert_eq!(transport.list_ports().unwrap(), vec!["sim-1".to_string()]);
//! ```
//!
//! [`SerialTransport`]: scout_detect::SerialTransport

pub mod device;
pub mod transport;

pub use device::SimDevice;
pub use transport::{SimPort, SimTransport};
