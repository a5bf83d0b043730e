//! Serial Device Identification Library
//!
//! This crate provides serial port enumeration and handshake probing for
//! a configured set of known devices. A device is described by a
//! [`DeviceProfile`]; the [`HandshakeProber`] opens a candidate port, waits
//! out any boot-time chatter, sends the profile's identification request and
//! checks the reply for the expected substring.
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_detect::{DeviceProfile, HandshakeProber, SerialTransport, SystemTransport};
//!
//! # async fn demo() {
//! let transport = SystemTransport::new();
//! let profile = DeviceProfile::new("Meter", "ID?", "METER-OK", 9600);
//! let prober = HandshakeProber::new();
//!
//! for port in transport.list_ports().unwrap() {
//!     if let Some(_connection) = prober.probe_port(&transport, &port, &profile).await {
//!         println!("{} found on {}", profile.name, port);
//!     }
//! }
//! # }
//! ```

pub mod error;
pub mod probe;
pub mod profile;
pub mod transport;

pub use error::DetectError;
pub use probe::{HandshakeProber, ProbeConfig};
pub use profile::DeviceProfile;
pub use transport::{SerialTransport, SystemTransport};
