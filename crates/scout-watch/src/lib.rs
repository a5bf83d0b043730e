//! Device Presence Scanning
//!
//! This crate drives the repeated scan cycles that keep track of which
//! configured serial devices are currently connected. Each cycle enumerates
//! the available ports, probes them for every profile that is not yet bound
//! to a port, reconciles disconnections, and emits one status string.
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_detect::{DeviceProfile, SystemTransport};
//! use scout_watch::{spawn_watcher, WatchConfig, WatchEvent};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() {
//! let profiles = vec![DeviceProfile::new("Meter", "ID?", "METER-OK", 9600)];
//! let (event_tx, mut event_rx) = mpsc::channel(16);
//!
//! let handle = spawn_watcher(
//!     SystemTransport::new(),
//!     profiles,
//!     WatchConfig::default(),
//!     event_tx,
//! );
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         WatchEvent::Status { text } => println!("{text}"),
//!         WatchEvent::Error { message } => eprintln!("{message}"),
//!         WatchEvent::Finished => break,
//!     }
//! }
//! # let _ = handle;
//! # }
//! ```

pub mod error;
pub mod events;
pub mod state;
pub mod watcher;

pub use error::WatchError;
pub use events::WatchEvent;
pub use state::{DeviceBinding, WatchState};
pub use watcher::{run_watcher, spawn_watcher, StopSignal, WatchConfig, WatchHandle};
