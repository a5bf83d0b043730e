//! Events emitted by the scan loop
//!
//! Whoever displays scan results receives these over an mpsc channel. The
//! loop emits exactly one [`Status`](WatchEvent::Status) per cycle, in cycle
//! order, and a single [`Finished`](WatchEvent::Finished) as the last event
//! it ever sends.

/// Notification from the scan loop to its host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The per-cycle presence report, ready for display
    Status {
        /// One `"<name>: <port>"` entry per bound device, joined with
        /// `",\n "`; empty when nothing is bound
        text: String,
    },

    /// The loop hit an unrecoverable error and is shutting down
    Error {
        /// Human-readable description
        message: String,
    },

    /// The loop has stopped; no further events follow
    Finished,
}
