//! Error types for device detection

use thiserror::Error;

/// Errors that can occur while enumerating or opening ports
#[derive(Debug, Error)]
pub enum DetectError {
    /// Enumeration failed this time; the caller may treat it as "no ports"
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// The enumeration primitive itself is unusable
    #[error("port enumeration is unusable: {0}")]
    EnumerationBroken(String),

    /// Failed to open a port (busy, missing, permissions)
    #[error("failed to open port {port}: {reason}")]
    OpenFailed {
        /// Port that could not be opened
        port: String,
        /// Underlying reason
        reason: String,
    },
}

impl DetectError {
    /// Whether a scanning caller can keep going after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectError::EnumerationBroken(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_broken_enumeration_is_fatal() {
        assert!(DetectError::EnumerationBroken("gone".into()).is_fatal());
        assert!(!DetectError::EnumerationFailed("flaky".into()).is_fatal());
        assert!(!DetectError::OpenFailed {
            port: "COM3".into(),
            reason: "busy".into(),
        }
        .is_fatal());
    }
}
