//! Error types for the scan loop

use scout_detect::DetectError;
use thiserror::Error;

/// Errors that end a scan loop
#[derive(Debug, Error)]
pub enum WatchError {
    /// Fatal transport failure surfaced from enumeration
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// The worker task ended abnormally (cancelled or panicked)
    #[error("scan worker ended abnormally: {0}")]
    Worker(String),
}
