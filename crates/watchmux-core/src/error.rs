//! Engine error types.

use thiserror::Error;
use watchmux_host::HostError;

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The registry has no engine of this kind.
    #[error("unsupported engine kind: {0}")]
    UnsupportedKind(String),

    /// The host capability rejected an operation.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
