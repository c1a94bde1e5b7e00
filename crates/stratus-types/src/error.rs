//! Error types for the Stratus pipeline.
//!
//! All crates return `StratusResult<T>` from fallible operations.
//! None of these errors is transient: each one aborts the current output
//! cycle rather than being retried.

use thiserror::Error;

/// Unified error type for the Stratus pipeline.
#[derive(Debug, Error)]
pub enum StratusError {
    /// Geometry or writer configuration is invalid (e.g. negative sizes).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The declare/write sequencing contract was broken (handle queue
    /// underflow or overflow, declaration after the first write).
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A caller handed the packer a geometry that does not fit the source layout.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// An output backend call failed.
    #[error("Backend {op} failed: {message}")]
    Backend {
        /// The backend operation (`open`, `reserve`, `write`, `close`, ...).
        op: &'static str,
        message: String,
    },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container encoding/decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StratusError {
    /// Shorthand for a failed backend operation.
    pub fn backend(op: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            op,
            message: message.into(),
        }
    }

    /// Returns true for errors that indicate a bug in the caller or in the
    /// pipeline itself, as opposed to resource or I/O failures.
    pub fn is_fatal_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Precondition(_))
    }
}

/// Convenience alias for `Result<T, StratusError>`.
pub type StratusResult<T> = Result<T, StratusError>;
