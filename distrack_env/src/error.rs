//! Error types for the distrack environment abstraction.

use thiserror::Error;

/// Errors that can occur at the fix source boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The platform location service could not be started
    #[error("Location service unavailable: {0}")]
    Unavailable(String),

    /// The event channel was closed (source shut down)
    #[error("Fix channel closed")]
    ChannelClosed,
}

impl SourceError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
