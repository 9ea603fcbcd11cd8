//! Error types surfaced by the session core.

use thiserror::Error;

/// Failures reported synchronously to the controller.
///
/// Unknown track ids, unregistered actions and disconnected sinks are not
/// errors: those paths are silent no-ops or deferred propagation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed command payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` for payload validation failures.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Json(_))
    }
}
