/*! Error types for toplevels operations. */

use super::WindowId;

/// Errors that can occur during toplevels operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToplevelsError {
  #[error("Failed to connect to the compositor: {0}")]
  ConnectionFailed(String),

  #[error("Compositor does not support wlr-foreign-toplevel-management")]
  NoCompositorSupport,

  #[error("Window not found: {0}")]
  NotFound(WindowId),

  #[error("No seat available for focusing")]
  NoSeat,

  #[error("Compositor transport error: {0}")]
  Transport(String),

  #[error("Session is not live")]
  NotLive,

  #[error("Internal error: {0}")]
  Internal(String),
}

impl ToplevelsError {
  /// Whether bootstrap may succeed if attempted again.
  pub const fn is_retryable(&self) -> bool {
    matches!(self, Self::ConnectionFailed(_))
  }
}

/// Result type for toplevels operations.
pub type ToplevelsResult<T> = Result<T, ToplevelsError>;
