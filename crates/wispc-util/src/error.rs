//! Error types for `wispc-util` itself.

use thiserror::Error;

/// Errors raised by the diagnostic handler.
#[derive(Debug, Error)]
pub enum WispUtilError {
    /// Tried to format a diagnostic with no message.
    #[error("diagnostic has no message")]
    EmptyMessage,
}
