//! Mirror transport error types.

use thiserror::Error;

/// Errors raised inside a transport.
///
/// These never reach callers of [`crate::Transport`]; they are logged and the
/// transport degrades to offline instead.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The broadcast medium does not exist in this environment.
    #[error("Mirror transport unavailable: {0}")]
    Unavailable(String),

    /// The channel was closed.
    #[error("Mirror channel closed")]
    Closed,

    /// A peer fell too far behind and was dropped.
    #[error("Mirror peer backlog full ({0} bytes queued)")]
    Backlog(usize),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for transport internals.
pub type MirrorResult<T> = Result<T, MirrorError>;
