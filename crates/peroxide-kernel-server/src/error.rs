//! Error types for the kernel server.

use std::path::PathBuf;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection file could not be read or understood.
    #[error("Bad connection file {path}: {message}")]
    Connection { path: PathBuf, message: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZeroMQ socket error.
    #[error("Socket error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    /// A message carried a missing or wrong HMAC signature.
    #[error("Invalid message signature")]
    Signature,

    /// A message did not follow the wire protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Kernel core error.
    #[error("Kernel error: {0}")]
    Core(#[from] peroxide_kernel_core::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
