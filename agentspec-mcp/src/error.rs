//! Errors raised by the connection pool and its transports.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum McpError {
    #[error("server '{name}' is not connected")]
    NotConnected { name: String },

    #[error("transport '{transport}' is not supported")]
    UnsupportedTransport { transport: String },

    #[error("connection to '{name}' failed: {reason}")]
    ConnectionFailed { name: String, reason: String },

    #[error("request to '{name}' failed: {reason}")]
    RequestFailed { name: String, reason: String },
}
