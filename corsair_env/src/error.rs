//! Error types for the Corsair environment abstraction.

use thiserror::Error;

/// Errors that can occur talking to the simulation fabric.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Could not open a session (DNS, refused, unreachable)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The fabric refused the worker during the handshake
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// Read or write on an established session failed
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Frame encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session is already closed
    #[error("Gateway is disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
}
