//! Error handling - Hierarchical session errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Venue probe error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inbound frame could not be interpreted
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Response carried an id with no pending request
    #[error("Unknown correlation id: {0}")]
    UnknownId(u64),

    /// Request id already outstanding
    #[error("Duplicate correlation id: {0}")]
    DuplicateId(u64),

    /// Notification method without a handler
    #[error("Unhandled notification method: {0}")]
    UnhandledMethod(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Venue rejected a request at the business level
    #[error("Business reject ({ref_method}): {reason}")]
    BusinessReject { ref_method: String, reason: String },

    /// Venue answered a request with an error payload
    #[error("Request {purpose} failed: {error}")]
    RequestFailed { purpose: String, error: String },

    /// Venue rejected the order
    #[error("Order rejected: reason={0}")]
    OrderRejected(String),

    /// No response arrived before the request deadline
    #[error("Request {id} ({purpose}) timed out")]
    RequestTimeout { id: u64, purpose: String },

    /// Connection ended in a way the error policy does not accept
    #[error("Connection {0}")]
    ConnectionClosed(String),
}

impl Error {
    /// Peer sent something the session can no longer trust.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::MalformedFrame(_) | Error::UnknownId(_) | Error::UnhandledMethod(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e.to_string())
    }
}
