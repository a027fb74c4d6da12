//! Transport - a bidirectional text message channel to the venue

pub mod memory;
pub mod ws;

use async_trait::async_trait;

use crate::core::Result;

pub use memory::{MemoryChannel, MemoryPeer};
pub use ws::WsChannel;

/// How the connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseKind {
    /// Clean close handshake from either side
    Ok,
    /// Abnormal closure (error close code, protocol error, reset)
    Error,
    /// Stream ended without a close frame
    Other,
}

impl std::fmt::Display for CloseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseKind::Ok => write!(f, "closed ok"),
            CloseKind::Error => write!(f, "closed error"),
            CloseKind::Other => write!(f, "closed"),
        }
    }
}

/// One message off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Closed(CloseKind),
}

/// One message = one protocol frame.
#[async_trait]
pub trait Channel: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound message. A closed connection is `Inbound::Closed`, not an error.
    async fn recv(&mut self) -> Result<Inbound>;
}
