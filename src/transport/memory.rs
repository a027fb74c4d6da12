//! In-process channel pair for replaying venue traffic without a socket

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::{Error, Result};
use crate::transport::{Channel, CloseKind, Inbound};

/// Session side of the pair
pub struct MemoryChannel {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Venue side of the pair
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<String>,
}

pub fn pair() -> (MemoryChannel, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel { inbound: in_rx, outbound: out_tx },
        MemoryPeer { tx: in_tx, rx: out_rx },
    )
}

impl MemoryPeer {
    /// Queue a frame for the session to receive.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.tx.send(Inbound::Text(text.into()));
    }

    pub fn close(&self, kind: CloseKind) {
        let _ = self.tx.send(Inbound::Closed(kind));
    }

    /// Drain everything the session has sent so far.
    pub fn sent(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            out.push(text);
        }
        out
    }

    /// Like [`MemoryPeer::sent`], parsed as JSON.
    pub fn sent_json(&mut self) -> Result<Vec<Value>> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| Error::WebSocket("memory peer dropped".into()))
    }

    /// A dropped peer reads as a connection that ended without a close frame.
    async fn recv(&mut self) -> Result<Inbound> {
        Ok(self.inbound.recv().await.unwrap_or(Inbound::Closed(CloseKind::Other)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_round_trip() {
        let (mut chan, mut peer) = pair();
        peer.push(r#"{"id":1,"result":"success"}"#);
        peer.close(CloseKind::Ok);

        chan.send("hello".into()).await.unwrap();
        assert_eq!(peer.sent(), vec!["hello".to_string()]);
        assert!(matches!(chan.recv().await.unwrap(), Inbound::Text(_)));
        assert_eq!(chan.recv().await.unwrap(), Inbound::Closed(CloseKind::Ok));
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_closed() {
        let (mut chan, peer) = pair();
        drop(peer);
        assert_eq!(chan.recv().await.unwrap(), Inbound::Closed(CloseKind::Other));
        assert!(chan.send("x".into()).await.is_err());
    }
}
