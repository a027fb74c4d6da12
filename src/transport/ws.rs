//! WebSocket channel to the venue gateway

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::core::{Error, Result};
use crate::transport::{Channel, CloseKind, Inbound};

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsChannel {
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to WebSocket: {}", url);

        let (stream, _) = connect_async(url).await
            .map_err(|e| Error::WebSocket(format!("{}: {}", url, e)))?;

        info!("Connected to WebSocket: {}", url);
        Ok(Self { stream })
    }

    /// Start the close handshake.
    pub async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Only 1000 and 1001 count as a clean close; a close frame without a
/// status code reads as 1005 and is abnormal.
fn close_kind(code: Option<CloseCode>) -> CloseKind {
    match code {
        Some(CloseCode::Normal | CloseCode::Away) => CloseKind::Ok,
        None | Some(_) => CloseKind::Error,
    }
}

fn binary_text(data: Vec<u8>) -> Result<Inbound> {
    String::from_utf8(data)
        .map(Inbound::Text)
        .map_err(|e| Error::MalformedFrame(format!("binary frame is not utf-8: {}", e)))
}

#[async_trait]
impl Channel for WsChannel {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Inbound::Text(text)),
                Some(Ok(Message::Binary(data))) => return binary_text(data),
                Some(Ok(Message::Ping(data))) => {
                    self.stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = &frame {
                        debug!("close frame: code={:?} reason={:?}", frame.code, frame.reason);
                    }
                    return Ok(Inbound::Closed(close_kind(frame.map(|f| f.code))));
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(Inbound::Closed(CloseKind::Ok));
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return Ok(Inbound::Closed(CloseKind::Error));
                }
                None => return Ok(Inbound::Closed(CloseKind::Other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes() {
        assert_eq!(close_kind(None), CloseKind::Error);
        assert_eq!(close_kind(Some(CloseCode::Normal)), CloseKind::Ok);
        assert_eq!(close_kind(Some(CloseCode::Away)), CloseKind::Ok);
        assert_eq!(close_kind(Some(CloseCode::Error)), CloseKind::Error);
        assert_eq!(close_kind(Some(CloseCode::Policy)), CloseKind::Error);
    }

    #[test]
    fn test_binary_frames_must_be_utf8() {
        assert_eq!(
            binary_text(br#"{"id":1}"#.to_vec()).unwrap(),
            Inbound::Text(r#"{"id":1}"#.into())
        );
        let err = binary_text(vec![0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_websocket_error() {
        let err = WsChannel::connect("ws://127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, Error::WebSocket(_)));
    }
}
