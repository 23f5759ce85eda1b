//! Message transports carrying STOMP text frames
//!
//! `WsTransport` talks to the authority over a WebSocket. `MemoryTransport`
//! is an in-process pair used for simulations and tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::frame::Frame;

/// A bidirectional text channel
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next text message, `None` once the channel is closed
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens a fresh transport for each connect
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn Transport>>;
}

pub struct WsDialer {
    url: String,
}

impl WsDialer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>> {
        info!(url = %self.url, "Opening WebSocket");
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| Error::Protocol(format!("Non UTF-8 frame: {}", e))),
                    )
                }
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Create a connected in-memory transport and the peer on its far end
pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (to_peer, from_client) = mpsc::unbounded_channel();
    let (to_client, from_peer) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            tx: Some(to_peer),
            rx: from_peer,
        },
        MemoryPeer {
            tx: to_client,
            rx: from_client,
        },
    )
}

pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        if self.tx.is_none() {
            return None;
        }
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

/// The authority's side of a `MemoryTransport`
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Push a frame to the client. Returns false once the client is gone.
    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.tx.send(frame.encode()).is_ok()
    }

    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    /// Next frame from the client, `None` once the client closed
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.rx.recv().await?;
            match Frame::decode(&text) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "Peer dropped undecodable frame");
                    continue;
                }
            }
        }
    }

    /// Drain every frame the client has sent so far
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            if let Ok(Some(frame)) = Frame::decode(&text) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Hands out pre-built memory transports in order
#[derive(Default)]
pub struct MemoryDialer {
    queue: Mutex<VecDeque<MemoryTransport>>,
}

impl MemoryDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport and return the peer that controls it
    pub fn push(&self) -> MemoryPeer {
        let (transport, peer) = memory_pair();
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(transport);
        peer
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>> {
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(Error::ChannelConnect("No endpoint available".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Command;

    #[tokio::test]
    async fn test_memory_pair_carries_frames() {
        let (mut transport, mut peer) = memory_pair();
        transport
            .send(Frame::unsubscribe("sub-1-0").encode())
            .await
            .unwrap();
        let frame = peer.recv_frame().await.unwrap();
        assert_eq!(frame.command, Command::Unsubscribe);

        assert!(peer.send_frame(&Frame::new(Command::Receipt).header("receipt-id", "x")));
        let text = transport.recv().await.unwrap().unwrap();
        assert!(text.starts_with("RECEIPT"));
    }

    #[tokio::test]
    async fn test_closed_memory_transport() {
        let (mut transport, peer) = memory_pair();
        transport.close().await.unwrap();
        assert!(transport.recv().await.is_none());
        assert!(transport.send("x".into()).await.is_err());
        assert!(!peer.send_raw("late"));
    }

    #[tokio::test]
    async fn test_memory_dialer_runs_dry() {
        let dialer = MemoryDialer::new();
        let _peer = dialer.push();
        assert!(dialer.dial().await.is_ok());
        assert!(matches!(dialer.dial().await, Err(Error::ChannelConnect(_))));
    }
}
