//! Session channel lifecycle
//!
//! Owns the transport, the subscription handles and the join handshake for
//! one room at a time. Every subscription id embeds the connection
//! generation, so a frame addressed to an earlier connection can never reach
//! the current one.

use std::sync::Arc;
use std::time::Duration;

use agora_core::Participant;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{Command, Frame};
use crate::protocol::{Destination, Topic};
use crate::transport::{Dialer, Transport};

/// Default bound on waiting for the CONNECTED frame
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A live topic subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: String,
    pub topic: Topic,
    pub destination: String,
}

/// Something the channel delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message { topic: Topic, body: String },
    /// The authority sent an ERROR frame and the channel is gone
    ServerError(String),
    /// The channel closed underneath us
    Closed,
}

pub struct SessionConnector {
    dialer: Arc<dyn Dialer>,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    room_id: Option<String>,
    subscriptions: Vec<SubscriptionHandle>,
    generation: u64,
    joined: Option<Participant>,
    host: String,
    connect_timeout: Duration,
}

impl SessionConnector {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            transport: None,
            state: ConnectionState::Disconnected,
            room_id: None,
            subscriptions: Vec::new(),
            generation: 0,
            joined: None,
            host: "/".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Virtual host named in the CONNECT frame
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.subscriptions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn joined(&self) -> Option<&Participant> {
        self.joined.as_ref()
    }

    /// Open the channel, subscribe to every room topic and join as `me`.
    ///
    /// Subscriptions and the join are only sent after the authority's
    /// CONNECTED frame. Any previous connection is torn down first.
    pub async fn connect(&mut self, room_id: &str, me: Participant) -> Result<()> {
        if self.transport.is_some() || self.state != ConnectionState::Disconnected {
            debug!("Tearing down previous connection before connect");
            self.leave().await;
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.room_id = Some(room_id.to_string());
        info!(room_id = %room_id, generation = self.generation, "Connecting to session channel");

        match self.open(room_id, me).await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!(
                    room_id = %room_id,
                    subscriptions = self.subscriptions.len(),
                    "Joined session"
                );
                Ok(())
            }
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Session channel connect failed");
                self.abandon().await;
                Err(match e {
                    Error::ChannelConnect(_) => e,
                    other => Error::ChannelConnect(other.to_string()),
                })
            }
        }
    }

    async fn open(&mut self, room_id: &str, me: Participant) -> Result<()> {
        let mut transport = self.dialer.dial().await?;
        transport.send(Frame::connect(&self.host).encode()).await?;
        let transport = self.transport.insert(transport);

        match tokio::time::timeout(self.connect_timeout, await_connected(&mut **transport)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::ChannelConnect(format!(
                    "No CONNECTED frame within {:?}",
                    self.connect_timeout
                )))
            }
        }

        for (index, topic) in Topic::ALL.iter().enumerate() {
            let handle = SubscriptionHandle {
                id: format!("sub-{}-{}", self.generation, index),
                topic: *topic,
                destination: topic.path(room_id),
            };
            transport
                .send(Frame::subscribe(&handle.id, &handle.destination).encode())
                .await?;
            debug!(id = %handle.id, topic = %topic, "Subscribed");
            self.subscriptions.push(handle);
        }

        let join = serde_json::to_string(&me).map_err(agora_core::Error::from)?;
        transport
            .send(Frame::send_json(&Destination::Join.path(room_id), join).encode())
            .await?;
        self.joined = Some(me);
        Ok(())
    }

    /// Wait for the next inbound room event
    ///
    /// Heart-beats, receipts and frames for unknown (stale) subscriptions are
    /// skipped. Returns `None` when there is no channel.
    pub async fn next_inbound(&mut self) -> Option<Inbound> {
        loop {
            let transport = self.transport.as_mut()?;
            let text = match transport.recv().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    warn!(error = %e, "Channel read error");
                    self.mark_lost();
                    return Some(Inbound::Closed);
                }
                None => {
                    debug!("Channel closed by authority");
                    self.mark_lost();
                    return Some(Inbound::Closed);
                }
            };

            let frame = match Frame::decode(&text) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "Discarding undecodable frame");
                    continue;
                }
            };

            match frame.command {
                Command::Message => {
                    let Some(sub_id) = frame.get("subscription") else {
                        warn!("MESSAGE frame without subscription header");
                        continue;
                    };
                    match self.subscriptions.iter().find(|h| h.id == sub_id) {
                        Some(handle) => {
                            return Some(Inbound::Message {
                                topic: handle.topic,
                                body: frame.body,
                            })
                        }
                        None => {
                            debug!(subscription = %sub_id, "Dropping frame for stale subscription");
                            continue;
                        }
                    }
                }
                Command::Error => {
                    let message = frame
                        .get("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| frame.body.clone());
                    error!(message = %message, "Authority reported an error");
                    self.mark_lost();
                    return Some(Inbound::ServerError(message));
                }
                other => {
                    debug!(command = other.as_str(), "Ignoring frame");
                    continue;
                }
            }
        }
    }

    /// Send a JSON payload to a room destination
    pub async fn send<T: Serialize>(&mut self, destination: Destination, payload: &T) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        let (Some(transport), Some(room_id)) = (self.transport.as_mut(), self.room_id.as_deref())
        else {
            return Err(Error::NotConnected);
        };
        let body = serde_json::to_string(payload).map_err(agora_core::Error::from)?;
        let path = destination.path(room_id);
        if let Err(e) = transport.send(Frame::send_json(&path, body).encode()).await {
            warn!(destination = %path, error = %e, "Send failed, dropping channel");
            self.mark_lost();
            return Err(e);
        }
        debug!(destination = %path, "Sent");
        Ok(())
    }

    /// Tear down: announce leave, unsubscribe every handle, then close.
    ///
    /// Safe to call in any state; always ends `Disconnected` with no handles.
    pub async fn leave(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            self.reset();
            return;
        };

        if let (Some(me), Some(room_id)) = (self.joined.as_ref(), self.room_id.as_deref()) {
            if self.state == ConnectionState::Connected {
                match serde_json::to_string(me) {
                    Ok(body) => {
                        let frame = Frame::send_json(&Destination::Leave.path(room_id), body);
                        if let Err(e) = transport.send(frame.encode()).await {
                            debug!(error = %e, "Leave announcement not delivered");
                        }
                    }
                    Err(e) => warn!(error = %e, "Could not encode leave announcement"),
                }
            }
        }

        for handle in self.subscriptions.drain(..) {
            if let Err(e) = transport.send(Frame::unsubscribe(&handle.id).encode()).await {
                debug!(id = %handle.id, error = %e, "Unsubscribe not delivered");
            }
        }

        let receipt = format!("disconnect-{}", self.generation);
        if let Err(e) = transport.send(Frame::disconnect(&receipt).encode()).await {
            debug!(error = %e, "DISCONNECT not delivered");
        }
        if let Err(e) = transport.close().await {
            debug!(error = %e, "Transport close failed");
        }

        info!(room_id = ?self.room_id, generation = self.generation, "Left session channel");
        self.reset();
    }

    /// Failed connect: close without the leave announcement
    async fn abandon(&mut self) {
        self.joined = None;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "Transport close failed");
            }
        }
        self.reset();
    }

    fn mark_lost(&mut self) {
        self.transport = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.subscriptions.clear();
        self.joined = None;
        self.room_id = None;
        self.state = ConnectionState::Disconnected;
    }
}

async fn await_connected(transport: &mut dyn Transport) -> Result<()> {
    loop {
        let text = match transport.recv().await {
            Some(result) => result?,
            None => {
                return Err(Error::ChannelConnect(
                    "Channel closed before CONNECTED".into(),
                ))
            }
        };
        match Frame::decode(&text)? {
            None => continue,
            Some(frame) => match frame.command {
                Command::Connected => {
                    debug!(version = ?frame.get("version"), "Channel ready");
                    return Ok(());
                }
                Command::Error => {
                    let message = frame.get("message").unwrap_or("unknown error");
                    return Err(Error::ChannelConnect(message.to_string()));
                }
                other => {
                    debug!(command = other.as_str(), "Ignoring frame before CONNECTED");
                }
            },
        }
    }
}
