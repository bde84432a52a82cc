//! Connection handler
//!
//! Every accepted connection is driven by [`serve_connection`], whatever its
//! transport. The reader loop runs in the connection's own task and
//! dispatches decoded commands; a writer task drains the connection's
//! outbound queue into the transport. A `CancellationToken` ties the two
//! together, and the publish path holds a clone of it through the
//! connection's [`ClientHandle`] so it can evict a subscriber that falls
//! behind.
//!
//! Lifecycle: `Connected` -> `Subscribed(topic)` -> `Closed`. Whatever ends
//! the connection (peer EOF, transport error, malformed frame, write
//! failure, broker shutdown), [`Connection::close`] runs once and removes
//! the connection from the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::publish;
use crate::broker::registry::TopicRegistry;
use crate::client::{ClientHandle, ClientId};
use crate::config::BrokerSettings;
use crate::transport::Frame;
use crate::transport::message::{self, Command};
use crate::utils::error::{CodecError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Subscribed(String),
    Closed,
}

/// What every connection handler shares with the broker.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub registry: Arc<TopicRegistry>,
    pub settings: BrokerSettings,
    pub shutdown: CancellationToken,
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct Connection {
    handle: ClientHandle,
    registry: Arc<TopicRegistry>,
    state: ConnectionState,
    peer: SocketAddr,
    delivery_timeout: Duration,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// `delivery_timeout` bounds how long a publish from this connection
    /// waits on any one subscriber's full queue.
    pub fn new(
        handle: ClientHandle,
        registry: Arc<TopicRegistry>,
        peer: SocketAddr,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            handle,
            registry,
            state: ConnectionState::Connected,
            peer,
            delivery_timeout,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.handle.id()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Decodes and dispatches one frame. Blank frames are ignored.
    ///
    /// An error means the frame was malformed and the connection must be
    /// closed.
    pub async fn handle_frame(&mut self, frame: &Frame) -> Result<(), CodecError> {
        let command = match frame {
            Frame::Text(text) if text.trim().is_empty() => return Ok(()),
            Frame::Text(text) => message::decode(text)?,
            Frame::Binary(data) => message::decode_bytes(data)?,
        };

        self.dispatch(command).await;
        Ok(())
    }

    /// Applies one command. A publish returns once every subscriber has
    /// taken the payload or been dropped, which paces a fast publisher to
    /// its subscribers.
    pub async fn dispatch(&mut self, command: Command) {
        if self.state == ConnectionState::Closed {
            return;
        }

        match command {
            Command::Subscribe { topic } => self.subscribe(topic),
            Command::Publish { topic, data } => {
                let delivery =
                    publish::publish(&self.registry, &topic, &data, self.delivery_timeout).await;
                debug!(
                    client = %self.id(),
                    topic = %topic,
                    delivered = delivery.delivered,
                    "published"
                );
            }
        }
    }

    fn subscribe(&mut self, topic: String) {
        match self.registry.subscribe(&topic, self.handle.clone()) {
            Some(previous) => {
                info!(client = %self.id(), from = %previous, to = %topic, "moved subscription")
            }
            None => info!(client = %self.id(), topic = %topic, "subscribed"),
        }
        self.state = ConnectionState::Subscribed(topic);
    }

    /// Enters `Closed`: signals the writer and removes the connection from
    /// the registry. Only the first call has any effect.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;

        self.handle.disconnect();
        self.registry.unsubscribe(&self.handle.id());

        let session = Utc::now() - self.connected_at;
        info!(
            client = %self.id(),
            peer = %self.peer,
            session_ms = session.num_milliseconds(),
            "connection closed"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drives one connection until it closes.
///
/// `frames` yields decoded transport frames; `sink` accepts encoded payloads
/// for this subscriber. The sink moves into a writer task so a slow peer
/// never stalls the reader.
pub async fn serve_connection<R, W>(mut frames: R, sink: W, peer: SocketAddr, ctx: ConnectionContext)
where
    R: Stream<Item = Result<Frame, TransportError>> + Unpin,
    W: Sink<Arc<str>, Error = TransportError> + Unpin + Send + 'static,
{
    let closed = ctx.shutdown.child_token();
    let (tx, rx) = mpsc::channel(ctx.settings.outbound_queue_capacity.max(1));
    let handle = ClientHandle::new(tx, closed.clone());
    let mut connection =
        Connection::new(handle, ctx.registry, peer, ctx.settings.write_timeout());
    let id = connection.id();

    info!(client = %id, peer = %peer, "connection accepted");

    let writer = tokio::spawn(write_loop(
        sink,
        rx,
        closed.clone(),
        ctx.settings.write_timeout(),
        id,
    ));

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                debug!(client = %id, "connection cancelled");
                break;
            }
            frame = frames.next() => match frame {
                None => {
                    debug!(client = %id, "peer closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(client = %id, "transport error: {e}");
                    break;
                }
                Some(Ok(frame)) => {
                    if let Err(e) = connection.handle_frame(&frame).await {
                        warn!(client = %id, "closing connection: {e}");
                        break;
                    }
                }
            }
        }
    }

    connection.close();

    if let Err(e) = writer.await {
        warn!(client = %id, "writer task failed: {e}");
    }
}

/// Moves queued payloads to the transport until the connection closes.
///
/// Once the connection is closed, payloads already queued are still
/// written before the transport is shut. A failed or timed-out write
/// closes the connection and discards the rest.
pub(crate) async fn write_loop<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Arc<str>>,
    closed: CancellationToken,
    write_timeout: Duration,
    id: ClientId,
) where
    W: Sink<Arc<str>, Error = TransportError> + Unpin,
{
    let mut draining = false;

    loop {
        let payload = tokio::select! {
            biased;
            _ = closed.cancelled(), if !draining => {
                // No new payloads; recv yields what is left, then None.
                outbound.close();
                draining = true;
                continue;
            }
            payload = outbound.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        match tokio::time::timeout(write_timeout, sink.send(payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(client = %id, "write failed: {e}");
                break;
            }
            Err(_) => {
                let e = TransportError::WriteTimeout(write_timeout.as_millis() as u64);
                warn!(client = %id, "{e}");
                break;
            }
        }
    }

    closed.cancel();

    if let Ok(Err(e)) = tokio::time::timeout(write_timeout, sink.close()).await {
        debug!(client = %id, "error while closing transport: {e}");
    }
}
