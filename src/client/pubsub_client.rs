//! Protocol client
//!
//! A thin client for the line protocol. `subscribe` keeps its connection
//! open and yields every payload delivered to it; `publish` opens a
//! connection, writes one request and closes it.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::transport::message::{self, Command, Payload};
use crate::utils::error::ClientError;

#[derive(Debug, Clone)]
pub struct PubSubClient {
    addr: String,
}

impl PubSubClient {
    /// `addr` is the `host:port` of the broker's TCP listener.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn connect(&self) -> Result<Framed<TcpStream, LinesCodec>, ClientError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        Ok(Framed::new(stream, LinesCodec::new()))
    }

    /// Subscribes to `topic` on a new connection.
    ///
    /// The broker does not acknowledge subscriptions, so payloads published
    /// before it has processed the request are not seen.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription, ClientError> {
        let mut framed = self.connect().await?;
        let request = message::encode_command(&Command::Subscribe {
            topic: topic.to_string(),
        })?;
        framed.send(request).await?;
        debug!(topic, addr = %self.addr, "subscription sent");

        Ok(Subscription {
            topic: topic.to_string(),
            framed,
        })
    }

    /// Publishes `data` to `topic` on a one-shot connection.
    pub async fn publish(&self, topic: &str, data: Payload) -> Result<(), ClientError> {
        let mut framed = self.connect().await?;
        let request = message::encode_command(&Command::Publish {
            topic: topic.to_string(),
            data,
        })?;
        framed.send(request).await?;
        SinkExt::<String>::close(&mut framed).await?;
        debug!(topic, addr = %self.addr, "publish sent");
        Ok(())
    }
}

/// An open subscription. Dropping it closes the connection, which
/// unsubscribes it on the broker.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    framed: Framed<TcpStream, LinesCodec>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next delivered payload. `None` once the broker has
    /// closed the connection.
    pub async fn recv(&mut self) -> Option<Result<Payload, ClientError>> {
        let line = match self.framed.next().await? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        Some(message::decode_payload(&line).map_err(ClientError::from))
    }

    /// Invokes `callback` with every delivered payload until the connection
    /// closes.
    pub async fn for_each<F>(mut self, mut callback: F) -> Result<(), ClientError>
    where
        F: FnMut(Payload),
    {
        while let Some(payload) = self.recv().await {
            callback(payload?);
        }
        Ok(())
    }
}
