//! Client representation
//!
//! `ClientHandle` is the broker-side view of one connection: a unique id, the
//! sending half of the connection's bounded outbound queue, and the token
//! that closes the connection. Handles are cheap to clone; the topic
//! registry stores them and the publish path delivers through them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::utils::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    sender: mpsc::Sender<Arc<str>>,
    closed: CancellationToken,
}

impl ClientHandle {
    /// Create a handle with a fresh id. The receiving half of `sender`
    /// belongs to the connection's writer task.
    pub fn new(sender: mpsc::Sender<Arc<str>>, closed: CancellationToken) -> Self {
        Self {
            id: ClientId::new(),
            sender,
            closed,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queues an encoded payload, waiting at most `timeout` for room in the
    /// subscriber's queue. A queue that stays full that long means the
    /// subscriber is not keeping up.
    pub async fn deliver(&self, payload: Arc<str>, timeout: Duration) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }

        tokio::select! {
            _ = self.closed.cancelled() => Err(DeliveryError::Closed),
            sent = self.sender.send_timeout(payload, timeout) => match sent {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(DeliveryError::Lagging),
                Err(SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
            },
        }
    }

    /// Asks the owning connection to close. Idempotent.
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}
