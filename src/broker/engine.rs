//! Broker engine
//!
//! The broker owns the shared [`TopicRegistry`] and runs the accept loops.
//! Every accepted connection gets its own task and shares the one registry.
//!
//! Concurrency and usage notes:
//! - `Broker` is cheap to clone; clones share the registry, the connection
//!   limit and the shutdown token, so one clone can serve TCP while another
//!   serves WebSocket.
//! - Failing to accept one connection never stops a listener. Only
//!   [`Broker::shutdown`] does, and it also closes every live connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::registry::TopicRegistry;
use crate::config::{BrokerSettings, ServerSettings};
use crate::transport::connection::ConnectionContext;
use crate::transport::{tcp, websocket};
use crate::utils::error::BrokerError;

/// Pause after a failed `accept`, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Lines,
    WebSocket,
}

#[derive(Debug, Clone)]
pub struct Broker {
    registry: Arc<TopicRegistry>,
    settings: BrokerSettings,
    connections: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            registry: Arc::new(TopicRegistry::new()),
            connections: Arc::new(Semaphore::new(settings.max_connections)),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> Arc<TopicRegistry> {
        self.registry.clone()
    }

    /// Number of connections currently being served, across all listeners.
    pub fn active_connections(&self) -> usize {
        self.settings.max_connections - self.connections.available_permits()
    }

    /// Stops every accept loop and closes every live connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn bind(addr: &str) -> Result<TcpListener, BrokerError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| BrokerError::Bind {
                addr: addr.to_string(),
                source,
            })
    }

    /// Binds the configured addresses and serves until [`Broker::shutdown`].
    pub async fn run(&self, server: &ServerSettings) -> Result<(), BrokerError> {
        let lines = Self::bind(&server.tcp_addr()).await?;

        match server.websocket_addr() {
            Some(addr) => {
                let ws = Self::bind(&addr).await?;
                tokio::join!(self.serve(lines), self.serve_websocket(ws));
            }
            None => self.serve(lines).await,
        }

        Ok(())
    }

    /// Serves the newline-delimited JSON protocol on `listener`.
    pub async fn serve(&self, listener: TcpListener) {
        self.accept_loop(listener, Transport::Lines).await;
    }

    /// Serves the same protocol over WebSocket on `listener`.
    pub async fn serve_websocket(&self, listener: TcpListener) {
        self.accept_loop(listener, Transport::WebSocket).await;
    }

    fn context(&self) -> ConnectionContext {
        ConnectionContext {
            registry: self.registry.clone(),
            settings: self.settings.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    async fn accept_loop(&self, listener: TcpListener, transport: Transport) {
        match listener.local_addr() {
            Ok(addr) => info!(?transport, "listening on {addr}"),
            Err(e) => warn!(?transport, "listening on unknown address: {e}"),
        }

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.spawn_connection(stream, peer, transport),
                Err(e) => {
                    error!(?transport, "failed to accept connection: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!(?transport, "listener stopped");
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, transport: Transport) {
        let Ok(permit) = self.connections.clone().try_acquire_owned() else {
            warn!(
                peer = %peer,
                limit = self.settings.max_connections,
                "connection limit reached, refusing connection"
            );
            return;
        };

        let ctx = self.context();
        tokio::spawn(async move {
            match transport {
                Transport::Lines => tcp::handle_connection(stream, peer, ctx).await,
                Transport::WebSocket => websocket::handle_connection(stream, peer, ctx).await,
            }
            drop(permit);
        });
    }
}
