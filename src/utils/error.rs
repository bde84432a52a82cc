//! The `error` module defines the error types used within `hubsub`.
//!
//! Every failure here is scoped: codec, transport and delivery errors only
//! ever end the connection they happened on, while `BrokerError` covers the
//! few things (binding, configuration) that can stop the process.

use std::io;

use thiserror::Error;

/// A frame that could not be turned into a `Command`, or a payload that
/// could not be encoded.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is not valid UTF-8")]
    NotUtf8,
}

/// Failure of the underlying stream, on either the read or the write side.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("line framing error: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("frame of {0} bytes exceeds the configured maximum")]
    FrameTooLarge(usize),

    #[error("write timed out after {0} ms")]
    WriteTimeout(u64),
}

/// Why a payload could not be handed to one subscriber.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber outbound queue stayed full")]
    Lagging,

    #[error("subscriber connection is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Errors surfaced by [`crate::client::PubSubClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<tokio_util::codec::LinesCodecError> for ClientError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        ClientError::Transport(err.into())
    }
}
