//! The `transport` module is responsible for network communication with
//! clients.
//!
//! It defines the wire protocol, the per-connection handler, and the two
//! ways a connection can arrive: a raw TCP stream carrying one JSON object
//! per line, or a WebSocket carrying one JSON object per message. Both are
//! reduced to a stream of [`Frame`]s and a sink of encoded payloads, and
//! from there are handled identically.

pub mod connection;
pub mod message;
pub mod tcp;
pub mod websocket;

/// One complete application-level message as cut out of the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub(crate) fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }
}
