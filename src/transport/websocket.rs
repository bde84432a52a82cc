//! WebSocket transport
//!
//! Performs the handshake and adapts the socket to the same frame stream and
//! payload sink the TCP transport produces: every text (or UTF-8 binary)
//! message is one frame and every delivered payload goes out as one text
//! message. Ping/pong is answered by tungstenite; a close frame ends the
//! connection like EOF does on TCP.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt, future};
use tokio::net::TcpStream;
use tokio_tungstenite::accept_async;
use tracing::warn;
use tungstenite::protocol::Message as WsMessage;

use crate::transport::Frame;
use crate::transport::connection::{ConnectionContext, serve_connection};
use crate::utils::error::TransportError;

pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: ConnectionContext) {
    let handshake_timeout = ctx.settings.write_timeout();
    let ws_stream = match tokio::time::timeout(handshake_timeout, accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!(peer = %peer, "WebSocket handshake error: {e}");
            return;
        }
        Err(_) => {
            warn!(
                peer = %peer,
                timeout_ms = handshake_timeout.as_millis() as u64,
                "WebSocket handshake timed out"
            );
            return;
        }
    };

    let max_frame_bytes = ctx.settings.max_frame_bytes;
    let (ws_sender, ws_receiver) = ws_stream.split();

    let frames = ws_receiver
        .take_while(|msg| future::ready(!matches!(msg, Ok(WsMessage::Close(_)))))
        .filter_map(move |msg| future::ready(to_frame(msg, max_frame_bytes)));

    let sink = ws_sender
        .with(|payload: Arc<str>| {
            future::ready(Ok::<_, tungstenite::Error>(WsMessage::text(
                payload.to_string(),
            )))
        })
        .sink_map_err(TransportError::from);

    serve_connection(frames, sink, peer, ctx).await;
}

/// Maps one WebSocket message to a frame. Control messages yield `None`.
fn to_frame(
    msg: Result<WsMessage, tungstenite::Error>,
    max_frame_bytes: usize,
) -> Option<Result<Frame, TransportError>> {
    let frame = match msg {
        Ok(WsMessage::Text(text)) => Frame::Text(text.as_str().to_owned()),
        Ok(WsMessage::Binary(data)) => Frame::Binary(data.to_vec()),
        Ok(_) => return None,
        Err(e) => return Some(Err(e.into())),
    };

    if frame.len() > max_frame_bytes {
        return Some(Err(TransportError::FrameTooLarge(frame.len())));
    }
    Some(Ok(frame))
}
