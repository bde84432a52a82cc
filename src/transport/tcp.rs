//! Line-framed TCP transport
//!
//! Each frame is one line of compact JSON terminated by `\n` (a trailing
//! `\r` is tolerated). Reads may split or coalesce lines arbitrarily, so the
//! `LinesCodec` reassembles them and rejects any line longer than
//! `max_frame_bytes`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::debug;

use crate::transport::Frame;
use crate::transport::connection::{ConnectionContext, serve_connection};
use crate::utils::error::TransportError;

pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: ConnectionContext) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, "failed to set TCP_NODELAY: {e}");
    }

    let (read_half, write_half) = stream.into_split();

    let frames = FramedRead::new(
        read_half,
        LinesCodec::new_with_max_length(ctx.settings.max_frame_bytes),
    )
    .map(|line| line.map(Frame::Text).map_err(TransportError::from));

    let sink = SinkExt::<Arc<str>>::sink_map_err(
        FramedWrite::new(write_half, LinesCodec::new()),
        TransportError::from,
    );

    serve_connection(frames, sink, peer, ctx).await;
}
