//! Binary WebSocket echo
//!
//! Every binary frame received on `/ws/audio` is sent back unchanged on the
//! same connection, in order. Text frames are ignored. The loop ends when the
//! peer closes or the connection fails. There is no auth and no shared state.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upgrade to a WebSocket and echo binary frames
///
/// Frame and message sizes are unbounded, so any frame the transport
/// delivers is echoed.
pub async fn audio_echo_handler(ws: WebSocketUpgrade) -> Response {
    ws.max_frame_size(usize::MAX)
        .max_message_size(usize::MAX)
        .on_upgrade(handle_audio_socket)
}

async fn handle_audio_socket(socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "Audio echo connection opened");

    let (mut sender, mut receiver) = socket.split();
    let mut frames: u64 = 0;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                if let Err(e) = sender.send(Message::Binary(data)).await {
                    warn!(%connection_id, error = %e, "Failed to echo audio frame");
                    break;
                }
                frames += 1;
            }
            Ok(Message::Text(_)) => {
                debug!(%connection_id, "Ignoring text frame");
            }
            // Pong replies are sent by the transport
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(%connection_id, "Peer closed audio connection");
                break;
            }
            Err(e) => {
                warn!(%connection_id, error = %e, "Audio connection error");
                break;
            }
        }
    }

    let _ = sender.close().await;
    info!(%connection_id, frames, "Audio echo connection closed");
}
