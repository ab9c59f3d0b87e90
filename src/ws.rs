//! WebSocket upgrade and per-connection session handler.
//!
//! Each session owns the receive half of its socket; the send half is driven
//! by a forwarder task fed from an unbounded channel. The broadcaster and the
//! session's own heartbeat replies both write to that channel, so pushes and
//! replies never interleave mid-frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::unbounded_channel;
use tracing::debug;

use crate::state::AppState;
use crate::types::StreamMessage;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = unbounded_channel::<Message>();

    // Drain the channel into the socket until either side goes away.
    let forward = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let id = state.broadcaster.register(tx.clone()).await;

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) if text == "ping" => {
                let reply = match serde_json::to_string(&StreamMessage::heartbeat()) {
                    Ok(js) => js,
                    Err(_) => break,
                };
                if tx.send(Message::Text(reply)).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Anything else inbound is ignored, per protocol.
            _ => {}
        }
    }

    // Disconnects and transport errors land here; both are normal exits.
    state.broadcaster.unregister(id).await;
    drop(tx);
    forward.abort();
    debug!(id, "session closed");
}
