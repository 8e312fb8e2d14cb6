use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::wall::{WallEvent, WallSnapshot};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Ask for a full snapshot, e.g. after the client saw `resync`
    Snapshot,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Snapshot { wall: WallSnapshot },
    Event { event: WallEvent },
    /// The client fell behind and missed `skipped` events
    Resync { skipped: u64 },
    Error { message: String },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe and snapshot under the same lock so no event falls in between
    let (mut events, initial) = {
        let wall = state.wall.lock().await;
        (wall.subscribe(), wall.snapshot())
    };

    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        if !send(&mut sender, &ServerMessage::Snapshot { wall: initial }).await {
            return;
        }

        loop {
            let msg = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => ServerMessage::Event { event },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagged behind wall events");
                        ServerMessage::Resync { skipped }
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            if !send(&mut sender, &msg).await {
                break;
            }
        }
    });

    let wall = state.wall.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => ServerMessage::Pong,
                        Ok(ClientMessage::Snapshot) => ServerMessage::Snapshot {
                            wall: wall.lock().await.snapshot(),
                        },
                        Err(e) => ServerMessage::Error {
                            message: format!("unrecognised message: {}", e),
                        },
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    info!("websocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

async fn send<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            debug!("failed to encode websocket message: {}", e);
            true
        }
    }
}
