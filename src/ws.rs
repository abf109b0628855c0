//! WebSocket gateway: one connection per player, routed into a room.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::host::HostEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{JoinedPlayer, RoomRegistry};
use crate::room::events;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub name: Option<String>,
}

/// WebSocket upgrade handler for `/ws/{room_id}`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<WsQuery>,
    State(registry): State<Arc<RoomRegistry>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: room={}, name={:?}",
        room_id,
        params.name
    );

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, params, registry))
}

/// Handle an individual player connection for its whole lifetime.
async fn handle_socket(
    socket: WebSocket,
    room_id: String,
    params: WsQuery,
    registry: Arc<RoomRegistry>,
) {
    let (mut sender, mut receiver) = socket.split();

    let JoinedPlayer {
        handle,
        player_id,
        player_name,
        mut rx,
    } = registry.join(&room_id, params.name).await;

    // The welcome goes to this connection only.
    let message = registry
        .host()
        .narrate(
            &HostEvent::Intro {
                player_name: player_name.clone(),
            },
            None,
        )
        .await;
    let audio = registry.host().synthesize(&message).await;
    let welcome = ServerMessage::Welcome {
        player_id: player_id.clone(),
        player_name: player_name.clone(),
        room_id: room_id.clone(),
        message,
        audio,
    };
    match serde_json::to_string(&welcome) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                tracing::warn!("Failed to send welcome to {}", player_name);
                registry.leave(&room_id, &player_id).await;
                return;
            }
        }
        Err(e) => tracing::error!("Failed to encode welcome message: {}", e),
    }

    // Everyone (including the newcomer) gets the updated roster.
    {
        let room = handle.room.lock().await;
        let roster = room.roster();
        room.broadcast(ServerMessage::PlayerUpdate { players: roster });
    }

    loop {
        tokio::select! {
            // Forward room broadcasts to this socket
            broadcast_msg = rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                // Send failure means this player is gone.
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Connection for {} lagged, skipped {} broadcasts",
                            player_name,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Handle inbound client frames
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received from {}: {}", player_name, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                events::handle_message(&handle, &player_id, client_msg).await;
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by {}", player_name);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error for {}: {}", player_name, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    registry.leave(&room_id, &player_id).await;
    tracing::info!("Connection closed for {} in room {}", player_name, room_id);
}
