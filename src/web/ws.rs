//! WebSocket endpoint for the signaling and relay channel
//!
//! Each connection at `/api/ws` gets a registry entry and an outbound
//! channel. The socket task shuttles frames: inbound text is parsed as
//! a [`ClientMessage`] and dispatched; anything the registry fans out
//! lands on the outbound channel and is written back as JSON. A
//! heartbeat ping keeps intermediaries from timing out idle viewers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::ConnectionId;
use crate::relay::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::{error_throttled, warn_throttled};

/// WebSocket upgrade handler for `/api/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = state.registry.register(tx);

    info!(connection = %id, "Signaling client connected");

    let heartbeat_secs = state.config.get().hub.heartbeat_secs;
    let mut heartbeat_interval =
        tokio::time::interval(tokio::time::Duration::from_secs(heartbeat_secs));

    let mut shutdown_rx = state.shutdown_signal();

    loop {
        tokio::select! {
            // Inbound frame from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        state.registry.touch(id);
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => dispatch(&state, id, msg),
                            Err(e) => {
                                warn_throttled!(
                                    state.log_throttler,
                                    "bad_client_message",
                                    "Unparseable message from {}: {}", id, e
                                );
                                state.registry.send_to(
                                    id,
                                    ServerMessage::Error {
                                        message: format!("invalid message: {e}"),
                                    },
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        debug!(connection = %id, "Received ping from client");
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!(connection = %id, "Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %id, "WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound message fanned out by the registry
            out = rx.recv() => {
                match out {
                    Some(msg) => {
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    warn!(connection = %id, "Failed to send, disconnecting");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(connection = %id, event = msg.event_name(),
                                      "Failed to serialize outbound message: {}", e);
                            }
                        }
                    }
                    // Registry dropped this entry (stale cleanup)
                    None => break,
                }
            }

            // Heartbeat
            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!(connection = %id, "Failed to send ping, disconnecting");
                    break;
                }
            }

            // Hub shutting down, close the socket cleanly
            _ = shutdown_rx.recv() => {
                info!(connection = %id, "Closing connection on shutdown");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    match state.registry.unregister(id) {
        Some(membership) => info!(
            connection = %id, session = %membership.session, role = %membership.role,
            "Signaling client disconnected"
        ),
        None => info!(connection = %id, "Signaling client disconnected before joining"),
    }
}

/// Route one parsed client message.
///
/// A connection must join before anything else; messages arriving
/// earlier are dropped with an error notice rather than relayed into
/// some default session.
fn dispatch(state: &Arc<AppState>, id: ConnectionId, msg: ClientMessage) {
    if let ClientMessage::Join {
        session,
        role,
        username,
    } = msg
    {
        if state.registry.join(id, session.clone(), role, username) {
            info!(connection = %id, session = %session, role = %role, "Client joined session");
            state.registry.send_to(
                id,
                ServerMessage::Joined {
                    connection_id: id.to_string(),
                    session,
                    role,
                },
            );
        }
        return;
    }

    let Some(membership) = state.registry.membership(id) else {
        warn_throttled!(
            state.log_throttler,
            "message_before_join",
            "Dropping message from {} sent before join", id
        );
        state.registry.send_to(
            id,
            ServerMessage::Error {
                message: "join a session first".to_string(),
            },
        );
        return;
    };
    let session = membership.session;

    match msg {
        // Handled above
        ClientMessage::Join { .. } => {}

        ClientMessage::ViewerReady => {
            state.registry.note_viewer_ready(id);
            let n = state
                .registry
                .broadcast_except(&session, id, ServerMessage::ViewerReady);
            debug!(connection = %id, session = %session, delivered = n, "Viewer ready");
        }

        ClientMessage::StreamOffer(offer) => {
            let n = state
                .registry
                .broadcast_except(&session, id, ServerMessage::StreamOffer(offer));
            state.registry.note_offer_broadcast(&session, id);
            debug!(connection = %id, session = %session, delivered = n, "Relayed offer");
        }

        ClientMessage::StreamAnswer(answer) => {
            state.registry.note_answer_sent(id);
            state
                .registry
                .broadcast_except(&session, id, ServerMessage::StreamAnswer(answer));
        }

        ClientMessage::IceCandidate(candidate) => {
            state
                .registry
                .broadcast_except(&session, id, ServerMessage::IceCandidate(candidate));
        }

        ClientMessage::Subtitle(text) => {
            state
                .registry
                .broadcast_except(&session, id, ServerMessage::Subtitle(text));
        }

        ClientMessage::AudioChunk(chunk) => match &state.transcriber {
            Some(bridge) => {
                let bridge = bridge.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    match bridge.relay_chunk(&chunk).await {
                        Ok(Some(caption)) => {
                            state.registry.broadcast_except(
                                &session,
                                id,
                                ServerMessage::Subtitle(caption),
                            );
                        }
                        Ok(None) => {
                            debug!(connection = %id, "Chunk transcribed to empty text");
                        }
                        Err(e) => {
                            // A failed chunk means no caption, never a dropped stream
                            error_throttled!(
                                state.log_throttler,
                                "transcribe_failed",
                                "Transcription failed for {}: {}", id, e
                            );
                        }
                    }
                });
            }
            None => {
                warn_throttled!(
                    state.log_throttler,
                    "transcribe_disabled",
                    "Audio chunk from {} dropped, transcription is disabled", id
                );
            }
        },

        ClientMessage::StartQa => {
            state
                .registry
                .broadcast_except(&session, id, ServerMessage::StartQa);
        }

        ClientMessage::Question { username, message } => {
            // Everyone sees the question, the asker included
            state
                .registry
                .broadcast_all(&session, ServerMessage::NewQuestion { username, message });
        }

        ClientMessage::StartPoll(definition) => {
            state
                .registry
                .broadcast_except(&session, id, ServerMessage::StartPoll(definition));
        }

        ClientMessage::Vote { username, option } => {
            debug!(connection = %id, session = %session, voter = %username, "Vote received");
            // Voter identity stays out of the relayed event
            state
                .registry
                .broadcast_all(&session, ServerMessage::NewVote { option });
        }
    }
}
