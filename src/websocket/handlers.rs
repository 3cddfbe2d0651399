use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::auth::authenticate;
use crate::routes::messages::MessageDto;
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// The handshake carries the token in the query string (browser WebSocket
/// clients cannot set headers) or in the Authorization header.
fn validate_ws_token(
    params: &WsParams,
    headers: &HeaderMap,
) -> Result<Uuid, axum::http::StatusCode> {
    let token = params.token.clone().or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    });

    match token {
        None => {
            warn!("WebSocket connection rejected: no token provided");
            Err(axum::http::StatusCode::UNAUTHORIZED)
        }
        Some(t) => authenticate(&t).map_err(|_| {
            warn!("WebSocket connection rejected: invalid token");
            axum::http::StatusCode::UNAUTHORIZED
        }),
    }
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_id = match validate_ws_token(&params, &headers) {
        Ok(user_id) => user_id,
        Err(status) => return status.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

fn send_event(tx: &UnboundedSender<Message>, event: &WsOutboundEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        let _ = tx.send(Message::Text(text));
    }
}

fn send_error(tx: &UnboundedSender<Message>, message: impl Into<String>) {
    send_event(
        tx,
        &WsOutboundEvent::Error {
            message: message.into(),
            client_ref: None,
        },
    );
}

async fn broadcast_event(state: &AppState, conversation_id: Uuid, event: &WsOutboundEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        state.registry.broadcast(conversation_id, text).await;
    }
}

async fn broadcast_event_except(
    state: &AppState,
    conversation_id: Uuid,
    skip: Uuid,
    event: &WsOutboundEvent,
) {
    if let Ok(text) = serde_json::to_string(event) {
        state
            .registry
            .broadcast_except(conversation_id, skip, text)
            .await;
    }
}

async fn handle_socket(state: AppState, user_id: Uuid, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = unbounded_channel::<Message>();
    let mut joined: HashSet<Uuid> = HashSet::new();

    debug!(%user_id, %connection_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            // Frames queued for this connection (broadcasts and direct replies)
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsInboundEvent>(&text) {
                            Ok(event) => {
                                handle_event(&state, user_id, connection_id, &tx, &mut joined, event)
                                    .await;
                            }
                            Err(_) => send_error(&tx, "unrecognized event"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by the framework
                    Some(Err(_)) => break,
                }
            }
        }
    }

    for conversation_id in joined {
        state.registry.leave(conversation_id, connection_id).await;
    }
    debug!(%user_id, %connection_id, "websocket disconnected");
}

async fn handle_event(
    state: &AppState,
    user_id: Uuid,
    connection_id: Uuid,
    tx: &UnboundedSender<Message>,
    joined: &mut HashSet<Uuid>,
    event: WsInboundEvent,
) {
    match event {
        WsInboundEvent::JoinConversation { conversation_id } => {
            match ConversationService::is_participant(&state.db, conversation_id, user_id).await {
                Ok(true) => {
                    state
                        .registry
                        .join(conversation_id, connection_id, tx.clone())
                        .await;
                    joined.insert(conversation_id);
                }
                Ok(false) => {
                    warn!(%user_id, %conversation_id, "join rejected: not a participant");
                    send_error(tx, "not a participant of this conversation");
                }
                Err(err) => {
                    warn!(%user_id, %conversation_id, error = %err, "join failed");
                    send_error(tx, "failed to join conversation");
                }
            }
        }

        WsInboundEvent::LeaveConversation { conversation_id } => {
            state.registry.leave(conversation_id, connection_id).await;
            joined.remove(&conversation_id);
        }

        WsInboundEvent::SendMessage {
            conversation_id,
            message,
            sender_id,
            client_ref,
        } => {
            if sender_id != user_id {
                send_error(tx, "senderId does not match the authenticated user");
                return;
            }
            if !joined.contains(&conversation_id) {
                send_error(tx, "join the conversation room first");
                return;
            }
            match persist_message(state, conversation_id, user_id, &message).await {
                Ok(dto) => {
                    let message_id = dto.id;
                    broadcast_event(
                        state,
                        conversation_id,
                        &WsOutboundEvent::MessageReceived(dto),
                    )
                    .await;
                    send_event(
                        tx,
                        &WsOutboundEvent::MessageAck {
                            message_id,
                            client_ref,
                        },
                    );
                }
                Err(err) => {
                    warn!(%user_id, %conversation_id, error = %err, "send failed");
                    send_event(
                        tx,
                        &WsOutboundEvent::Error {
                            message: err.to_string(),
                            client_ref,
                        },
                    );
                }
            }
        }

        WsInboundEvent::Typing {
            conversation_id,
            user_id: evt_user_id,
            user_name,
        } => {
            // Events claiming another identity are dropped
            if evt_user_id != user_id {
                return;
            }
            if !joined.contains(&conversation_id) {
                send_error(tx, "join the conversation room first");
                return;
            }
            broadcast_event_except(
                state,
                conversation_id,
                connection_id,
                &WsOutboundEvent::UserTyping {
                    conversation_id,
                    user_id,
                    user_name,
                },
            )
            .await;
        }

        WsInboundEvent::StopTyping {
            conversation_id,
            user_id: evt_user_id,
        } => {
            if evt_user_id != user_id {
                return;
            }
            if !joined.contains(&conversation_id) {
                send_error(tx, "join the conversation room first");
                return;
            }
            broadcast_event_except(
                state,
                conversation_id,
                connection_id,
                &WsOutboundEvent::UserStoppedTyping {
                    conversation_id,
                    user_id,
                },
            )
            .await;
        }

        WsInboundEvent::MarkAsSeen {
            conversation_id,
            user_id: evt_user_id,
        } => {
            if evt_user_id != user_id {
                send_error(tx, "userId does not match the authenticated user");
                return;
            }
            if !joined.contains(&conversation_id) {
                send_error(tx, "join the conversation room first");
                return;
            }
            match mark_seen(state, conversation_id, user_id).await {
                // announced even when nothing was newly marked
                Ok(_) => {
                    broadcast_event_except(
                        state,
                        conversation_id,
                        connection_id,
                        &WsOutboundEvent::MessagesSeen {
                            conversation_id,
                            user_id,
                            seen_at: chrono::Utc::now(),
                        },
                    )
                    .await;
                }
                Err(err) => {
                    warn!(%user_id, %conversation_id, error = %err, "mark seen failed");
                    send_error(tx, err.to_string());
                }
            }
        }
    }
}

/// Encrypt, persist, and shape the DTO for fan-out. Both failure modes
/// (not a participant, store error) surface to the sender as an error
/// event while the room sees nothing.
async fn persist_message(
    state: &AppState,
    conversation_id: Uuid,
    sender_id: Uuid,
    plaintext: &str,
) -> Result<MessageDto, crate::error::AppError> {
    if plaintext.is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "message content is required".into(),
        ));
    }
    ConversationService::require_participant(&state.db, conversation_id, sender_id).await?;

    let ciphertext = state.encryption.encrypt_content(plaintext)?;
    let message =
        MessageService::append_message(&state.db, conversation_id, sender_id, &ciphertext).await?;

    Ok(MessageDto::from_parts(
        &message,
        plaintext.to_string(),
        Vec::new(),
    ))
}

async fn mark_seen(
    state: &AppState,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<u64, crate::error::AppError> {
    ConversationService::require_participant(&state.db, conversation_id, user_id).await?;
    MessageService::mark_seen(&state.db, conversation_id, user_id).await
}
