use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

pub mod handlers;
pub mod message_types;

/// Tracks which live connections are joined to which conversations.
///
/// A connection has one outbound channel and may be joined to many
/// conversations at once. Dead senders are dropped lazily on the next
/// broadcast that touches their room.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // conversation_id -> (connection_id -> outbound channel)
    rooms: Arc<RwLock<HashMap<Uuid, HashMap<Uuid, UnboundedSender<Message>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a connection to a conversation room.
    pub async fn join(
        &self,
        conversation_id: Uuid,
        connection_id: Uuid,
        sender: UnboundedSender<Message>,
    ) {
        let mut guard = self.rooms.write().await;
        guard
            .entry(conversation_id)
            .or_default()
            .insert(connection_id, sender);
        tracing::debug!(
            %conversation_id,
            %connection_id,
            members = guard.get(&conversation_id).map(|m| m.len()).unwrap_or(0),
            "connection joined room"
        );
    }

    /// Remove a connection from a conversation room. Empty rooms are
    /// removed from the registry so it cannot grow without bound.
    pub async fn leave(&self, conversation_id: Uuid, connection_id: Uuid) {
        let mut guard = self.rooms.write().await;
        if let Some(members) = guard.get_mut(&conversation_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                guard.remove(&conversation_id);
            }
        }
    }

    /// Send a text frame to every connection in the room, the origin
    /// included. Senders whose connection has gone away are pruned.
    pub async fn broadcast(&self, conversation_id: Uuid, text: String) {
        self.fan_out(conversation_id, None, text).await;
    }

    /// Send a text frame to every connection in the room except one.
    pub async fn broadcast_except(&self, conversation_id: Uuid, skip: Uuid, text: String) {
        self.fan_out(conversation_id, Some(skip), text).await;
    }

    async fn fan_out(&self, conversation_id: Uuid, skip: Option<Uuid>, text: String) {
        let mut guard = self.rooms.write().await;
        if let Some(members) = guard.get_mut(&conversation_id) {
            members.retain(|connection_id, sender| {
                if skip == Some(*connection_id) {
                    return true;
                }
                sender.send(Message::Text(text.clone())).is_ok()
            });
            if members.is_empty() {
                guard.remove(&conversation_id);
            }
        }
    }

    /// Number of live connections in a room (for logging).
    pub async fn room_size(&self, conversation_id: Uuid) -> usize {
        let guard = self.rooms.read().await;
        guard.get(&conversation_id).map(|m| m.len()).unwrap_or(0)
    }
}
