use crate::client::{ChatApi, ChatSocket, ClientError};
use crate::routes::messages::{MessageDto, SeenByDto};
use crate::websocket::message_types::WsOutboundEvent;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Pure state for one open conversation: the message list, who is
/// typing, and seen-receipt bookkeeping. Mutations arrive either from
/// REST responses or from gateway events via [`SessionState::apply`].
#[derive(Debug, Clone)]
pub struct SessionState {
    pub conversation_id: Uuid,
    pub current_user: Uuid,
    pub messages: Vec<MessageDto>,
    // user_id -> display name, present while that user is typing
    pub typing: HashMap<Uuid, String>,
}

impl SessionState {
    pub fn new(conversation_id: Uuid, current_user: Uuid) -> Self {
        Self {
            conversation_id,
            current_user,
            messages: Vec::new(),
            typing: HashMap::new(),
        }
    }

    /// Replace the message list with freshly fetched history.
    pub fn load_history(&mut self, messages: Vec<MessageDto>) {
        self.messages = messages;
    }

    fn contains_message(&self, id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Integrate a gateway event. Returns true if anything changed, so
    /// a UI layer knows when to re-render.
    ///
    /// The gateway echoes the sender's own message back to it;
    /// reconciliation is by message id, so the echo never duplicates an
    /// entry that already arrived through another path.
    pub fn apply(&mut self, event: &WsOutboundEvent) -> bool {
        match event {
            WsOutboundEvent::MessageReceived(message) => {
                if message.conversation_id != self.conversation_id
                    || self.contains_message(message.id)
                {
                    return false;
                }
                self.typing.remove(&message.sender_id);
                self.messages.push(message.clone());
                true
            }

            WsOutboundEvent::UserTyping {
                conversation_id,
                user_id,
                user_name,
            } => {
                if *conversation_id != self.conversation_id {
                    return false;
                }
                self.typing.insert(*user_id, user_name.clone());
                true
            }

            WsOutboundEvent::UserStoppedTyping {
                conversation_id,
                user_id,
            } => {
                *conversation_id == self.conversation_id && self.typing.remove(user_id).is_some()
            }

            WsOutboundEvent::MessagesSeen {
                conversation_id,
                user_id,
                seen_at,
            } => {
                if *conversation_id != self.conversation_id {
                    return false;
                }
                let mut changed = false;
                for message in &mut self.messages {
                    if message.sender_id != *user_id
                        && !message.seen_by.iter().any(|s| s.user == *user_id)
                    {
                        message.seen_by.push(SeenByDto {
                            user: *user_id,
                            seen_at: *seen_at,
                        });
                        changed = true;
                    }
                }
                changed
            }

            WsOutboundEvent::MessageAck { .. } | WsOutboundEvent::Error { .. } => false,
        }
    }

    /// Names of other users currently typing.
    pub fn typing_names(&self) -> Vec<&str> {
        self.typing
            .iter()
            .filter(|(user_id, _)| **user_id != self.current_user)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

/// One open conversation, owned by the UI layer. Created on open,
/// dropped on close; no global state survives it.
pub struct ConversationSession {
    api: Arc<ChatApi>,
    socket: Option<Arc<ChatSocket>>,
    pub state: SessionState,
}

impl ConversationSession {
    /// Open a conversation: fetch history, join its room when a live
    /// socket is available, and mark everything seen (opening the
    /// conversation is what "viewing" means).
    pub async fn open(
        api: Arc<ChatApi>,
        socket: Option<Arc<ChatSocket>>,
        conversation_id: Uuid,
        current_user: Uuid,
    ) -> Result<Self, ClientError> {
        let mut state = SessionState::new(conversation_id, current_user);
        state.load_history(api.list_messages(conversation_id).await?);

        let live = socket.as_ref().filter(|s| s.is_connected());
        if let Some(socket) = live {
            socket.join_conversation(conversation_id)?;
            socket.mark_as_seen(conversation_id, current_user)?;
        } else {
            api.mark_seen(conversation_id).await?;
        }

        Ok(Self { api, socket, state })
    }

    fn live_socket(&self) -> Option<&ChatSocket> {
        self.socket
            .as_deref()
            .filter(|socket| socket.is_connected())
    }

    /// Send through the gateway when connected, otherwise fall back to
    /// HTTP. Either way the message is persisted identically; only live
    /// fan-out differs.
    pub async fn send(&self, content: &str) -> Result<(), ClientError> {
        if let Some(socket) = self.live_socket() {
            return socket.send_message(
                self.state.conversation_id,
                self.state.current_user,
                content,
                None,
            );
        }
        self.api
            .send_message(self.state.conversation_id, content)
            .await?;
        Ok(())
    }

    /// Feed a gateway event into the session. New incoming messages are
    /// immediately marked seen, since the conversation is open.
    pub async fn handle_event(&mut self, event: &WsOutboundEvent) -> Result<bool, ClientError> {
        let changed = self.state.apply(event);

        if changed {
            if let WsOutboundEvent::MessageReceived(message) = event {
                if message.sender_id != self.state.current_user {
                    self.mark_seen().await?;
                }
            }
        }
        Ok(changed)
    }

    pub async fn mark_seen(&self) -> Result<(), ClientError> {
        if let Some(socket) = self.live_socket() {
            return socket.mark_as_seen(self.state.conversation_id, self.state.current_user);
        }
        self.api.mark_seen(self.state.conversation_id).await?;
        Ok(())
    }

    pub fn notify_typing(&self, user_name: &str) -> Result<(), ClientError> {
        match self.live_socket() {
            Some(socket) => socket.typing(
                self.state.conversation_id,
                self.state.current_user,
                user_name,
            ),
            None => Ok(()), // typing state is best effort
        }
    }

    pub fn notify_stopped_typing(&self) -> Result<(), ClientError> {
        match self.live_socket() {
            Some(socket) => {
                socket.stop_typing(self.state.conversation_id, self.state.current_user)
            }
            None => Ok(()),
        }
    }

    /// Leave the room. Called on close; harmless if the socket is gone.
    pub fn close(&self) {
        if let Some(socket) = self.live_socket() {
            let _ = socket.leave_conversation(self.state.conversation_id);
        }
    }
}
