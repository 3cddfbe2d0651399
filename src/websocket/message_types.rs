use crate::routes::messages::MessageDto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket events from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "joinConversation", rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    #[serde(rename = "leaveConversation", rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },

    /// Realtime send. `sender_id` must match the authenticated user;
    /// `client_ref` is echoed back on the ack so the client can match
    /// it to its optimistic entry.
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        conversation_id: Uuid,
        message: String,
        sender_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        conversation_id: Uuid,
        user_id: Uuid,
        user_name: String,
    },

    #[serde(rename = "stopTyping", rename_all = "camelCase")]
    StopTyping { conversation_id: Uuid, user_id: Uuid },

    #[serde(rename = "markAsSeen", rename_all = "camelCase")]
    MarkAsSeen { conversation_id: Uuid, user_id: Uuid },
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// A message landed in a room the client has joined. Sent to every
    /// room member, the sender included.
    #[serde(rename = "messageReceived")]
    MessageReceived(MessageDto),

    #[serde(rename = "userTyping", rename_all = "camelCase")]
    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
        user_name: String,
    },

    #[serde(rename = "userStoppedTyping", rename_all = "camelCase")]
    UserStoppedTyping { conversation_id: Uuid, user_id: Uuid },

    #[serde(rename = "messagesSeen", rename_all = "camelCase")]
    MessagesSeen {
        conversation_id: Uuid,
        user_id: Uuid,
        seen_at: DateTime<Utc>,
    },

    /// Confirmation that a sendMessage was persisted, addressed to the
    /// sender only.
    #[serde(rename = "messageAck", rename_all = "camelCase")]
    MessageAck {
        message_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },

    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
}
