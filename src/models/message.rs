use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored message. `content` is the ciphertext envelope as persisted;
/// decryption happens at read time in the route/gateway layer. Immutable
/// after insert except for seen-ledger appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the seen-by ledger: a non-sender participant and when they
/// first viewed the message. At most one entry per user per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenEntry {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub seen_at: DateTime<Utc>,
}
