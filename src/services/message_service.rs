use crate::error::AppError;
use crate::models::{Message, SeenEntry};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

fn message_from_row(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

pub struct MessageService;

impl MessageService {
    /// Persist a message and bump the conversation's updated_at in one
    /// transaction, so list ordering can never observe one without the
    /// other. `ciphertext` is the already-encoded storage string; both
    /// the HTTP fallback path and the gateway go through here, which is
    /// what makes the two transports indistinguishable at rest.
    pub async fn append_message(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        ciphertext: &str,
    ) -> Result<Message, AppError> {
        let mut tx = db.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, conversation_id, sender_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(ciphertext)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(message_from_row(&row))
    }

    /// Full history for a conversation, ascending chronological order.
    /// Content is returned as stored; callers decrypt.
    pub async fn list_messages(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;
        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Newest message in a conversation, if any.
    pub async fn latest_message(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?;
        Ok(row.as_ref().map(message_from_row))
    }

    /// Seen-ledger entries for a set of messages, grouped by message id.
    pub async fn seen_entries(
        db: &Pool<Postgres>,
        message_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<SeenEntry>>, AppError> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT message_id, user_id, seen_at FROM message_seen WHERE message_id = ANY($1) ORDER BY seen_at ASC",
        )
        .bind(message_ids)
        .fetch_all(db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SeenEntry>> = HashMap::new();
        for row in rows {
            let entry = SeenEntry {
                message_id: row.get("message_id"),
                user_id: row.get("user_id"),
                seen_at: row.get("seen_at"),
            };
            grouped.entry(entry.message_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// Mark every message in the conversation not sent by `user_id` and
    /// not already seen by them. One INSERT..SELECT keeps it a single
    /// atomic store update; ON CONFLICT makes a concurrent duplicate a
    /// no-op rather than an error. Returns the number of messages newly
    /// marked, so a second consecutive call returns 0.
    pub async fn mark_seen(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_seen (message_id, user_id, seen_at)
            SELECT m.id, $2, NOW()
            FROM messages m
            WHERE m.conversation_id = $1
              AND m.sender_id <> $2
              AND NOT EXISTS (
                  SELECT 1 FROM message_seen s
                  WHERE s.message_id = m.id AND s.user_id = $2
              )
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Messages across all of the user's conversations that were sent by
    /// someone else and are absent from the user's seen ledger. The
    /// sender's own messages never count as unread.
    pub async fn unread_count(db: &Pool<Postgres>, user_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE (c.user_low = $1 OR c.user_high = $1)
              AND m.sender_id <> $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_seen s
                  WHERE s.message_id = m.id AND s.user_id = $1
              )
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}
