use crate::error::AppError;
use crate::models::{Conversation, Message};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

/// Normalize an unordered participant pair to its stored form.
/// Uuid ordering is arbitrary but stable, which is all the unique
/// constraint needs.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn conversation_from_row(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_low: row.get("user_low"),
        user_high: row.get("user_high"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub struct ConversationService;

impl ConversationService {
    /// Find the conversation for an unordered user pair, creating it if
    /// absent. The upsert on the (user_low, user_high) unique constraint
    /// makes this atomic: both participants calling at the same instant
    /// resolve to the same row. The no-op DO UPDATE exists so RETURNING
    /// yields the existing row on conflict.
    pub async fn find_or_create(
        db: &Pool<Postgres>,
        a: Uuid,
        b: Uuid,
    ) -> Result<Conversation, AppError> {
        if a == b {
            return Err(AppError::BadRequest(
                "Cannot create conversation with yourself".into(),
            ));
        }
        let (low, high) = normalize_pair(a, b);
        let row = sqlx::query(
            r#"
            INSERT INTO conversations (id, user_low, user_high)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_low, user_high) DO UPDATE SET user_low = EXCLUDED.user_low
            RETURNING id, user_low, user_high, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(low)
        .bind(high)
        .fetch_one(db)
        .await?;
        Ok(conversation_from_row(&row))
    }

    pub async fn get(db: &Pool<Postgres>, id: Uuid) -> Result<Conversation, AppError> {
        let row = sqlx::query(
            "SELECT id, user_low, user_high, created_at, updated_at FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(conversation_from_row(&row))
    }

    /// Load a conversation and enforce that the caller is one of its two
    /// participants. Missing conversations report NotFound; existing ones
    /// with a non-participant caller report Forbidden.
    pub async fn require_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Conversation, AppError> {
        let conversation = Self::get(db, conversation_id).await?;
        if !conversation.has_participant(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    pub async fn is_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let rec = sqlx::query(
            "SELECT 1 AS one FROM conversations WHERE id = $1 AND (user_low = $2 OR user_high = $2) LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }

    /// All conversations containing the user, newest-updated first, each
    /// with only its most recent message (list-view previews).
    pub async fn list_with_latest(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<(Conversation, Option<Message>)>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.user_low, c.user_high, c.created_at, c.updated_at,
                   m.id AS message_id,
                   m.sender_id AS message_sender_id,
                   m.content AS message_content,
                   m.created_at AS message_created_at
            FROM conversations c
            LEFT JOIN LATERAL (
                SELECT id, sender_id, content, created_at
                FROM messages
                WHERE conversation_id = c.id
                ORDER BY created_at DESC
                LIMIT 1
            ) m ON TRUE
            WHERE c.user_low = $1 OR c.user_high = $1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let out = rows
            .into_iter()
            .map(|row| {
                let conversation = conversation_from_row(&row);
                let message_id: Option<Uuid> = row.try_get("message_id").ok().flatten();
                let latest = message_id.map(|id| {
                    let sender_id: Uuid = row.get("message_sender_id");
                    let content: String = row.get("message_content");
                    let created_at: DateTime<Utc> = row.get("message_created_at");
                    Message {
                        id,
                        conversation_id: conversation.id,
                        sender_id,
                        content,
                        created_at,
                    }
                });
                (conversation, latest)
            })
            .collect();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalization_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
        let (low, high) = normalize_pair(a, b);
        assert!(low < high);
    }
}
