//! Store-level properties: pair uniqueness, seen-ledger idempotence,
//! unread accounting, participant enforcement, and encryption at rest.
//!
//! All tests here need Postgres; run with `cargo test -- --ignored` and
//! DATABASE_URL set.

mod common;

use chat_service::error::AppError;
use chat_service::services::conversation_service::ConversationService;
use chat_service::services::encryption::EncryptionService;
use chat_service::services::message_service::MessageService;
use sqlx::Row;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn find_or_create_is_idempotent_and_order_independent() {
    let pool = common::setup_pool().await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let first = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("create");
    let again = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("repeat");
    let reversed = ConversationService::find_or_create(&pool, b, a)
        .await
        .expect("reversed");

    assert_eq!(first.id, again.id);
    assert_eq!(first.id, reversed.id);
    assert!(first.has_participant(a));
    assert!(first.has_participant(b));
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn concurrent_find_or_create_resolves_to_one_conversation() {
    let pool = common::setup_pool().await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    // both participants hit create-or-get in the same instant
    let (left, right) = tokio::join!(
        ConversationService::find_or_create(&pool, a, b),
        ConversationService::find_or_create(&pool, b, a),
    );
    let left = left.expect("left create");
    let right = right.expect("right create");
    assert_eq!(left.id, right.id);

    let count: i64 = sqlx::query(
        "SELECT COUNT(*)::bigint AS n FROM conversations WHERE user_low = $1 AND user_high = $2",
    )
    .bind(left.user_low)
    .bind(left.user_high)
    .fetch_one(&pool)
    .await
    .expect("count")
    .get("n");
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn self_conversation_is_rejected() {
    let pool = common::setup_pool().await;
    let a = Uuid::new_v4();

    let err = ConversationService::find_or_create(&pool, a, a)
        .await
        .expect_err("self pair must fail");
    assert!(matches!(err, AppError::BadRequest(_)));
}

async fn send(
    pool: &sqlx::PgPool,
    encryption: &EncryptionService,
    conversation_id: Uuid,
    sender: Uuid,
    text: &str,
) -> Uuid {
    let ciphertext = encryption.encrypt_content(text).expect("encrypt");
    MessageService::append_message(pool, conversation_id, sender, &ciphertext)
        .await
        .expect("append")
        .id
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn mark_seen_is_idempotent_and_unread_accounting_holds() {
    let pool = common::setup_pool().await;
    let encryption = EncryptionService::new(common::MASTER_KEY);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("create");

    for text in ["one", "two", "three"] {
        send(&pool, &encryption, conversation.id, a, text).await;
    }

    // sender never counts their own messages as unread
    assert_eq!(MessageService::unread_count(&pool, a).await.unwrap(), 0);
    assert_eq!(MessageService::unread_count(&pool, b).await.unwrap(), 3);

    let marked = MessageService::mark_seen(&pool, conversation.id, b)
        .await
        .expect("mark seen");
    assert_eq!(marked, 3);
    assert_eq!(MessageService::unread_count(&pool, b).await.unwrap(), 0);

    // second consecutive call is a no-op
    let marked_again = MessageService::mark_seen(&pool, conversation.id, b)
        .await
        .expect("mark seen again");
    assert_eq!(marked_again, 0);

    // the ledger never contains the sender
    let messages = MessageService::list_messages(&pool, conversation.id)
        .await
        .expect("list");
    let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
    let seen = MessageService::seen_entries(&pool, &ids).await.expect("seen");
    for entries in seen.values() {
        assert!(entries.iter().all(|e| e.user_id == b));
    }
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn participants_are_enforced_before_content_access() {
    let pool = common::setup_pool().await;
    let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let conversation = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("create");

    let missing = ConversationService::require_participant(&pool, Uuid::new_v4(), a)
        .await
        .expect_err("unknown conversation");
    assert!(matches!(missing, AppError::NotFound));

    let forbidden = ConversationService::require_participant(&pool, conversation.id, outsider)
        .await
        .expect_err("outsider");
    assert!(matches!(forbidden, AppError::Forbidden));
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn content_is_encrypted_at_rest_and_legacy_rows_read_back_unchanged() {
    let pool = common::setup_pool().await;
    let encryption = EncryptionService::new(common::MASTER_KEY);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("create");

    let message_id = send(&pool, &encryption, conversation.id, a, "secret text").await;

    let stored: String = sqlx::query("SELECT content FROM messages WHERE id = $1")
        .bind(message_id)
        .fetch_one(&pool)
        .await
        .expect("fetch raw")
        .get("content");
    assert_ne!(stored, "secret text");
    assert!(!stored.contains("secret text"));
    assert_eq!(encryption.decrypt_content(&stored).unwrap(), "secret text");

    // a pre-codec row stored as bare plaintext
    MessageService::append_message(&pool, conversation.id, a, "legacy plain row")
        .await
        .expect("legacy append");
    let messages = MessageService::list_messages(&pool, conversation.id)
        .await
        .expect("list");
    let last = messages.last().expect("legacy row present");
    assert_eq!(
        encryption.decrypt_content(&last.content).unwrap(),
        "legacy plain row"
    );
}

#[tokio::test]
#[ignore = "requires Postgres (set DATABASE_URL)"]
async fn appending_bumps_updated_at_and_list_order() {
    let pool = common::setup_pool().await;
    let encryption = EncryptionService::new(common::MASTER_KEY);
    let a = Uuid::new_v4();
    let (b, c) = (Uuid::new_v4(), Uuid::new_v4());

    let with_b = ConversationService::find_or_create(&pool, a, b)
        .await
        .expect("create");
    let with_c = ConversationService::find_or_create(&pool, a, c)
        .await
        .expect("create");

    send(&pool, &encryption, with_b.id, b, "older").await;
    send(&pool, &encryption, with_c.id, c, "newer").await;

    let listed = ConversationService::list_with_latest(&pool, a)
        .await
        .expect("list");
    assert_eq!(listed.len(), 2);
    // newest-updated first, each with its latest message attached
    assert_eq!(listed[0].0.id, with_c.id);
    assert_eq!(listed[1].0.id, with_b.id);
    let preview = listed[0].1.as_ref().expect("latest message");
    assert_eq!(encryption.decrypt_content(&preview.content).unwrap(), "newer");
    assert!(listed[0].0.updated_at >= listed[0].0.created_at);
}
