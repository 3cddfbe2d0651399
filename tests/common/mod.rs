//! Shared helpers for integration tests.
//!
//! These tests need a throwaway Postgres instance; point DATABASE_URL at
//! one and drop the #[ignore] filter (`cargo test -- --ignored`). Users
//! are plain UUIDs, so each test can mint fresh ones and never collide
//! with other tests sharing the database.

#![allow(dead_code)]

use chat_service::config::Config;
use chat_service::routes;
use chat_service::services::encryption::EncryptionService;
use chat_service::state::AppState;
use chat_service::websocket::ConnectionRegistry;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const MASTER_KEY: [u8; 32] = [7u8; 32];

pub fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database")
}

pub async fn setup_pool() -> Pool<Postgres> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url())
        .await
        .expect("connect to test database");
    chat_service::db::MIGRATOR
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub fn init_auth() {
    crypto_core::jwt::initialize_hmac_secret(JWT_SECRET).expect("init jwt secret");
}

pub fn token_for(user_id: Uuid) -> String {
    crypto_core::jwt::generate_token(user_id, chrono::Duration::hours(1))
        .expect("generate test token")
}

pub fn test_state(pool: Pool<Postgres>) -> AppState {
    let config = Config {
        database_url: database_url(),
        port: 0,
        jwt_secret: JWT_SECRET.to_string(),
        encryption_master_key: MASTER_KEY,
    };
    AppState {
        db: pool,
        registry: ConnectionRegistry::new(),
        config: Arc::new(config),
        encryption: Arc::new(EncryptionService::new(MASTER_KEY)),
    }
}

/// Serve the full router on an ephemeral port. Returns the HTTP base url
/// and the gateway url.
pub async fn spawn_app(pool: Pool<Postgres>) -> (String, String) {
    init_auth();
    let state = test_state(pool);
    let app = routes::build_router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test app");
    });

    (format!("http://{addr}"), format!("ws://{addr}/api/chat/ws"))
}
