use chat_service::services::encryption::EncryptionService;
use chat_service::state::AppState;
use chat_service::websocket::ConnectionRegistry;
use chat_service::{config, db, error, logging, routes};
use crypto_core::jwt as core_jwt;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Run embedded migrations (idempotent); the schema must be in sync
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    core_jwt::initialize_hmac_secret(&cfg.jwt_secret)
        .map_err(|e| error::AppError::StartServer(format!("init jwt: {e}")))?;

    let encryption = Arc::new(EncryptionService::new(cfg.encryption_master_key));
    let registry = ConnectionRegistry::new();

    let state = AppState {
        db: pool,
        registry,
        config: cfg.clone(),
        encryption,
    };

    let app = routes::build_router().with_state(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(format!("serve: {e}")))?;

    Ok(())
}
