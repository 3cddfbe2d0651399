use crate::state::AppState;
use axum::middleware;
use axum::{
    routing::{get, post},
    Router,
};

pub mod conversations;
use conversations::{create_conversation, get_conversation, list_conversations};
pub mod messages;
use messages::{get_message_history, get_unread_count, mark_messages_seen, send_message};

use crate::websocket::handlers::ws_handler;

pub fn build_router() -> Router<AppState> {
    // Service introspection (public, no auth)
    let introspection = Router::new().route("/health", get(|| async { "OK" }));

    // Chat REST API, all behind bearer auth
    let api = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations", post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/messages", post(send_message))
        .route("/messages/:conversation_id", get(get_message_history))
        .route("/messages/:conversation_id/seen", post(mark_messages_seen))
        .route("/unread-count", get(get_unread_count));

    let secured_api = api.layer(middleware::from_fn(
        crate::middleware::auth::auth_middleware,
    ));

    // The WebSocket handshake authenticates itself (token in the query
    // string or Authorization header), so it sits outside the middleware.
    let gateway = Router::new().route("/ws", get(ws_handler));

    let router = introspection.merge(Router::new().nest("/api/chat", secured_api.merge(gateway)));

    crate::middleware::with_defaults(router)
}
