use axum::http;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::state::AppState;

/// Request tracing for the chat API. Spans carry the conversation id
/// when the path addresses one, so store and gateway logs correlate.
pub fn add_tracing(router: Router<AppState>) -> Router<AppState> {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &http::Request<_>| {
                let path = req.uri().path();
                match conversation_segment(path) {
                    Some(id) => tracing::span!(
                        Level::INFO,
                        "chat_request",
                        method = %req.method(),
                        path,
                        conversation_id = id
                    ),
                    None => tracing::span!(
                        Level::INFO,
                        "chat_request",
                        method = %req.method(),
                        path
                    ),
                }
            })
            .on_response(|res: &http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                let elapsed_ms = latency.as_millis() as u64;
                if res.status().is_server_error() {
                    tracing::error!(status = %res.status(), elapsed_ms, "request failed");
                } else {
                    tracing::info!(status = %res.status(), elapsed_ms, "request completed");
                }
            }),
    )
}

/// Pulls the id segment out of `/api/chat/conversations/<id>/...` paths.
fn conversation_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/api/chat/conversations/")?;
    let id = rest.split('/').next()?;
    (!id.is_empty()).then_some(id)
}
