//! Client-side building blocks: the REST client, the realtime socket,
//! the per-conversation session, and the notification aggregator.
//!
//! Everything here is explicitly constructed and owned by the caller's
//! login lifecycle. Nothing is process-global; dropping or stopping an
//! object releases its tasks and connections.

use thiserror::Error;

pub mod http;
pub mod notifications;
pub mod session;
pub mod socket;

pub use http::ChatApi;
pub use notifications::{derive_notifications, Notification, NotificationAggregator};
pub use session::{ConversationSession, SessionState};
pub use socket::ChatSocket;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("websocket error: {0}")]
    Socket(String),

    #[error("realtime channel is not connected")]
    NotConnected,
}
