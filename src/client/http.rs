use crate::client::ClientError;
use crate::routes::conversations::ConversationDto;
use crate::routes::messages::MessageDto;
use error_types::ErrorResponse;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub message: String,
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenAck {
    pub message: String,
    pub marked_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCount {
    unread_count: i64,
}

/// REST client for the chat API. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Clone)]
pub struct ChatApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/chat{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationDto>, ClientError> {
        self.get("/conversations").await
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<ConversationDto, ClientError> {
        self.get(&format!("/conversations/{id}")).await
    }

    pub async fn create_conversation(
        &self,
        participant_id: Uuid,
    ) -> Result<ConversationDto, ClientError> {
        self.post("/conversations", &json!({ "participantId": participant_id }))
            .await
    }

    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageDto>, ClientError> {
        self.get(&format!("/messages/{conversation_id}")).await
    }

    /// Fallback send: lands in the store exactly like a realtime send,
    /// but nobody is pushed an event for it.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SentMessage, ClientError> {
        self.post(
            "/messages",
            &json!({ "content": content, "conversationId": conversation_id }),
        )
        .await
    }

    pub async fn mark_seen(&self, conversation_id: Uuid) -> Result<u64, ClientError> {
        let ack: SeenAck = self
            .post(&format!("/messages/{conversation_id}/seen"), &json!({}))
            .await?;
        Ok(ack.marked_count)
    }

    pub async fn unread_count(&self) -> Result<i64, ClientError> {
        let body: UnreadCount = self.get("/unread-count").await?;
        Ok(body.unread_count)
    }
}
