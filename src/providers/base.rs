//! Provider trait and wire types for the remote chat backend

use crate::error::Result;
use crate::storage::{ChatMessage, Sender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A generation request
///
/// Mirrors the backend's `/generate` contract: the prompt plus an optional
/// conversation id (omitted for a fresh conversation) and model selector.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// User prompt text
    pub prompt: String,

    /// Conversation to continue, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Model selector forwarded opaquely to the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A generation response
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Generated text; may contain embedded image markers
    pub text: String,

    /// Additional image markers delivered out-of-band
    #[serde(default)]
    pub images: Vec<String>,

    /// Conversation id assigned or echoed by the backend
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl GenerateResponse {
    /// Fold the response into a bot message
    ///
    /// Out-of-band image markers are appended to the text so the codec
    /// handles every payload through one path at save time.
    pub fn into_message(self) -> ChatMessage {
        let mut text = self.text;
        for marker in &self.images {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(marker);
        }
        ChatMessage::bot(text)
    }
}

/// A message in the backend's own conversation format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// "user" or "bot"
    pub sender: String,
    /// Message text
    pub text: String,
}

impl RemoteMessage {
    /// Convert to the local message type
    pub fn into_message(self) -> ChatMessage {
        match self.sender.as_str() {
            "user" => ChatMessage::user(self.text),
            _ => ChatMessage::bot(self.text),
        }
    }

    /// Project a local message into the backend's shape
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            sender: match message.sender {
                Sender::User => "user".to_string(),
                Sender::Bot => "bot".to_string(),
            },
            text: message.text.clone(),
        }
    }
}

/// A conversation as the backend returns it
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConversation {
    /// Conversation id
    pub id: String,
    /// Messages in chronological order
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
}

/// The remote chat backend boundary
///
/// Implementations must be cancellation-aware: an aborted generation
/// returns an error promptly instead of waiting out the request timeout.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Request a generation for a prompt
    ///
    /// Cancelling `cancel` aborts the in-flight request; any content
    /// already persisted by the caller stays as-is (no rollback).
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse>;

    /// Best-effort out-of-band notification that generation should halt
    async fn stop(&self) -> Result<()>;

    /// Create a conversation on the backend, returning its id
    async fn create_conversation(&self, title: &str) -> Result<String>;

    /// Fetch a conversation from the backend; `None` when it is unknown
    async fn fetch_conversation(&self, id: &str) -> Result<Option<RemoteConversation>>;

    /// Delete a conversation on the backend
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
