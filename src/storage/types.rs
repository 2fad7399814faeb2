//! Data model for the tiered conversation store
//!
//! These types flow between the codec, the two storage tiers, and the
//! storage manager. Conversations own their messages; messages reference
//! image blobs by id, and blobs never outlive the message that produced
//! them (explicit deletes cascade; eviction removes blobs but keeps the
//! message text).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Human input
    User,
    /// Generated response from the remote backend
    Bot,
}

impl Sender {
    /// String form used in tables and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

/// A chat message in its resolved view
///
/// `text` holds the visible content; `images` holds the resolved image
/// markers (`IMG_DATA:<mime>,<payload>`), and `image_ids` the blob
/// references recorded by the codec at extraction time. Before extraction
/// `image_ids` is empty and markers may still be embedded in `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (ULID, globally unique for blob association)
    pub id: String,

    /// Who produced the message
    pub sender: Sender,

    /// Plain/markdown text, possibly containing embedded image markers
    pub text: String,

    /// Resolved image markers (filled by the codec on restore)
    #[serde(default)]
    pub images: Vec<String>,

    /// Blob references (filled by the codec on extract)
    #[serde(default)]
    pub image_ids: Vec<String>,

    /// Creation timestamp, fixed at creation
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatvault::storage::{ChatMessage, Sender};
    ///
    /// let msg = ChatMessage::user("Hello!");
    /// assert_eq!(msg.sender, Sender::User);
    /// assert!(msg.image_ids.is_empty());
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Creates a new bot message
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            sender,
            text: text.into(),
            images: Vec::new(),
            image_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Fast-tier projection of a message
///
/// Only what the conversation list and quick reload need: no payloads,
/// just stripped text and blob references. When the original text was
/// entirely an image, a short placeholder stands in so the projection is
/// never empty for a non-empty message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Message identifier
    pub id: String,

    /// Who produced the message
    pub sender: Sender,

    /// Stripped text, or `[Image]` if the message was image-only
    pub text: String,

    /// Blob references
    #[serde(default)]
    pub image_ids: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl MessageMeta {
    /// Placeholder shown for image-only messages
    pub const IMAGE_PLACEHOLDER: &'static str = "[Image]";

    /// Build the projection of an already-stripped message
    pub fn from_message(message: &ChatMessage) -> Self {
        let text = if message.text.trim().is_empty() && !message.image_ids.is_empty() {
            Self::IMAGE_PLACEHOLDER.to_string()
        } else {
            message.text.clone()
        };

        Self {
            id: message.id.clone(),
            sender: message.sender,
            text,
            image_ids: message.image_ids.clone(),
            created_at: message.created_at,
        }
    }

    /// Expand the projection back into a message shell
    ///
    /// Images are resolved separately through the codec.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            sender: self.sender,
            text: self.text,
            images: Vec::new(),
            image_ids: self.image_ids,
            created_at: self.created_at,
        }
    }
}

/// Durable conversation record (blob-tier source of truth)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation identifier
    pub id: String,

    /// Stripped messages in chronological order
    pub messages: Vec<ChatMessage>,

    /// Creation timestamp, preserved across updates
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp; the eviction sort key
    pub updated_at: DateTime<Utc>,
}

/// A stored image payload
///
/// The payload stays in its text encoding; `size` approximates the decoded
/// byte size as `ceil(len * 0.75)` and is what eviction accounting uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlob {
    /// Unique blob identifier, derived from the owning message id
    pub id: String,

    /// Back-reference to the owning message (lookup and bulk delete only)
    pub message_id: String,

    /// Short mime-type hint ("png", "jpeg", ...)
    pub mime_type: String,

    /// Base64 text payload
    pub payload: String,

    /// Approximate decoded size in bytes
    pub size: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ImageBlob {
    /// Create a blob for a payload extracted from the given message
    pub fn new(
        message_id: impl Into<String>,
        mime_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let message_id = message_id.into();
        let payload = payload.into();
        Self {
            id: new_blob_id(&message_id),
            message_id,
            mime_type: mime_type.into(),
            size: estimate_decoded_size(&payload),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Approximate decoded byte size of a base64 text payload
pub fn estimate_decoded_size(payload: &str) -> u64 {
    // ceil(len * 0.75)
    (payload.len() as u64 * 3 + 3) / 4
}

/// Aggregate statistics over the blob tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of stored image blobs
    pub image_count: u64,

    /// Number of stored conversations
    pub conversation_count: u64,

    /// Sum of the approximate decoded sizes of all blobs
    pub total_image_size_bytes: u64,
}

/// Generate a new conversation ID
///
/// ULIDs are sortable by creation time and more human-readable than UUIDs.
pub fn new_conversation_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new message ID
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}

/// Generate a blob ID for a payload owned by `message_id`
///
/// The ULID suffix keeps two blobs extracted from the same message in the
/// same instant from colliding.
pub fn new_blob_id(message_id: &str) -> String {
    format!("img_{}_{}", message_id, Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_id_is_unique() {
        assert_ne!(new_conversation_id(), new_conversation_id());
    }

    #[test]
    fn test_blob_id_embeds_message_id() {
        let id = new_blob_id("01ARZ3NDEK");
        assert!(id.starts_with("img_01ARZ3NDEK_"));
    }

    #[test]
    fn test_estimate_decoded_size_rounds_up() {
        // "QQ==" is 4 chars -> 3 bytes
        assert_eq!(estimate_decoded_size("QQ=="), 3);
        // 5 chars -> ceil(3.75) = 4
        assert_eq!(estimate_decoded_size("ABCDE"), 4);
        assert_eq!(estimate_decoded_size(""), 0);
    }

    #[test]
    fn test_image_blob_new_computes_size() {
        let blob = ImageBlob::new("msg1", "png", "QQ==");
        assert_eq!(blob.size, 3);
        assert_eq!(blob.message_id, "msg1");
        assert_eq!(blob.mime_type, "png");
    }

    #[test]
    fn test_message_meta_placeholder_for_image_only_message() {
        let mut msg = ChatMessage::bot("");
        msg.image_ids.push("img_x_y".to_string());
        let meta = MessageMeta::from_message(&msg);
        assert_eq!(meta.text, MessageMeta::IMAGE_PLACEHOLDER);
    }

    #[test]
    fn test_message_meta_keeps_text_when_present() {
        let mut msg = ChatMessage::bot("look at this");
        msg.image_ids.push("img_x_y".to_string());
        let meta = MessageMeta::from_message(&msg);
        assert_eq!(meta.text, "look at this");
    }

    #[test]
    fn test_message_meta_round_trip() {
        let msg = ChatMessage::user("hello");
        let meta = MessageMeta::from_message(&msg);
        let back = meta.into_message();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.text, "hello");
        assert_eq!(back.sender, Sender::User);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let json = serde_json::to_string(&Sender::Bot).expect("serialize failed");
        assert_eq!(json, "\"bot\"");
        let back: Sender = serde_json::from_str("\"user\"").expect("deserialize failed");
        assert_eq!(back, Sender::User);
    }

    #[test]
    fn test_chat_message_serialization_round_trip() {
        let msg = ChatMessage::user("hi there");
        let json = serde_json::to_string(&msg).expect("serialize failed");
        let back: ChatMessage = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(back.id, msg.id);
        assert_eq!(back.text, msg.text);
        assert_eq!(back.sender, Sender::User);
    }
}
