//! Storage orchestration
//!
//! [`StorageManager`] is the single authority for persisted conversation
//! state. It drives the codec and both tiers to save, load, and delete
//! whole conversations as a unit. It is constructed once at startup and
//! injected into whatever needs it; there is no ambient singleton.
//!
//! Write path: extract image payloads per message, persist each blob
//! individually (one failed blob is logged and skipped, never fatal),
//! project the stripped messages into the fast tier, then write the
//! authoritative conversation record to the blob tier. Read path prefers
//! the fast tier and falls back to the blob tier; callers go to the remote
//! backend only when both come up empty.

use crate::error::Result;
use crate::storage::blob::BlobStore;
use crate::storage::codec::ImageCodec;
use crate::storage::metadata::MetadataStore;
use crate::storage::types::{
    ChatMessage, ConversationRecord, ImageBlob, MessageMeta, StorageStats,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// Orchestrates codec, blob tier, and metadata tier
pub struct StorageManager {
    codec: ImageCodec,
    blob: Arc<BlobStore>,
    metadata: MetadataStore,
}

impl StorageManager {
    /// Create a manager over already-opened stores
    pub fn new(blob: Arc<BlobStore>, metadata: MetadataStore) -> Self {
        Self {
            codec: ImageCodec::new(),
            blob,
            metadata,
        }
    }

    /// Save the full message list of a conversation
    ///
    /// Image payloads are split out into the blob tier; a single failed
    /// blob write is logged and skipped (losing one image is recoverable,
    /// losing all text is not). The conversation record write is the only
    /// fatal failure. Bumps the conversation's `updated_at` and the
    /// last-active pointer.
    pub fn save_messages(&self, conversation_id: &str, messages: &[ChatMessage]) -> Result<()> {
        let mut stripped_messages = Vec::with_capacity(messages.len());

        for message in messages {
            let (stripped, blobs) = self.codec.extract(message);
            for blob in &blobs {
                if let Err(e) = self.blob.put_image(blob) {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        blob_id = %blob.id,
                        "Image blob write failed, continuing without it: {}",
                        e
                    );
                }
            }
            stripped_messages.push(stripped);
        }

        let metas: Vec<MessageMeta> = stripped_messages
            .iter()
            .map(MessageMeta::from_message)
            .collect();
        self.metadata.save_messages(conversation_id, &metas);
        self.metadata.set_last_conversation(conversation_id);

        let now = Utc::now();
        let record = ConversationRecord {
            id: conversation_id.to_string(),
            messages: stripped_messages,
            created_at: now,
            updated_at: now,
        };
        self.blob.put_conversation(&record)?;

        tracing::debug!(
            conversation_id = %conversation_id,
            messages = messages.len(),
            "Conversation saved"
        );

        Ok(())
    }

    /// Load the full message list of a conversation, images resolved
    ///
    /// Local-first: the fast-tier projection wins when present and
    /// non-empty; otherwise the blob-tier record is used. Returns an empty
    /// list when nothing is stored locally.
    pub fn load_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let metas = self.metadata.get_messages(conversation_id);

        let stripped: Vec<ChatMessage> = if !metas.is_empty() {
            metas.into_iter().map(MessageMeta::into_message).collect()
        } else if let Some(record) = self.blob.get_conversation(conversation_id)? {
            record.messages
        } else {
            return Ok(Vec::new());
        };

        let blob_store = &self.blob;
        let resolved = stripped
            .iter()
            .map(|message| {
                self.codec.restore(message, |blob_id| {
                    match blob_store.get_image(blob_id) {
                        Ok(found) => found,
                        Err(e) => {
                            tracing::warn!(blob_id = %blob_id, "Blob lookup failed: {}", e);
                            None
                        }
                    }
                })
            })
            .collect();

        Ok(resolved)
    }

    /// Delete a conversation, its metadata projection, and every blob its
    /// messages ever referenced
    ///
    /// Idempotent: deleting an absent conversation is a no-op, and a
    /// conversation with zero blobs skips the blob step entirely.
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        // Collect message ids from both tiers; either may be stale.
        let mut message_ids: HashSet<String> = HashSet::new();

        for meta in self.metadata.get_messages(conversation_id) {
            message_ids.insert(meta.id);
        }
        if let Some(record) = self.blob.get_conversation(conversation_id)? {
            for message in record.messages {
                for blob_id in &message.image_ids {
                    self.blob.delete_image(blob_id)?;
                }
                message_ids.insert(message.id);
            }
        }

        self.metadata.remove_conversation(conversation_id);

        let mut deleted = 0u64;
        for message_id in &message_ids {
            deleted += self.blob.delete_message_images(message_id)?;
        }

        self.blob.delete_conversation(conversation_id)?;

        tracing::info!(
            conversation_id = %conversation_id,
            blobs_deleted = deleted,
            "Conversation deleted"
        );

        Ok(())
    }

    /// Wipe both tiers
    pub fn clear_all(&self) -> Result<()> {
        self.metadata.clear_all();
        self.blob.clear_all()?;
        tracing::info!("All conversations and images cleared");
        Ok(())
    }

    /// Aggregate blob-tier statistics
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.blob.stats()
    }

    /// List stored conversations, most recently updated first
    pub fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
        let mut records = self.blob.list_conversations()?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Every blob currently owned by a message
    pub fn get_message_images(&self, message_id: &str) -> Result<Vec<ImageBlob>> {
        self.blob.images_for_message(message_id)
    }

    /// Record the last-active conversation
    pub fn set_last_conversation(&self, conversation_id: &str) {
        self.metadata.set_last_conversation(conversation_id);
    }

    /// The last-active conversation, if any
    pub fn last_conversation(&self) -> Option<String> {
        self.metadata.last_conversation()
    }
}
