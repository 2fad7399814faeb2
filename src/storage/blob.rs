//! Durable blob tier
//!
//! An embedded `sled` database with two trees: `images` holds extracted
//! image payloads keyed by synthetic blob id, and `conversations` holds the
//! authoritative conversation records (stripped messages plus timestamps).
//! Records are stored as JSON; writes are flushed so a crash never loses an
//! acknowledged save.

use crate::error::{ChatVaultError, Result};
use crate::storage::types::{ConversationRecord, ImageBlob, StorageStats};
use chrono::Utc;
use std::path::Path;

/// Durable store for image payloads and conversation records
pub struct BlobStore {
    db: sled::Db,
    images: sled::Tree,
    conversations: sled::Tree,
}

impl BlobStore {
    /// Open or create the blob store
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database directory
    ///
    /// # Errors
    ///
    /// Returns `ChatVaultError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chatvault::storage::BlobStore;
    ///
    /// let store = BlobStore::open("/tmp/chatvault/blobs").unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ChatVaultError::Storage(format!("Failed to open blob store: {}", e)))?;

        let images = db
            .open_tree("images")
            .map_err(|e| ChatVaultError::Storage(format!("Failed to open images tree: {}", e)))?;

        let conversations = db.open_tree("conversations").map_err(|e| {
            ChatVaultError::Storage(format!("Failed to open conversations tree: {}", e))
        })?;

        Ok(Self {
            db,
            images,
            conversations,
        })
    }

    /// Persist one image blob
    pub fn put_image(&self, blob: &ImageBlob) -> Result<()> {
        let value = serde_json::to_vec(blob)
            .map_err(|e| ChatVaultError::Storage(format!("Blob serialization failed: {}", e)))?;

        self.images
            .insert(blob.id.as_bytes(), value)
            .map_err(|e| ChatVaultError::Storage(format!("Blob insert failed: {}", e)))?;

        self.images
            .flush()
            .map_err(|e| ChatVaultError::Storage(format!("Blob flush failed: {}", e)))?;

        Ok(())
    }

    /// Retrieve an image blob by id
    pub fn get_image(&self, id: &str) -> Result<Option<ImageBlob>> {
        match self
            .images
            .get(id.as_bytes())
            .map_err(|e| ChatVaultError::Storage(format!("Blob get failed: {}", e)))?
        {
            Some(bytes) => {
                let blob = serde_json::from_slice(&bytes).map_err(|e| {
                    ChatVaultError::Storage(format!("Blob deserialization failed: {}", e))
                })?;
                Ok(Some(blob))
            }
            None => Ok(None),
        }
    }

    /// Delete an image blob (no error if absent)
    pub fn delete_image(&self, id: &str) -> Result<()> {
        self.images
            .remove(id.as_bytes())
            .map_err(|e| ChatVaultError::Storage(format!("Blob delete failed: {}", e)))?;
        Ok(())
    }

    /// Return every blob owned by a message
    pub fn images_for_message(&self, message_id: &str) -> Result<Vec<ImageBlob>> {
        let mut blobs = Vec::new();
        for entry in self.images.iter() {
            let (_, value) =
                entry.map_err(|e| ChatVaultError::Storage(format!("Blob scan failed: {}", e)))?;
            let blob: ImageBlob = serde_json::from_slice(&value).map_err(|e| {
                ChatVaultError::Storage(format!("Blob deserialization failed: {}", e))
            })?;
            if blob.message_id == message_id {
                blobs.push(blob);
            }
        }
        Ok(blobs)
    }

    /// Bulk-delete every blob owned by a message, returning how many were removed
    pub fn delete_message_images(&self, message_id: &str) -> Result<u64> {
        let blobs = self.images_for_message(message_id)?;
        let count = blobs.len() as u64;
        for blob in blobs {
            self.delete_image(&blob.id)?;
        }
        if count > 0 {
            self.images
                .flush()
                .map_err(|e| ChatVaultError::Storage(format!("Blob flush failed: {}", e)))?;
        }
        Ok(count)
    }

    /// Save or update a conversation record
    ///
    /// Preserves `created_at` of an existing record and bumps `updated_at`
    /// to now. Use [`BlobStore::put_conversation_raw`] when the timestamps
    /// must be written as-is (eviction must not rotate the LRU order).
    pub fn put_conversation(&self, record: &ConversationRecord) -> Result<()> {
        let mut record = record.clone();
        if let Some(existing) = self.get_conversation(&record.id)? {
            record.created_at = existing.created_at;
        }
        record.updated_at = Utc::now();
        self.put_conversation_raw(&record)
    }

    /// Write a conversation record without touching its timestamps
    pub fn put_conversation_raw(&self, record: &ConversationRecord) -> Result<()> {
        let value = serde_json::to_vec(record).map_err(|e| {
            ChatVaultError::Storage(format!("Conversation serialization failed: {}", e))
        })?;

        self.conversations
            .insert(record.id.as_bytes(), value)
            .map_err(|e| ChatVaultError::Storage(format!("Conversation insert failed: {}", e)))?;

        self.conversations
            .flush()
            .map_err(|e| ChatVaultError::Storage(format!("Conversation flush failed: {}", e)))?;

        Ok(())
    }

    /// Retrieve a conversation record by id
    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>> {
        match self
            .conversations
            .get(id.as_bytes())
            .map_err(|e| ChatVaultError::Storage(format!("Conversation get failed: {}", e)))?
        {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    ChatVaultError::Storage(format!("Conversation deserialization failed: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a conversation record (no error if absent)
    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        self.conversations
            .remove(id.as_bytes())
            .map_err(|e| ChatVaultError::Storage(format!("Conversation delete failed: {}", e)))?;
        self.conversations
            .flush()
            .map_err(|e| ChatVaultError::Storage(format!("Conversation flush failed: {}", e)))?;
        Ok(())
    }

    /// List every conversation record, unordered
    pub fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
        let mut records = Vec::new();
        for entry in self.conversations.iter() {
            let (_, value) = entry
                .map_err(|e| ChatVaultError::Storage(format!("Conversation scan failed: {}", e)))?;
            let record: ConversationRecord = serde_json::from_slice(&value).map_err(|e| {
                ChatVaultError::Storage(format!("Conversation deserialization failed: {}", e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// List conversations ordered by `updated_at` ascending
    ///
    /// The eviction candidate order: least-recently-updated first.
    pub fn list_conversations_oldest_first(&self) -> Result<Vec<ConversationRecord>> {
        let mut records = self.list_conversations()?;
        records.sort_by_key(|r| r.updated_at);
        Ok(records)
    }

    /// Aggregate statistics over both trees
    pub fn stats(&self) -> Result<StorageStats> {
        let mut image_count = 0u64;
        let mut total_image_size_bytes = 0u64;

        for entry in self.images.iter() {
            let (_, value) =
                entry.map_err(|e| ChatVaultError::Storage(format!("Blob scan failed: {}", e)))?;
            let blob: ImageBlob = serde_json::from_slice(&value).map_err(|e| {
                ChatVaultError::Storage(format!("Blob deserialization failed: {}", e))
            })?;
            image_count += 1;
            total_image_size_bytes += blob.size;
        }

        Ok(StorageStats {
            image_count,
            conversation_count: self.conversations.len() as u64,
            total_image_size_bytes,
        })
    }

    /// On-disk footprint of the blob tier
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db
            .size_on_disk()
            .map_err(|e| ChatVaultError::Storage(format!("Size estimation failed: {}", e)).into())
    }

    /// Write arbitrary bytes under a conversation key, bypassing
    /// serialization. For failure-injection in tests only.
    #[cfg(test)]
    pub(crate) fn insert_raw_conversation(&self, id: &str, bytes: &[u8]) {
        self.conversations
            .insert(id.as_bytes(), bytes)
            .expect("raw conversation insert failed");
    }

    /// Remove every blob and conversation
    pub fn clear_all(&self) -> Result<()> {
        self.images
            .clear()
            .map_err(|e| ChatVaultError::Storage(format!("Images clear failed: {}", e)))?;
        self.conversations
            .clear()
            .map_err(|e| ChatVaultError::Storage(format!("Conversations clear failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ChatVaultError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{ChatMessage, ImageBlob};
    use tempfile::tempdir;

    fn create_test_store() -> (BlobStore, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let store = BlobStore::open(dir.path().join("blobs")).expect("failed to open store");
        (store, dir)
    }

    fn record(id: &str, messages: Vec<ChatMessage>) -> ConversationRecord {
        let now = Utc::now();
        ConversationRecord {
            id: id.to_string(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_put_and_get_image() {
        let (store, _dir) = create_test_store();
        let blob = ImageBlob::new("m1", "png", "QQ==");

        store.put_image(&blob).expect("put failed");

        let loaded = store.get_image(&blob.id).expect("get failed");
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.payload, "QQ==");
        assert_eq!(loaded.size, 3);
    }

    #[test]
    fn test_get_missing_image_returns_none() {
        let (store, _dir) = create_test_store();
        assert!(store.get_image("img_nope").expect("get failed").is_none());
    }

    #[test]
    fn test_delete_image_is_idempotent() {
        let (store, _dir) = create_test_store();
        let blob = ImageBlob::new("m1", "png", "AAAA");
        store.put_image(&blob).expect("put failed");

        store.delete_image(&blob.id).expect("first delete failed");
        store.delete_image(&blob.id).expect("second delete failed");
        assert!(store.get_image(&blob.id).expect("get failed").is_none());
    }

    #[test]
    fn test_images_for_message_filters_by_owner() {
        let (store, _dir) = create_test_store();
        store
            .put_image(&ImageBlob::new("m1", "png", "AAAA"))
            .expect("put failed");
        store
            .put_image(&ImageBlob::new("m1", "jpeg", "BBBB"))
            .expect("put failed");
        store
            .put_image(&ImageBlob::new("m2", "png", "CCCC"))
            .expect("put failed");

        let blobs = store.images_for_message("m1").expect("scan failed");
        assert_eq!(blobs.len(), 2);
        assert!(blobs.iter().all(|b| b.message_id == "m1"));
    }

    #[test]
    fn test_delete_message_images_bulk() {
        let (store, _dir) = create_test_store();
        store
            .put_image(&ImageBlob::new("m1", "png", "AAAA"))
            .expect("put failed");
        store
            .put_image(&ImageBlob::new("m1", "png", "BBBB"))
            .expect("put failed");
        store
            .put_image(&ImageBlob::new("m2", "png", "CCCC"))
            .expect("put failed");

        let removed = store.delete_message_images("m1").expect("bulk delete failed");
        assert_eq!(removed, 2);
        assert!(store.images_for_message("m1").expect("scan failed").is_empty());
        assert_eq!(store.images_for_message("m2").expect("scan failed").len(), 1);
    }

    #[test]
    fn test_put_conversation_preserves_created_at() {
        let (store, _dir) = create_test_store();
        let first = record("c1", vec![ChatMessage::user("hi")]);
        store.put_conversation(&first).expect("put failed");

        let stored = store
            .get_conversation("c1")
            .expect("get failed")
            .expect("record missing");
        let created = stored.created_at;

        std::thread::sleep(std::time::Duration::from_millis(10));

        let second = record("c1", vec![ChatMessage::user("hi"), ChatMessage::bot("yo")]);
        store.put_conversation(&second).expect("update failed");

        let updated = store
            .get_conversation("c1")
            .expect("get failed")
            .expect("record missing");
        assert_eq!(updated.created_at, created);
        assert!(updated.updated_at > stored.updated_at);
        assert_eq!(updated.messages.len(), 2);
    }

    #[test]
    fn test_put_conversation_raw_keeps_timestamps() {
        let (store, _dir) = create_test_store();
        let mut rec = record("c1", vec![]);
        rec.updated_at = Utc::now() - chrono::Duration::days(7);
        store.put_conversation_raw(&rec).expect("put failed");

        let stored = store
            .get_conversation("c1")
            .expect("get failed")
            .expect("record missing");
        assert_eq!(stored.updated_at, rec.updated_at);
    }

    #[test]
    fn test_list_conversations_oldest_first() {
        let (store, _dir) = create_test_store();

        let mut old = record("old", vec![]);
        old.updated_at = Utc::now() - chrono::Duration::days(3);
        let mut mid = record("mid", vec![]);
        mid.updated_at = Utc::now() - chrono::Duration::days(1);
        let new = record("new", vec![]);

        store.put_conversation_raw(&new).expect("put failed");
        store.put_conversation_raw(&old).expect("put failed");
        store.put_conversation_raw(&mid).expect("put failed");

        let listed = store
            .list_conversations_oldest_first()
            .expect("list failed");
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "mid", "new"]);
    }

    #[test]
    fn test_stats_counts_and_sizes() {
        let (store, _dir) = create_test_store();
        store
            .put_image(&ImageBlob::new("m1", "png", "QQ=="))
            .expect("put failed");
        store
            .put_image(&ImageBlob::new("m2", "png", "ABCDE"))
            .expect("put failed");
        store
            .put_conversation(&record("c1", vec![]))
            .expect("put failed");

        let stats = store.stats().expect("stats failed");
        assert_eq!(stats.image_count, 2);
        assert_eq!(stats.conversation_count, 1);
        assert_eq!(stats.total_image_size_bytes, 3 + 4);
    }

    #[test]
    fn test_clear_all_empties_both_trees() {
        let (store, _dir) = create_test_store();
        store
            .put_image(&ImageBlob::new("m1", "png", "AAAA"))
            .expect("put failed");
        store
            .put_conversation(&record("c1", vec![]))
            .expect("put failed");

        store.clear_all().expect("clear failed");

        let stats = store.stats().expect("stats failed");
        assert_eq!(stats.image_count, 0);
        assert_eq!(stats.conversation_count, 0);
    }

    #[test]
    fn test_delete_conversation_is_idempotent() {
        let (store, _dir) = create_test_store();
        store
            .put_conversation(&record("c1", vec![]))
            .expect("put failed");

        store.delete_conversation("c1").expect("delete failed");
        store.delete_conversation("c1").expect("second delete failed");
        assert!(store.get_conversation("c1").expect("get failed").is_none());
    }
}
