//! Fast metadata tier
//!
//! A small rusqlite database holding per-conversation message projections
//! and tiny key/value records (last-active conversation, small config).
//! This tier is an accelerator: the blob tier's conversation table is the
//! durable source of truth, and everything here can be rebuilt from it.
//!
//! Failure policy follows the tier-unavailable contract: reads degrade to
//! empty results and writes to a logged no-op, so the client stays usable
//! with whatever state is in memory.

use crate::error::{ChatVaultError, Result};
use crate::storage::types::MessageMeta;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

/// Key under which the last-active conversation pointer is stored
const LAST_CONVERSATION_KEY: &str = "last_conversation_id";

/// Fast store for small text records
pub struct MetadataStore {
    db_path: PathBuf,
}

impl MetadataStore {
    /// Open (or create) the metadata database at the given path
    ///
    /// # Errors
    ///
    /// Returns `ChatVaultError::Storage` if the schema cannot be initialized
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chatvault::storage::MetadataStore;
    ///
    /// let store = MetadataStore::open("/tmp/chatvault/metadata.db").unwrap();
    /// ```
    pub fn open<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatVaultError::Storage(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS message_meta (
                conversation_id TEXT PRIMARY KEY,
                payload JSON NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChatVaultError::Storage(format!("Failed to create message_meta: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value JSON NOT NULL
            )",
            [],
        )
        .map_err(|e| ChatVaultError::Storage(format!("Failed to create kv: {}", e)))?;

        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .map_err(|e| ChatVaultError::Storage(format!("Failed to open metadata db: {}", e)).into())
    }

    /// Save the message projection for a conversation
    ///
    /// Returns `true` on success. Failures are logged and swallowed: losing
    /// the accelerator copy is recoverable from the blob tier.
    pub fn save_messages(&self, conversation_id: &str, messages: &[MessageMeta]) -> bool {
        let result = (|| -> Result<()> {
            let payload = serde_json::to_string(messages)?;
            let conn = self.connect()?;
            conn.execute(
                "INSERT INTO message_meta (conversation_id, payload, updated_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
                params![
                    conversation_id,
                    payload,
                    chrono::Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "Metadata projection save failed: {}",
                    e
                );
                false
            }
        }
    }

    /// Load the message projection for a conversation
    ///
    /// Returns an empty list when the conversation is unknown or the tier
    /// is unreadable.
    pub fn get_messages(&self, conversation_id: &str) -> Vec<MessageMeta> {
        let result = (|| -> Result<Option<Vec<MessageMeta>>> {
            let conn = self.connect()?;
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM message_meta WHERE conversation_id = ?",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .optional()?;

            match payload {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })();

        match result {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "Metadata projection read failed: {}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Remove the projection for a conversation (no error if absent)
    pub fn remove_conversation(&self, conversation_id: &str) {
        let result = (|| -> Result<()> {
            let conn = self.connect()?;
            conn.execute(
                "DELETE FROM message_meta WHERE conversation_id = ?",
                params![conversation_id],
            )?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!(
                conversation_id = %conversation_id,
                "Metadata projection delete failed: {}",
                e
            );
        }
    }

    /// Remove every stored projection
    pub fn clear_all(&self) {
        let result = (|| -> Result<()> {
            let conn = self.connect()?;
            conn.execute("DELETE FROM message_meta", [])?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("Metadata clear failed: {}", e);
        }
    }

    /// Store a small JSON-serializable value under a key
    pub fn set_value<T: serde::Serialize>(&self, key: &str, value: &T) -> bool {
        let result = (|| -> Result<()> {
            let json = serde_json::to_string(value)?;
            let conn = self.connect()?;
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, json],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, "KV write failed: {}", e);
                false
            }
        }
    }

    /// Read a small JSON-serializable value by key
    pub fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let result = (|| -> Result<Option<T>> {
            let conn = self.connect()?;
            let json: Option<String> = conn
                .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                    row.get(0)
                })
                .optional()?;

            match json {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })();

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, "KV read failed: {}", e);
                None
            }
        }
    }

    /// Record the last-active conversation
    pub fn set_last_conversation(&self, conversation_id: &str) {
        self.set_value(LAST_CONVERSATION_KEY, &conversation_id.to_string());
    }

    /// Return the last-active conversation, if any
    pub fn last_conversation(&self) -> Option<String> {
        self.get_value(LAST_CONVERSATION_KEY)
    }
}
