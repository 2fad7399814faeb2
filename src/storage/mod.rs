//! Tiered conversation storage
//!
//! Chat data is split across two durable tiers by access pattern and size:
//! a fast rusqlite tier for small text metadata ([`MetadataStore`]) and a
//! sled tier for image blobs and the authoritative conversation records
//! ([`BlobStore`]). The [`ImageCodec`] moves image payloads between message
//! text and the blob tier, [`StorageManager`] orchestrates the three, and
//! the [`Evictor`] reclaims image space when usage crosses a threshold.

use crate::config::StorageConfig;
use crate::error::{ChatVaultError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;

pub mod blob;
pub mod codec;
pub mod evictor;
pub mod manager;
pub mod metadata;
pub mod types;

pub use blob::BlobStore;
pub use codec::ImageCodec;
pub use evictor::{
    DiskUsageEstimator, EvictionPolicy, EvictionReport, Evictor, UsageEstimate, UsageEstimator,
};
pub use manager::StorageManager;
pub use metadata::MetadataStore;
pub use types::{
    ChatMessage, ConversationRecord, ImageBlob, MessageMeta, Sender, StorageStats,
};

/// The opened storage tiers, constructed once at startup
///
/// The blob store is shared (`Arc`) between the manager and the evictor;
/// both are explicitly injected rather than reached through a global.
pub struct StorageHandles {
    /// Orchestrator for save/load/delete of whole conversations
    pub manager: StorageManager,
    /// Shared blob tier handle, for the evictor and the estimator
    pub blob: Arc<BlobStore>,
    /// Path of the metadata database file (for usage estimation)
    pub metadata_db_path: PathBuf,
}

/// Open both tiers under the configured data directory
pub fn open(config: &StorageConfig) -> Result<StorageHandles> {
    let data_dir = resolve_data_dir(config)?;
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| ChatVaultError::Storage(format!("Failed to create data directory: {}", e)))?;

    let metadata_db_path = data_dir.join("metadata.db");
    let blob = Arc::new(BlobStore::open(data_dir.join("blobs"))?);
    let metadata = MetadataStore::open(&metadata_db_path)?;

    tracing::debug!(data_dir = %data_dir.display(), "Storage tiers opened");

    Ok(StorageHandles {
        manager: StorageManager::new(blob.clone(), metadata),
        blob,
        metadata_db_path,
    })
}

/// Resolve the data directory: explicit config/CLI/env override first,
/// then the platform data dir
fn resolve_data_dir(config: &StorageConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(PathBuf::from(dir));
    }

    let proj_dirs = ProjectDirs::from("com", "chatvault", "chatvault")
        .ok_or_else(|| ChatVaultError::Storage("Could not determine data directory".into()))?;

    Ok(proj_dirs.data_dir().to_path_buf())
}
