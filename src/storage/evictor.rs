//! Usage monitoring and LRU image eviction
//!
//! Keeps durable storage usage under a ceiling without ever discarding
//! message text. When estimated usage crosses the high-water mark, image
//! blobs are evicted from the least-recently-updated conversations until
//! usage would fall under the low-water mark or every conversation has
//! been swept. The two marks give the pass hysteresis so it does not
//! thrash around a single threshold.
//!
//! Usage estimation is an injected capability so the evictor can be tested
//! against a fake instead of a real disk probe. The estimate is
//! approximate and may be stale or unavailable; an unavailable estimate
//! silently skips the pass.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::storage::blob::BlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Approximate storage usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEstimate {
    /// Bytes currently used by durable storage
    pub used: u64,
    /// Total bytes available, when the environment reports one
    pub quota: Option<u64>,
}

/// Injected storage-estimation capability
pub trait UsageEstimator: Send + Sync {
    /// Estimate current usage; `None` when estimation is unsupported
    fn estimate(&self) -> Option<UsageEstimate>;
}

/// Estimator backed by the real on-disk footprint of both tiers
pub struct DiskUsageEstimator {
    blob: Arc<BlobStore>,
    metadata_db_path: PathBuf,
}

impl DiskUsageEstimator {
    /// Create an estimator over the blob store and the metadata db file
    pub fn new(blob: Arc<BlobStore>, metadata_db_path: impl Into<PathBuf>) -> Self {
        Self {
            blob,
            metadata_db_path: metadata_db_path.into(),
        }
    }
}

impl UsageEstimator for DiskUsageEstimator {
    fn estimate(&self) -> Option<UsageEstimate> {
        let blob_bytes = match self.blob.size_on_disk() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("Blob tier size estimation unavailable: {}", e);
                return None;
            }
        };

        // The metadata file may not exist yet; that is zero usage, not an error.
        let metadata_bytes = std::fs::metadata(&self.metadata_db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Some(UsageEstimate {
            used: blob_bytes + metadata_bytes,
            quota: None,
        })
    }
}

/// Eviction thresholds (absolute byte counts)
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Usage above this triggers an eviction pass
    pub high_water_mark_bytes: u64,
    /// An eviction pass frees space until usage would fall to this
    pub low_water_mark_bytes: u64,
}

impl From<&StorageConfig> for EvictionPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            high_water_mark_bytes: config.high_water_mark_bytes,
            low_water_mark_bytes: config.low_water_mark_bytes,
        }
    }
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Conversations whose image lists were cleared
    pub conversations_swept: u64,
    /// Image blobs removed from the blob tier
    pub blobs_deleted: u64,
    /// Approximate bytes reclaimed
    pub bytes_freed: u64,
}

/// Evicts image payloads from least-recently-updated conversations
pub struct Evictor {
    blob: Arc<BlobStore>,
    estimator: Box<dyn UsageEstimator>,
    policy: EvictionPolicy,
}

impl Evictor {
    /// Create an evictor over an injected store and estimator
    pub fn new(
        blob: Arc<BlobStore>,
        estimator: Box<dyn UsageEstimator>,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            blob,
            estimator,
            policy,
        }
    }

    /// Run one measure-then-maybe-evict pass
    ///
    /// No-op (empty report) when the usage estimate is unavailable or usage
    /// is at or below the high-water mark. Otherwise sweeps conversations
    /// oldest-`updated_at` first, deleting their image blobs and clearing
    /// the blob references on every message, until the accumulated freed
    /// bytes reach `used - low_water_mark` or candidates run out. Message
    /// text is never touched.
    pub fn auto_cleanup(&self) -> Result<EvictionReport> {
        let estimate = match self.estimator.estimate() {
            Some(estimate) => estimate,
            None => {
                tracing::debug!("Usage estimation unavailable, skipping eviction");
                return Ok(EvictionReport::default());
            }
        };

        if estimate.used <= self.policy.high_water_mark_bytes {
            tracing::debug!(
                used = estimate.used,
                high_water_mark = self.policy.high_water_mark_bytes,
                "Storage usage under threshold"
            );
            return Ok(EvictionReport::default());
        }

        let bytes_to_free = estimate.used - self.policy.low_water_mark_bytes;
        tracing::info!(
            used = estimate.used,
            bytes_to_free = bytes_to_free,
            "Storage usage over high-water mark, starting image eviction"
        );

        let report = self.sweep(bytes_to_free)?;

        tracing::info!(
            conversations_swept = report.conversations_swept,
            blobs_deleted = report.blobs_deleted,
            bytes_freed = report.bytes_freed,
            "Image eviction finished; message text preserved"
        );

        Ok(report)
    }

    /// Sweep conversations oldest-first until the target is reached
    ///
    /// The candidate order is strictly LRU-by-`updated_at`: a conversation
    /// currently being viewed can still be swept if it is the
    /// least-recently-updated one. Likely-unintended upstream behavior,
    /// kept until the policy is revisited with intent.
    ///
    /// Known race: a save that lands between this read and the
    /// `put_conversation_raw` below can lose an in-flight image reference.
    /// Accepted for a single-process client; text is never at risk.
    fn sweep(&self, bytes_to_free: u64) -> Result<EvictionReport> {
        let mut report = EvictionReport::default();

        for mut record in self.blob.list_conversations_oldest_first()? {
            if report.bytes_freed >= bytes_to_free {
                break;
            }

            let mut modified = false;
            for message in &mut record.messages {
                if message.image_ids.is_empty() && message.images.is_empty() {
                    continue;
                }

                for blob_id in &message.image_ids {
                    match self.blob.get_image(blob_id)? {
                        Some(blob) => {
                            report.bytes_freed += blob.size;
                            self.blob.delete_image(blob_id)?;
                            report.blobs_deleted += 1;
                        }
                        None => {
                            // Already evicted or deleted; nothing to free.
                        }
                    }
                }

                message.image_ids.clear();
                message.images.clear();
                modified = true;
            }

            if modified {
                // Timestamps written as-is: bumping updated_at here would
                // rotate this conversation to the back of the LRU order.
                self.blob.put_conversation_raw(&record)?;
                report.conversations_swept += 1;
            }
        }

        Ok(report)
    }
}

/// Spawn the background usage monitor
///
/// Runs `auto_cleanup` on every tick until the token is cancelled. Races
/// with concurrent user edits are tolerated by design (see [`Evictor`]).
pub fn spawn_monitor(
    evictor: Arc<Evictor>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Usage monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match evictor.auto_cleanup() {
                        Ok(report) if report.blobs_deleted > 0 => {
                            tracing::info!(
                                bytes_freed = report.bytes_freed,
                                "Automatic cleanup reclaimed space"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Automatic cleanup failed: {}", e);
                        }
                    }
                }
            }
        }
    })
}
