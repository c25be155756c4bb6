//! Save-game persistence
//!
//! Snapshots are stored as pretty JSON in the flat
//! `[{runnerId, storyboardName, nodeStates: [{nodeId, status}]}]` shape.
//! `save`/`load` work on bytes; `SaveSlotRepository` stores numbered slots.

use crate::types::snapshot::SnapshotEntry;
use async_trait::async_trait;
use std::path::PathBuf;

/// Serialize snapshot entries to bytes
pub fn save(entries: &[SnapshotEntry]) -> anyhow::Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(entries)?;
    Ok(json.into_bytes())
}

/// Deserialize snapshot entries from bytes
pub fn load(bytes: &[u8]) -> anyhow::Result<Vec<SnapshotEntry>> {
    let json = std::str::from_utf8(bytes)?;
    let entries = serde_json::from_str(json)?;
    Ok(entries)
}

/// Repository of numbered save slots
#[async_trait]
pub trait SaveSlotRepository: Send + Sync {
    /// Write `entries` into `slot`, replacing what was there
    async fn save_slot(&self, slot: u32, entries: &[SnapshotEntry]) -> Result<(), StorageError>;

    /// `None` when the slot is empty
    async fn load_slot(&self, slot: u32) -> Result<Option<Vec<SnapshotEntry>>, StorageError>;

    /// Occupied slots in ascending order
    async fn list_slots(&self) -> Result<Vec<u32>, StorageError>;

    async fn delete_slot(&self, slot: u32) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Save slot {slot} is empty")]
    SlotNotFound { slot: u32 },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<StorageError> for crate::error::NarrativeError {
    fn from(error: StorageError) -> Self {
        Self::Storage {
            message: error.to_string(),
        }
    }
}

/// Save slots stored as `slot-<n>.json` files in one directory
pub struct FileSaveSlots {
    base_path: PathBuf,
}

impl FileSaveSlots {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn slot_path(&self, slot: u32) -> PathBuf {
        self.base_path.join(format!("slot-{slot}.json"))
    }

    fn parse_slot(file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix("slot-")?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }
}

#[async_trait]
impl SaveSlotRepository for FileSaveSlots {
    async fn save_slot(&self, slot: u32, entries: &[SnapshotEntry]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to create save directory: {e}"),
            })?;

        let bytes = save(entries).map_err(|e| StorageError::Serialization {
            message: format!("Failed to serialize snapshot: {e}"),
        })?;

        let path = self.slot_path(slot);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to write save file {}: {e}", path.display()),
            })?;
        log::debug!(target: "storyweave::snapshot", "saved slot {slot} to {}", path.display());
        Ok(())
    }

    async fn load_slot(&self, slot: u32) -> Result<Option<Vec<SnapshotEntry>>, StorageError> {
        let path = self.slot_path(slot);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    message: format!("Failed to read save file {}: {e}", path.display()),
                });
            }
        };

        let entries = load(&bytes).map_err(|e| StorageError::Serialization {
            message: format!("Failed to deserialize snapshot: {e}"),
        })?;
        Ok(Some(entries))
    }

    async fn list_slots(&self) -> Result<Vec<u32>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io {
                    message: format!("Failed to read save directory: {e}"),
                });
            }
        };

        let mut slots = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| StorageError::Io {
            message: format!("Failed to read directory entry: {e}"),
        })? {
            if let Some(slot) = entry.file_name().to_str().and_then(Self::parse_slot) {
                slots.push(slot);
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }

    async fn delete_slot(&self, slot: u32) -> Result<(), StorageError> {
        let path = self.slot_path(slot);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::SlotNotFound { slot })
            }
            Err(e) => Err(StorageError::Io {
                message: format!("Failed to delete save file {}: {e}", path.display()),
            }),
        }
    }
}
