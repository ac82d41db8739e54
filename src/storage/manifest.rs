use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use super::lists::ListDescriptor;
use crate::error::{AnnError, Result};
use crate::types::ListId;

/// One list descriptor as persisted in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub list_id: ListId,
    #[serde(flatten)]
    pub descriptor: ListDescriptor,
}

/// The manifest records everything needed to reopen a list store next to
/// its region file: the vector dimension, the region size, and every list
/// descriptor. Free slots are not stored; they are the complement of the
/// list extents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    pub vector_dim: usize,
    pub total_size: usize,
    /// Sorted by list id.
    pub lists: Vec<ListEntry>,
    /// xxHash of the serialized (vector_dim, total_size, lists).
    pub checksum: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoreManifest {
    pub fn new(vector_dim: usize, total_size: usize, mut lists: Vec<ListEntry>) -> Result<Self> {
        lists.sort_by_key(|e| e.list_id);
        let checksum = Self::compute_checksum(vector_dim, total_size, &lists)?;
        Ok(Self {
            vector_dim,
            total_size,
            lists,
            checksum,
            updated_at: Utc::now(),
        })
    }

    /// Path of the manifest that belongs to the region file at `region_path`.
    pub fn path_for(region_path: &Path) -> PathBuf {
        let mut name = region_path.as_os_str().to_owned();
        name.push(".manifest.json");
        PathBuf::from(name)
    }

    fn compute_checksum(vector_dim: usize, total_size: usize, lists: &[ListEntry]) -> Result<u64> {
        let payload = serde_json::to_vec(&(vector_dim, total_size, lists))?;
        Ok(xxh3_64(&payload))
    }

    pub fn validate_checksum(&self) -> Result<()> {
        let expected = Self::compute_checksum(self.vector_dim, self.total_size, &self.lists)?;
        if self.checksum != expected {
            return Err(AnnError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            });
        }
        Ok(())
    }

    /// Read and validate the manifest at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let manifest: Self = serde_json::from_slice(&data)?;
        manifest.validate_checksum()?;
        Ok(manifest)
    }

    /// Write the manifest to `path`, replacing any previous one atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;

        debug!(
            path = %path.display(),
            lists = self.lists.len(),
            total_size = self.total_size,
            "wrote manifest"
        );
        Ok(())
    }
}
