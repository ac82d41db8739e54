//! A single growable byte buffer backed by a file and kept memory-mapped.
//!
//! Slices handed out by [`Region::as_slice`] borrow the region, and
//! [`Region::resize`] takes `&mut self`, so no slice can outlive a remap.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tracing::{debug, warn};

use crate::error::{AnnError, Result};

/// Smallest non-empty region size in bytes. Every non-empty region is this
/// value times a power of two.
pub const MIN_REGION_SIZE: usize = 32;

pub struct Region {
    path: PathBuf,
    file: File,
    /// `None` while the region is empty.
    mmap: Option<MmapMut>,
    total_size: usize,
}

impl Region {
    /// Create an empty region, truncating any existing file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        debug!(path = %path.display(), "created region file");
        Ok(Self {
            path,
            file,
            mmap: None,
            total_size: 0,
        })
    }

    /// Map an existing region file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let total_size = usize::try_from(file.metadata()?.len()).map_err(|_| {
            AnnError::InvariantViolation(format!("{} is too large to map", path.display()))
        })?;

        if !is_valid_size(total_size) {
            return Err(AnnError::InvariantViolation(format!(
                "{} has size {total_size}, not a doubling of {MIN_REGION_SIZE}",
                path.display()
            )));
        }

        let mmap = if total_size == 0 {
            None
        } else {
            Some(map(&file)?)
        };

        debug!(path = %path.display(), total_size, "opened region file");
        Ok(Self {
            path,
            file,
            mmap,
            total_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Grow the backing file to `new_size` bytes and remap it.
    ///
    /// Existing bytes keep their offsets. Shrinking is an invariant violation.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size < self.total_size {
            return Err(AnnError::InvariantViolation(format!(
                "cannot shrink region from {} to {new_size} bytes",
                self.total_size
            )));
        }
        if new_size == self.total_size {
            return Ok(());
        }

        // The old mapping stays in place until the new one exists, so a
        // failed grow leaves the region readable at its old size.
        self.file.set_len(new_size as u64)?;
        let mmap = match map(&self.file) {
            Ok(mmap) => mmap,
            Err(e) => {
                if let Err(undo) = self.file.set_len(self.total_size as u64) {
                    warn!(error = %undo, path = %self.path.display(), "failed to restore region length");
                }
                return Err(e);
            }
        };
        self.mmap = Some(mmap);

        debug!(
            from = self.total_size,
            to = new_size,
            path = %self.path.display(),
            "grew region"
        );
        self.total_size = new_size;

        crate::metrics::REGION_GROWS_TOTAL.inc();
        crate::metrics::REGION_BYTES.set(new_size as i64);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.mmap {
            Some(mmap) => &mut mmap[..],
            None => &mut [],
        }
    }

    /// Flush dirty pages to the backing file.
    pub fn flush(&self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }
}

fn map(file: &File) -> Result<MmapMut> {
    // SAFETY: the file handle is owned by the region and only ever grows
    // while mapped, so no mapped page is ever truncated away.
    Ok(unsafe { MmapMut::map_mut(file)? })
}

fn is_valid_size(size: usize) -> bool {
    size == 0 || (size >= MIN_REGION_SIZE && size.is_power_of_two())
}
