//! Variable-size first-fit allocator over a [`Region`].

use tracing::debug;

use super::region::{Region, MIN_REGION_SIZE};
use super::slots::{FreeSlots, Slot};
use crate::error::{AnnError, Result};

pub struct SlabAllocator {
    region: Region,
    free: FreeSlots,
}

impl SlabAllocator {
    /// Allocator over a region whose bytes are all free.
    pub fn new(region: Region) -> Self {
        let mut free = FreeSlots::new();
        free.insert_and_coalesce(Slot::new(0, region.len()));
        Self { region, free }
    }

    /// Allocator over a region with a known set of free ranges.
    pub fn with_free_slots(region: Region, free: FreeSlots) -> Self {
        Self { region, free }
    }

    /// Reserve `size` bytes and return their offset, growing the region when
    /// no free slot is large enough.
    pub fn allocate(&mut self, size: usize) -> Result<usize> {
        if let Some(offset) = self.free.take_first_fit(size) {
            return Ok(offset);
        }
        self.grow_for(size)?;
        self.free.take_first_fit(size).ok_or_else(|| {
            AnnError::InvariantViolation(format!(
                "no free slot of {size} bytes after growing region to {}",
                self.region.len()
            ))
        })
    }

    /// Release `[offset, offset + size)`.
    pub fn free(&mut self, offset: usize, size: usize) {
        self.free.insert_and_coalesce(Slot::new(offset, size));
    }

    /// Re-reserve a range that was just released. Returns false if any part
    /// of it has been handed out since.
    pub fn reclaim(&mut self, offset: usize, size: usize) -> bool {
        self.free.take_exact(offset, size)
    }

    /// Double the region until the free space at its end holds `size` bytes.
    pub fn grow_for(&mut self, size: usize) -> Result<()> {
        let total = self.region.len();
        let needed = size.saturating_sub(self.free.trailing(total));
        let mut new_size = if total == 0 { MIN_REGION_SIZE } else { total };
        while new_size - total < needed {
            new_size = new_size.checked_mul(2).ok_or_else(|| {
                AnnError::InvalidArgument(format!(
                    "region of {total} bytes cannot grow to fit {size} more"
                ))
            })?;
        }
        self.resize_region(new_size)
    }

    fn resize_region(&mut self, new_size: usize) -> Result<()> {
        let old_size = self.region.len();
        self.region.resize(new_size)?;
        if new_size > old_size {
            self.free
                .insert_and_coalesce(Slot::new(old_size, new_size - old_size));
            debug!(
                old_size,
                new_size,
                free_slots = self.free.len(),
                "extended free space"
            );
        }
        Ok(())
    }

    pub fn total_size(&self) -> usize {
        self.region.len()
    }

    pub fn free_space(&self) -> usize {
        self.free.total()
    }

    pub fn largest_free_slot(&self) -> usize {
        self.free.largest()
    }

    pub fn free_slots(&self) -> &FreeSlots {
        &self.free
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn bytes(&self) -> &[u8] {
        self.region.as_slice()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.region.as_mut_slice()
    }

    pub fn flush(&self) -> Result<()> {
        self.region.flush()
    }
}
