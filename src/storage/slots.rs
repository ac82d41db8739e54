//! Ordered collection of free byte ranges inside the region.
//!
//! Slots are keyed by offset. No two slots are ever adjacent: every insert
//! merges with its byte-contiguous neighbours, so the collection always holds
//! maximal free ranges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A contiguous byte range `[offset, offset + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub offset: usize,
    pub size: usize,
}

impl Slot {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSlots {
    /// offset -> size
    slots: BTreeMap<usize, usize>,
}

impl FreeSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the free ranges of a region of `total_size` bytes from the
    /// extents currently allocated in it.
    ///
    /// Fails if two extents overlap or an extent runs past the region.
    pub fn complement(total_size: usize, allocated: &[Slot]) -> Result<Self, String> {
        let mut extents: Vec<Slot> = allocated.iter().copied().filter(|s| s.size > 0).collect();
        extents.sort_by_key(|s| s.offset);

        let mut free = Self::new();
        let mut cursor = 0;
        for extent in extents {
            if extent.offset < cursor {
                return Err(format!(
                    "extent at {} overlaps previous extent ending at {cursor}",
                    extent.offset
                ));
            }
            free.insert_and_coalesce(Slot::new(cursor, extent.offset - cursor));
            cursor = extent.end();
        }
        if cursor > total_size {
            return Err(format!(
                "extent ending at {cursor} exceeds region size {total_size}"
            ));
        }
        free.insert_and_coalesce(Slot::new(cursor, total_size - cursor));
        Ok(free)
    }

    /// Take `size` bytes from the lowest-offset slot large enough to hold
    /// them. The slot is consumed from the front.
    pub fn take_first_fit(&mut self, size: usize) -> Option<usize> {
        let (offset, slot_size) = self
            .slots
            .iter()
            .find(|(_, &slot_size)| slot_size >= size)
            .map(|(&offset, &slot_size)| (offset, slot_size))?;

        self.slots.remove(&offset);
        if slot_size > size {
            self.slots.insert(offset + size, slot_size - size);
        }
        Some(offset)
    }

    /// Remove exactly `[offset, offset + size)` from the free ranges.
    ///
    /// Returns false, leaving the collection unchanged, if that range is not
    /// entirely free.
    pub fn take_exact(&mut self, offset: usize, size: usize) -> bool {
        let Some((&slot_offset, &slot_size)) = self.slots.range(..=offset).next_back() else {
            return false;
        };
        let slot = Slot::new(slot_offset, slot_size);
        if offset + size > slot.end() {
            return false;
        }

        self.slots.remove(&slot_offset);
        if offset > slot_offset {
            self.slots.insert(slot_offset, offset - slot_offset);
        }
        if slot.end() > offset + size {
            self.slots.insert(offset + size, slot.end() - offset - size);
        }
        true
    }

    /// Return a range to the free list, merging it with the free slots
    /// directly to its left and right.
    pub fn insert_and_coalesce(&mut self, slot: Slot) {
        if slot.size == 0 {
            return;
        }
        let mut offset = slot.offset;
        let mut size = slot.size;

        if let Some((&left_offset, &left_size)) = self.slots.range(..slot.offset).next_back() {
            debug_assert!(left_offset + left_size <= slot.offset, "double free");
            if left_offset + left_size == slot.offset {
                self.slots.remove(&left_offset);
                offset = left_offset;
                size += left_size;
            }
        }

        if let Some(right_size) = self.slots.remove(&slot.end()) {
            size += right_size;
        }

        self.slots.insert(offset, size);
    }

    /// Size of the free slot that ends exactly at `total_size`, if any.
    pub fn trailing(&self, total_size: usize) -> usize {
        match self.slots.iter().next_back() {
            Some((&offset, &size)) if offset + size == total_size => size,
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.slots.values().sum()
    }

    pub fn largest(&self) -> usize {
        self.slots.values().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots
            .iter()
            .map(|(&offset, &size)| Slot::new(offset, size))
    }

    /// Verify that these free slots and `allocated` exactly tile
    /// `[0, total_size)` and that no two free slots are adjacent.
    pub fn check_tiling(&self, total_size: usize, allocated: &[Slot]) -> Result<(), String> {
        let mut prev_free_end: Option<usize> = None;
        for slot in self.iter() {
            if slot.size == 0 {
                return Err(format!("empty free slot at {}", slot.offset));
            }
            if prev_free_end == Some(slot.offset) {
                return Err(format!("adjacent free slots meet at {}", slot.offset));
            }
            prev_free_end = Some(slot.end());
        }

        let mut ranges: Vec<Slot> = self.iter().chain(allocated.iter().copied()).collect();
        ranges.sort_by_key(|s| s.offset);

        let mut cursor = 0;
        for range in ranges {
            if range.offset != cursor {
                return Err(format!(
                    "range at {} does not start where the previous ended ({cursor})",
                    range.offset
                ));
            }
            cursor = range.end();
        }
        if cursor != total_size {
            return Err(format!("ranges cover {cursor} bytes of {total_size}"));
        }
        Ok(())
    }
}
