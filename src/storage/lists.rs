//! Inverted lists stored contiguously in one memory-mapped region.
//!
//! Each list occupies a single slot laid out as `allocated_entries` vectors
//! followed by `allocated_entries` ids. `allocated_entries` is always a power
//! of two, so a list is only moved when it outgrows its slot or shrinks to
//! half of it.
//!
//! Mutating operations take `&mut self` and every read hands out data that
//! borrows `&self`. A view can therefore never be held across a remap, and
//! readers can only share a store once all writers are done with it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::allocator::SlabAllocator;
use super::manifest::{ListEntry, StoreManifest};
use super::region::Region;
use super::slots::{FreeSlots, Slot};
use crate::config::StorageConfig;
use crate::error::{AnnError, Result};
use crate::types::{ListId, VectorId, ID_SIZE, VECTOR_ELEMENT_SIZE};

/// Location and occupancy of one list inside the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDescriptor {
    pub offset: usize,
    pub allocated_entries: usize,
    pub used_entries: usize,
}

impl ListDescriptor {
    /// A list is moved when it outgrows its slot or drops to half of it.
    fn needs_reallocation(&self, n_entries: usize) -> bool {
        n_entries > self.allocated_entries || n_entries <= self.allocated_entries / 2
    }
}

pub struct ListStore {
    vector_dim: usize,
    vector_size: usize,
    allocator: SlabAllocator,
    lists: HashMap<ListId, ListDescriptor>,
}

impl ListStore {
    /// Create an empty store backed by a fresh file at `path`.
    pub fn new(vector_dim: usize, path: impl AsRef<Path>) -> Result<Self> {
        if vector_dim == 0 {
            return Err(AnnError::InvalidArgument(
                "vector dimension must be greater than 0".into(),
            ));
        }
        let vector_size = vector_dim
            .checked_mul(VECTOR_ELEMENT_SIZE)
            .filter(|size| size.checked_add(ID_SIZE).is_some())
            .ok_or_else(|| {
                AnnError::InvalidArgument(format!("vector dimension {vector_dim} is too large"))
            })?;
        let region = Region::create(path)?;
        Ok(Self {
            vector_dim,
            vector_size,
            allocator: SlabAllocator::new(region),
            lists: HashMap::new(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config.vector_dim, &config.path)
    }

    /// Reopen a store previously persisted with [`ListStore::sync`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest = StoreManifest::read(&StoreManifest::path_for(path))?;
        if manifest.vector_dim == 0 {
            return Err(AnnError::InvalidArgument(
                "vector dimension must be greater than 0".into(),
            ));
        }

        let region = Region::open(path)?;
        if region.len() != manifest.total_size {
            return Err(AnnError::InvariantViolation(format!(
                "region file holds {} bytes, manifest expects {}",
                region.len(),
                manifest.total_size
            )));
        }

        let vector_size = manifest
            .vector_dim
            .checked_mul(VECTOR_ELEMENT_SIZE)
            .ok_or_else(|| {
                AnnError::InvariantViolation(format!(
                    "manifest vector dimension {} is too large",
                    manifest.vector_dim
                ))
            })?;
        let lists: HashMap<ListId, ListDescriptor> = manifest
            .lists
            .iter()
            .map(|e| (e.list_id, e.descriptor))
            .collect();
        if lists.len() != manifest.lists.len() {
            return Err(AnnError::InvariantViolation(
                "manifest lists a list id more than once".into(),
            ));
        }

        let mut extents: Vec<Slot> = Vec::with_capacity(lists.len());
        for (&list_id, d) in &lists {
            let size = d
                .allocated_entries
                .checked_mul(vector_size + ID_SIZE)
                .filter(|&size| {
                    d.offset
                        .checked_add(size)
                        .is_some_and(|end| end <= manifest.total_size)
                })
                .ok_or_else(|| {
                    AnnError::InvariantViolation(format!(
                        "list {list_id} does not fit in a region of {} bytes",
                        manifest.total_size
                    ))
                })?;
            extents.push(Slot::new(d.offset, size));
        }
        let free = FreeSlots::complement(manifest.total_size, &extents)
            .map_err(AnnError::InvariantViolation)?;

        let store = Self {
            vector_dim: manifest.vector_dim,
            vector_size,
            allocator: SlabAllocator::with_free_slots(region, free),
            lists,
        };
        store.check_layout()?;

        info!(
            path = %path.display(),
            lists = store.len(),
            total_size = store.get_total_size(),
            "opened list store"
        );
        Ok(store)
    }

    /// Flush the region and write the manifest needed by [`ListStore::open`].
    pub fn sync(&self) -> Result<()> {
        self.allocator.flush()?;
        let entries = self
            .lists
            .iter()
            .map(|(&list_id, &descriptor)| ListEntry {
                list_id,
                descriptor,
            })
            .collect();
        let manifest = StoreManifest::new(self.vector_dim, self.get_total_size(), entries)?;
        manifest.write(&StoreManifest::path_for(self.path()))?;

        info!(
            path = %self.path().display(),
            lists = self.len(),
            total_size = self.get_total_size(),
            "synced list store"
        );
        Ok(())
    }

    // ─── Layout helpers ───

    fn entry_size(&self) -> usize {
        self.vector_size + ID_SIZE
    }

    /// Bytes of a slot already in the layout. Only called for descriptors
    /// whose size was checked by [`ListStore::plan_slot`] or on open.
    fn slot_size(&self, allocated_entries: usize) -> usize {
        allocated_entries * self.entry_size()
    }

    /// Allocated entries and slot bytes for a list of `n_entries`.
    fn plan_slot(&self, list_id: ListId, n_entries: usize) -> Result<(usize, usize)> {
        n_entries
            .checked_next_power_of_two()
            .and_then(|allocated| Some((allocated, allocated.checked_mul(self.entry_size())?)))
            .ok_or_else(|| {
                AnnError::InvalidArgument(format!(
                    "list {list_id} of {n_entries} entries exceeds the addressable size"
                ))
            })
    }

    fn ids_offset(&self, list: &ListDescriptor) -> usize {
        list.offset + self.vector_size * list.allocated_entries
    }

    fn descriptor(&self, list_id: ListId) -> Result<ListDescriptor> {
        self.lists
            .get(&list_id)
            .copied()
            .ok_or(AnnError::NotFound { list_id })
    }

    fn vector_bytes(&self, list: &ListDescriptor) -> &[u8] {
        let start = list.offset;
        &self.allocator.bytes()[start..start + list.used_entries * self.vector_size]
    }

    fn id_bytes(&self, list: &ListDescriptor) -> &[u8] {
        let start = self.ids_offset(list);
        &self.allocator.bytes()[start..start + list.used_entries * ID_SIZE]
    }

    fn check_entries(&self, vectors: &[f32], ids: &[VectorId]) -> Result<()> {
        let expected = ids.len() * self.vector_dim;
        if vectors.len() != expected {
            return Err(AnnError::DimensionMismatch {
                expected,
                actual: vectors.len(),
            });
        }
        Ok(())
    }

    // ─── Mutation ───

    /// Create list `list_id` holding `n_entries` uninitialized entries.
    pub fn create_list(&mut self, list_id: ListId, n_entries: usize) -> Result<()> {
        if self.lists.contains_key(&list_id) {
            return Err(AnnError::AlreadyExists { list_id });
        }
        if n_entries == 0 {
            return Err(AnnError::InvalidArgument(format!(
                "list {list_id} must have at least one entry"
            )));
        }

        let (allocated_entries, size) = self.plan_slot(list_id, n_entries)?;
        let offset = self.allocator.allocate(size)?;
        self.lists.insert(
            list_id,
            ListDescriptor {
                offset,
                allocated_entries,
                used_entries: n_entries,
            },
        );

        debug!(list_id, n_entries, allocated_entries, offset, "created list");
        Ok(())
    }

    /// Change the logical length of a list, keeping its leading entries.
    pub fn resize_list(&mut self, list_id: ListId, n_entries: usize) -> Result<()> {
        let old = self.descriptor(list_id)?;
        if n_entries == 0 {
            return Err(AnnError::InvalidArgument(format!(
                "cannot resize list {list_id} to 0 entries"
            )));
        }

        let (allocated_entries, size) = self.plan_slot(list_id, n_entries)?;
        if !old.needs_reallocation(n_entries) {
            if let Some(list) = self.lists.get_mut(&list_id) {
                list.used_entries = n_entries;
            }
            return Ok(());
        }

        // Release first so the list may move into space that overlaps its
        // old extent.
        let old_size = self.slot_size(old.allocated_entries);
        self.allocator.free(old.offset, old_size);

        let offset = match self.allocator.allocate(size) {
            Ok(offset) => offset,
            Err(e) => {
                self.allocator.reclaim(old.offset, old_size);
                return Err(e);
            }
        };
        let new = ListDescriptor {
            offset,
            allocated_entries,
            used_entries: n_entries,
        };

        self.move_entries(&old, &new);
        self.lists.insert(list_id, new);

        crate::metrics::LIST_REALLOCATIONS_TOTAL.inc();
        debug!(
            list_id,
            from_offset = old.offset,
            to_offset = new.offset,
            from_allocated = old.allocated_entries,
            to_allocated = new.allocated_entries,
            "reallocated list"
        );
        Ok(())
    }

    /// Copy the entries shared by `old` and `new` into `new`'s layout.
    ///
    /// The two extents may overlap. Vectors and ids are separate blocks, and
    /// the copy order keeps each source block intact until it has been read:
    /// moving left copies vectors first, moving right copies ids first.
    fn move_entries(&mut self, old: &ListDescriptor, new: &ListDescriptor) {
        let count = old.used_entries.min(new.used_entries);
        if count == 0 {
            return;
        }

        let vectors_len = count * self.vector_size;
        let ids_len = count * ID_SIZE;
        let old_ids = self.ids_offset(old);
        let new_ids = self.ids_offset(new);
        let bytes = self.allocator.bytes_mut();

        if new.offset <= old.offset {
            bytes.copy_within(old.offset..old.offset + vectors_len, new.offset);
            bytes.copy_within(old_ids..old_ids + ids_len, new_ids);
        } else {
            bytes.copy_within(old_ids..old_ids + ids_len, new_ids);
            bytes.copy_within(old.offset..old.offset + vectors_len, new.offset);
        }
    }

    /// Overwrite entries `[offset, offset + ids.len())` of a list.
    ///
    /// `vectors` holds `ids.len()` row-major vectors.
    pub fn update_entries(
        &mut self,
        list_id: ListId,
        vectors: &[f32],
        ids: &[VectorId],
        offset: usize,
    ) -> Result<()> {
        let list = self.descriptor(list_id)?;
        self.check_entries(vectors, ids)?;
        let count = ids.len();
        if offset
            .checked_add(count)
            .is_none_or(|end| end > list.used_entries)
        {
            return Err(AnnError::OutOfRange {
                list_id,
                offset,
                count,
                length: list.used_entries,
            });
        }

        let vectors_start = list.offset + offset * self.vector_size;
        let ids_start = self.ids_offset(&list) + offset * ID_SIZE;
        let vector_bytes: &[u8] = bytemuck::cast_slice(vectors);
        let id_bytes: &[u8] = bytemuck::cast_slice(ids);

        let bytes = self.allocator.bytes_mut();
        bytes[vectors_start..vectors_start + vector_bytes.len()].copy_from_slice(vector_bytes);
        bytes[ids_start..ids_start + id_bytes.len()].copy_from_slice(id_bytes);
        Ok(())
    }

    /// Append entries to the end of a list.
    pub fn insert_entries(
        &mut self,
        list_id: ListId,
        vectors: &[f32],
        ids: &[VectorId],
    ) -> Result<()> {
        let list = self.descriptor(list_id)?;
        self.check_entries(vectors, ids)?;
        if ids.is_empty() {
            return Ok(());
        }

        let old_length = list.used_entries;
        let new_length = old_length.checked_add(ids.len()).ok_or_else(|| {
            AnnError::InvalidArgument(format!("list {list_id} cannot grow past {old_length} entries"))
        })?;
        self.resize_list(list_id, new_length)?;
        self.update_entries(list_id, vectors, ids, old_length)
    }

    /// Remove a list and release its slot. The region does not shrink.
    pub fn delete_list(&mut self, list_id: ListId) -> Result<()> {
        let list = self
            .lists
            .remove(&list_id)
            .ok_or(AnnError::NotFound { list_id })?;
        self.allocator
            .free(list.offset, self.slot_size(list.allocated_entries));

        debug!(list_id, offset = list.offset, "deleted list");
        Ok(())
    }

    /// Grow the region until at least `n_entries` entries fit in the free
    /// space at its end.
    pub fn reserve(&mut self, n_entries: usize) -> Result<()> {
        if n_entries == 0 {
            return Err(AnnError::InvalidArgument("cannot reserve 0 entries".into()));
        }
        let size = n_entries.checked_mul(self.entry_size()).ok_or_else(|| {
            AnnError::InvalidArgument(format!("cannot reserve {n_entries} entries"))
        })?;
        self.allocator.grow_for(size)
    }

    // ─── Access ───

    /// Vectors of a list, `get_list_length(list_id) * vector_dim` floats.
    pub fn get_vectors(&self, list_id: ListId) -> Result<&[f32]> {
        let list = self.descriptor(list_id)?;
        bytemuck::try_cast_slice(self.vector_bytes(&list)).map_err(|e| {
            AnnError::InvariantViolation(format!("list {list_id} vectors are misaligned: {e}"))
        })
    }

    pub fn get_ids(&self, list_id: ListId) -> Result<ListIds<'_>> {
        let list = self.descriptor(list_id)?;
        Ok(ListIds {
            bytes: self.id_bytes(&list),
        })
    }

    pub fn get_list_length(&self, list_id: ListId) -> Result<usize> {
        Ok(self.descriptor(list_id)?.used_entries)
    }

    /// Vectors and ids of a list together.
    pub fn list(&self, list_id: ListId) -> Result<ListView<'_>> {
        Ok(ListView {
            vectors: self.get_vectors(list_id)?,
            ids: self.get_ids(list_id)?,
            vector_dim: self.vector_dim,
        })
    }

    pub fn get_descriptor(&self, list_id: ListId) -> Option<ListDescriptor> {
        self.lists.get(&list_id).copied()
    }

    pub fn contains_list(&self, list_id: ListId) -> bool {
        self.lists.contains_key(&list_id)
    }

    /// All list ids in ascending order.
    pub fn list_ids(&self) -> Vec<ListId> {
        let mut ids: Vec<ListId> = self.lists.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of lists.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    /// Bytes per stored vector.
    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn path(&self) -> &Path {
        self.allocator.region().path()
    }

    // ─── Space accounting ───

    pub fn get_total_size(&self) -> usize {
        self.allocator.total_size()
    }

    pub fn get_free_space(&self) -> usize {
        self.allocator.free_space()
    }

    pub fn get_largest_continuous_free_space(&self) -> usize {
        self.allocator.largest_free_slot()
    }

    /// Verify descriptor invariants and that lists and free slots exactly
    /// tile the region.
    pub fn check_layout(&self) -> Result<()> {
        let mut extents = Vec::with_capacity(self.lists.len());
        for (&list_id, list) in &self.lists {
            if !list.allocated_entries.is_power_of_two() {
                return Err(AnnError::InvariantViolation(format!(
                    "list {list_id} has {} allocated entries, not a power of two",
                    list.allocated_entries
                )));
            }
            if list.used_entries > list.allocated_entries {
                return Err(AnnError::InvariantViolation(format!(
                    "list {list_id} uses {} of {} entries",
                    list.used_entries, list.allocated_entries
                )));
            }
            extents.push(Slot::new(list.offset, self.slot_size(list.allocated_entries)));
        }
        self.allocator
            .free_slots()
            .check_tiling(self.get_total_size(), &extents)
            .map_err(AnnError::InvariantViolation)
    }
}

/// Ids of one list. Ids are read unaligned since an id block may start on a
/// 4-byte boundary.
#[derive(Debug, Clone, Copy)]
pub struct ListIds<'a> {
    bytes: &'a [u8],
}

impl<'a> ListIds<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len() / ID_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<VectorId> {
        let start = index.checked_mul(ID_SIZE)?;
        let chunk = self.bytes.get(start..start + ID_SIZE)?;
        Some(bytemuck::pod_read_unaligned(chunk))
    }

    pub fn iter(&self) -> impl Iterator<Item = VectorId> + 'a {
        self.bytes
            .chunks_exact(ID_SIZE)
            .map(bytemuck::pod_read_unaligned::<VectorId>)
    }

    pub fn to_vec(&self) -> Vec<VectorId> {
        self.iter().collect()
    }
}

/// Borrowed view of one list, valid until the store is next mutated.
#[derive(Debug, Clone, Copy)]
pub struct ListView<'a> {
    vectors: &'a [f32],
    ids: ListIds<'a>,
    vector_dim: usize,
}

impl<'a> ListView<'a> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn vectors(&self) -> &'a [f32] {
        self.vectors
    }

    pub fn ids(&self) -> ListIds<'a> {
        self.ids
    }

    pub fn vector(&self, index: usize) -> Option<&'a [f32]> {
        let start = index.checked_mul(self.vector_dim)?;
        self.vectors.get(start..start + self.vector_dim)
    }

    /// `(vector, id)` pairs in list order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a [f32], VectorId)> + 'a {
        self.vectors.chunks_exact(self.vector_dim).zip(self.ids.iter())
    }
}
