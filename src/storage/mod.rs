//! Storage layer: a file-backed memory-mapped region, a first-fit slab
//! allocator over it, and the inverted list store built on top.

pub mod allocator;
pub mod bulk;
pub mod lists;
pub mod manifest;
pub mod region;
pub mod slots;

pub use allocator::SlabAllocator;
pub use lists::{ListDescriptor, ListIds, ListStore, ListView};
pub use manifest::StoreManifest;
pub use region::{Region, MIN_REGION_SIZE};
pub use slots::{FreeSlots, Slot};
