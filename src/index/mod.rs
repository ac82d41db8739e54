//! Search stages over the list store.
//!
//! The coarse stage ([`RootIndex`]) picks the lists nearest to a query; the
//! fine stage ([`StorageIndex`]) scans exactly those lists. Both rank
//! candidates with the same [`BoundedMaxHeap`].

pub mod distance;
pub mod heap;
pub mod root;
pub mod storage_index;
pub mod traits;

// Re-export the stage types at the module level so callers can write
// `use crate::index::{RootIndex, StorageIndex}`.
pub use distance::{squared_euclidean, DistanceFn};
pub use heap::BoundedMaxHeap;
pub use root::RootIndex;
pub use storage_index::StorageIndex;
pub use traits::CoarseQuantizer;
