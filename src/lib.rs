//! ann-dkvs: inverted-file vector search over a memory-mapped slab store.

pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod types;

pub use error::{AnnError, Result};
pub use index::{CoarseQuantizer, RootIndex, StorageIndex};
pub use query::{Query, QueryBatch};
pub use storage::ListStore;
pub use types::{ListId, ParallelMode, QueryResult, QueryResults, VectorId};
