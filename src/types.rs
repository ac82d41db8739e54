use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Identifier of an inverted list (a coarse cluster).
pub type ListId = i64;

/// Identifier of a stored vector.
pub type VectorId = i64;

/// Distance between two vectors. Smaller is closer.
pub type Distance = f32;

/// Size in bytes of one vector element.
pub const VECTOR_ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

/// Size in bytes of one stored vector id.
pub const ID_SIZE: usize = std::mem::size_of::<VectorId>();

/// A single search hit.
///
/// Ordered by ascending distance, ties broken by ascending id. This order
/// decides both which candidate a full top-k heap evicts and the order in
/// which results are returned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryResult {
    pub distance: Distance,
    pub vector_id: VectorId,
}

impl QueryResult {
    pub fn new(distance: Distance, vector_id: VectorId) -> Self {
        Self {
            distance,
            vector_id,
        }
    }
}

/// Total order on distances in which `-0.0` and `+0.0` are equal.
fn cmp_distance(a: Distance, b: Distance) -> Ordering {
    (a + 0.0).total_cmp(&(b + 0.0))
}

impl Ord for QueryResult {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_distance(self.distance, other.distance)
            .then(self.vector_id.cmp(&other.vector_id))
    }
}

impl PartialOrd for QueryResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueryResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueryResult {}

/// Ranked results for one query, nearest first.
pub type QueryResults = Vec<QueryResult>;

/// Distance from a query to a coarse centroid, under the same total order
/// as [`QueryResult`].
#[derive(Debug, Clone, Copy)]
pub struct CentroidMatch {
    pub distance: Distance,
    pub list_id: ListId,
}

impl Ord for CentroidMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_distance(self.distance, other.distance)
            .then(self.list_id.cmp(&other.list_id))
    }
}

impl PartialOrd for CentroidMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CentroidMatch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CentroidMatch {}

/// Execution strategy for batch fine search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelMode {
    /// One query after another on the calling thread.
    Sequential,
    /// One worker per query.
    #[default]
    PerQuery,
    /// One worker per (query, list) pair, merged into per-query heaps.
    PerWorkItem,
}

impl std::fmt::Display for ParallelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParallelMode::Sequential => write!(f, "sequential"),
            ParallelMode::PerQuery => write!(f, "per_query"),
            ParallelMode::PerWorkItem => write!(f, "per_work_item"),
        }
    }
}

impl std::str::FromStr for ParallelMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(ParallelMode::Sequential),
            "per_query" => Ok(ParallelMode::PerQuery),
            "per_work_item" => Ok(ParallelMode::PerWorkItem),
            other => Err(format!("unknown parallel mode: {other}")),
        }
    }
}
