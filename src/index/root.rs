//! Coarse quantizer over a fixed centroid table.

use std::path::Path;

use tracing::{debug, instrument};

use super::distance::{squared_euclidean, DistanceFn};
use super::heap::BoundedMaxHeap;
use super::traits::CoarseQuantizer;
use crate::error::{AnnError, Result};
use crate::storage::bulk::read_f32_file;
use crate::types::{CentroidMatch, ListId};

/// Centroid table, row-major. Row `i` is the centroid of list `i`.
pub struct RootIndex {
    vector_dim: usize,
    centroids: Vec<f32>,
    distance: DistanceFn,
}

impl RootIndex {
    pub fn new(vector_dim: usize, centroids: Vec<f32>) -> Result<Self> {
        if vector_dim == 0 {
            return Err(AnnError::InvalidArgument(
                "vector dimension must be greater than 0".into(),
            ));
        }
        if centroids.is_empty() {
            return Err(AnnError::InvalidArgument("centroid table is empty".into()));
        }
        if centroids.len() % vector_dim != 0 {
            return Err(AnnError::InvalidArgument(format!(
                "centroid table of {} floats is not a multiple of dimension {vector_dim}",
                centroids.len()
            )));
        }
        Ok(Self {
            vector_dim,
            centroids,
            distance: squared_euclidean,
        })
    }

    /// Load a headerless host-endian f32 centroid table.
    pub fn from_file(path: impl AsRef<Path>, vector_dim: usize) -> Result<Self> {
        let centroids = read_f32_file(path.as_ref())?;
        debug!(
            path = %path.as_ref().display(),
            n_centroids = centroids.len() / vector_dim.max(1),
            "loaded centroid table"
        );
        Self::new(vector_dim, centroids)
    }

    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    pub fn n_centroids(&self) -> usize {
        self.centroids.len() / self.vector_dim
    }

    pub fn centroid(&self, list_id: ListId) -> Option<&[f32]> {
        let start = usize::try_from(list_id).ok()?.checked_mul(self.vector_dim)?;
        self.centroids.get(start..start + self.vector_dim)
    }
}

impl CoarseQuantizer for RootIndex {
    fn dimension(&self) -> usize {
        self.vector_dim
    }

    #[instrument(skip(self, vector), fields(n_centroids = self.n_centroids()))]
    fn nearest_lists(&self, vector: &[f32], n_probe: usize) -> Result<Vec<ListId>> {
        if vector.len() != self.vector_dim {
            return Err(AnnError::DimensionMismatch {
                expected: self.vector_dim,
                actual: vector.len(),
            });
        }

        let mut nearest = BoundedMaxHeap::new(n_probe);
        for (list_id, centroid) in (0..).zip(self.centroids.chunks_exact(self.vector_dim)) {
            nearest.push(CentroidMatch {
                distance: (self.distance)(vector, centroid),
                list_id,
            });
        }

        crate::metrics::QUERIES_TOTAL
            .with_label_values(&["coarse"])
            .inc();

        let list_ids: Vec<ListId> = nearest
            .into_sorted_vec()
            .into_iter()
            .map(|m| m.list_id)
            .collect();
        debug!(probes = ?list_ids, "selected lists");
        Ok(list_ids)
    }
}
