//! Seam between the request layer and coarse list selection.

use rayon::prelude::*;

use crate::error::{AnnError, Result};
use crate::query::Query;
use crate::types::ListId;

/// Selects, for a query vector, the inverted lists worth probing.
///
/// Implementors only provide [`CoarseQuantizer::nearest_lists`]; the query
/// bookkeeping and batch fan-out come with the trait.
pub trait CoarseQuantizer: Sync {
    /// Dimensionality of the vectors this quantizer accepts.
    fn dimension(&self) -> usize;

    /// Up to `n_probe` list ids, nearest first.
    fn nearest_lists(&self, vector: &[f32], n_probe: usize) -> Result<Vec<ListId>>;

    /// Fill the probe buffer of an unassigned query.
    ///
    /// # Errors
    /// `DimensionMismatch` if the query vector has the wrong length,
    /// `InvariantViolation` if the query was already preassigned.
    fn preassign_query(&self, query: &mut Query<'_>) -> Result<()> {
        if query.vector().len() != self.dimension() {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.vector().len(),
            });
        }
        if query.is_preassigned() {
            return Err(AnnError::InvariantViolation(
                "query has already been preassigned".into(),
            ));
        }
        let list_ids = self.nearest_lists(query.vector(), query.n_probe())?;
        query.assign_probes(&list_ids)
    }

    /// Preassign every query of a batch. Queries share no state, so they are
    /// processed in parallel.
    fn batch_preassign_queries(&self, queries: &mut [Query<'_>]) -> Result<()> {
        let _timer = crate::metrics::SEARCH_DURATION
            .with_label_values(&["coarse_batch"])
            .start_timer();
        queries
            .par_iter_mut()
            .try_for_each(|query| self.preassign_query(query))
    }
}
