//! Exact scan of preassigned inverted lists.

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::distance::{squared_euclidean, DistanceFn};
use super::heap::BoundedMaxHeap;
use crate::error::{AnnError, Result};
use crate::query::Query;
use crate::storage::ListStore;
use crate::types::{ListId, ParallelMode, QueryResult, QueryResults};

type Candidates = BoundedMaxHeap<QueryResult>;

/// Fine search over a [`ListStore`].
///
/// Holding a `StorageIndex` borrows the store immutably, so the store cannot
/// be mutated while searches are possible.
pub struct StorageIndex<'s> {
    lists: &'s ListStore,
    distance: DistanceFn,
}

impl<'s> StorageIndex<'s> {
    pub fn new(lists: &'s ListStore) -> Self {
        Self::with_distance(lists, squared_euclidean)
    }

    pub fn with_distance(lists: &'s ListStore, distance: DistanceFn) -> Self {
        Self { lists, distance }
    }

    pub fn lists(&self) -> &'s ListStore {
        self.lists
    }

    /// Probe list ids of a query that is ready for fine search.
    fn probes<'q>(&self, query: &'q Query<'_>) -> Result<&'q [ListId]> {
        let expected = self.lists.vector_dim();
        if query.vector().len() != expected {
            return Err(AnnError::DimensionMismatch {
                expected,
                actual: query.vector().len(),
            });
        }
        query.lists_to_probe().ok_or_else(|| {
            AnnError::InvariantViolation("query has not been preassigned".into())
        })
    }

    fn scan_list(&self, vector: &[f32], list_id: ListId, candidates: &mut Candidates) -> Result<()> {
        let list = self.lists.list(list_id)?;
        for (entry, vector_id) in list.iter() {
            let distance = (self.distance)(entry, vector);
            candidates.push(QueryResult::new(distance, vector_id));
        }
        Ok(())
    }

    /// The `n_results` nearest entries across all probed lists, nearest
    /// first, ties broken by vector id.
    #[instrument(skip_all, fields(n_results = query.n_results(), n_probe = query.n_probe()))]
    pub fn search_preassigned(&self, query: &Query<'_>) -> Result<QueryResults> {
        let _timer = crate::metrics::SEARCH_DURATION
            .with_label_values(&["fine"])
            .start_timer();

        let probes = self.probes(query)?;
        let mut candidates = Candidates::new(query.n_results());
        for &list_id in probes {
            self.scan_list(query.vector(), list_id, &mut candidates)?;
        }

        crate::metrics::QUERIES_TOTAL.with_label_values(&["fine"]).inc();
        Ok(candidates.into_sorted_vec())
    }

    /// Search every query of a batch. All modes return identical results.
    #[instrument(skip(self, queries), fields(n_queries = queries.len()))]
    pub fn batch_search_preassigned(
        &self,
        queries: &[Query<'_>],
        mode: ParallelMode,
    ) -> Result<Vec<QueryResults>> {
        let results: Vec<QueryResults> = match mode {
            ParallelMode::Sequential => queries
                .iter()
                .map(|query| self.search_preassigned(query))
                .collect::<Result<_>>()?,
            ParallelMode::PerQuery => queries
                .par_iter()
                .map(|query| self.search_preassigned(query))
                .collect::<Result<_>>()?,
            ParallelMode::PerWorkItem => self.batch_search_work_items(queries)?,
        };

        debug!(n_queries = queries.len(), %mode, "batch search complete");
        Ok(results)
    }

    /// One work item per (query, list). Each item fills a private heap that
    /// is then merged into its query's heap under that query's lock.
    fn batch_search_work_items(&self, queries: &[Query<'_>]) -> Result<Vec<QueryResults>> {
        let mut work_items: Vec<(usize, ListId)> = Vec::new();
        for (query_index, query) in queries.iter().enumerate() {
            for &list_id in self.probes(query)? {
                work_items.push((query_index, list_id));
            }
        }

        let shared: Vec<Mutex<Candidates>> = queries
            .iter()
            .map(|query| Mutex::new(Candidates::new(query.n_results())))
            .collect();

        work_items
            .par_iter()
            .try_for_each(|&(query_index, list_id)| -> Result<()> {
                let query = &queries[query_index];
                let mut local = Candidates::new(query.n_results());
                self.scan_list(query.vector(), list_id, &mut local)?;
                shared[query_index].lock().merge(local);
                Ok(())
            })?;

        crate::metrics::QUERIES_TOTAL
            .with_label_values(&["fine"])
            .inc_by(queries.len() as u64);

        Ok(shared
            .into_iter()
            .map(|candidates| candidates.into_inner().into_sorted_vec())
            .collect())
    }
}
