//! Query data model shared by the coarse and fine search stages.
//!
//! A query starts unassigned. The coarse quantizer fills its probe buffer
//! exactly once, after which fine search may read it.

use crate::config::SearchConfig;
use crate::error::{AnnError, Result};
use crate::types::ListId;

#[derive(Debug)]
enum ProbeBuffer<'a> {
    Owned(Vec<ListId>),
    Borrowed(&'a mut [ListId]),
}

impl ProbeBuffer<'_> {
    fn as_slice(&self) -> &[ListId] {
        match self {
            ProbeBuffer::Owned(v) => v,
            ProbeBuffer::Borrowed(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [ListId] {
        match self {
            ProbeBuffer::Owned(v) => v,
            ProbeBuffer::Borrowed(s) => s,
        }
    }
}

#[derive(Debug)]
pub struct Query<'a> {
    vector: &'a [f32],
    n_results: usize,
    probes: ProbeBuffer<'a>,
    /// Number of probe slots filled, once preassigned.
    n_assigned: Option<usize>,
}

impl<'a> Query<'a> {
    /// Unassigned query that owns a probe buffer of `n_probe` lists.
    pub fn new(vector: &'a [f32], n_results: usize, n_probe: usize) -> Result<Self> {
        Self::validate(vector, n_results, n_probe)?;
        Ok(Self {
            vector,
            n_results,
            probes: ProbeBuffer::Owned(vec![0; n_probe]),
            n_assigned: None,
        })
    }

    /// Unassigned query that writes its probes into `buffer`. `n_probe` is
    /// the buffer length.
    pub fn with_probe_buffer(
        vector: &'a [f32],
        n_results: usize,
        buffer: &'a mut [ListId],
    ) -> Result<Self> {
        Self::validate(vector, n_results, buffer.len())?;
        Ok(Self {
            vector,
            n_results,
            probes: ProbeBuffer::Borrowed(buffer),
            n_assigned: None,
        })
    }

    /// Query whose lists to probe are already known.
    pub fn preassigned(vector: &'a [f32], n_results: usize, list_ids: Vec<ListId>) -> Result<Self> {
        Self::validate(vector, n_results, list_ids.len())?;
        let n_assigned = Some(list_ids.len());
        Ok(Self {
            vector,
            n_results,
            probes: ProbeBuffer::Owned(list_ids),
            n_assigned,
        })
    }

    pub fn from_config(vector: &'a [f32], config: &SearchConfig) -> Result<Self> {
        Self::new(vector, config.n_results, config.n_probe)
    }

    fn validate(vector: &[f32], n_results: usize, n_probe: usize) -> Result<()> {
        if vector.is_empty() {
            return Err(AnnError::InvalidArgument("query vector is empty".into()));
        }
        if n_results == 0 {
            return Err(AnnError::InvalidArgument("n_results must be > 0".into()));
        }
        if n_probe == 0 {
            return Err(AnnError::InvalidArgument("n_probe must be > 0".into()));
        }
        Ok(())
    }

    pub fn vector(&self) -> &'a [f32] {
        self.vector
    }

    pub fn n_results(&self) -> usize {
        self.n_results
    }

    /// Capacity of the probe buffer.
    pub fn n_probe(&self) -> usize {
        self.probes.as_slice().len()
    }

    pub fn is_preassigned(&self) -> bool {
        self.n_assigned.is_some()
    }

    /// Lists to probe, nearest first. `None` until preassigned.
    pub fn lists_to_probe(&self) -> Option<&[ListId]> {
        self.n_assigned.map(|n| &self.probes.as_slice()[..n])
    }

    /// Record the lists to probe. Allowed once per query; may hold fewer
    /// lists than `n_probe`.
    pub fn assign_probes(&mut self, list_ids: &[ListId]) -> Result<()> {
        if self.is_preassigned() {
            return Err(AnnError::InvariantViolation(
                "query has already been preassigned".into(),
            ));
        }
        let buffer = self.probes.as_mut_slice();
        if list_ids.len() > buffer.len() {
            return Err(AnnError::InvalidArgument(format!(
                "{} lists do not fit a probe buffer of {}",
                list_ids.len(),
                buffer.len()
            )));
        }
        buffer[..list_ids.len()].copy_from_slice(list_ids);
        self.n_assigned = Some(list_ids.len());
        Ok(())
    }
}

/// Queries processed together by the batch entry points.
pub type QueryBatch<'a> = Vec<Query<'a>>;
