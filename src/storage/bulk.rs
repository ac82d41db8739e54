//! Two-pass bulk ingestion from raw record files.
//!
//! Inputs are three headerless files of host-endian fixed-width records, in
//! the same record order:
//! - vectors: `n_entries * vector_dim` f32
//! - vector ids: `n_entries` i64
//! - list ids: `n_entries` i64, naming the destination list of each record
//!
//! The first pass counts records per list and creates every list at its final
//! size. The second pass writes each record straight into its slot, so no
//! list is ever reallocated.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::{debug, info, instrument};

use super::lists::ListStore;
use crate::error::{AnnError, Result};
use crate::types::{ListId, VectorId};

fn open_records(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Fill `buf` with the next record. Returns `Ok(false)` at a clean end of
/// file; a partial trailing record is an error.
fn read_record(reader: &mut impl BufRead, buf: &mut [u8]) -> Result<bool> {
    if reader.fill_buf()?.is_empty() {
        return Ok(false);
    }
    reader.read_exact(buf)?;
    Ok(true)
}

fn read_i64(reader: &mut impl BufRead) -> Result<Option<i64>> {
    let mut buf = [0u8; 8];
    if read_record(reader, &mut buf)? {
        Ok(Some(i64::from_ne_bytes(buf)))
    } else {
        Ok(None)
    }
}

fn short_read(path: &Path, expected: usize, actual: usize) -> AnnError {
    AnnError::ShortRead {
        path: path.display().to_string(),
        expected,
        actual,
    }
}

impl ListStore {
    /// Populate an empty store from record files.
    ///
    /// Fails with `InvariantViolation` if the store already holds data. A
    /// failure part way through leaves the store partially populated.
    #[instrument(skip(self, vectors_path, ids_path, list_ids_path))]
    pub fn bulk_insert_entries(
        &mut self,
        vectors_path: impl AsRef<Path>,
        ids_path: impl AsRef<Path>,
        list_ids_path: impl AsRef<Path>,
        n_entries: usize,
    ) -> Result<()> {
        let (vectors_path, ids_path, list_ids_path) =
            (vectors_path.as_ref(), ids_path.as_ref(), list_ids_path.as_ref());

        if self.get_total_size() != 0 {
            return Err(AnnError::InvariantViolation(
                "bulk_insert_entries requires an empty store".into(),
            ));
        }
        if n_entries > 0 {
            self.reserve(n_entries)?;
        }

        let mut entries_left = self.bulk_create_lists(list_ids_path, n_entries)?;
        info!(
            n_entries,
            lists = entries_left.len(),
            total_size = self.get_total_size(),
            "bulk load: lists created"
        );

        let mut vectors = open_records(vectors_path)?;
        let mut ids = open_records(ids_path)?;
        let mut list_ids = open_records(list_ids_path)?;
        let mut vector = vec![0f32; self.vector_dim()];

        for n_read in 0..n_entries {
            if !read_record(&mut vectors, bytemuck::cast_slice_mut(&mut vector))? {
                return Err(short_read(vectors_path, n_entries, n_read));
            }
            let id: VectorId =
                read_i64(&mut ids)?.ok_or_else(|| short_read(ids_path, n_entries, n_read))?;
            let list_id: ListId = read_i64(&mut list_ids)?
                .ok_or_else(|| short_read(list_ids_path, n_entries, n_read))?;

            let remaining = match entries_left.get_mut(&list_id) {
                Some(remaining) if *remaining > 0 => remaining,
                _ => {
                    return Err(AnnError::InvariantViolation(format!(
                        "record {n_read} targets list {list_id} beyond the size counted in the sizing pass"
                    )))
                }
            };
            let slot = self.get_list_length(list_id)? - *remaining;
            self.update_entries(list_id, &vector, &[id], slot)?;
            *remaining -= 1;
        }

        crate::metrics::BULK_ENTRIES_TOTAL.inc_by(n_entries as u64);
        info!(
            n_entries,
            lists = self.len(),
            total_size = self.get_total_size(),
            free_space = self.get_free_space(),
            "bulk load complete"
        );
        Ok(())
    }

    /// Sizing pass: count records per list and create each list once at its
    /// final length, in ascending list id order.
    fn bulk_create_lists(
        &mut self,
        list_ids_path: &Path,
        n_entries: usize,
    ) -> Result<BTreeMap<ListId, usize>> {
        let mut counts: BTreeMap<ListId, usize> = BTreeMap::new();
        let mut reader = open_records(list_ids_path)?;
        let mut n_read = 0;
        while let Some(list_id) = read_i64(&mut reader)? {
            *counts.entry(list_id).or_default() += 1;
            n_read += 1;
        }
        if n_read != n_entries {
            return Err(short_read(list_ids_path, n_entries, n_read));
        }

        for (&list_id, &count) in &counts {
            self.create_list(list_id, count)?;
        }
        debug!(lists = counts.len(), n_entries, "bulk load: sizing pass done");
        Ok(counts)
    }
}

/// Read a headerless file of host-endian f32 values.
pub fn read_f32_file(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let mut bytes = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut bytes)?;
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(AnnError::InvalidArgument(format!(
            "{} holds {} bytes, not a whole number of f32 values",
            path.as_ref().display(),
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}
