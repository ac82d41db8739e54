use std::path::PathBuf;

use tempfile::TempDir;

use ann_dkvs::storage::ListStore;

/// Temporary directory holding a store file and its bulk input files.
pub struct TestDir {
    pub dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn store(&self, vector_dim: usize) -> ListStore {
        ListStore::new(vector_dim, self.path("lists.bin")).unwrap()
    }

    /// Write raw host-endian records and return the file path.
    pub fn write_records<T: bytemuck::Pod>(&self, name: &str, records: &[T]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, bytemuck::cast_slice::<T, u8>(records)).unwrap();
        path
    }

    /// Write the three bulk input files.
    pub fn write_bulk_inputs(
        &self,
        vectors: &[f32],
        ids: &[i64],
        list_ids: &[i64],
    ) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.write_records("vectors.bin", vectors),
            self.write_records("ids.bin", ids),
            self.write_records("list_ids.bin", list_ids),
        )
    }
}
