mod common;

use common::assertions::{assert_layout_ok, assert_list_contents};
use common::files::TestDir;

use ann_dkvs::error::{AnnError, ErrorKind};
use ann_dkvs::storage::{ListStore, StoreManifest, MIN_REGION_SIZE};

/// Bytes of one entry for a store of dimension `dim`.
fn entry_bytes(dim: usize) -> usize {
    dim * 4 + 8
}

// ─── Construction ───

#[test]
fn test_new_store_is_empty() {
    let dir = TestDir::new();
    let store = dir.store(4);
    assert_eq!(store.get_total_size(), 0);
    assert_eq!(store.get_free_space(), 0);
    assert_eq!(store.get_largest_continuous_free_space(), 0);
    assert_eq!(store.len(), 0);
    assert_eq!(store.vector_dim(), 4);
    assert_eq!(store.vector_size(), 16);
    assert_eq!(std::fs::metadata(store.path()).unwrap().len(), 0);
}

#[test]
fn test_zero_dimension_rejected() {
    let dir = TestDir::new();
    let err = ListStore::new(0, dir.path("lists.bin")).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// ─── create_list ───

#[test]
fn test_create_list_seeds_minimum_region() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();

    assert_eq!(store.get_total_size(), MIN_REGION_SIZE);
    assert_eq!(store.get_free_space(), MIN_REGION_SIZE - entry_bytes(1));
    assert_eq!(store.get_list_length(1).unwrap(), 1);
    assert_eq!(
        std::fs::metadata(store.path()).unwrap().len(),
        MIN_REGION_SIZE as u64
    );
    assert_layout_ok(&store);
}

#[test]
fn test_create_list_rounds_allocation_to_power_of_two() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(7, 5).unwrap();

    let descriptor = store.get_descriptor(7).unwrap();
    assert_eq!(descriptor.allocated_entries, 8);
    assert_eq!(descriptor.used_entries, 5);
    assert_eq!(
        store.get_free_space(),
        store.get_total_size() - 8 * entry_bytes(2)
    );
}

#[test]
fn test_create_list_duplicate_fails() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(1, 3).unwrap();
    let size = store.get_total_size();

    match store.create_list(1, 3).unwrap_err() {
        AnnError::AlreadyExists { list_id } => assert_eq!(list_id, 1),
        other => panic!("expected AlreadyExists, got: {other}"),
    }
    assert_eq!(store.get_total_size(), size);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_create_list_zero_entries_fails() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    let err = store.create_list(1, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(store.get_total_size(), 0);
    assert!(!store.contains_list(1));
}

#[test]
fn test_allocation_accounting_for_creates() {
    let dim = 3;
    let dir = TestDir::new();
    let mut store = dir.store(dim);

    let mut allocated = 0;
    for (list_id, n) in [(0, 1), (1, 3), (2, 17), (3, 2), (4, 100), (5, 9)] {
        store.create_list(list_id, n).unwrap();
        allocated += (n as usize).next_power_of_two() * entry_bytes(dim);

        let expected_total = MIN_REGION_SIZE.max(allocated.next_power_of_two());
        assert_eq!(store.get_total_size(), expected_total, "after list {list_id}");
        assert_eq!(store.get_free_space(), expected_total - allocated);
        assert_layout_ok(&store);
    }
}

// ─── update / read ───

#[test]
fn test_update_then_read_round_trip() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(3, 3).unwrap();

    let vectors = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let ids = [10, 20, 30];
    store.update_entries(3, &vectors, &ids, 0).unwrap();

    assert_list_contents(&store, 3, &vectors, &ids);

    let view = store.list(3).unwrap();
    assert_eq!(view.len(), 3);
    assert_eq!(view.vector(1), Some(&[3.0, 4.0][..]));
    assert_eq!(view.ids().get(2), Some(30));
    assert_eq!(view.ids().get(3), None);
}

#[test]
fn test_update_sub_range() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 4).unwrap();
    store
        .update_entries(1, &[1.0, 2.0, 3.0, 4.0], &[1, 2, 3, 4], 0)
        .unwrap();
    store.update_entries(1, &[9.0, 8.0], &[90, 80], 1).unwrap();

    assert_list_contents(&store, 1, &[1.0, 9.0, 8.0, 4.0], &[1, 90, 80, 4]);
}

#[test]
fn test_update_out_of_range_fails() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 2).unwrap();

    match store.update_entries(1, &[1.0, 2.0], &[1, 2], 1).unwrap_err() {
        AnnError::OutOfRange {
            list_id,
            offset,
            count,
            length,
        } => {
            assert_eq!((list_id, offset, count, length), (1, 1, 2, 2));
        }
        other => panic!("expected OutOfRange, got: {other}"),
    }
}

#[test]
fn test_update_mismatched_lengths_fails() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(1, 2).unwrap();
    let err = store.update_entries(1, &[1.0, 2.0, 3.0], &[1, 2], 0).unwrap_err();
    assert!(matches!(
        err,
        AnnError::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
}

#[test]
fn test_missing_list_is_not_found() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();

    assert_eq!(store.get_vectors(2).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.get_ids(2).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.get_list_length(2).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.resize_list(2, 4).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        store.update_entries(2, &[1.0], &[1], 0).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        store.insert_entries(2, &[1.0], &[1]).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(store.delete_list(2).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_update_offset_overflow_is_out_of_range() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 2).unwrap();
    let err = store.update_entries(1, &[1.0], &[1], usize::MAX).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

// ─── Oversized requests ───

#[test]
fn test_oversized_list_is_rejected() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();

    let err = store.create_list(2, usize::MAX / 8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(store.resize_list(1, usize::MAX).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(store.reserve(usize::MAX / 2).unwrap_err().kind(), ErrorKind::InvalidArgument);
    // Fits the address space but not any region that can be doubled to.
    assert_eq!(store.create_list(3, 1 << 60).unwrap_err().kind(), ErrorKind::InvalidArgument);

    assert_eq!(store.get_total_size(), MIN_REGION_SIZE);
    assert_eq!(store.list_ids(), vec![1]);
    assert_layout_ok(&store);
}

#[test]
fn test_failed_grow_leaves_lists_readable() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();
    store.update_entries(1, &[4.5], &[45], 0).unwrap();

    // Needs a 2^63 byte region, a length no file can be set to.
    let err = store.create_list(2, 1 << 59).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    let err = store.resize_list(1, 1 << 59).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    assert_eq!(store.get_total_size(), MIN_REGION_SIZE);
    assert_list_contents(&store, 1, &[4.5], &[45]);
    assert_layout_ok(&store);

    store.insert_entries(1, &[5.5], &[55]).unwrap();
    assert_list_contents(&store, 1, &[4.5, 5.5], &[45, 55]);
}

// ─── resize ───

#[test]
fn test_resize_shrink_preserves_prefix() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 8).unwrap();
    let vectors: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let ids: Vec<i64> = (100..108).collect();
    store.update_entries(1, &vectors, &ids, 0).unwrap();

    store.resize_list(1, 3).unwrap();
    assert_eq!(store.get_descriptor(1).unwrap().allocated_entries, 4);
    assert_list_contents(&store, 1, &vectors[..3], &ids[..3]);
    assert_layout_ok(&store);
}

#[test]
fn test_resize_grow_preserves_entries() {
    let dir = TestDir::new();
    let mut store = dir.store(3);
    // Neighbours on both sides force the list to move.
    store.create_list(0, 2).unwrap();
    store.create_list(1, 2).unwrap();
    store.create_list(2, 2).unwrap();
    let vectors: Vec<f32> = (0..6).map(|i| i as f32 * 0.5).collect();
    store.update_entries(1, &vectors, &[7, 8], 0).unwrap();

    store.resize_list(1, 5).unwrap();
    assert_eq!(store.get_list_length(1).unwrap(), 5);
    assert_eq!(&store.get_vectors(1).unwrap()[..6], &vectors[..]);
    assert_eq!(&store.get_ids(1).unwrap().to_vec()[..2], &[7, 8]);
    assert_layout_ok(&store);
}

#[test]
fn test_resize_into_overlapping_space_keeps_data() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(0, 1).unwrap();
    store.create_list(1, 1).unwrap();
    store.update_entries(1, &[5.0], &[55], 0).unwrap();
    store.delete_list(0).unwrap();

    // List 1 now sits right after a free slot and moves left over its own
    // old extent.
    store.resize_list(1, 2).unwrap();
    assert_eq!(store.get_descriptor(1).unwrap().offset, 0);
    assert_eq!(store.get_vectors(1).unwrap()[0], 5.0);
    assert_eq!(store.get_ids(1).unwrap().get(0), Some(55));
    assert_layout_ok(&store);
}

#[test]
fn test_resize_hysteresis_keeps_allocation() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(1, 8).unwrap();
    store.create_list(2, 8).unwrap();
    let before = store.get_descriptor(1).unwrap();
    let total = store.get_total_size();

    for n in [5, 8, 6, 7] {
        store.resize_list(1, n).unwrap();
        let after = store.get_descriptor(1).unwrap();
        assert_eq!(after.offset, before.offset);
        assert_eq!(after.allocated_entries, 8);
        assert_eq!(after.used_entries, n);
        assert_eq!(store.get_total_size(), total);
    }

    store.resize_list(1, 4).unwrap();
    assert_eq!(store.get_descriptor(1).unwrap().allocated_entries, 4);
    assert_eq!(store.get_total_size(), total);
}

#[test]
fn test_resize_zero_fails_without_change() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 4).unwrap();
    let before = store.get_descriptor(1).unwrap();
    assert_eq!(
        store.resize_list(1, 0).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(store.get_descriptor(1).unwrap(), before);
}

// ─── insert ───

#[test]
fn test_insert_appends_entries() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(1, 1).unwrap();
    store.update_entries(1, &[0.0, 0.5], &[1], 0).unwrap();

    store.insert_entries(1, &[1.0, 1.5, 2.0, 2.5], &[2, 3]).unwrap();
    store.insert_entries(1, &[3.0, 3.5], &[4]).unwrap();

    assert_list_contents(
        &store,
        1,
        &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5],
        &[1, 2, 3, 4],
    );
    assert_layout_ok(&store);
}

#[test]
fn test_insert_empty_is_noop() {
    let dir = TestDir::new();
    let mut store = dir.store(2);
    store.create_list(1, 2).unwrap();
    let before = store.get_descriptor(1).unwrap();
    store.insert_entries(1, &[], &[]).unwrap();
    assert_eq!(store.get_descriptor(1).unwrap(), before);
}

// ─── delete / reserve ───

#[test]
fn test_delete_list_frees_and_coalesces() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();
    store.create_list(2, 1).unwrap();
    let total = store.get_total_size();

    store.delete_list(1).unwrap();
    store.delete_list(2).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.get_free_space(), total);
    assert_eq!(store.get_largest_continuous_free_space(), total);
    assert_eq!(store.get_total_size(), total);
    assert_layout_ok(&store);
}

#[test]
fn test_reserve_grows_trailing_space() {
    let dir = TestDir::new();
    let mut store = dir.store(4);
    store.reserve(10).unwrap();
    assert!(store.get_largest_continuous_free_space() >= 10 * entry_bytes(4));
    assert!(store.get_total_size().is_power_of_two());

    let total = store.get_total_size();
    store.reserve(1).unwrap();
    assert_eq!(store.get_total_size(), total);

    assert_eq!(store.reserve(0).unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_list_ids_sorted() {
    let dir = TestDir::new();
    let mut store = dir.store(1);
    for id in [5, -2, 9, 0] {
        store.create_list(id, 1).unwrap();
    }
    assert_eq!(store.list_ids(), vec![-2, 0, 5, 9]);
}

// ─── persistence ───

#[test]
fn test_sync_and_reopen() {
    let dir = TestDir::new();
    let path = dir.path("lists.bin");
    {
        let mut store = ListStore::new(2, &path).unwrap();
        store.create_list(1, 2).unwrap();
        store.create_list(4, 3).unwrap();
        store
            .update_entries(1, &[1.0, 2.0, 3.0, 4.0], &[11, 12], 0)
            .unwrap();
        store
            .update_entries(4, &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0], &[41, 42, 43], 0)
            .unwrap();
        store.delete_list(1).unwrap();
        store.create_list(2, 1).unwrap();
        store.update_entries(2, &[0.5, 0.25], &[21], 0).unwrap();
        store.sync().unwrap();
    }

    let reopened = ListStore::open(&path).unwrap();
    assert_eq!(reopened.vector_dim(), 2);
    assert_eq!(reopened.list_ids(), vec![2, 4]);
    assert_list_contents(&reopened, 4, &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0], &[41, 42, 43]);
    assert_list_contents(&reopened, 2, &[0.5, 0.25], &[21]);
    assert_layout_ok(&reopened);
}

#[test]
fn test_open_rejects_tampered_manifest() {
    let dir = TestDir::new();
    let path = dir.path("lists.bin");
    let mut store = ListStore::new(1, &path).unwrap();
    store.create_list(1, 2).unwrap();
    store.sync().unwrap();
    drop(store);

    let manifest_path = StoreManifest::path_for(&path);
    let mut manifest: StoreManifest =
        serde_json::from_slice(&std::fs::read(&manifest_path).unwrap()).unwrap();
    manifest.lists[0].descriptor.used_entries = 1;
    std::fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();

    let err = ListStore::open(&path).err().unwrap();
    assert!(matches!(err, AnnError::ChecksumMismatch { .. }));
}

#[test]
fn test_open_rejects_resized_region() {
    let dir = TestDir::new();
    let path = dir.path("lists.bin");
    let mut store = ListStore::new(1, &path).unwrap();
    store.create_list(1, 2).unwrap();
    store.sync().unwrap();
    drop(store);

    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(64)
        .unwrap();

    let err = ListStore::open(&path).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
}

#[test]
fn test_open_without_manifest_fails() {
    let dir = TestDir::new();
    let err = ListStore::open(dir.path("missing.bin")).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

// ─── Metrics ───

#[test]
fn test_growth_and_reallocation_are_counted() {
    ann_dkvs::metrics::init();
    let grows = ann_dkvs::metrics::REGION_GROWS_TOTAL.get();
    let moves = ann_dkvs::metrics::LIST_REALLOCATIONS_TOTAL.get();

    let dir = TestDir::new();
    let mut store = dir.store(1);
    store.create_list(1, 1).unwrap();
    store.resize_list(1, 16).unwrap();

    assert!(ann_dkvs::metrics::REGION_GROWS_TOTAL.get() >= grows + 2);
    assert!(ann_dkvs::metrics::LIST_REALLOCATIONS_TOTAL.get() > moves);
}
