use ann_dkvs::storage::ListStore;
use ann_dkvs::types::QueryResult;

/// Assert that a store's lists and free slots tile its region.
pub fn assert_layout_ok(store: &ListStore) {
    if let Err(e) = store.check_layout() {
        panic!("store layout is broken: {e}");
    }
}

/// Assert a list holds exactly `vectors` and `ids`.
pub fn assert_list_contents(store: &ListStore, list_id: i64, vectors: &[f32], ids: &[i64]) {
    assert_eq!(
        store.get_list_length(list_id).unwrap(),
        ids.len(),
        "length of list {list_id}"
    );
    assert_eq!(store.get_vectors(list_id).unwrap(), vectors, "vectors of list {list_id}");
    assert_eq!(store.get_ids(list_id).unwrap().to_vec(), ids, "ids of list {list_id}");
}

/// Assert results equal `(distance, id)` pairs exactly.
pub fn assert_results(results: &[QueryResult], expected: &[(f32, i64)]) {
    let actual: Vec<(f32, i64)> = results.iter().map(|r| (r.distance, r.vector_id)).collect();
    assert_eq!(actual, expected);
}

/// Assert result batches are bit-for-bit identical.
pub fn assert_batches_identical(a: &[Vec<QueryResult>], b: &[Vec<QueryResult>]) {
    assert_eq!(a.len(), b.len(), "batch sizes differ");
    for (qa, qb) in a.iter().zip(b) {
        let ka: Vec<(u32, i64)> = qa.iter().map(|r| (r.distance.to_bits(), r.vector_id)).collect();
        let kb: Vec<(u32, i64)> = qb.iter().map(|r| (r.distance.to_bits(), r.vector_id)).collect();
        assert_eq!(ka, kb);
    }
}

/// Assert that recall@k of `results` against `ground_truth` is at least `min_recall`.
pub fn assert_recall_at_k(results: &[QueryResult], ground_truth: &[i64], k: usize, min_recall: f64) {
    let truth: std::collections::HashSet<i64> = ground_truth.iter().take(k).copied().collect();
    let hits = results
        .iter()
        .take(k)
        .filter(|r| truth.contains(&r.vector_id))
        .count();
    let recall = hits as f64 / truth.len().max(1) as f64;
    assert!(
        recall >= min_recall,
        "recall@{k} = {recall:.2} below {min_recall:.2}"
    );
}
