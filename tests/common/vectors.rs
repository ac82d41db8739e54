use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` random vectors of dimension `dims`, row-major, uniform in [-1, 1].
pub fn random_vectors(n: usize, dims: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dims).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Vectors clustered around `n_clusters` random centroids.
///
/// Returns `(centroids, vectors, vector_ids, list_ids)`, all row-major or
/// aligned by record. Vector `i` has id `i` and belongs to the list of the
/// centroid it was generated from.
pub fn clustered_vectors(
    n_clusters: usize,
    n_per_cluster: usize,
    dims: usize,
    noise: f32,
) -> (Vec<f32>, Vec<f32>, Vec<i64>, Vec<i64>) {
    let mut rng = StdRng::seed_from_u64(123);
    let centroids: Vec<f32> = (0..n_clusters * dims)
        .map(|_| rng.gen_range(-10.0..10.0))
        .collect();

    let total = n_clusters * n_per_cluster;
    let mut vectors = Vec::with_capacity(total * dims);
    let mut ids = Vec::with_capacity(total);
    let mut list_ids = Vec::with_capacity(total);

    // Interleave clusters so every list receives records out of order.
    for i in 0..total {
        let cluster = i % n_clusters;
        let centroid = &centroids[cluster * dims..(cluster + 1) * dims];
        vectors.extend(centroid.iter().map(|&c| c + rng.gen_range(-noise..noise)));
        ids.push(i as i64);
        list_ids.push(cluster as i64);
    }

    (centroids, vectors, ids, list_ids)
}

/// Brute-force `k` nearest ids by squared distance, ties by id.
pub fn brute_force_knn(vectors: &[f32], ids: &[i64], dims: usize, query: &[f32], k: usize) -> Vec<i64> {
    let mut scored: Vec<(f32, i64)> = vectors
        .chunks_exact(dims)
        .zip(ids)
        .map(|(v, &id)| {
            let d: f32 = v.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
            (d, id)
        })
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(k).map(|(_, id)| id).collect()
}
