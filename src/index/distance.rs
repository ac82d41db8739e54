use crate::types::Distance;

/// Distance between two vectors of equal length. Must be non-negative, and
/// smaller means closer.
pub type DistanceFn = fn(&[f32], &[f32]) -> Distance;

/// Squared Euclidean distance. The square root is skipped since it does not
/// change the ranking.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> Distance {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
