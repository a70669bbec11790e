use super::distance::DistanceKernel;
use super::rng::{hash, hash_float};
use crate::progress::{CancelToken, Cancelled};
use log::{debug, trace};
use rayon::prelude::*;
use std::borrow::Cow;

/// Inputs of a k-means++ seeding pass besides the buffers themselves.
#[derive(Debug, Clone, Copy)]
pub struct SeedParams {
    pub dim: usize,
    /// Take every `subsample_stride`-th point into the working set (1 = all points).
    pub subsample_stride: usize,
    /// Points per parallel task.
    pub chunk_size: usize,
    /// PRNG input for the first, uniformly drawn centroid.
    pub seed: u32,
}

/// Largest stride not exceeding `requested` that still leaves at least `k` points.
pub fn effective_stride(n: usize, k: usize, requested: usize) -> usize {
    requested.max(1).min((n / k.max(1)).max(1))
}

/// k-means++ seeding: fills every slot of `centroids` with a copy of a distinct
/// input point, chosen with probability proportional to its squared distance to
/// the nearest centroid picked so far.
///
/// Returns the chosen point indices (into `points`, not the subsample) in slot
/// order. The caller validates buffer shapes and guarantees `n >= k`. On
/// `Err(Cancelled)` the centroid buffer is partially written and must not be used.
pub fn seed<K: DistanceKernel>(
    kernel: K,
    points: &[f32],
    centroids: &mut [f32],
    params: &SeedParams,
    token: &mut CancelToken<'_>,
) -> Result<Vec<usize>, Cancelled> {
    let dim = params.dim;
    let chunk = params.chunk_size.max(1);
    let n = points.len() / dim;
    let k = centroids.len() / dim;
    debug_assert!(k >= 1 && n >= k);

    let stride = effective_stride(n, k, params.subsample_stride);
    if stride != params.subsample_stride {
        debug!(
            "k-means++: stride {} clamped to {} to keep {} candidates",
            params.subsample_stride, stride, k
        );
    }
    let working: Cow<[f32]> = if stride == 1 {
        Cow::Borrowed(points)
    } else {
        Cow::Owned(
            points
                .chunks_exact(dim)
                .step_by(stride)
                .flatten()
                .copied()
                .collect(),
        )
    };
    let working = working.as_ref();
    let m = working.len() / dim;
    debug!("k-means++: seeding {} centroids from {} of {} points", k, m, n);

    let mut taken = vec![false; m];
    let mut chosen = Vec::with_capacity(k);

    let first = hash(params.seed) as usize % m;
    taken[first] = true;
    copy_point(working, first, centroids, 0, dim);
    chosen.push(first);
    debug!("k-means++: selected centroid 0 (point {})", first * stride);

    let mut min_distances = vec![0.0f32; m];
    min_distances
        .par_chunks_mut(chunk)
        .enumerate()
        .for_each(|(c, out)| {
            let base = c * chunk;
            for (j, d) in out.iter_mut().enumerate() {
                *d = kernel.distance_squared(working, base + j, working, first, dim);
            }
        });

    loop {
        token.checkpoint(chosen.len() as f32 / k as f32)?;
        if chosen.len() == k {
            break;
        }

        let total = untaken_weight(&min_distances, &taken, chunk);
        let threshold = hash_float(chosen.len() as u32, total);
        let next = select_weighted(&min_distances, &taken, threshold, total);

        let slot = chosen.len();
        taken[next] = true;
        copy_point(working, next, centroids, slot, dim);
        chosen.push(next);
        debug!(
            "k-means++: selected centroid {} (point {}, dist²={:.4})",
            slot,
            next * stride,
            min_distances[next]
        );

        if chosen.len() < k {
            update_min_distances(kernel, working, dim, next, &mut min_distances, &taken, chunk);
        }
    }

    Ok(chosen.into_iter().map(|i| i * stride).collect())
}

#[inline]
fn copy_point(src: &[f32], index: usize, dst: &mut [f32], slot: usize, dim: usize) {
    dst[slot * dim..(slot + 1) * dim].copy_from_slice(&src[index * dim..(index + 1) * dim]);
}

/// Sum of cached distances over untaken points: parallel per-chunk partials,
/// reduced serially in chunk order so the total does not depend on scheduling.
fn untaken_weight(min_distances: &[f32], taken: &[bool], chunk: usize) -> f32 {
    let partials: Vec<f32> = min_distances
        .par_chunks(chunk)
        .zip(taken.par_chunks(chunk))
        .map(|(d, t)| {
            d.iter()
                .zip(t)
                .filter(|&(_, &taken)| !taken)
                .map(|(&d, _)| d)
                .sum::<f32>()
        })
        .collect();
    partials.iter().sum()
}

/// First untaken point whose running weight reaches `threshold`.
///
/// Zero-weight points (exact duplicates of a chosen centroid) only qualify when
/// no weight is left at all.
/// This is stricter than taking the first point whose running weight reaches the
/// threshold: a zero threshold, or one equal to a prefix sum, would otherwise pick
/// a point that coincides with an existing centroid. Falls back to the highest-indexed untaken point when
/// rounding leaves the threshold out of reach.
fn select_weighted(min_distances: &[f32], taken: &[bool], threshold: f32, total: f32) -> usize {
    let mut cumsum = 0.0f32;
    let mut last_untaken = 0;

    for (i, (&d, &t)) in min_distances.iter().zip(taken).enumerate() {
        if t {
            continue;
        }
        cumsum += d;
        last_untaken = i;
        if cumsum >= threshold && (d > 0.0 || total <= 0.0) {
            return i;
        }
    }

    trace!(
        "k-means++: threshold {} unreached (cumsum {}), falling back to point {}",
        threshold,
        cumsum,
        last_untaken
    );
    last_untaken
}

/// Lower each untaken point's cached distance to its distance to `newest` when closer.
fn update_min_distances<K: DistanceKernel>(
    kernel: K,
    working: &[f32],
    dim: usize,
    newest: usize,
    min_distances: &mut [f32],
    taken: &[bool],
    chunk: usize,
) {
    min_distances
        .par_chunks_mut(chunk)
        .zip(taken.par_chunks(chunk))
        .enumerate()
        .for_each(|(c, (out, taken))| {
            let base = c * chunk;
            for (j, (min_dist, &t)) in out.iter_mut().zip(taken).enumerate() {
                if t {
                    continue;
                }
                let dist = kernel.distance_squared(working, base + j, working, newest, dim);
                if dist < *min_dist {
                    *min_dist = dist;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::distance::{Scalar, Wide8};
    use pretty_assertions::assert_eq;

    fn params(dim: usize) -> SeedParams {
        SeedParams {
            dim,
            subsample_stride: 1,
            chunk_size: 3,
            seed: 314_159,
        }
    }

    fn run(points: &[f32], dim: usize, k: usize, params: &SeedParams) -> (Vec<usize>, Vec<f32>) {
        let mut centroids = vec![0.0; k * dim];
        let chosen = seed(Wide8, points, &mut centroids, params, &mut CancelToken::never())
            .expect("never token cannot cancel");
        (chosen, centroids)
    }

    #[test]
    fn picks_distinct_points() {
        let points: Vec<f32> = (0..40).map(|i| (i * 7 % 13) as f32).collect();
        for k in 1..=20 {
            let (chosen, _) = run(&points, 2, k, &params(2));
            assert_eq!(chosen.len(), k);
            let mut sorted = chosen.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), k, "indices must be distinct for k={k}");
        }
    }

    #[test]
    fn centroids_are_exact_copies() {
        let points: Vec<f32> = (0..30).map(|i| i as f32 * 0.5).collect();
        let (chosen, centroids) = run(&points, 3, 4, &params(3));
        for (slot, &idx) in chosen.iter().enumerate() {
            assert_eq!(&centroids[slot * 3..slot * 3 + 3], &points[idx * 3..idx * 3 + 3]);
        }
    }

    #[test]
    fn k_equals_n_takes_every_point() {
        let points = vec![0.0, 10.0, 20.0, 30.0];
        let (chosen, _) = run(&points, 1, 4, &params(1));
        let mut sorted = chosen;
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn duplicates_still_yield_distinct_indices() {
        let points = vec![1.0; 12];
        let (chosen, _) = run(&points, 2, 6, &params(2));
        let mut sorted = chosen;
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn outlier_is_selected() {
        let mut points: Vec<f32> = (0..10).map(|i| i as f32 * 0.01).collect();
        points.push(1000.0);
        let (chosen, _) = run(&points, 1, 2, &params(1));
        assert!(chosen.contains(&10), "chosen {chosen:?}");
    }

    #[test]
    fn subsampled_indices_are_stride_multiples() {
        let points: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let p = SeedParams {
            subsample_stride: 5,
            ..params(1)
        };
        let (chosen, centroids) = run(&points, 1, 4, &p);
        for (slot, &idx) in chosen.iter().enumerate() {
            assert_eq!(idx % 5, 0);
            assert_eq!(centroids[slot], points[idx]);
        }
    }

    #[test]
    fn stride_is_clamped_to_keep_k_candidates() {
        assert_eq!(effective_stride(10, 4, 8), 2);
        assert_eq!(effective_stride(10, 10, 3), 1);
        assert_eq!(effective_stride(1000, 2, 4), 4);
        assert_eq!(effective_stride(5, 1, 0), 1);
    }

    #[test]
    fn deterministic_and_kernel_independent() {
        let points: Vec<f32> = (0..300).map(|i| ((i * 31 % 97) as f32).sqrt()).collect();
        let (a, ca) = run(&points, 3, 7, &params(3));
        let (b, cb) = run(&points, 3, 7, &params(3));
        assert_eq!(a, b);
        assert_eq!(ca, cb);

        let mut centroids = vec![0.0; 21];
        let scalar = seed(Scalar, &points, &mut centroids, &params(3), &mut CancelToken::never())
            .unwrap();
        assert_eq!(scalar, a);
    }

    #[test]
    fn cancelled_on_first_checkpoint() {
        let points: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut centroids = vec![0.0; 3];
        let mut stop = |_: f32| false;
        let mut token = CancelToken::new(Some(&mut stop));
        let result = seed(Wide8, &points, &mut centroids, &params(1), &mut token);
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn selection_falls_back_to_last_untaken() {
        let d = [1.0, 2.0, 3.0, 4.0];
        let taken = [false, false, false, true];
        assert_eq!(select_weighted(&d, &taken, 100.0, 6.0), 2);
        assert_eq!(select_weighted(&d, &taken, 2.5, 6.0), 1);
        assert_eq!(select_weighted(&d, &taken, 0.0, 6.0), 0);
    }

    #[test]
    fn zero_weight_points_skipped_while_weight_remains() {
        let d = [0.0, 0.0, 5.0];
        let taken = [false; 3];
        assert_eq!(select_weighted(&d, &taken, 0.0, 5.0), 2);
        assert_eq!(select_weighted(&[0.0, 0.0], &[true, false], 0.0, 0.0), 1);
    }

    #[test]
    fn untaken_weight_excludes_taken() {
        let d = [1.0, 2.0, 3.0, 4.0, 5.0];
        let taken = [false, true, false, true, false];
        assert_eq!(untaken_weight(&d, &taken, 2), 9.0);
    }
}
