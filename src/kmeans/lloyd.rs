use super::distance::DistanceKernel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the Update Stage accumulates per-cluster sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// One pass over all points in index order.
    #[default]
    Serial,
    /// Per-chunk partial sums in parallel, merged serially in chunk order.
    /// Deterministic for a fixed chunk size, allocates `k * dim` sums per chunk.
    Partitioned,
}

/// Nearest centroid to point `index` and its squared distance. Ties keep the lowest index.
#[inline]
pub fn nearest_centroid<K: DistanceKernel>(
    kernel: K,
    dim: usize,
    points: &[f32],
    index: usize,
    centroids: &[f32],
    k: usize,
) -> (usize, f32) {
    let mut best_c = 0;
    let mut best_dist = f32::INFINITY;
    for c in 0..k {
        let dist = kernel.distance_squared(points, index, centroids, c, dim);
        if dist < best_dist {
            best_dist = dist;
            best_c = c;
        }
    }
    (best_c, best_dist)
}

/// Assignment Stage over one batch: `assignments[j]` receives the nearest centroid
/// of point `first + j`.
///
/// Each rayon task owns a disjoint `chunk`-sized slice of `assignments`, the point
/// and centroid buffers are only read.
pub fn assign_range<K: DistanceKernel>(
    kernel: K,
    dim: usize,
    points: &[f32],
    centroids: &[f32],
    assignments: &mut [u32],
    first: usize,
    chunk: usize,
) {
    let k = centroids.len() / dim;
    assignments
        .par_chunks_mut(chunk.max(1))
        .enumerate()
        .for_each(|(c, labels)| {
            let base = first + c * chunk.max(1);
            for (j, label) in labels.iter_mut().enumerate() {
                let (best_c, _) = nearest_centroid(kernel, dim, points, base + j, centroids, k);
                *label = best_c as u32;
            }
        });
}

/// Update Stage: each centroid becomes the mean of its assigned points. Clusters
/// with no points keep their `previous` position.
///
/// Returns the per-cluster point counts.
pub fn update(
    dim: usize,
    points: &[f32],
    previous: &[f32],
    assignments: &[u32],
    centroids: &mut [f32],
    strategy: UpdateStrategy,
    chunk: usize,
) -> Vec<usize> {
    let k = centroids.len() / dim;
    let (sums, counts) = match strategy {
        UpdateStrategy::Serial => accumulate(dim, k, points, assignments, 0),
        UpdateStrategy::Partitioned => {
            let chunk = chunk.max(1);
            let partials: Vec<(Vec<f64>, Vec<usize>)> = assignments
                .par_chunks(chunk)
                .enumerate()
                .map(|(c, labels)| accumulate(dim, k, points, labels, c * chunk))
                .collect();

            let mut sums = vec![0.0f64; k * dim];
            let mut counts = vec![0usize; k];
            for (partial_sums, partial_counts) in partials {
                for (s, p) in sums.iter_mut().zip(&partial_sums) {
                    *s += p;
                }
                for (n, p) in counts.iter_mut().zip(&partial_counts) {
                    *n += p;
                }
            }
            (sums, counts)
        }
    };

    for (c, &count) in counts.iter().enumerate() {
        let dst = &mut centroids[c * dim..(c + 1) * dim];
        if count == 0 {
            dst.copy_from_slice(&previous[c * dim..(c + 1) * dim]);
            continue;
        }
        let count = count as f64;
        for (d, s) in dst.iter_mut().zip(&sums[c * dim..(c + 1) * dim]) {
            *d = (s / count) as f32;
        }
    }

    counts
}

fn accumulate(
    dim: usize,
    k: usize,
    points: &[f32],
    labels: &[u32],
    first: usize,
) -> (Vec<f64>, Vec<usize>) {
    let mut sums = vec![0.0f64; k * dim];
    let mut counts = vec![0usize; k];
    for (j, &label) in labels.iter().enumerate() {
        let c = label as usize;
        let i = first + j;
        counts[c] += 1;
        for (s, &x) in sums[c * dim..(c + 1) * dim]
            .iter_mut()
            .zip(&points[i * dim..(i + 1) * dim])
        {
            *s += x as f64;
        }
    }
    (sums, counts)
}

/// Total squared distance of every point to its assigned centroid.
pub fn inertia<K: DistanceKernel>(
    kernel: K,
    dim: usize,
    points: &[f32],
    centroids: &[f32],
    assignments: &[u32],
    chunk: usize,
) -> f64 {
    let chunk = chunk.max(1);
    let partials: Vec<f64> = assignments
        .par_chunks(chunk)
        .enumerate()
        .map(|(c, labels)| {
            let base = c * chunk;
            labels
                .iter()
                .enumerate()
                .map(|(j, &label)| {
                    kernel.distance_squared(points, base + j, centroids, label as usize, dim) as f64
                })
                .sum::<f64>()
        })
        .collect();
    partials.iter().sum()
}
