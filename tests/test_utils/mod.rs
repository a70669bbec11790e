use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Create synthetic data with well-separated clusters.
/// Returns (data, true_labels)
#[allow(dead_code)]
pub fn create_gaussian_clusters(
    num_clusters: usize,
    points_per_cluster: usize,
    dim: usize,
    separation: f32,
    seed: u64,
) -> (Array2<f32>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let total_points = num_clusters * points_per_cluster;
    let mut data = Array2::<f32>::zeros((total_points, dim));
    let mut true_labels = Vec::with_capacity(total_points);

    for cluster_id in 0..num_clusters {
        let center: Vec<f32> = (0..dim)
            .map(|d| (cluster_id as f32) * separation + (d as f32) * 0.1)
            .collect();

        for point_id in 0..points_per_cluster {
            let idx = cluster_id * points_per_cluster + point_id;
            true_labels.push(cluster_id);

            for d in 0..dim {
                let noise: f32 = rng.gen_range(-0.5..0.5);
                data[(idx, d)] = center[d] + noise;
            }
        }
    }

    (data, true_labels)
}

/// Generate deterministic uniform vectors in [-10, 10).
#[allow(dead_code)]
pub fn create_deterministic_vectors(n: usize, dim: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dim).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

/// Row-major copy of a matrix.
#[allow(dead_code)]
pub fn flatten(data: &Array2<f32>) -> Vec<f32> {
    data.iter().copied().collect()
}

#[allow(dead_code)]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[allow(dead_code)]
pub fn row_distance_squared(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Within-cluster sum of squares over flat buffers, accumulated in f64.
#[allow(dead_code)]
pub fn calculate_inertia(dim: usize, points: &[f32], centroids: &[f32], labels: &[u32]) -> f64 {
    points
        .chunks_exact(dim)
        .zip(labels)
        .map(|(point, &label)| {
            let c = label as usize;
            euclidean_distance_squared(point, &centroids[c * dim..(c + 1) * dim]) as f64
        })
        .sum()
}

/// Verify that each point is assigned to its nearest centroid
#[allow(dead_code)]
pub fn verify_optimal_assignment(
    dim: usize,
    points: &[f32],
    centroids: &[f32],
    labels: &[u32],
) -> bool {
    for (point, &label) in points.chunks_exact(dim).zip(labels) {
        let assigned = label as usize;
        let assigned_dist =
            euclidean_distance_squared(point, &centroids[assigned * dim..(assigned + 1) * dim]);

        for centroid in centroids.chunks_exact(dim) {
            if euclidean_distance_squared(point, centroid) < assigned_dist - 1e-4 {
                return false;
            }
        }
    }
    true
}

/// Per-cluster mean of the assigned points; `None` for empty clusters.
#[allow(dead_code)]
pub fn cluster_means(dim: usize, k: usize, points: &[f32], labels: &[u32]) -> Vec<Option<Vec<f64>>> {
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];
    for (point, &label) in points.chunks_exact(dim).zip(labels) {
        let c = label as usize;
        counts[c] += 1;
        for (s, &x) in sums[c].iter_mut().zip(point) {
            *s += x as f64;
        }
    }
    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| (count > 0).then(|| sum.iter().map(|s| s / count as f64).collect()))
        .collect()
}
