use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic flat dataset of `point_count` points drawn around `blobs`
/// centers in `[-1, 1]^dimension`. Noise is uniform with the standard
/// deviation `blob_std`.
pub fn generate_blobs(
    point_count: usize,
    dimension: usize,
    blobs: usize,
    blob_std: f32,
    seed: u64,
) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let blobs = blobs.max(1);

    let centers: Vec<f32> = (0..blobs * dimension)
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();

    // uniform(-h, h) has std h / sqrt(3)
    let half_width = blob_std.max(0.0) * 3.0f32.sqrt();
    let mut points = Vec::with_capacity(point_count * dimension);
    for i in 0..point_count {
        let center = &centers[(i % blobs) * dimension..(i % blobs + 1) * dimension];
        points.extend(center.iter().map(|&c| {
            if half_width > 0.0 {
                c + rng.gen_range(-half_width..half_width)
            } else {
                c
            }
        }));
    }

    log::debug!(
        "generated {} points of dimension {} around {} blobs (seed {})",
        point_count,
        dimension,
        blobs,
        seed
    );
    points
}

/// Size of a flat dataset in bytes
pub fn dataset_bytes(points: &[f32]) -> u64 {
    std::mem::size_of_val(points) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_points() {
        assert_eq!(generate_blobs(100, 3, 4, 0.1, 9), generate_blobs(100, 3, 4, 0.1, 9));
        assert_ne!(generate_blobs(100, 3, 4, 0.1, 9), generate_blobs(100, 3, 4, 0.1, 10));
    }

    #[test]
    fn points_stay_near_their_center() {
        let points = generate_blobs(40, 2, 4, 0.0, 1);
        assert_eq!(points.len(), 80);
        // zero noise: point i sits exactly on center i % 4
        assert_eq!(&points[0..2], &points[8..10]);
        assert_eq!(dataset_bytes(&points), 320);
    }
}
