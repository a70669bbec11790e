use crate::api::{ClusterOutcome, KMeansConfig, Stage};
use crate::observer::{ClusterObserver, IterationReport};
use crate::progress::CancelToken;
use convergence::{max_shift, ConvergenceCheck};
use distance::DistanceKernel;
use log::{debug, info, trace};
use seeding::SeedParams;
use std::time::Instant;

pub mod convergence;
pub mod distance;
pub mod lloyd;
pub mod rng;
pub mod seeding;

// References:
// - k-means++: The Advantages of Careful Seeding (D. Arthur, S. Vassilvitskii)
// - Least squares quantization in PCM (S. P. Lloyd)

/// Share of the overall progress range reported while seeding.
const SEEDING_SHARE: f32 = 0.1;

/// Buffers of one clustering call, already validated by the caller.
pub(crate) struct Buffers<'a> {
    pub dim: usize,
    pub points: &'a [f32],
    pub centroids: &'a mut [f32],
    pub assignments: &'a mut [u32],
}

/// Seeds, then alternates Assignment and Update until the convergence check stops
/// the loop or the token is cancelled.
pub(crate) fn run<K: DistanceKernel>(
    kernel: K,
    config: &KMeansConfig,
    observer: &dyn ClusterObserver,
    buffers: Buffers<'_>,
    token: &mut CancelToken<'_>,
) -> ClusterOutcome {
    let Buffers {
        dim,
        points,
        centroids,
        assignments,
    } = buffers;
    let n = points.len() / dim;
    let k = centroids.len() / dim;
    let chunk = config.chunk_size;
    info!(
        "k-means: n={}, k={}, dim={}, kernel={}, max_iterations={}",
        n,
        k,
        dim,
        K::NAME,
        config.max_iterations
    );

    token.set_span(0.0, SEEDING_SHARE);
    let started = Instant::now();
    let params = SeedParams {
        dim,
        subsample_stride: config.subsample_stride,
        chunk_size: chunk,
        seed: config.seed,
    };
    let chosen = match seeding::seed(kernel, points, centroids, &params, token) {
        Ok(chosen) => chosen,
        Err(_) => {
            info!("k-means: cancelled during seeding");
            return ClusterOutcome::Cancelled {
                stage: Stage::Seeding,
            };
        }
    };
    observer.on_seeded(&chosen, started.elapsed());

    let check = ConvergenceCheck {
        max_iterations: config.max_iterations,
        min_delta: config.min_delta,
    };
    let batch_size = config.batch_size;
    let mut previous: Vec<f32> = Vec::with_capacity(centroids.len());
    let mut before_previous: Vec<f32> = Vec::with_capacity(centroids.len());
    let mut iteration = 0;

    loop {
        let span = (1.0 - SEEDING_SHARE) / config.max_iterations as f32;
        let span_start = SEEDING_SHARE + span * iteration as f32;
        token.set_span(span_start, span_start + span);

        let started = Instant::now();
        for (b, labels) in assignments.chunks_mut(batch_size).enumerate() {
            let first = b * batch_size;
            if token.checkpoint(first as f32 / n as f32).is_err() {
                info!(
                    "k-means: cancelled in iteration {} at point {}",
                    iteration + 1,
                    first
                );
                return ClusterOutcome::Cancelled {
                    stage: Stage::Assignment,
                };
            }
            lloyd::assign_range(kernel, dim, points, centroids, labels, first, chunk);
            trace!("k-means: assigned points {}..{}", first, first + labels.len());
        }
        observer.on_stage(Stage::Assignment, started.elapsed());

        // before_previous <- previous, previous <- current
        std::mem::swap(&mut previous, &mut before_previous);
        previous.clear();
        previous.extend_from_slice(centroids);

        let started = Instant::now();
        let counts = lloyd::update(
            dim,
            points,
            &previous,
            assignments,
            centroids,
            config.update_strategy,
            chunk,
        );
        observer.on_stage(Stage::Update, started.elapsed());
        iteration += 1;

        let shift = max_shift(kernel, dim, centroids, &previous);
        let report = IterationReport {
            iteration,
            max_shift: shift,
            empty_clusters: counts.iter().filter(|&&count| count == 0).count(),
            inertia: config
                .track_inertia
                .then(|| lloyd::inertia(kernel, dim, points, centroids, assignments, chunk)),
        };
        debug!(
            "k-means: iteration {}, max shift {:.6}, {} empty clusters",
            iteration, report.max_shift, report.empty_clusters
        );
        observer.on_iteration(&report);

        let two_back = (iteration >= 2).then_some(before_previous.as_slice());
        if let Some(stop) = check.check(iteration, centroids, &previous, two_back, shift) {
            info!("k-means: stopped after {} iterations ({:?})", iteration, stop);
            return ClusterOutcome::Completed {
                iterations: iteration,
                stop,
            };
        }
    }
}
