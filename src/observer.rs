use crate::api::{ClusterOutcome, Stage};
use log::{debug, info};
use std::time::Duration;

/// Per-iteration summary handed to [`ClusterObserver::on_iteration`].
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// 1-based count of completed iterations.
    pub iteration: usize,
    /// Largest Euclidean distance any centroid moved during this iteration.
    pub max_shift: f32,
    /// Clusters that received no points and kept their previous centroid.
    pub empty_clusters: usize,
    /// Total squared distance of points to their assigned centroid after the
    /// update, present only when `track_inertia` is enabled.
    pub inertia: Option<f64>,
}

/// Profiling and diagnostics hooks injected into [`crate::KMeans`].
///
/// All methods default to no-ops. Callbacks run on the thread that called
/// `cluster`, never from inside a parallel batch.
pub trait ClusterObserver: Send + Sync {
    /// Seeding finished; `chosen` holds the selected point indices.
    fn on_seeded(&self, _chosen: &[usize], _elapsed: Duration) {}

    /// One stage pass finished.
    fn on_stage(&self, _stage: Stage, _elapsed: Duration) {}

    fn on_iteration(&self, _report: &IterationReport) {}

    fn on_finished(&self, _outcome: &ClusterOutcome) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ClusterObserver for NoopObserver {}

/// Forwards every hook to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ClusterObserver for LogObserver {
    fn on_seeded(&self, chosen: &[usize], elapsed: Duration) {
        info!("seeded {} centroids in {:?}", chosen.len(), elapsed);
    }

    fn on_stage(&self, stage: Stage, elapsed: Duration) {
        debug!("{:?} stage took {:?}", stage, elapsed);
    }

    fn on_iteration(&self, report: &IterationReport) {
        match report.inertia {
            Some(inertia) => info!(
                "iteration {}: max shift {:.6}, {} empty, inertia {:.4}",
                report.iteration, report.max_shift, report.empty_clusters, inertia
            ),
            None => info!(
                "iteration {}: max shift {:.6}, {} empty",
                report.iteration, report.max_shift, report.empty_clusters
            ),
        }
    }

    fn on_finished(&self, outcome: &ClusterOutcome) {
        info!("clustering finished: {:?}", outcome);
    }
}
