use crate::config::BenchmarkRun;
use crate::metrics::{compute_stats, measure_rss, TimingHistogram};
use indicatif::ProgressBar;
use kmeans_engine::{ClusterObserver, ClusterOutcome, KMeans, Stage};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Resolution of the progress bar driven by the engine's progress callback.
pub const PROGRESS_TICKS: u64 = 1000;

/// Result from the clustering benchmark
#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub kernel: &'static str,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub range_ms: f64,
    pub iterations: usize,
    pub stop_reason: String,
    pub seeding_ms: f64,
    pub assign_p50_ms: f64,
    pub assign_p95_ms: f64,
    pub update_p50_ms: f64,
    pub update_p95_ms: f64,
    pub inertia: f64,
    pub memory_bytes: u64,
}

/// Result from the cancellation benchmark
#[derive(Debug, Clone)]
pub struct CancelResult {
    /// Time between the callback asking to stop and the call returning.
    pub latency_ms: f64,
    pub stage: Stage,
}

/// Collects per-stage timings reported by the engine.
#[derive(Default)]
struct TimingObserver {
    seeding: Mutex<TimingHistogram>,
    assignment: Mutex<TimingHistogram>,
    update: Mutex<TimingHistogram>,
}

impl ClusterObserver for TimingObserver {
    fn on_seeded(&self, _chosen: &[usize], elapsed: Duration) {
        if let Ok(mut hist) = self.seeding.lock() {
            hist.record_duration(elapsed);
        }
    }

    fn on_stage(&self, stage: Stage, elapsed: Duration) {
        let hist = match stage {
            Stage::Assignment => &self.assignment,
            Stage::Update => &self.update,
            Stage::Seeding => &self.seeding,
        };
        if let Ok(mut hist) = hist.lock() {
            hist.record_duration(elapsed);
        }
    }
}

fn snapshot(hist: &Mutex<TimingHistogram>) -> TimingHistogram {
    hist.lock().map(|h| h.clone()).unwrap_or_default()
}

/// Run a full clustering `run.repeats` times and measure wall time, stage
/// timings, memory and final inertia.
pub fn cluster_benchmark(
    run: &BenchmarkRun,
    points: &[f32],
    pbar: &ProgressBar,
) -> Result<ClusterResult, Box<dyn std::error::Error>> {
    let observer = Arc::new(TimingObserver::default());
    let engine = KMeans::new(run.engine_config()).with_observer(observer.clone());
    let dim = run.dimension;

    let mut centroids = vec![0.0f32; run.k * dim];
    let mut assignments = vec![0u32; run.point_count];
    let mut wall = Vec::with_capacity(run.repeats);
    let mut outcome = None;

    let memory_before = measure_rss().unwrap_or(0);
    for repeat in 0..run.repeats {
        pbar.set_position(0);
        pbar.set_message(format!("repeat {}/{}", repeat + 1, run.repeats));
        let mut report = |p: f32| {
            pbar.set_position((p * PROGRESS_TICKS as f32) as u64);
            true
        };

        let start = Instant::now();
        let result = engine.cluster(dim, points, &mut centroids, &mut assignments, Some(&mut report))?;
        wall.push(start.elapsed().as_secs_f64() * 1000.0);
        outcome = Some(result);
    }
    let memory_after = measure_rss().unwrap_or(0);

    let Some(ClusterOutcome::Completed { iterations, stop }) = outcome else {
        return Err("clustering did not complete".into());
    };

    engine.assign(dim, points, &centroids, &mut assignments)?;
    let inertia = engine.inertia(dim, points, &centroids, &assignments)?;

    let (mean_ms, std_dev_ms, range_ms) = compute_stats(&wall);
    let seeding = snapshot(&observer.seeding);
    let assignment = snapshot(&observer.assignment);
    let update = snapshot(&observer.update);

    Ok(ClusterResult {
        kernel: engine.kernel().name(),
        mean_ms,
        std_dev_ms,
        range_ms,
        iterations,
        stop_reason: format!("{:?}", stop),
        seeding_ms: seeding.mean().unwrap_or(0.0),
        assign_p50_ms: assignment.p50().unwrap_or(0.0),
        assign_p95_ms: assignment.p95().unwrap_or(0.0),
        update_p50_ms: update.p50().unwrap_or(0.0),
        update_p95_ms: update.p95().unwrap_or(0.0),
        inertia,
        memory_bytes: memory_after.saturating_sub(memory_before),
    })
}

/// Ask the engine to stop once half of the work is reported and measure how
/// long it takes to return. `None` when the run finished before that point.
pub fn cancel_benchmark(
    run: &BenchmarkRun,
    points: &[f32],
) -> Result<Option<CancelResult>, Box<dyn std::error::Error>> {
    let engine = KMeans::new(run.engine_config());
    let mut centroids = vec![0.0f32; run.k * run.dimension];
    let mut assignments = vec![0u32; run.point_count];

    let mut requested: Option<Instant> = None;
    let mut stop_halfway = |p: f32| {
        if p >= 0.5 {
            requested.get_or_insert_with(Instant::now);
            false
        } else {
            true
        }
    };

    let outcome = engine.cluster(
        run.dimension,
        points,
        &mut centroids,
        &mut assignments,
        Some(&mut stop_halfway),
    )?;
    let returned = Instant::now();

    Ok(match (outcome, requested) {
        (ClusterOutcome::Cancelled { stage }, Some(at)) => Some(CancelResult {
            latency_ms: returned.duration_since(at).as_secs_f64() * 1000.0,
            stage,
        }),
        _ => None,
    })
}
