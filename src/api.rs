use crate::error::{KMeansError, Result};
use crate::kmeans::convergence::StopReason;
use crate::kmeans::distance::{KernelChoice, Scalar, Wide4, Wide8};
use crate::kmeans::lloyd::{self, UpdateStrategy};
use crate::kmeans::seeding::{self, SeedParams};
use crate::kmeans::{self, Buffers};
use crate::observer::{ClusterObserver, NoopObserver};
use crate::progress::{CancelToken, ProgressFn};
use ndarray::{Array1, Array2, ArrayView2};
use once_cell::sync::OnceCell;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

// Runs `$body` with `$k` bound to the kernel type picked by `$choice`, so each
// branch is monomorphized and the hot loops never branch on the width.
macro_rules! with_kernel {
    ($choice:expr, |$k:ident| $body:expr) => {
        match $choice {
            KernelChoice::Wide8 => {
                let $k = Wide8;
                $body
            }
            KernelChoice::Wide4 => {
                let $k = Wide4;
                $body
            }
            KernelChoice::Scalar => {
                let $k = Scalar;
                $body
            }
        }
    };
}

/// Configuration for a clustering run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Hard cap on Lloyd iterations (at least 1).
    pub max_iterations: usize,

    /// Stop once every centroid moved less than this Euclidean distance.
    /// `<= 0` disables the check.
    pub min_delta: f32,

    /// Seed from every `subsample_stride`-th point only (1 = all points).
    pub subsample_stride: usize,

    /// Points per assignment batch; progress is reported between batches.
    pub batch_size: usize,

    /// Points per parallel task.
    pub chunk_size: usize,

    /// PRNG input for the first centroid.
    pub seed: u32,

    pub update_strategy: UpdateStrategy,

    /// Compute inertia after every iteration for [`ClusterObserver::on_iteration`].
    pub track_inertia: bool,

    /// Run on a dedicated pool of this many threads instead of the global one.
    pub threads: Option<usize>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            min_delta: 0.0,
            subsample_stride: 1,
            batch_size: 262_144,
            chunk_size: 16_384,
            // pi * 100_000
            seed: 314_159,
            update_strategy: UpdateStrategy::Serial,
            track_inertia: false,
            threads: None,
        }
    }
}

impl KMeansConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn with_subsample_stride(mut self, subsample_stride: usize) -> Self {
        self.subsample_stride = subsample_stride;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_update_strategy(mut self, update_strategy: UpdateStrategy) -> Self {
        self.update_strategy = update_strategy;
        self
    }

    pub fn with_track_inertia(mut self, track_inertia: bool) -> Self {
        self.track_inertia = track_inertia;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            (self.max_iterations, "max_iterations"),
            (self.subsample_stride, "subsample_stride"),
            (self.batch_size, "batch_size"),
            (self.chunk_size, "chunk_size"),
        ];
        for (value, name) in positive {
            if value == 0 {
                return Err(KMeansError::InvalidParameter {
                    name,
                    message: "must be at least 1",
                });
            }
        }
        if self.min_delta.is_nan() {
            return Err(KMeansError::InvalidParameter {
                name: "min_delta",
                message: "must not be NaN",
            });
        }
        Ok(())
    }
}

/// Pipeline stage, used in observer callbacks and cancellation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Seeding,
    Assignment,
    Update,
}

/// Result of a clustering call that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterOutcome {
    /// At least one full iteration ran; buffers hold the final state.
    Completed { iterations: usize, stop: StopReason },
    /// The progress predicate returned `false`. Buffers may be partially
    /// updated and must not be treated as a clustering result.
    Cancelled { stage: Stage },
}

impl ClusterOutcome {
    /// Completed iterations, 0 when cancelled.
    pub fn iterations(&self) -> usize {
        match self {
            ClusterOutcome::Completed { iterations, .. } => *iterations,
            ClusterOutcome::Cancelled { .. } => 0,
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            ClusterOutcome::Completed { stop, .. } => Some(*stop),
            ClusterOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClusterOutcome::Cancelled { .. })
    }
}

/// Result of seeding alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Indices of the points copied into each centroid slot.
    Seeded(Vec<usize>),
    Cancelled,
}

/// Owned result of [`KMeans::fit`].
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Shape `(k, dim)`.
    pub centroids: Array2<f32>,
    pub assignments: Array1<u32>,
    pub outcome: ClusterOutcome,
}

/// Checks the flat buffers and returns `(n, k)`.
fn validate_shapes(dim: usize, points: &[f32], centroids: &[f32]) -> Result<(usize, usize)> {
    if dim < 1 {
        return Err(KMeansError::InvalidDimension { dim });
    }
    if points.len() % dim != 0 {
        return Err(KMeansError::BufferLength {
            buffer: "point",
            len: points.len(),
            dim,
        });
    }
    if centroids.len() % dim != 0 {
        return Err(KMeansError::BufferLength {
            buffer: "centroid",
            len: centroids.len(),
            dim,
        });
    }
    let n = points.len() / dim;
    let k = centroids.len() / dim;
    if k < 1 {
        return Err(KMeansError::NoCentroids);
    }
    if n < k {
        return Err(KMeansError::TooFewPoints { points: n, k });
    }
    Ok((n, k))
}

fn validate_assignments(n: usize, assignments: &[u32]) -> Result<()> {
    if assignments.len() != n {
        return Err(KMeansError::AssignmentLength {
            expected: n,
            found: assignments.len(),
        });
    }
    Ok(())
}

fn validate_labels(k: usize, assignments: &[u32]) -> Result<()> {
    match assignments
        .iter()
        .enumerate()
        .find(|&(_, &cluster)| cluster as usize >= k)
    {
        Some((index, &cluster)) => Err(KMeansError::AssignmentOutOfRange { index, cluster, k }),
        None => Ok(()),
    }
}

/// Parallel k-means engine: k-means++ seeding followed by Lloyd iterations.
///
/// ```
/// use kmeans_engine::{KMeans, KMeansConfig};
///
/// let points = [0.0, 0.0, 0.0, 1.0, 10.0, 0.0, 10.0, 1.0];
/// let mut centroids = [0.0f32; 4];
/// let mut assignments = [0u32; 4];
///
/// let engine = KMeans::new(KMeansConfig::new().with_max_iterations(10));
/// let outcome = engine
///     .cluster(2, &points, &mut centroids, &mut assignments, None)
///     .unwrap();
///
/// assert!(!outcome.is_cancelled());
/// assert_eq!(assignments[0], assignments[1]);
/// assert_ne!(assignments[1], assignments[2]);
/// ```
pub struct KMeans {
    config: KMeansConfig,
    kernel: KernelChoice,
    observer: Arc<dyn ClusterObserver>,
    pool: OnceCell<Arc<ThreadPool>>,
}

impl fmt::Debug for KMeans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KMeans")
            .field("config", &self.config)
            .field("kernel", &self.kernel)
            .finish_non_exhaustive()
    }
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(KMeansConfig::default())
    }
}

impl KMeans {
    /// Uses the distance kernel detected for this CPU and a no-op observer.
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            kernel: KernelChoice::detect(),
            observer: Arc::new(NoopObserver),
            pool: OnceCell::new(),
        }
    }

    pub fn with_kernel(mut self, kernel: KernelChoice) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClusterObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    pub fn kernel(&self) -> KernelChoice {
        self.kernel
    }

    /// Runs `op` on the dedicated pool when `threads` is configured.
    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> Result<R> {
        let Some(threads) = self.config.threads else {
            return Ok(op());
        };
        let pool = self.pool.get_or_try_init(|| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map(Arc::new)
        })?;
        Ok(pool.install(op))
    }

    /// Seeds `centroids` with k-means++ and refines them with Lloyd's algorithm.
    ///
    /// `k` is `centroids.len() / dim`; `assignments` needs one slot per point.
    /// Invalid shapes or configuration fail before any buffer is written.
    /// `progress` receives completion in `[0, 1]` between seeding steps and
    /// assignment batches; returning `false` abandons the run with
    /// [`ClusterOutcome::Cancelled`]. When cancelled during seeding, `assignments`
    /// is left untouched.
    pub fn cluster<'p>(
        &self,
        dim: usize,
        points: &[f32],
        centroids: &mut [f32],
        assignments: &mut [u32],
        progress: Option<&'p mut ProgressFn<'p>>,
    ) -> Result<ClusterOutcome> {
        self.config.validate()?;
        let (n, _) = validate_shapes(dim, points, centroids)?;
        validate_assignments(n, assignments)?;

        let mut token = CancelToken::new(progress);
        let config = &self.config;
        let observer = self.observer.as_ref();
        let kernel = self.kernel;
        let outcome = self.install(move || {
            let buffers = Buffers {
                dim,
                points,
                centroids,
                assignments,
            };
            with_kernel!(kernel, |kern| kmeans::run(kern, config, observer, buffers, &mut token))
        })?;

        self.observer.on_finished(&outcome);
        Ok(outcome)
    }

    /// k-means++ seeding only. Every centroid slot receives a copy of a distinct point.
    pub fn seed_centroids<'p>(
        &self,
        dim: usize,
        points: &[f32],
        centroids: &mut [f32],
        progress: Option<&'p mut ProgressFn<'p>>,
    ) -> Result<SeedOutcome> {
        self.config.validate()?;
        validate_shapes(dim, points, centroids)?;

        let mut token = CancelToken::new(progress);
        let params = SeedParams {
            dim,
            subsample_stride: self.config.subsample_stride,
            chunk_size: self.config.chunk_size,
            seed: self.config.seed,
        };
        let kernel = self.kernel;
        let seeded = self.install(move || {
            with_kernel!(kernel, |kern| seeding::seed(
                kern,
                points,
                centroids,
                &params,
                &mut token
            ))
        })?;

        Ok(match seeded {
            Ok(chosen) => SeedOutcome::Seeded(chosen),
            Err(_) => SeedOutcome::Cancelled,
        })
    }

    /// Assignment Stage over all points.
    pub fn assign(
        &self,
        dim: usize,
        points: &[f32],
        centroids: &[f32],
        assignments: &mut [u32],
    ) -> Result<()> {
        self.config.validate()?;
        let (n, _) = validate_shapes(dim, points, centroids)?;
        validate_assignments(n, assignments)?;

        let chunk = self.config.chunk_size;
        let kernel = self.kernel;
        self.install(move || {
            with_kernel!(kernel, |kern| lloyd::assign_range(
                kern,
                dim,
                points,
                centroids,
                assignments,
                0,
                chunk
            ))
        })
    }

    /// Update Stage: writes cluster means into `centroids`, keeping the
    /// `previous` centroid for clusters without points. Returns per-cluster counts.
    pub fn update(
        &self,
        dim: usize,
        points: &[f32],
        previous: &[f32],
        assignments: &[u32],
        centroids: &mut [f32],
    ) -> Result<Vec<usize>> {
        self.config.validate()?;
        let (n, k) = validate_shapes(dim, points, centroids)?;
        validate_assignments(n, assignments)?;
        if previous.len() != centroids.len() {
            return Err(KMeansError::InvalidParameter {
                name: "previous",
                message: "must have the same length as the centroid buffer",
            });
        }
        validate_labels(k, assignments)?;

        let strategy = self.config.update_strategy;
        let chunk = self.config.chunk_size;
        self.install(move || {
            lloyd::update(dim, points, previous, assignments, centroids, strategy, chunk)
        })
    }

    /// Total squared distance of every point to its assigned centroid.
    pub fn inertia(
        &self,
        dim: usize,
        points: &[f32],
        centroids: &[f32],
        assignments: &[u32],
    ) -> Result<f64> {
        let (n, k) = validate_shapes(dim, points, centroids)?;
        validate_assignments(n, assignments)?;
        validate_labels(k, assignments)?;

        let chunk = self.config.chunk_size.max(1);
        let kernel = self.kernel;
        self.install(move || {
            with_kernel!(kernel, |kern| lloyd::inertia(
                kern,
                dim,
                points,
                centroids,
                assignments,
                chunk
            ))
        })
    }

    /// Clusters the rows of `points` into `k` groups.
    pub fn fit(&self, points: ArrayView2<'_, f32>, k: usize) -> Result<Clustering> {
        let (n, dim) = points.dim();
        self.config.validate()?;
        if dim < 1 {
            return Err(KMeansError::InvalidDimension { dim });
        }
        if k < 1 {
            return Err(KMeansError::NoCentroids);
        }
        if n < k {
            return Err(KMeansError::TooFewPoints { points: n, k });
        }
        let flat: Cow<[f32]> = match points.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(points.iter().copied().collect()),
        };

        let mut centroids = vec![0.0f32; k * dim];
        let mut assignments = vec![0u32; n];
        let outcome = self.cluster(dim, &flat, &mut centroids, &mut assignments, None)?;

        Ok(Clustering {
            centroids: Array2::from_shape_vec((k, dim), centroids)?,
            assignments: Array1::from_vec(assignments),
            outcome,
        })
    }
}

/// One-shot clustering with an otherwise default configuration.
#[allow(clippy::too_many_arguments)]
pub fn cluster<'p>(
    dim: usize,
    subsample_stride: usize,
    points: &[f32],
    centroids: &mut [f32],
    assignments: &mut [u32],
    max_iterations: usize,
    min_delta: f32,
    progress: Option<&'p mut ProgressFn<'p>>,
) -> Result<ClusterOutcome> {
    let config = KMeansConfig::new()
        .with_subsample_stride(subsample_stride)
        .with_max_iterations(max_iterations)
        .with_min_delta(min_delta);
    KMeans::new(config).cluster(dim, points, centroids, assignments, progress)
}
