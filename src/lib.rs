pub mod api;
pub mod error;
pub mod observer;
pub mod progress;

pub use api::{cluster, ClusterOutcome, Clustering, KMeans, KMeansConfig, SeedOutcome, Stage};
pub use error::{KMeansError, Result};
pub use observer::{ClusterObserver, IterationReport, LogObserver, NoopObserver};
pub use progress::ProgressFn;

pub use kmeans::convergence::StopReason;
pub use kmeans::distance::KernelChoice;
pub use kmeans::lloyd::UpdateStrategy;

// Internal implementation modules (not part of the public API).
#[cfg(not(feature = "internal_tests"))]
mod kmeans;
#[cfg(feature = "internal_tests")]
pub mod kmeans;
