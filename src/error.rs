use thiserror::Error;

/// Errors returned before any clustering work begins.
///
/// Every variant is a precondition violation: the caller's buffers are left
/// untouched and retrying with the same inputs fails the same way.
#[derive(Debug, Error)]
pub enum KMeansError {
    /// Dimensionality must be at least 1.
    #[error("invalid dimensionality {dim}: must be at least 1")]
    InvalidDimension { dim: usize },

    /// A flat buffer is not an exact multiple of the dimensionality.
    #[error("{buffer} buffer length {len} is not a multiple of dim {dim}")]
    BufferLength {
        buffer: &'static str,
        len: usize,
        dim: usize,
    },

    /// The centroid buffer holds no centroids.
    #[error("centroid buffer is empty: at least one centroid is required")]
    NoCentroids,

    /// Fewer points than requested clusters.
    #[error("too few points: {points} points cannot form {k} clusters")]
    TooFewPoints { points: usize, k: usize },

    /// Assignment buffer does not have one slot per point.
    #[error("assignment buffer length mismatch: expected {expected}, found {found}")]
    AssignmentLength { expected: usize, found: usize },

    /// An assignment names a cluster that does not exist.
    #[error("assignment {index} refers to cluster {cluster}, but only {k} clusters exist")]
    AssignmentOutOfRange { index: usize, cluster: u32, k: usize },

    /// A configuration value is out of range.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: &'static str,
    },

    /// Result matrix could not be shaped.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// The dedicated worker pool could not be built.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, KMeansError>;
