use super::distance::DistanceKernel;
use serde::Serialize;

/// Why a completed run stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// The iteration cap was reached.
    MaxIterations,
    /// Centroids are identical to the previous iteration's.
    Unchanged,
    /// Centroids are identical to the ones two iterations back (2-cycle).
    Oscillation,
    /// Every centroid moved less than `min_delta`.
    MinDelta,
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceCheck {
    pub max_iterations: usize,
    /// Per-centroid Euclidean shift threshold; `<= 0` disables the check.
    pub min_delta: f32,
}

impl ConvergenceCheck {
    /// Evaluated once after each Update Stage. `iteration` counts completed
    /// iterations, `before_previous` is `None` until two iterations have run.
    ///
    /// Convergence reasons take precedence over the iteration cap when both hold.
    pub fn check(
        &self,
        iteration: usize,
        current: &[f32],
        previous: &[f32],
        before_previous: Option<&[f32]>,
        max_shift: f32,
    ) -> Option<StopReason> {
        if current == previous {
            Some(StopReason::Unchanged)
        } else if before_previous.is_some_and(|bp| current == bp) {
            Some(StopReason::Oscillation)
        } else if self.min_delta > 0.0 && max_shift < self.min_delta {
            Some(StopReason::MinDelta)
        } else if iteration >= self.max_iterations {
            Some(StopReason::MaxIterations)
        } else {
            None
        }
    }
}

/// Largest Euclidean distance between matching centroids of two buffers.
pub fn max_shift<K: DistanceKernel>(kernel: K, dim: usize, current: &[f32], previous: &[f32]) -> f32 {
    let k = current.len() / dim;
    (0..k)
        .map(|c| kernel.distance_squared(current, c, previous, c, dim))
        .fold(0.0f32, f32::max)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::distance::Wide4;

    const CHECK: ConvergenceCheck = ConvergenceCheck {
        max_iterations: 10,
        min_delta: 0.5,
    };

    #[test]
    fn stops_on_identical_centroids() {
        let c = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(CHECK.check(1, &c, &c, None, 0.0), Some(StopReason::Unchanged));
    }

    #[test]
    fn detects_two_cycle() {
        let a = [1.0, 2.0];
        let b = [5.0, 6.0];
        assert_eq!(CHECK.check(3, &a, &b, Some(&a), 4.0), Some(StopReason::Oscillation));
        assert_eq!(CHECK.check(3, &a, &b, None, 4.0), None);
    }

    #[test]
    fn min_delta_threshold() {
        let a = [0.0, 0.0];
        let b = [0.3, 0.0];
        let shift = max_shift(Wide4, 2, &a, &b);
        assert!((shift - 0.3).abs() < 1e-6);
        assert_eq!(CHECK.check(2, &a, &b, None, shift), Some(StopReason::MinDelta));

        let disabled = ConvergenceCheck {
            min_delta: 0.0,
            ..CHECK
        };
        assert_eq!(disabled.check(2, &a, &b, None, shift), None);
    }

    #[test]
    fn every_centroid_must_be_below_min_delta() {
        let current = [0.0, 0.0, 10.0, 0.0];
        let previous = [0.1, 0.0, 12.0, 0.0];
        let shift = max_shift(Wide4, 2, &current, &previous);
        assert!((shift - 2.0).abs() < 1e-6);
        assert_eq!(CHECK.check(4, &current, &previous, None, shift), None);
    }

    #[test]
    fn iteration_cap() {
        let a = [0.0];
        let b = [9.0];
        assert_eq!(CHECK.check(9, &a, &b, None, 9.0), None);
        assert_eq!(CHECK.check(10, &a, &b, None, 9.0), Some(StopReason::MaxIterations));
        assert_eq!(CHECK.check(10, &a, &a, None, 0.0), Some(StopReason::Unchanged));
    }
}
