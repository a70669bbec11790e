use once_cell::sync::OnceCell;
use wide::{f32x4, f32x8};

/// Squared Euclidean distance between points stored in flat, `dim`-strided buffers.
///
/// Implementations differ only in how many scalars they process per step, results
/// agree up to floating-point rounding. The kernel is chosen once (see
/// [`KernelChoice::detect`]) and threaded through the stages as a type parameter,
/// so the hot loops are monomorphized per width.
///
/// Sums are accumulated in `f32`: coordinate differences beyond roughly `1e19`
/// overflow to `inf`, and ties between infinite distances go to the lowest index.
pub trait DistanceKernel: Copy + Send + Sync + 'static {
    const NAME: &'static str;

    /// Distance between two equally sized coordinate slices.
    fn slice_distance_squared(self, a: &[f32], b: &[f32]) -> f32;

    /// Distance between point `index_a` of `points_a` and point `index_b` of `points_b`.
    #[inline]
    fn distance_squared(
        self,
        points_a: &[f32],
        index_a: usize,
        points_b: &[f32],
        index_b: usize,
        dim: usize,
    ) -> f32 {
        let a = &points_a[index_a * dim..(index_a + 1) * dim];
        let b = &points_b[index_b * dim..(index_b + 1) * dim];
        self.slice_distance_squared(a, b)
    }
}

#[inline(always)]
fn load8(s: &[f32]) -> f32x8 {
    f32x8::new([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

#[inline(always)]
fn load4(s: &[f32]) -> f32x4 {
    f32x4::new([s[0], s[1], s[2], s[3]])
}

#[inline(always)]
fn scalar_tail(a: &[f32], b: &[f32]) -> f32 {
    let mut tail = 0.0;
    for (x, y) in a.iter().zip(b) {
        let diff = x - y;
        tail += diff * diff;
    }
    tail
}

#[inline(always)]
fn wide4_distance(a: &[f32], b: &[f32]) -> f32 {
    let a4 = a.chunks_exact(4);
    let b4 = b.chunks_exact(4);
    let (a_rest, b_rest) = (a4.remainder(), b4.remainder());

    let mut acc4 = f32x4::splat(0.0);
    for (pa, pb) in a4.zip(b4) {
        let diff = load4(pa) - load4(pb);
        acc4 += diff * diff;
    }

    acc4.reduce_add() + scalar_tail(a_rest, b_rest)
}

/// 8 lanes per step, then one 4-lane step, then scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wide8;

impl DistanceKernel for Wide8 {
    const NAME: &'static str = "f32x8";

    #[inline]
    fn slice_distance_squared(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let a8 = a.chunks_exact(8);
        let b8 = b.chunks_exact(8);
        let (a_rest, b_rest) = (a8.remainder(), b8.remainder());

        let mut acc8 = f32x8::splat(0.0);
        for (pa, pb) in a8.zip(b8) {
            let diff = load8(pa) - load8(pb);
            acc8 += diff * diff;
        }

        acc8.reduce_add() + wide4_distance(a_rest, b_rest)
    }
}

/// 4 lanes per step, then scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wide4;

impl DistanceKernel for Wide4 {
    const NAME: &'static str = "f32x4";

    #[inline]
    fn slice_distance_squared(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        wide4_distance(a, b)
    }
}

/// No vector unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

impl DistanceKernel for Scalar {
    const NAME: &'static str = "scalar";

    #[inline]
    fn slice_distance_squared(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        scalar_tail(a, b)
    }
}

/// Which [`DistanceKernel`] a run uses.
///
/// The choice selects a loop shape. The instructions behind each `wide` lane type
/// are fixed at compile time, so `Wide8` only runs as AVX when the crate is built
/// with `-C target-feature=+avx` (or `target-cpu=native`); otherwise it is two
/// SSE lanes per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelChoice {
    Wide8,
    Wide4,
    Scalar,
}

static DETECTED: OnceCell<KernelChoice> = OnceCell::new();

impl KernelChoice {
    /// Probes the CPU on first call and caches the answer for the process lifetime.
    pub fn detect() -> KernelChoice {
        *DETECTED.get_or_init(probe)
    }

    pub fn name(self) -> &'static str {
        match self {
            KernelChoice::Wide8 => Wide8::NAME,
            KernelChoice::Wide4 => Wide4::NAME,
            KernelChoice::Scalar => Scalar::NAME,
        }
    }
}

fn probe() -> KernelChoice {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if std::arch::is_x86_feature_detected!("avx") {
            return KernelChoice::Wide8;
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            return KernelChoice::Wide4;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return KernelChoice::Wide4;
    }

    #[allow(unreachable_code)]
    KernelChoice::Scalar
}
