// Stateless PCG-style hash. Every stochastic choice in a run is a pure function of
// an integer seed, so identical inputs always pick identical centroids.

/// PCG output permutation applied to an LCG step of `input`.
#[inline]
pub fn hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Uniform float in `[0, upper_bound)` derived from `hash(seed)`.
///
/// The top 23 hash bits become the mantissa of a float in `[1, 2)`, which is then
/// shifted down to `[0, 1)` and scaled.
#[inline]
pub fn hash_float(seed: u32, upper_bound: f32) -> f32 {
    let bits = (hash(seed) >> 9) | 0x3f80_0000;
    (f32::from_bits(bits) - 1.0) * upper_bound
}
