/// Stochastic mechanics: uniform draws and random signs on `WyRand`.
/// Callers own the generator so every stream is reproducible from its seed.
use bevy_prng::WyRand;
use rand_core::RngCore;

/// Uniform [0, 1) with 53 bits of precision.
#[inline]
pub fn uniform01(rng: &mut WyRand) -> f64 {
    ((rng.next_u64() >> 11) as f64) / ((1u64 << 53) as f64)
}

/// Uniform [lo, hi]; a degenerate range returns `lo`.
#[inline]
pub fn uniform_in(rng: &mut WyRand, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    lo + (hi - lo) * uniform01(rng)
}

/// Bernoulli(p).
#[inline]
pub fn bernoulli(rng: &mut WyRand, p: f64) -> bool {
    uniform01(rng) < p.clamp(0.0, 1.0)
}

/// +1.0 or -1.0 with equal probability.
#[inline]
pub fn random_sign(rng: &mut WyRand) -> f64 {
    if bernoulli(rng, 0.5) { 1.0 } else { -1.0 }
}
