use rand::Rng;

/// Upper bound (inclusive) for randomly drawn seeds.
pub const MAX_RANDOM_SEED: u64 = u32::MAX as u64;

/// Turns the requested seed into the concrete value handed to a pipeline.
///
/// `-1` (and any other negative value) draws a uniform seed in `0..=2^32-1`, anything else is
/// passed through unchanged.
pub fn normalize_seed(requested: i64) -> u64 {
    normalize_seed_with(requested, &mut rand::thread_rng())
}

pub fn normalize_seed_with<R: Rng>(requested: i64, rng: &mut R) -> u64 {
    if requested < 0 {
        rng.gen_range(0..=MAX_RANDOM_SEED)
    } else {
        requested as u64
    }
}
