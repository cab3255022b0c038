//! Seed derivation for reproducible parallel random streams.
//!
//! Each unit of parallel work (a row batch, a path, a scenario block) owns an
//! independent `StdRng` seeded from `(base_seed, stream_index)`. Because the
//! stream is a function of the work index rather than of the thread that runs
//! it, output is identical for any worker count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derives the seed of stream `stream_index` from `base_seed`.
///
/// Offsets by a prime stride and then applies the SplitMix64 finalizer so that
/// neighbouring streams start from decorrelated states.
#[inline]
pub fn stream_seed(base_seed: u64, stream_index: usize) -> u64 {
    let mut z = base_seed.wrapping_add((stream_index as u64).wrapping_mul(7_919));
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Generator for stream `stream_index`.
#[inline]
pub fn seeded_rng(base_seed: u64, stream_index: usize) -> StdRng {
    StdRng::seed_from_u64(stream_seed(base_seed, stream_index))
}

/// Returns `seed`, or a fresh OS-entropy seed when `None`.
#[inline]
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random::<u64>())
}
