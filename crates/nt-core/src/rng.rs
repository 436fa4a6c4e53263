//! Seeded random source for tensor construction.

use std::hash::Hasher;
use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use siphasher::sip::SipHasher13;

/// Reproducible random source behind `Tensor::rand`.
///
/// Every handle is created from an explicit seed. Independent streams (one per
/// energy batch, say) come from [`RngHandle::substream`], which hashes the
/// master seed and the stream id with zero-keyed SipHash-1-3, so the draws do
/// not depend on the platform or on the order streams are created in.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
    seed: u64,
}

impl RngHandle {
    /// Handle seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Fresh handle for stream `id` of this handle's seed.
    pub fn substream(&self, id: u64) -> Self {
        Self::from_seed(derive_substream_seed(self.seed, id))
    }

    /// Seed the handle was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform sample from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform sample from `range`.
    ///
    /// # Panics
    ///
    /// Panics when the range is empty.
    pub fn uniform_in(&mut self, range: Range<f64>) -> f64 {
        self.rng.gen_range(range)
    }
}

/// Seed of stream `id` under `master_seed`.
pub fn derive_substream_seed(master_seed: u64, id: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(id);
    hasher.finish()
}
