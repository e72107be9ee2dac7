//! Deterministic seed derivation.
//!
//! A master seed is expanded into labelled sub-seeds by hashing with BLAKE3.
//! Derivation is order-independent, so parallel sweeps produce the same seeds
//! regardless of scheduling.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTree {
    master_seed: u64,
}

impl SeedTree {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for `(label, index)`, e.g. `("matching", 3)` for the fourth
    /// run of a sweep.
    pub fn sub_seed(&self, label: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, label: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(label, index))
    }
}
