//! Deterministic random number generation for shuffling.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for reproducible index shuffling.
///
/// Two iterators built with the same seed shuffle their index permutations
/// identically, which makes training runs repeatable.
///
/// # Example
///
/// ```rust
/// use tsbatch_core::Seed;
/// use rand::Rng;
///
/// let mut a = Seed::new(42).to_rng();
/// let mut b = Seed::new(42).to_rng();
/// assert_eq!(a.gen::<u32>(), b.gen::<u32>());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a new seed with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Create a ChaCha8 generator from this seed.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Derive an independent seed for a named random stream.
    ///
    /// The iterator derives its shuffle stream with the key `"shuffle"`, so a
    /// single master seed can drive several components without correlation.
    /// The key is folded with FNV-1a and mixed with SplitMix64, so derived
    /// seeds are identical across platforms and compiler releases.
    #[must_use]
    pub fn derive(&self, key: &str) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in key.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        Self(splitmix64(self.0 ^ hash))
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl Default for Seed {
    fn default() -> Self {
        Self::new(0)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn test_same_seed_same_permutation() {
        let mut a: Vec<usize> = (0..50).collect();
        let mut b = a.clone();
        a.shuffle(&mut Seed::new(7).to_rng());
        b.shuffle(&mut Seed::new(7).to_rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_is_stable_and_key_dependent() {
        let master = Seed::new(42);
        assert_eq!(master.derive("shuffle"), master.derive("shuffle"));
        assert_ne!(master.derive("shuffle"), master.derive("other"));
    }

    #[test]
    fn test_derive_is_pinned() {
        // fixed mixer output
        assert_eq!(Seed::new(42).derive("shuffle").value(), 0x8ac7_f018_9597_eade);
    }

    #[test]
    fn test_seed_serialization() {
        let seed = Seed::new(12345);
        let json = serde_json::to_string(&seed).unwrap();
        let restored: Seed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed, restored);
    }
}
