//! Logical-to-physical index indirection.
//!
//! The iterator walks logical positions `0, step, 2 * step, ...` and reads
//! every value through an [`IndexPermutation`]. Shuffling the permutation
//! changes which rows are read without touching the cursor.

use rand::prelude::*;

/// A bijection over `[0, len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPermutation {
    indexes: Vec<usize>,
}

impl IndexPermutation {
    /// The identity permutation.
    #[must_use]
    pub fn identity(len: usize) -> Self {
        Self {
            indexes: (0..len).collect(),
        }
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Check if the permutation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Physical position for logical position `pos`.
    #[inline]
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<usize> {
        self.indexes.get(pos).copied()
    }

    /// Replace the mapping with a uniformly random bijection.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.indexes.sort_unstable();
        self.indexes.shuffle(rng);
    }

    /// The raw mapping.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_identity() {
        let perm = IndexPermutation::identity(5);
        assert_eq!(perm.as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(perm.get(3), Some(3));
        assert_eq!(perm.get(5), None);
    }

    #[test]
    fn test_shuffle_is_bijection() {
        let mut perm = IndexPermutation::identity(100);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        perm.shuffle(&mut rng);

        assert_ne!(perm, IndexPermutation::identity(100));
        let mut sorted = perm.as_slice().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut a = IndexPermutation::identity(20);
        let mut b = IndexPermutation::identity(20);
        a.shuffle(&mut ChaCha8Rng::seed_from_u64(7));
        b.shuffle(&mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_reshuffle_does_not_compound() {
        // shuffling twice with the same stream state gives the same result as
        // shuffling the identity, independent of the previous order
        let mut a = IndexPermutation::identity(20);
        a.shuffle(&mut ChaCha8Rng::seed_from_u64(1));
        a.shuffle(&mut ChaCha8Rng::seed_from_u64(9));
        let mut b = IndexPermutation::identity(20);
        b.shuffle(&mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
