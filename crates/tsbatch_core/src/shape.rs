//! Batch tensor shape metadata.

use serde::{Deserialize, Serialize};

/// Shape of a batch tensor.
///
/// Follows the convention `(B, F, T)`:
/// - `B`: Batch size (number of windows)
/// - `F`: Features (series in the group)
/// - `T`: Time steps in the window
///
/// # Example
///
/// ```rust
/// use tsbatch_core::BatchShape;
///
/// let shape = BatchShape::new(32, 3, 60);
/// assert_eq!(shape.batch(), 32);
/// assert_eq!(shape.features(), 3);
/// assert_eq!(shape.len(), 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchShape {
    batch: usize,
    features: usize,
    len: usize,
}

impl BatchShape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(batch: usize, features: usize, len: usize) -> Self {
        Self {
            batch,
            features,
            len,
        }
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of features.
    #[must_use]
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Get the number of time steps.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.features == 0 || self.len == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.features * self.len
    }

    /// Convert to a tuple usable as an ndarray shape.
    #[must_use]
    pub const fn as_tuple(&self) -> (usize, usize, usize) {
        (self.batch, self.features, self.len)
    }

    /// Convert to an array usable as a burn shape.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.batch, self.features, self.len]
    }

    /// Shape of the matching `(B, T)` mask.
    #[must_use]
    pub const fn mask_dims(&self) -> (usize, usize) {
        (self.batch, self.len)
    }
}

impl std::fmt::Display for BatchShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(B={}, F={}, T={})", self.batch, self.features, self.len)
    }
}

impl From<(usize, usize, usize)> for BatchShape {
    fn from((batch, features, len): (usize, usize, usize)) -> Self {
        Self::new(batch, features, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_accessors() {
        let shape = BatchShape::new(4, 2, 10);
        assert_eq!(shape.as_tuple(), (4, 2, 10));
        assert_eq!(shape.as_array(), [4, 2, 10]);
        assert_eq!(shape.mask_dims(), (4, 10));
        assert_eq!(shape.numel(), 80);
    }

    #[test]
    fn test_shape_is_empty() {
        assert!(!BatchShape::new(1, 1, 1).is_empty());
        assert!(BatchShape::new(1, 0, 5).is_empty());
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(BatchShape::new(2, 3, 4).to_string(), "(B=2, F=3, T=4)");
    }
}
