//! Scratch buffers of characteristic matrices.
//!
//! Analysis and optimization need many short-lived [`CharacteristicMatrix`] buffers of the same
//! size. The pool hands out buffers keyed by wavelength count and takes them back for reuse.
use std::collections::HashMap;

use super::CharacteristicMatrix;

/// Pool of pre-sized [`CharacteristicMatrix`] buffers.
#[derive(Debug, Clone, Default)]
pub struct MatrixPool {
    free: HashMap<usize, Vec<CharacteristicMatrix>>,
}
impl MatrixPool {
    /// Creates a new, empty [`MatrixPool`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Check out a unity matrix for `len` wavelengths.
    pub fn take(&mut self, len: usize) -> CharacteristicMatrix {
        self.free
            .get_mut(&len)
            .and_then(Vec::pop)
            .map_or_else(
                || CharacteristicMatrix::new(len),
                |mut matrix| {
                    matrix.set_unity();
                    matrix
                },
            )
    }
    /// Return a buffer to the pool.
    pub fn give_back(&mut self, matrix: CharacteristicMatrix) {
        self.free.entry(matrix.len()).or_default().push(matrix);
    }
    /// Number of buffers currently available for `len` wavelengths.
    #[must_use]
    pub fn available(&self, len: usize) -> usize {
        self.free.get(&len).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{abeles::Sin2, index::Index, wavelengths::WavelengthSet};
    #[test]
    fn reuse() {
        let mut pool = MatrixPool::new();
        let mut matrix = pool.take(2);
        let wavelengths = WavelengthSet::new(vec![500.0, 600.0]).unwrap();
        matrix.set_matrices(&Index::constant(2.0, 2), 50.0, &Sin2::normal(2), &wavelengths);
        pool.give_back(matrix);
        assert_eq!(pool.available(2), 1);
        assert_eq!(pool.available(3), 0);
        let reused = pool.take(2);
        assert_eq!(reused, CharacteristicMatrix::new(2));
        assert_eq!(pool.available(2), 0);
        assert_eq!(pool.take(3).len(), 3);
    }
}
