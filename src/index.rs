#![warn(missing_docs)]
//! Complex refractive index curves sampled on a [`WavelengthSet`](crate::wavelengths::WavelengthSet).
//!
//! The convention `N = n - i·k` is used throughout: a negative imaginary part means absorption.
use num::complex::Complex64;
use serde::{Deserialize, Serialize};

/// Per-wavelength complex refractive index.
///
/// For mixtures used in graded layers, an [`Index`] may additionally hold the family of index
/// curves of every discretization level (see [`Index::with_graded_levels`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Index {
    values: Vec<Complex64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    graded: Vec<Index>,
}
impl Index {
    /// Creates a new [`Index`] from per-wavelength values.
    #[must_use]
    pub const fn new(values: Vec<Complex64>) -> Self {
        Self {
            values,
            graded: Vec::new(),
        }
    }
    /// Creates an [`Index`] with the same (real, non-absorbing) value at all `len` wavelengths.
    #[must_use]
    pub fn constant(n: f64, len: usize) -> Self {
        Self::new(vec![Complex64::new(n, 0.0); len])
    }
    /// Attach the index curves of the discretization levels of a mixture.
    #[must_use]
    pub fn with_graded_levels(mut self, levels: Vec<Self>) -> Self {
        self.graded = levels;
        self
    }
    /// Number of wavelengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }
    /// Returns `true` if no wavelength is sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Returns the values of this [`Index`].
    #[must_use]
    pub fn values(&self) -> &[Complex64] {
        &self.values
    }
    /// The index curve of discretization level `level` (graded mixtures only).
    #[must_use]
    pub fn graded_level(&self, level: usize) -> Option<&Self> {
        self.graded.get(level)
    }
    /// Number of discretization levels held by this [`Index`].
    #[must_use]
    pub fn nb_graded_levels(&self) -> usize {
        self.graded.len()
    }
    /// Returns `true` if any wavelength shows absorption.
    #[must_use]
    pub fn is_absorbing(&self) -> bool {
        self.values.iter().any(|n| n.im != 0.0)
    }
}
impl std::ops::Index<usize> for Index {
    type Output = Complex64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}
impl FromIterator<Complex64> for Index {
    fn from_iter<T: IntoIterator<Item = Complex64>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn constant() {
        let index = Index::constant(1.5, 3);
        assert_eq!(index.len(), 3);
        assert_eq!(index[2], Complex64::new(1.5, 0.0));
        assert!(!index.is_absorbing());
        assert_eq!(index.nb_graded_levels(), 0);
    }
    #[test]
    fn graded() {
        let levels = vec![Index::constant(1.5, 2), Index::constant(2.0, 2)];
        let index = Index::constant(1.5, 2).with_graded_levels(levels);
        assert_eq!(index.nb_graded_levels(), 2);
        assert_eq!(index.graded_level(1).unwrap()[0].re, 2.0);
        assert!(index.graded_level(2).is_none());
    }
    #[test]
    fn absorbing() {
        let index: Index = vec![Complex64::new(2.0, -0.1)].into_iter().collect();
        assert!(index.is_absorbing());
    }
}
