//! Snell invariant of an incidence condition.
use std::hash::{Hash, Hasher};

use num::complex::Complex64;
use uom::si::{angle::radian, f64::Angle};

use crate::index::Index;

/// Per-wavelength value of `(N_medium·sinθ)²`.
///
/// This value is conserved through the whole stack and therefore identifies an incidence
/// condition. Equality and hashing are bitwise so that it can be used as cache key: two conditions
/// reached through different angle / medium pairs hit the same entry if their projections are
/// numerically identical.
#[derive(Debug, Clone)]
pub struct Sin2 {
    values: Vec<Complex64>,
}
impl Sin2 {
    /// Create the invariant for light propagating at `angle` inside a medium of index `medium`.
    #[must_use]
    pub fn new(medium: &Index, angle: Angle) -> Self {
        let sin = angle.get::<radian>().sin();
        Self {
            values: medium
                .values()
                .iter()
                .map(|n| {
                    let n_sin = n * sin;
                    n_sin * n_sin
                })
                .collect(),
        }
    }
    /// Invariant of normal incidence for `len` wavelengths.
    #[must_use]
    pub fn normal(len: usize) -> Self {
        Self {
            values: vec![Complex64::new(0.0, 0.0); len],
        }
    }
    /// Returns the values of this [`Sin2`].
    #[must_use]
    pub fn values(&self) -> &[Complex64] {
        &self.values
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
}
impl PartialEq for Sin2 {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            })
    }
}
impl Eq for Sin2 {}
impl Hash for Sin2 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.values {
            value.re.to_bits().hash(state);
            value.im.to_bits().hash(state);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::degree;
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;
    #[test]
    fn new() {
        let medium = Index::constant(1.0, 2);
        let sin2 = Sin2::new(&medium, degree!(30.0));
        assert_eq!(sin2.len(), 2);
        assert_abs_diff_eq!(sin2.values()[0].re, 0.25, epsilon = 1e-15);
        assert_eq!(Sin2::new(&medium, degree!(0.0)), Sin2::normal(2));
    }
    #[test]
    fn same_projection_from_different_media() {
        let air = Index::constant(1.0, 1);
        let glass = Index::constant(2.0, 1);
        let a = Sin2::new(&air, degree!(90.0));
        let b = Sin2::new(&glass, degree!(30.0));
        assert_abs_diff_eq!(a.values()[0].re, b.values()[0].re, epsilon = 1e-15);
    }
    #[test]
    fn hash() {
        let medium = Index::constant(1.5, 3);
        let mut set = HashSet::new();
        set.insert(Sin2::new(&medium, degree!(10.0)));
        set.insert(Sin2::new(&medium, degree!(10.0)));
        set.insert(Sin2::new(&medium, degree!(20.0)));
        assert_eq!(set.len(), 2);
    }
}
