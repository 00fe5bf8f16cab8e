//! Optical admittances of a semi-infinite medium.
use num::complex::Complex64;

use super::{Mode, Sin2};
use crate::{index::Index, utils::math_utils::is_pure_imaginary};

/// Longitudinal index `N_s = sqrt(N² - sin²θ₀)`.
///
/// The principal branch is used, which yields `Re(N_s) >= 0`. For a purely imaginary result the
/// sign is flipped so that evanescent waves decay (`Im(N_s) < 0` with the `n - i·k` convention).
#[must_use]
pub fn normal_index(n: Complex64, sin2: Complex64) -> Complex64 {
    let n_s = (n * n - sin2).sqrt();
    if is_pure_imaginary(n_s) {
        -n_s
    } else {
        n_s
    }
}

/// Tilted admittances `η_s = N_s` and `η_p = N² / N_s` of a single index value.
#[must_use]
pub fn admittances(n: Complex64, sin2: Complex64) -> (Complex64, Complex64, Complex64) {
    let n_s = normal_index(n, sin2);
    (n_s, n_s, n * n / n_s)
}

/// Per-wavelength admittances of a medium (or substrate) for a given incidence condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Admittance {
    normal_index: Vec<Complex64>,
    s: Vec<Complex64>,
    p: Vec<Complex64>,
}
impl Admittance {
    /// Creates the admittances of a medium of index `n` under the condition `sin2`.
    ///
    /// # Panics
    ///
    /// Panics if `n` and `sin2` are sampled on a different number of wavelengths.
    #[must_use]
    pub fn new(n: &Index, sin2: &Sin2) -> Self {
        assert_eq!(n.len(), sin2.len(), "index and sin2 length mismatch");
        let mut normal_index = Vec::with_capacity(n.len());
        let mut s = Vec::with_capacity(n.len());
        let mut p = Vec::with_capacity(n.len());
        for (n, sin2) in n.values().iter().zip(sin2.values()) {
            let (n_s, eta_s, eta_p) = admittances(*n, *sin2);
            normal_index.push(n_s);
            s.push(eta_s);
            p.push(eta_p);
        }
        Self { normal_index, s, p }
    }
    /// Admittances of the given polarization mode.
    #[must_use]
    pub fn get(&self, mode: Mode) -> &[Complex64] {
        match mode {
            Mode::S => &self.s,
            Mode::P => &self.p,
        }
    }
    /// Longitudinal index `N_s` of the medium.
    #[must_use]
    pub fn normal_index(&self) -> &[Complex64] {
        &self.normal_index
    }
    /// Number of wavelengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.s.len()
    }
    /// Returns `true` if no wavelength is sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }
}
