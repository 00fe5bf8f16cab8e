//! Characteristic matrices of homogeneous slices.
//!
//! A slice of index `N` and thickness `d` is described, for each wavelength and polarization, by
//!
//! ```text
//! | cos φ        j·sin φ / η |
//! | j·η·sin φ    cos φ       |      with φ = 2π·N_s·d / λ
//! ```
//!
//! where `η` is the tilted admittance of the slice. Products are accumulated in deposition order:
//! the slice touching the substrate comes first, every further slice is multiplied from the right.
use nalgebra::Matrix2;
use num::complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::PI;

use super::{admittance::admittances, Mode, Sin2};
use crate::{index::Index, wavelengths::WavelengthSet};

/// A single complex 2x2 matrix.
pub type Matrix = Matrix2<Complex64>;

/// Lower limit of `Im(φ)`. Thick, strongly absorbing slices would overflow `cos` and `sin`.
const MIN_PHASE_IMAGINARY: f64 = -100.0;

const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Phase thickness of a slice, with the imaginary part clamped.
fn phase_thickness(n_s: Complex64, thickness: f64, wavelength: f64) -> Complex64 {
    let mut phi = n_s * (2.0 * PI * thickness / wavelength);
    if phi.im < MIN_PHASE_IMAGINARY {
        phi.im = MIN_PHASE_IMAGINARY;
    }
    phi
}

fn slice_matrix(phi: Complex64, eta: Complex64) -> Matrix {
    let (sin, cos) = (phi.sin(), phi.cos());
    Matrix::new(cos, J * sin / eta, J * eta * sin, cos)
}

fn thickness_derivative(phi: Complex64, d_phi: Complex64, eta: Complex64) -> Matrix {
    let (sin, cos) = (phi.sin(), phi.cos());
    Matrix::new(-sin, J * cos / eta, J * eta * cos, -sin) * d_phi
}

/// Derivative of a slice matrix when both `φ` and `η` vary.
fn index_derivative(phi: Complex64, d_phi: Complex64, eta: Complex64, d_eta: Complex64) -> Matrix {
    let (sin, cos) = (phi.sin(), phi.cos());
    Matrix::new(
        -sin * d_phi,
        J * (cos * d_phi / eta - sin * d_eta / (eta * eta)),
        J * (d_eta * sin + eta * cos * d_phi),
        -sin * d_phi,
    )
}

/// Per-wavelength characteristic matrices for both polarization modes.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicMatrix {
    s: Vec<Matrix>,
    p: Vec<Matrix>,
}
impl CharacteristicMatrix {
    /// Creates a unity [`CharacteristicMatrix`] for `len` wavelengths.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            s: vec![Matrix::identity(); len],
            p: vec![Matrix::identity(); len],
        }
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
    /// The matrices of one polarization mode.
    #[must_use]
    pub fn get(&self, mode: Mode) -> &[Matrix] {
        match mode {
            Mode::S => &self.s,
            Mode::P => &self.p,
        }
    }
    /// Reset all matrices to unity.
    pub fn set_unity(&mut self) {
        for m in self.s.iter_mut().chain(self.p.iter_mut()) {
            *m = Matrix::identity();
        }
    }
    /// Reset all matrices to zero (used as accumulator of derivatives).
    pub fn set_zero(&mut self) {
        for m in self.s.iter_mut().chain(self.p.iter_mut()) {
            *m = Matrix::zeros();
        }
    }
    /// Copy the content of `other` into this matrix (without reallocation if sizes agree).
    pub fn copy_from(&mut self, other: &Self) {
        self.s.clone_from(&other.s);
        self.p.clone_from(&other.p);
    }
    fn fill<F>(&mut self, n: &Index, sin2: &Sin2, wavelengths: &WavelengthSet, f: F)
    where
        F: Fn(usize, Complex64, Complex64, f64) -> (Matrix, Matrix) + Sync,
    {
        assert_eq!(n.len(), wavelengths.len(), "index and wavelength length mismatch");
        assert_eq!(sin2.len(), wavelengths.len(), "sin2 and wavelength length mismatch");
        let len = wavelengths.len();
        self.s.resize(len, Matrix::identity());
        self.p.resize(len, Matrix::identity());
        let n = n.values();
        let sin2 = sin2.values();
        let wavelengths = wavelengths.as_slice();
        self.s
            .par_iter_mut()
            .zip(self.p.par_iter_mut())
            .enumerate()
            .for_each(|(i, (s, p))| {
                let (m_s, m_p) = f(i, n[i], sin2[i], wavelengths[i]);
                *s = m_s;
                *p = m_p;
            });
    }
    /// Set the matrices of a slice of index `n` and `thickness` (nm).
    ///
    /// A zero thickness yields the unity matrix.
    ///
    /// # Panics
    ///
    /// Panics if `n` or `sin2` is not sampled on `wavelengths`.
    pub fn set_matrices(
        &mut self,
        n: &Index,
        thickness: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) {
        self.fill(n, sin2, wavelengths, |_, n, sin2, wavelength| {
            let (n_s, eta_s, eta_p) = admittances(n, sin2);
            let phi = phase_thickness(n_s, thickness, wavelength);
            (slice_matrix(phi, eta_s), slice_matrix(phi, eta_p))
        });
    }
    /// Set the matrices to the derivative of a slice with respect to its thickness.
    ///
    /// # Panics
    ///
    /// Panics if `n` or `sin2` is not sampled on `wavelengths`.
    pub fn set_derivative_thickness(
        &mut self,
        n: &Index,
        thickness: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) {
        self.fill(n, sin2, wavelengths, |_, n, sin2, wavelength| {
            let (n_s, eta_s, eta_p) = admittances(n, sin2);
            let phi = phase_thickness(n_s, thickness, wavelength);
            let d_phi = n_s * (2.0 * PI / wavelength);
            (
                thickness_derivative(phi, d_phi, eta_s),
                thickness_derivative(phi, d_phi, eta_p),
            )
        });
    }
    /// Set the matrices to the derivative of a slice with respect to its (mixture) index.
    ///
    /// `d_n` is the derivative of the index curve with respect to the index at the center
    /// wavelength.
    ///
    /// # Panics
    ///
    /// Panics if `n`, `d_n` or `sin2` is not sampled on `wavelengths`.
    pub fn set_derivative_index(
        &mut self,
        n: &Index,
        d_n: &Index,
        thickness: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) {
        self.fill_with_derivative(n, d_n, sin2, wavelengths, thickness, 0.0);
    }
    /// Same as [`CharacteristicMatrix::set_derivative_index`] with the optical thickness
    /// `center_index·thickness` kept constant.
    ///
    /// # Panics
    ///
    /// Panics if `n`, `d_n` or `sin2` is not sampled on `wavelengths`.
    pub fn set_derivative_index_constant_ot(
        &mut self,
        n: &Index,
        d_n: &Index,
        thickness: f64,
        center_index: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) {
        let d_thickness = -thickness / center_index;
        self.fill_with_derivative(n, d_n, sin2, wavelengths, thickness, d_thickness);
    }
    fn fill_with_derivative(
        &mut self,
        n: &Index,
        d_n: &Index,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
        thickness: f64,
        d_thickness: f64,
    ) {
        assert_eq!(d_n.len(), wavelengths.len(), "dN and wavelength length mismatch");
        let d_n = d_n.values();
        self.fill(n, sin2, wavelengths, |i, n, sin2, wavelength| {
            let d_n = d_n[i];
            let (n_s, eta_s, eta_p) = admittances(n, sin2);
            let phi = phase_thickness(n_s, thickness, wavelength);
            let d_n_s = n / n_s * d_n;
            let d_eta_p = n * (2.0 * n_s * n_s - n * n) / (n_s * n_s * n_s) * d_n;
            let k = 2.0 * PI / wavelength;
            let d_phi = (d_n_s * thickness + n_s * d_thickness) * k;
            (
                index_derivative(phi, d_phi, eta_s, d_n_s),
                index_derivative(phi, d_phi, eta_p, d_eta_p),
            )
        });
    }
    /// Set the matrices to the derivative, at zero thickness, of a needle of index `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` or `sin2` is not sampled on `wavelengths`.
    pub fn set_needle(&mut self, n: &Index, sin2: &Sin2, wavelengths: &WavelengthSet) {
        self.fill(n, sin2, wavelengths, |_, n, sin2, wavelength| {
            let (n_s, eta_s, eta_p) = admittances(n, sin2);
            let d_phi = n_s * (2.0 * PI / wavelength);
            let zero = Complex64::new(0.0, 0.0);
            (
                Matrix::new(zero, J * d_phi / eta_s, J * eta_s * d_phi, zero),
                Matrix::new(zero, J * d_phi / eta_p, J * eta_p * d_phi, zero),
            )
        });
    }
    /// Right-multiply by `other`: `self = self · other`.
    ///
    /// # Panics
    ///
    /// Panics if both matrices are sampled on a different number of wavelengths.
    pub fn multiply(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len(), "matrix length mismatch");
        for (a, b) in self.s.iter_mut().zip(&other.s) {
            *a *= b;
        }
        for (a, b) in self.p.iter_mut().zip(&other.p) {
            *a *= b;
        }
    }
    /// Left-multiply by `other`: `self = other · self`.
    ///
    /// # Panics
    ///
    /// Panics if both matrices are sampled on a different number of wavelengths.
    pub fn pre_multiply(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len(), "matrix length mismatch");
        for (a, b) in self.s.iter_mut().zip(&other.s) {
            *a = b * *a;
        }
        for (a, b) in self.p.iter_mut().zip(&other.p) {
            *a = b * *a;
        }
    }
    /// Store the product `a · b` into this matrix.
    ///
    /// # Panics
    ///
    /// Panics if the matrices are sampled on a different number of wavelengths.
    pub fn set_product(&mut self, a: &Self, b: &Self) {
        assert_eq!(a.len(), b.len(), "matrix length mismatch");
        self.s.resize(a.len(), Matrix::identity());
        self.p.resize(a.len(), Matrix::identity());
        for ((out, a), b) in self.s.iter_mut().zip(&a.s).zip(&b.s) {
            *out = a * b;
        }
        for ((out, a), b) in self.p.iter_mut().zip(&a.p).zip(&b.p) {
            *out = a * b;
        }
    }
    /// Add `other` element-wise.
    pub fn add_assign(&mut self, other: &Self) {
        for (a, b) in self.s.iter_mut().zip(&other.s) {
            *a += b;
        }
        for (a, b) in self.p.iter_mut().zip(&other.p) {
            *a += b;
        }
    }
    /// Matrix of the same stack traversed in the opposite order.
    ///
    /// For products of slice matrices (equal diagonal elements) reversing the order of the factors
    /// swaps the diagonal elements of the product.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let swap = |m: &Matrix| Matrix::new(m[(1, 1)], m[(0, 1)], m[(1, 0)], m[(0, 0)]);
        Self {
            s: self.s.iter().map(swap).collect(),
            p: self.p.iter().map(swap).collect(),
        }
    }
    /// Determinants of one mode.
    #[must_use]
    pub fn determinants(&self, mode: Mode) -> Vec<Complex64> {
        self.get(mode)
            .iter()
            .map(|m| m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)])
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::degree;
    use approx::assert_abs_diff_eq;

    fn setup() -> (WavelengthSet, Index, Sin2) {
        let wavelengths = WavelengthSet::new(vec![450.0, 550.0, 650.0]).unwrap();
        let n: Index = vec![
            Complex64::new(2.1, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(1.95, -0.01),
        ]
        .into_iter()
        .collect();
        let sin2 = Sin2::new(&Index::constant(1.0, 3), degree!(30.0));
        (wavelengths, n, sin2)
    }
    fn assert_matrix_eq(a: &CharacteristicMatrix, b: &CharacteristicMatrix, epsilon: f64) {
        for mode in [Mode::S, Mode::P] {
            for (m_a, m_b) in a.get(mode).iter().zip(b.get(mode)) {
                assert_abs_diff_eq!((m_a - m_b).norm(), 0.0, epsilon = epsilon);
            }
        }
    }
    #[test]
    fn zero_thickness_is_unity() {
        let (wavelengths, n, sin2) = setup();
        let mut m = CharacteristicMatrix::new(3);
        m.set_matrices(&n, 0.0, &sin2, &wavelengths);
        assert_matrix_eq(&m, &CharacteristicMatrix::new(3), 1e-15);
    }
    #[test]
    #[should_panic(expected = "index and wavelength length mismatch")]
    fn index_on_other_wavelengths() {
        let (wavelengths, _, sin2) = setup();
        let mut m = CharacteristicMatrix::new(3);
        m.set_needle(&Index::constant(2.0, 2), &sin2, &wavelengths);
    }
    #[test]
    fn unity_law() {
        let (wavelengths, n, sin2) = setup();
        let mut m = CharacteristicMatrix::new(3);
        m.set_matrices(&n, 123.0, &sin2, &wavelengths);
        let reference = m.clone();
        m.multiply(&CharacteristicMatrix::new(3));
        assert_matrix_eq(&m, &reference, 1e-15);
        let mut unity = CharacteristicMatrix::new(3);
        unity.set_unity();
        unity.multiply(&reference);
        assert_matrix_eq(&unity, &reference, 1e-15);
    }
    #[test]
    fn lossless_determinant() {
        let (wavelengths, n, sin2) = setup();
        let mut m = CharacteristicMatrix::new(3);
        m.set_matrices(&n, 250.0, &sin2, &wavelengths);
        for mode in [Mode::S, Mode::P] {
            let det = m.determinants(mode);
            assert_abs_diff_eq!(det[0].re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(det[0].im, 0.0, epsilon = 1e-12);
        }
    }
    #[test]
    fn slices_add_up() {
        let (wavelengths, n, sin2) = setup();
        let mut a = CharacteristicMatrix::new(3);
        a.set_matrices(&n, 40.0, &sin2, &wavelengths);
        let mut b = CharacteristicMatrix::new(3);
        b.set_matrices(&n, 60.0, &sin2, &wavelengths);
        a.multiply(&b);
        let mut whole = CharacteristicMatrix::new(3);
        whole.set_matrices(&n, 100.0, &sin2, &wavelengths);
        assert_matrix_eq(&a, &whole, 1e-12);
    }
    #[test]
    fn product_order() {
        let (wavelengths, n, sin2) = setup();
        let mut a = CharacteristicMatrix::new(3);
        a.set_matrices(&n, 40.0, &sin2, &wavelengths);
        let mut b = CharacteristicMatrix::new(3);
        b.set_matrices(&Index::constant(1.46, 3), 90.0, &sin2, &wavelengths);
        let mut ab = a.clone();
        ab.multiply(&b);
        let mut pre = b.clone();
        pre.pre_multiply(&a);
        assert_matrix_eq(&ab, &pre, 1e-14);
        let mut product = CharacteristicMatrix::new(3);
        product.set_product(&a, &b);
        assert_matrix_eq(&ab, &product, 1e-14);
    }
    #[test]
    fn reversed_order() {
        let (wavelengths, n, sin2) = setup();
        let mut a = CharacteristicMatrix::new(3);
        a.set_matrices(&n, 40.0, &sin2, &wavelengths);
        let mut b = CharacteristicMatrix::new(3);
        b.set_matrices(&Index::constant(1.46, 3), 90.0, &sin2, &wavelengths);
        let mut ab = a.clone();
        ab.multiply(&b);
        let mut ba = b.clone();
        ba.multiply(&a);
        assert_matrix_eq(&ab.reversed(), &ba, 1e-13);
    }
    #[test]
    fn absorbing_clamp() {
        let wavelengths = WavelengthSet::new(vec![500.0]).unwrap();
        let metal: Index = vec![Complex64::new(0.1, -5.0)].into_iter().collect();
        let mut m = CharacteristicMatrix::new(1);
        m.set_matrices(&metal, 1.0e6, &Sin2::normal(1), &wavelengths);
        assert!(m.get(Mode::S)[0][(0, 0)].norm().is_finite());
    }
    #[test]
    fn thickness_derivative_matches_finite_difference() {
        let (wavelengths, n, sin2) = setup();
        let d = 80.0;
        let h = 1e-4;
        let mut derivative = CharacteristicMatrix::new(3);
        derivative.set_derivative_thickness(&n, d, &sin2, &wavelengths);
        let mut plus = CharacteristicMatrix::new(3);
        plus.set_matrices(&n, d + h, &sin2, &wavelengths);
        let mut minus = CharacteristicMatrix::new(3);
        minus.set_matrices(&n, d - h, &sin2, &wavelengths);
        for mode in [Mode::S, Mode::P] {
            for i in 0..3 {
                let fd = (plus.get(mode)[i] - minus.get(mode)[i]) / Complex64::new(2.0 * h, 0.0);
                assert_abs_diff_eq!((fd - derivative.get(mode)[i]).norm(), 0.0, epsilon = 1e-7);
            }
        }
    }
    #[test]
    fn index_derivative_matches_finite_difference() {
        let (wavelengths, n, sin2) = setup();
        let d_n = Index::constant(1.0, 3);
        let d = 80.0;
        let h = 1e-6;
        let shifted = |delta: f64| -> Index {
            n.values().iter().map(|v| v + delta).collect()
        };
        let mut derivative = CharacteristicMatrix::new(3);
        derivative.set_derivative_index(&n, &d_n, d, &sin2, &wavelengths);
        let mut plus = CharacteristicMatrix::new(3);
        plus.set_matrices(&shifted(h), d, &sin2, &wavelengths);
        let mut minus = CharacteristicMatrix::new(3);
        minus.set_matrices(&shifted(-h), d, &sin2, &wavelengths);
        for mode in [Mode::S, Mode::P] {
            for i in 0..3 {
                let fd = (plus.get(mode)[i] - minus.get(mode)[i]) / Complex64::new(2.0 * h, 0.0);
                assert_abs_diff_eq!((fd - derivative.get(mode)[i]).norm(), 0.0, epsilon = 1e-6);
            }
        }
    }
    #[test]
    fn constant_ot_derivative() {
        let (wavelengths, n, sin2) = setup();
        let d_n = Index::constant(1.0, 3);
        let (d, center) = (80.0, 2.0);
        let h = 1e-6;
        let matrices = |delta: f64| -> CharacteristicMatrix {
            let shifted: Index = n.values().iter().map(|v| v + delta).collect();
            let mut m = CharacteristicMatrix::new(3);
            m.set_matrices(&shifted, d * center / (center + delta), &sin2, &wavelengths);
            m
        };
        let mut derivative = CharacteristicMatrix::new(3);
        derivative.set_derivative_index_constant_ot(&n, &d_n, d, center, &sin2, &wavelengths);
        let (plus, minus) = (matrices(h), matrices(-h));
        for mode in [Mode::S, Mode::P] {
            for i in 0..3 {
                let fd = (plus.get(mode)[i] - minus.get(mode)[i]) / Complex64::new(2.0 * h, 0.0);
                assert_abs_diff_eq!((fd - derivative.get(mode)[i]).norm(), 0.0, epsilon = 1e-6);
            }
        }
    }
    #[test]
    fn needle_is_thickness_derivative_at_zero() {
        let (wavelengths, n, sin2) = setup();
        let mut needle = CharacteristicMatrix::new(3);
        needle.set_needle(&n, &sin2, &wavelengths);
        let mut derivative = CharacteristicMatrix::new(3);
        derivative.set_derivative_thickness(&n, 0.0, &sin2, &wavelengths);
        assert_matrix_eq(&needle, &derivative, 1e-15);
    }
}
