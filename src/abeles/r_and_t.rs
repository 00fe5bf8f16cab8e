//! Amplitude reflection and transmission coefficients.
//!
//! The coefficients relate tangential field amplitudes. A coated face of the substrate is
//! described by its global matrix `M` (deposition order, substrate first). For light coming from
//! the outer medium (admittance `η_m`) the field at the outer surface is
//!
//! ```text
//! | B |   | m22  m12 | |   1   |
//! | C | = | m21  m11 | | η_sub |
//! ```
//!
//! since the layer order is reversed with respect to the direction of incidence. Light coming
//! from the substrate sees the layers in deposition order and uses `M` directly.
use num::complex::Complex64;
use strum::IntoEnumIterator;

use super::{matrices::Matrix, Admittance, CharacteristicMatrix, Mode};

/// Amplitude coefficients of one polarization mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amplitudes {
    /// reflection coefficients
    pub r: Vec<Complex64>,
    /// transmission coefficients
    pub t: Vec<Complex64>,
}
impl Amplitudes {
    fn with_capacity(len: usize) -> Self {
        Self {
            r: Vec::with_capacity(len),
            t: Vec::with_capacity(len),
        }
    }
    /// Number of wavelengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.r.len()
    }
    /// Returns `true` if no wavelength is sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
}

/// Amplitude coefficients for both polarization modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RAndT {
    s: Amplitudes,
    p: Amplitudes,
}
impl RAndT {
    /// Coefficients of one polarization mode.
    #[must_use]
    pub const fn get(&self, mode: Mode) -> &Amplitudes {
        match mode {
            Mode::S => &self.s,
            Mode::P => &self.p,
        }
    }
    fn get_mut(&mut self, mode: Mode) -> &mut Amplitudes {
        match mode {
            Mode::S => &mut self.s,
            Mode::P => &mut self.p,
        }
    }
}

/// Normalized field amplitudes `(B, C)` at the entrance of a face.
#[derive(Clone, Copy)]
struct Boundary {
    b: Complex64,
    c: Complex64,
}

fn forward_boundary(m: &Matrix, eta_exit: Complex64) -> Boundary {
    Boundary {
        b: m[(1, 1)] + m[(0, 1)] * eta_exit,
        c: m[(1, 0)] + m[(0, 0)] * eta_exit,
    }
}
fn reverse_boundary(m: &Matrix, eta_exit: Complex64) -> Boundary {
    Boundary {
        b: m[(0, 0)] + m[(0, 1)] * eta_exit,
        c: m[(1, 0)] + m[(1, 1)] * eta_exit,
    }
}
fn coefficients(boundary: Boundary, eta_in: Complex64) -> (Complex64, Complex64) {
    let denominator = eta_in * boundary.b + boundary.c;
    (
        (eta_in * boundary.b - boundary.c) / denominator,
        2.0 * eta_in / denominator,
    )
}
fn coefficient_derivatives(
    boundary: Boundary,
    d_boundary: Boundary,
    eta_in: Complex64,
) -> (Complex64, Complex64) {
    let denominator = eta_in * boundary.b + boundary.c;
    let d_denominator = eta_in * d_boundary.b + d_boundary.c;
    let (r, t) = coefficients(boundary, eta_in);
    (
        (eta_in * d_boundary.b - d_boundary.c - r * d_denominator) / denominator,
        -t * d_denominator / denominator,
    )
}

fn evaluate<F>(m: &CharacteristicMatrix, incident: &Admittance, exit: &Admittance, f: F) -> RAndT
where
    F: Fn(&Matrix, Complex64, Complex64) -> (Complex64, Complex64),
{
    let mut result = RAndT::default();
    for mode in Mode::iter() {
        let out = result.get_mut(mode);
        *out = Amplitudes::with_capacity(m.len());
        for ((m, eta_in), eta_exit) in m
            .get(mode)
            .iter()
            .zip(incident.get(mode))
            .zip(exit.get(mode))
        {
            let (r, t) = f(m, *eta_in, *eta_exit);
            out.r.push(r);
            out.t.push(t);
        }
    }
    result
}

/// Coefficients of a face for light incident from the outer `medium` towards the `substrate`.
#[must_use]
pub fn calculate_r_and_t(
    m: &CharacteristicMatrix,
    medium: &Admittance,
    substrate: &Admittance,
) -> RAndT {
    evaluate(m, medium, substrate, |m, eta_m, eta_sub| {
        coefficients(forward_boundary(m, eta_sub), eta_m)
    })
}

/// Coefficients of a face for light incident from the `substrate` towards the outer `medium`.
#[must_use]
pub fn calculate_r_and_t_reverse(
    m: &CharacteristicMatrix,
    medium: &Admittance,
    substrate: &Admittance,
) -> RAndT {
    evaluate(m, substrate, medium, |m, eta_sub, eta_m| {
        coefficients(reverse_boundary(m, eta_m), eta_sub)
    })
}

fn evaluate_derivative<F>(
    m: &CharacteristicMatrix,
    d_m: &CharacteristicMatrix,
    incident: &Admittance,
    exit: &Admittance,
    f: F,
) -> RAndT
where
    F: Fn(&Matrix, &Matrix, Complex64, Complex64) -> (Complex64, Complex64),
{
    let mut result = RAndT::default();
    for mode in Mode::iter() {
        let out = result.get_mut(mode);
        *out = Amplitudes::with_capacity(m.len());
        for (((m, d_m), eta_in), eta_exit) in m
            .get(mode)
            .iter()
            .zip(d_m.get(mode))
            .zip(incident.get(mode))
            .zip(exit.get(mode))
        {
            let (d_r, d_t) = f(m, d_m, *eta_in, *eta_exit);
            out.r.push(d_r);
            out.t.push(d_t);
        }
    }
    result
}

/// Derivatives of [`calculate_r_and_t`] given the derivative `d_m` of the global matrix.
#[must_use]
pub fn calculate_dr_and_dt(
    m: &CharacteristicMatrix,
    d_m: &CharacteristicMatrix,
    medium: &Admittance,
    substrate: &Admittance,
) -> RAndT {
    evaluate_derivative(m, d_m, medium, substrate, |m, d_m, eta_m, eta_sub| {
        coefficient_derivatives(
            forward_boundary(m, eta_sub),
            forward_boundary(d_m, eta_sub),
            eta_m,
        )
    })
}

/// Derivatives of [`calculate_r_and_t_reverse`] given the derivative `d_m` of the global matrix.
#[must_use]
pub fn calculate_dr_and_dt_reverse(
    m: &CharacteristicMatrix,
    d_m: &CharacteristicMatrix,
    medium: &Admittance,
    substrate: &Admittance,
) -> RAndT {
    evaluate_derivative(m, d_m, substrate, medium, |m, d_m, eta_sub, eta_m| {
        coefficient_derivatives(
            reverse_boundary(m, eta_m),
            reverse_boundary(d_m, eta_m),
            eta_sub,
        )
    })
}

/// Amplitude coefficients of one coated face for both directions of incidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Face {
    /// light coming from the outer medium
    pub forward: RAndT,
    /// light coming from the substrate
    pub reverse: RAndT,
}
impl Face {
    /// Evaluate a face with global matrix `m` between `medium` and `substrate`.
    #[must_use]
    pub fn new(m: &CharacteristicMatrix, medium: &Admittance, substrate: &Admittance) -> Self {
        Self {
            forward: calculate_r_and_t(m, medium, substrate),
            reverse: calculate_r_and_t_reverse(m, medium, substrate),
        }
    }
    /// The same face seen from the substrate: both directions of incidence are exchanged.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            forward: self.reverse.clone(),
            reverse: self.forward.clone(),
        }
    }
    /// Derivative of a face given the derivative `d_m` of its global matrix.
    #[must_use]
    pub fn derivative(
        m: &CharacteristicMatrix,
        d_m: &CharacteristicMatrix,
        medium: &Admittance,
        substrate: &Admittance,
    ) -> Self {
        Self {
            forward: calculate_dr_and_dt(m, d_m, medium, substrate),
            reverse: calculate_dr_and_dt_reverse(m, d_m, medium, substrate),
        }
    }
}
