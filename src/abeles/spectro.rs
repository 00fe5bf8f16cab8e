//! Intensity coefficients (spectrophotometry).
//!
//! Reflectance and transmittance of a single face follow from the amplitude coefficients. The two
//! faces of a substrate are combined incoherently: the light bouncing inside the substrate is summed
//! in intensity, attenuated by the substrate absorption on every pass.
use std::f64::consts::PI;

use num::complex::Complex64;

use super::{r_and_t::Amplitudes, Face, Mode};
use crate::{abeles::Admittance, wavelengths::WavelengthSet};

/// `|r|²`
#[must_use]
pub fn reflectance(amplitudes: &Amplitudes) -> Vec<f64> {
    amplitudes.r.iter().map(Complex64::norm_sqr).collect()
}

/// `Re(η_exit) / Re(η_incident) · |t|²`
#[must_use]
pub fn transmittance(amplitudes: &Amplitudes, incident: &[Complex64], exit: &[Complex64]) -> Vec<f64> {
    amplitudes
        .t
        .iter()
        .zip(incident.iter().zip(exit))
        .map(|(t, (eta_in, eta_exit))| eta_exit.re / eta_in.re * t.norm_sqr())
        .collect()
}

/// Derivative of [`reflectance`]: `2·Re(conj(r)·dr)`.
#[must_use]
pub fn d_reflectance(amplitudes: &Amplitudes, d_amplitudes: &Amplitudes) -> Vec<f64> {
    amplitudes
        .r
        .iter()
        .zip(&d_amplitudes.r)
        .map(|(r, d_r)| 2.0 * (r.conj() * d_r).re)
        .collect()
}

/// Derivative of [`transmittance`].
#[must_use]
pub fn d_transmittance(
    amplitudes: &Amplitudes,
    d_amplitudes: &Amplitudes,
    incident: &[Complex64],
    exit: &[Complex64],
) -> Vec<f64> {
    amplitudes
        .t
        .iter()
        .zip(&d_amplitudes.t)
        .zip(incident.iter().zip(exit))
        .map(|((t, d_t), (eta_in, eta_exit))| eta_exit.re / eta_in.re * 2.0 * (t.conj() * d_t).re)
        .collect()
}

/// Single pass intensity transmission `exp(4π·Im(N_s)·d/λ)` of an (incoherent) substrate.
#[must_use]
pub fn substrate_transmission(
    substrate: &Admittance,
    thickness: f64,
    wavelengths: &WavelengthSet,
) -> Vec<f64> {
    substrate
        .normal_index()
        .iter()
        .zip(wavelengths)
        .map(|(n_s, wavelength)| (4.0 * PI * n_s.im * thickness / wavelength).exp())
        .collect()
}

/// Intensity coefficients of one coated face for one polarization mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceIntensities {
    /// reflectance for light coming from the outer medium
    pub r: Vec<f64>,
    /// transmittance from the outer medium into the substrate
    pub t: Vec<f64>,
    /// reflectance for light coming from the substrate
    pub r_reverse: Vec<f64>,
    /// transmittance from the substrate into the outer medium
    pub t_reverse: Vec<f64>,
}
impl FaceIntensities {
    /// Intensities of a face lying between `medium` and `substrate`.
    #[must_use]
    pub fn new(face: &Face, mode: Mode, medium: &Admittance, substrate: &Admittance) -> Self {
        let (eta_m, eta_sub) = (medium.get(mode), substrate.get(mode));
        Self {
            r: reflectance(face.forward.get(mode)),
            t: transmittance(face.forward.get(mode), eta_m, eta_sub),
            r_reverse: reflectance(face.reverse.get(mode)),
            t_reverse: transmittance(face.reverse.get(mode), eta_sub, eta_m),
        }
    }
    /// Derivatives of the intensities given the face and its derivative.
    #[must_use]
    pub fn derivative(
        face: &Face,
        d_face: &Face,
        mode: Mode,
        medium: &Admittance,
        substrate: &Admittance,
    ) -> Self {
        let (eta_m, eta_sub) = (medium.get(mode), substrate.get(mode));
        Self {
            r: d_reflectance(face.forward.get(mode), d_face.forward.get(mode)),
            t: d_transmittance(face.forward.get(mode), d_face.forward.get(mode), eta_m, eta_sub),
            r_reverse: d_reflectance(face.reverse.get(mode), d_face.reverse.get(mode)),
            t_reverse: d_transmittance(
                face.reverse.get(mode),
                d_face.reverse.get(mode),
                eta_sub,
                eta_m,
            ),
        }
    }
    /// All-zero intensities (derivative of a face that does not depend on a parameter).
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            r: vec![0.0; len],
            t: vec![0.0; len],
            r_reverse: vec![0.0; len],
            t_reverse: vec![0.0; len],
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

/// Total reflectance and transmittance of a substrate with two faces.
///
/// Light enters through face `a`, travels through the substrate (single pass transmission `tau`),
/// and leaves through face `b`:
///
/// ```text
/// R = R_a + T_a·T'_a·τ²·R'_b / (1 - R'_a·R'_b·τ²)
/// T = T_a·τ·T'_b / (1 - R'_a·R'_b·τ²)
/// ```
#[must_use]
pub fn combine_faces(a: &FaceIntensities, b: &FaceIntensities, tau: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut r = Vec::with_capacity(tau.len());
    let mut t = Vec::with_capacity(tau.len());
    for (i, tau) in tau.iter().enumerate() {
        let tau2 = tau * tau;
        let denominator = 1.0 - a.r_reverse[i] * b.r_reverse[i] * tau2;
        r.push(a.r[i] + a.t[i] * a.t_reverse[i] * tau2 * b.r_reverse[i] / denominator);
        t.push(a.t[i] * tau * b.t_reverse[i] / denominator);
    }
    (r, t)
}

/// Derivatives of [`combine_faces`] given the derivatives `d_a` and `d_b` of both faces.
#[must_use]
pub fn combine_faces_derivative(
    a: &FaceIntensities,
    d_a: &FaceIntensities,
    b: &FaceIntensities,
    d_b: &FaceIntensities,
    tau: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut d_r = Vec::with_capacity(tau.len());
    let mut d_t = Vec::with_capacity(tau.len());
    for (i, tau) in tau.iter().enumerate() {
        let tau2 = tau * tau;
        let denominator = 1.0 - a.r_reverse[i] * b.r_reverse[i] * tau2;
        let d_denominator =
            -(d_a.r_reverse[i] * b.r_reverse[i] + a.r_reverse[i] * d_b.r_reverse[i]) * tau2;
        let numerator_r = a.t[i] * a.t_reverse[i] * b.r_reverse[i];
        let d_numerator_r = d_a.t[i] * a.t_reverse[i] * b.r_reverse[i]
            + a.t[i] * d_a.t_reverse[i] * b.r_reverse[i]
            + a.t[i] * a.t_reverse[i] * d_b.r_reverse[i];
        let numerator_t = a.t[i] * b.t_reverse[i];
        let d_numerator_t = d_a.t[i] * b.t_reverse[i] + a.t[i] * d_b.t_reverse[i];
        let denominator2 = denominator * denominator;
        d_r.push(
            d_a.r[i]
                + tau2 * (d_numerator_r * denominator - numerator_r * d_denominator) / denominator2,
        );
        d_t.push(tau * (d_numerator_t * denominator - numerator_t * d_denominator) / denominator2);
    }
    (d_r, d_t)
}

/// Absorptance `A = 1 - R - T`.
#[must_use]
pub fn absorptance(r: &[f64], t: &[f64]) -> Vec<f64> {
    r.iter().zip(t).map(|(r, t)| 1.0 - r - t).collect()
}
