//! Phase, group delay (GD) and group delay dispersion (GDD).
//!
//! GD and GDD are finite difference derivatives of the phase with respect to the angular
//! frequency `ω = 2πc/λ`. Every requested wavelength `λ` is evaluated at the three wavelengths
//! `λ(1-δ)`, `λ`, `λ(1+δ)` (see [`WavelengthSet::expanded_for_derivative`]). Both results are
//! linear in the three phases, so their derivatives are obtained from the same weights.
use std::f64::consts::PI;

use num::complex::Complex64;

use crate::{utils::math_utils::unwrap_phase, wavelengths::WavelengthSet};

/// Speed of light in nm/fs.
pub const SPEED_OF_LIGHT: f64 = 299.792_458;

/// Relative wavelength step used for GD and GDD.
pub const RELATIVE_WAVELENGTH_STEP: f64 = 1.0e-3;

/// Phase (radians) of complex amplitudes.
#[must_use]
pub fn phase(amplitudes: &[Complex64]) -> Vec<f64> {
    amplitudes.iter().map(|a| a.arg()).collect()
}

/// Derivative of the phase `Im(da/a)`.
#[must_use]
pub fn d_phase(amplitudes: &[Complex64], d_amplitudes: &[Complex64]) -> Vec<f64> {
    amplitudes
        .iter()
        .zip(d_amplitudes)
        .map(|(a, d_a)| (d_a / a).im)
        .collect()
}

fn angular_frequency(wavelength: f64) -> f64 {
    2.0 * PI * SPEED_OF_LIGHT / wavelength
}

/// Lagrange weights of the first and second derivative at the middle one of three points.
fn lagrange_weights(x: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    let (x0, x1, x2) = (x[0], x[1], x[2]);
    let first = [
        (x1 - x2) / ((x0 - x1) * (x0 - x2)),
        ((x1 - x0) + (x1 - x2)) / ((x1 - x0) * (x1 - x2)),
        (x1 - x0) / ((x2 - x0) * (x2 - x1)),
    ];
    let second = [
        2.0 / ((x0 - x1) * (x0 - x2)),
        2.0 / ((x1 - x0) * (x1 - x2)),
        2.0 / ((x2 - x0) * (x2 - x1)),
    ];
    (first, second)
}

/// Weights `w` such that `GD = Σ w_k·φ_k` (fs) for the three phases of one requested wavelength.
#[must_use]
pub fn group_delay_weights(wavelengths: [f64; 3]) -> [f64; 3] {
    let (first, _) = lagrange_weights(wavelengths.map(angular_frequency));
    first.map(|w| -w)
}

/// Weights `w` such that `GDD = Σ w_k·φ_k` (fs²) for the three phases of one requested wavelength.
#[must_use]
pub fn group_delay_dispersion_weights(wavelengths: [f64; 3]) -> [f64; 3] {
    let (_, second) = lagrange_weights(wavelengths.map(angular_frequency));
    second.map(|w| -w)
}

fn triplets<'a>(
    expanded: &'a WavelengthSet,
    phases: &'a [f64],
) -> impl Iterator<Item = ([f64; 3], [f64; 3])> + 'a {
    expanded
        .as_slice()
        .chunks_exact(3)
        .zip(phases.chunks_exact(3))
        .map(|(w, p)| {
            let reference = p[1];
            (
                [w[0], w[1], w[2]],
                [unwrap_phase(p[0], reference), p[1], unwrap_phase(p[2], reference)],
            )
        })
}

fn apply(weights: [f64; 3], values: [f64; 3]) -> f64 {
    weights
        .iter()
        .zip(values)
        .map(|(w, v)| w * v)
        .sum::<f64>()
}

/// Group delay (fs) from phases (radians) evaluated on an expanded wavelength set.
#[must_use]
pub fn group_delay(expanded: &WavelengthSet, phases: &[f64]) -> Vec<f64> {
    triplets(expanded, phases)
        .map(|(w, p)| apply(group_delay_weights(w), p))
        .collect()
}

/// Group delay dispersion (fs²) from phases (radians) evaluated on an expanded wavelength set.
#[must_use]
pub fn group_delay_dispersion(expanded: &WavelengthSet, phases: &[f64]) -> Vec<f64> {
    triplets(expanded, phases)
        .map(|(w, p)| apply(group_delay_dispersion_weights(w), p))
        .collect()
}

/// Derivative of [`group_delay`] given the phase derivatives.
#[must_use]
pub fn d_group_delay(expanded: &WavelengthSet, d_phases: &[f64]) -> Vec<f64> {
    expanded
        .as_slice()
        .chunks_exact(3)
        .zip(d_phases.chunks_exact(3))
        .map(|(w, d)| apply(group_delay_weights([w[0], w[1], w[2]]), [d[0], d[1], d[2]]))
        .collect()
}

/// Derivative of [`group_delay_dispersion`] given the phase derivatives.
#[must_use]
pub fn d_group_delay_dispersion(expanded: &WavelengthSet, d_phases: &[f64]) -> Vec<f64> {
    expanded
        .as_slice()
        .chunks_exact(3)
        .zip(d_phases.chunks_exact(3))
        .map(|(w, d)| {
            apply(
                group_delay_dispersion_weights([w[0], w[1], w[2]]),
                [d[0], d[1], d[2]],
            )
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    #[test]
    fn phase_of_amplitudes() {
        let phases = phase(&[Complex64::new(0.0, 1.0), Complex64::new(-1.0, 0.0)]);
        assert_abs_diff_eq!(phases[0], PI / 2.0);
        assert_abs_diff_eq!(phases[1], PI);
    }
    #[test]
    fn phase_derivative() {
        let a = Complex64::from_polar(0.5, 0.3);
        let d_a = Complex64::new(0.0, 1.0) * a * 0.7;
        assert_abs_diff_eq!(d_phase(&[a], &[d_a])[0], 0.7, epsilon = 1e-14);
    }
    #[test]
    fn linear_phase_gives_constant_delay() {
        // a pure delay of 10 fs: φ(ω) = -ω·10
        let set = WavelengthSet::new(vec![600.0, 800.0]).unwrap();
        let expanded = set.expanded_for_derivative(RELATIVE_WAVELENGTH_STEP);
        let phases: Vec<f64> = expanded
            .iter()
            .map(|w| -(angular_frequency(*w) * 10.0) % (2.0 * PI))
            .collect();
        let gd = group_delay(&expanded, &phases);
        assert_eq!(gd.len(), 2);
        assert_relative_eq!(gd[0], 10.0, max_relative = 1e-6);
        assert_relative_eq!(gd[1], 10.0, max_relative = 1e-6);
        let gdd = group_delay_dispersion(&expanded, &phases);
        assert_abs_diff_eq!(gdd[0], 0.0, epsilon = 1e-3);
    }
    #[test]
    fn quadratic_phase_gives_constant_dispersion() {
        // φ(ω) = -½·50·(ω-ω0)²  => GDD = 50 fs²
        let set = WavelengthSet::new(vec![700.0]).unwrap();
        let expanded = set.expanded_for_derivative(RELATIVE_WAVELENGTH_STEP);
        let omega0 = angular_frequency(700.0);
        let phases: Vec<f64> = expanded
            .iter()
            .map(|w| -0.5 * 50.0 * (angular_frequency(*w) - omega0).powi(2))
            .collect();
        let gdd = group_delay_dispersion(&expanded, &phases);
        assert_relative_eq!(gdd[0], 50.0, max_relative = 1e-6);
        let gd = group_delay(&expanded, &phases);
        assert_abs_diff_eq!(gd[0], 0.0, epsilon = 1e-6);
    }
    #[test]
    fn derivative_weights_are_linear() {
        let set = WavelengthSet::new(vec![550.0]).unwrap();
        let expanded = set.expanded_for_derivative(RELATIVE_WAVELENGTH_STEP);
        let phases = [0.1, 0.2, 0.35];
        assert_abs_diff_eq!(
            d_group_delay(&expanded, &phases)[0],
            group_delay(&expanded, &phases)[0],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            d_group_delay_dispersion(&expanded, &phases)[0],
            group_delay_dispersion(&expanded, &phases)[0],
            epsilon = 1e-6
        );
    }
}
