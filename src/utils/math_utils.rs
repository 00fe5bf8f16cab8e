//! Small numeric helpers shared by the analysis and optimization code.
use num::complex::Complex64;

#[must_use]
pub const fn usize_to_f64(value: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let newval = value as f64;
    newval
}

#[must_use]
pub const fn f64_to_usize(value: f64) -> usize {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let newval = value as usize;
    newval
}

/// Bring `angle` (degrees) into the interval `[min, min + 360)`.
#[must_use]
pub fn wrap_degrees(angle: f64, min: f64) -> f64 {
    let mut wrapped = angle;
    while wrapped < min {
        wrapped += 360.0;
    }
    while wrapped >= min + 360.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Shift `phase` (radians) by multiples of 2π such that it lies within π of `reference`.
#[must_use]
pub fn unwrap_phase(phase: f64, reference: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    phase - two_pi * ((phase - reference) / two_pi).round()
}

/// The real part of `z` with an exact-zero check used by branch selections.
#[must_use]
pub fn is_pure_imaginary(z: Complex64) -> bool {
    #[allow(clippy::float_cmp)]
    let zero = z.re == 0.0;
    zero
}
