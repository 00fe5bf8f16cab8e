//! Mixtures of two (or more) materials whose index can be tuned continuously.
//!
//! A mixture is described by an ordered list of composition points (fractions). Each point carries
//! a dispersion model of the same kind; between points the complex index is linearly interpolated
//! in composition. The tunable parameter of a mixture (its "index") is the real part of the
//! refractive index at the center wavelength, which must be strictly monotonic in composition.
use num::complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{
    CauchyDispersion, ConstantDispersion, DispersionModel, SellmeierDispersion, TableDispersion,
};
use crate::{
    error::{FilmError, FilmResult},
    index::Index,
    utils::usize_to_f64,
    wavelengths::WavelengthSet,
};

const RANGE_TOLERANCE: f64 = 1e-9;

/// Dispersion models of the composition points of a [`Mixture`].
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum MixtureKind {
    /// wavelength-independent points
    Constant(Vec<ConstantDispersion>),
    /// tabulated points
    Table(Vec<TableDispersion>),
    /// Cauchy points
    Cauchy(Vec<CauchyDispersion>),
    /// Sellmeier points
    Sellmeier(Vec<SellmeierDispersion>),
}
impl MixtureKind {
    fn len(&self) -> usize {
        match self {
            Self::Constant(points) => points.len(),
            Self::Table(points) => points.len(),
            Self::Cauchy(points) => points.len(),
            Self::Sellmeier(points) => points.len(),
        }
    }
    fn point_index(&self, point: usize, wavelength: f64) -> Complex64 {
        match self {
            Self::Constant(points) => points[point].complex_index(wavelength),
            Self::Table(points) => points[point].complex_index(wavelength),
            Self::Cauchy(points) => points[point].complex_index(wavelength),
            Self::Sellmeier(points) => points[point].complex_index(wavelength),
        }
    }
}

/// A material whose index can be chosen within a range (see module documentation).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Mixture {
    fractions: Vec<f64>,
    kind: MixtureKind,
    #[serde(default = "default_deposition_step_spacing")]
    deposition_step_spacing: f64,
}
const fn default_deposition_step_spacing() -> f64 {
    0.01
}
impl Mixture {
    /// Creates a new [`Mixture`].
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - less than two composition points are given
    ///   - the number of fractions does not match the number of points
    ///   - the fractions are not strictly increasing
    pub fn new(fractions: Vec<f64>, kind: MixtureKind) -> FilmResult<Self> {
        if fractions.len() < 2 || fractions.len() != kind.len() {
            return Err(FilmError::Material(
                "a mixture needs at least two composition points with one fraction each".into(),
            ));
        }
        if fractions.windows(2).any(|f| f[1] <= f[0]) || fractions.iter().any(|f| !f.is_finite())
        {
            return Err(FilmError::Material(
                "mixture fractions must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            fractions,
            kind,
            deposition_step_spacing: default_deposition_step_spacing(),
        })
    }
    /// Set the step spacing that deposition systems use for this mixture.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spacing is not positive.
    pub fn set_deposition_step_spacing(&mut self, spacing: f64) -> FilmResult<()> {
        if spacing <= 0.0 || !spacing.is_finite() {
            return Err(FilmError::Material(
                "deposition step spacing must be positive".into(),
            ));
        }
        self.deposition_step_spacing = spacing;
        Ok(())
    }
    /// Returns the deposition step spacing of this [`Mixture`].
    #[must_use]
    pub const fn deposition_step_spacing(&self) -> f64 {
        self.deposition_step_spacing
    }
    /// Returns the composition fractions of this [`Mixture`].
    #[must_use]
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }
    fn center_indices(&self, center_wavelength: f64) -> Vec<f64> {
        (0..self.kind.len())
            .map(|p| self.kind.point_index(p, center_wavelength).re)
            .collect()
    }
    /// Check that the real index at the center wavelength is strictly monotonic in composition.
    #[must_use]
    pub fn check_monotonicity(&self, center_wavelength: f64) -> bool {
        let indices = self.center_indices(center_wavelength);
        indices.windows(2).all(|w| w[1] > w[0]) || indices.windows(2).all(|w| w[1] < w[0])
    }
    /// Returns the `(n_min, n_max)` range of the index at the center wavelength.
    #[must_use]
    pub fn index_range(&self, center_wavelength: f64) -> (f64, f64) {
        self.center_indices(center_wavelength)
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), n| {
                (min.min(*n), max.max(*n))
            })
    }
    /// Find the composition segment (and position inside it) of a given center index.
    fn locate_index(&self, center_wavelength: f64, n: f64) -> FilmResult<(usize, f64)> {
        if !self.check_monotonicity(center_wavelength) {
            return Err(FilmError::Material(format!(
                "mixture is not monotonic at {center_wavelength} nm"
            )));
        }
        let (n_min, n_max) = self.index_range(center_wavelength);
        if !n.is_finite() || n < n_min - RANGE_TOLERANCE || n > n_max + RANGE_TOLERANCE {
            return Err(FilmError::Material(format!(
                "index {n} outside the mixture range [{n_min}, {n_max}]"
            )));
        }
        let indices = self.center_indices(center_wavelength);
        for (segment, w) in indices.windows(2).enumerate() {
            let (low, high) = if w[0] <= w[1] { (w[0], w[1]) } else { (w[1], w[0]) };
            if n <= high + RANGE_TOLERANCE && n >= low - RANGE_TOLERANCE {
                let t = ((n - w[0]) / (w[1] - w[0])).clamp(0.0, 1.0);
                return Ok((segment, t));
            }
        }
        Err(FilmError::Material(format!(
            "index {n} could not be located in the mixture"
        )))
    }
    fn locate_fraction(&self, fraction: f64) -> FilmResult<(usize, f64)> {
        let last = self.fractions.len() - 1;
        if !fraction.is_finite()
            || fraction < self.fractions[0] - RANGE_TOLERANCE
            || fraction > self.fractions[last] + RANGE_TOLERANCE
        {
            return Err(FilmError::Material(format!(
                "fraction {fraction} outside the mixture range"
            )));
        }
        let segment = self
            .fractions
            .partition_point(|f| *f <= fraction)
            .clamp(1, last)
            - 1;
        let t = ((fraction - self.fractions[segment])
            / (self.fractions[segment + 1] - self.fractions[segment]))
            .clamp(0.0, 1.0);
        Ok((segment, t))
    }
    fn interpolate(&self, segment: usize, t: f64, wavelength: f64) -> Complex64 {
        let lower = self.kind.point_index(segment, wavelength);
        let upper = self.kind.point_index(segment + 1, wavelength);
        lower + (upper - lower) * t
    }
    /// Composition fraction corresponding to the center index `n`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the mixture is not monotonic or `n` is out of range.
    pub fn fraction_for_index(&self, center_wavelength: f64, n: f64) -> FilmResult<f64> {
        let (segment, t) = self.locate_index(center_wavelength, n)?;
        Ok(self.fractions[segment]
            + t * (self.fractions[segment + 1] - self.fractions[segment]))
    }
    /// Center index corresponding to the composition `fraction`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the fraction is out of range.
    pub fn index_for_fraction(&self, center_wavelength: f64, fraction: f64) -> FilmResult<f64> {
        let (segment, t) = self.locate_fraction(fraction)?;
        Ok(self.interpolate(segment, t, center_wavelength).re)
    }
    /// Index curve of the mixture tuned to center index `n`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the mixture is not monotonic or `n` is out of range.
    pub fn index_curve(
        &self,
        wavelengths: &WavelengthSet,
        center_wavelength: f64,
        n: f64,
    ) -> FilmResult<Index> {
        let (segment, t) = self.locate_index(center_wavelength, n)?;
        Ok(wavelengths
            .iter()
            .map(|w| self.interpolate(segment, t, *w))
            .collect())
    }
    /// Index curve of the mixture at composition `fraction`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the fraction is out of range.
    pub fn index_curve_by_fraction(
        &self,
        wavelengths: &WavelengthSet,
        fraction: f64,
    ) -> FilmResult<Index> {
        let (segment, t) = self.locate_fraction(fraction)?;
        Ok(wavelengths
            .iter()
            .map(|w| self.interpolate(segment, t, *w))
            .collect())
    }
    /// Derivative `dN(λ)/dn` of the index curve with respect to the center index `n`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the mixture is not monotonic or `n` is out of range.
    pub fn index_derivative(
        &self,
        wavelengths: &WavelengthSet,
        center_wavelength: f64,
        n: f64,
    ) -> FilmResult<Index> {
        let (segment, _) = self.locate_index(center_wavelength, n)?;
        let center_lower = self.kind.point_index(segment, center_wavelength).re;
        let center_upper = self.kind.point_index(segment + 1, center_wavelength).re;
        let dn_center = center_upper - center_lower;
        Ok(wavelengths
            .iter()
            .map(|w| {
                (self.kind.point_index(segment + 1, *w) - self.kind.point_index(segment, *w))
                    / dn_center
            })
            .collect())
    }
    /// Discretize the index range at the center wavelength into equidistant levels.
    ///
    /// The number of steps is chosen such that the level spacing does not exceed `step_spacing`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the mixture is not monotonic or the spacing is not
    /// positive.
    pub fn discretize(&self, center_wavelength: f64, step_spacing: f64) -> FilmResult<Vec<f64>> {
        if step_spacing <= 0.0 || !step_spacing.is_finite() {
            return Err(FilmError::Material("step spacing must be positive".into()));
        }
        if !self.check_monotonicity(center_wavelength) {
            return Err(FilmError::Material(format!(
                "mixture is not monotonic at {center_wavelength} nm"
            )));
        }
        let (n_min, n_max) = self.index_range(center_wavelength);
        let nb_steps =
            crate::utils::f64_to_usize(((n_max - n_min) / step_spacing - 1e-9).ceil()).max(1);
        let delta = (n_max - n_min) / usize_to_f64(nb_steps);
        Ok((0..=nb_steps)
            .map(|i| usize_to_f64(i).mul_add(delta, n_min))
            .collect())
    }
}
