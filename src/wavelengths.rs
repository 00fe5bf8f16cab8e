#![warn(missing_docs)]
//! Ordered sets of wavelengths used as the sampling grid of every calculation.
use crate::error::{FilmError, FilmResult};
use crate::utils::usize_to_f64;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use uom::si::{f64::Length, length::nanometer};

/// An ordered, non-empty list of positive wavelengths (in nm).
///
/// A [`WavelengthSet`] is used as cache key for refractive indices and monitoring matrices. It is
/// therefore immutable once created. Equality is element-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WavelengthSet {
    wavelengths: Vec<f64>,
}
impl WavelengthSet {
    /// Creates a new [`WavelengthSet`] from a list of wavelengths given in nm.
    ///
    /// # Errors
    ///
    /// This function will return an [`FilmError::Spectrum`] if
    ///   - the list is empty
    ///   - any wavelength is not positive or not finite
    pub fn new(wavelengths: Vec<f64>) -> FilmResult<Self> {
        if wavelengths.is_empty() {
            return Err(FilmError::Spectrum(
                "wavelength set must not be empty".into(),
            ));
        }
        if wavelengths.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(FilmError::Spectrum(
                "wavelengths must be positive and finite".into(),
            ));
        }
        Ok(Self { wavelengths })
    }
    /// Creates a set containing a single wavelength.
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelength is not positive and finite.
    pub fn single(wavelength: Length) -> FilmResult<Self> {
        Self::new(vec![wavelength.get::<nanometer>()])
    }
    /// Create an equidistant [`WavelengthSet`] covering the given range (both limits included).
    ///
    /// # Errors
    ///
    /// This function will return an [`FilmError::Spectrum`] if
    ///   - the wavelength range is not in ascending order
    ///   - the wavelength limits are not both positive
    ///   - the resolution is not positive
    pub fn from_range(range: Range<Length>, resolution: Length) -> FilmResult<Self> {
        Self::from_range_nm(
            range.start.get::<nanometer>(),
            range.end.get::<nanometer>(),
            resolution.get::<nanometer>(),
        )
    }
    /// Same as [`WavelengthSet::from_range`] with plain values in nm.
    ///
    /// # Errors
    ///
    /// See [`WavelengthSet::from_range`].
    pub fn from_range_nm(from: f64, to: f64, by: f64) -> FilmResult<Self> {
        if by <= 0.0 || !by.is_finite() {
            return Err(FilmError::Spectrum("resolution must be positive".into()));
        }
        if from >= to {
            return Err(FilmError::Spectrum(
                "wavelength range must be in ascending order and not empty".into(),
            ));
        }
        if from <= 0.0 {
            return Err(FilmError::Spectrum(
                "wavelength range limits must both be positive".into(),
            ));
        }
        // a small tolerance keeps the upper limit when (to - from) is a multiple of by
        let number_of_steps = crate::utils::f64_to_usize(((to - from) / by + 1e-9).floor());
        let wavelengths = (0..=number_of_steps)
            .map(|i| usize_to_f64(i).mul_add(by, from))
            .collect();
        Self::new(wavelengths)
    }
    /// Return a set with the three wavelengths `λ(1-δ)`, `λ`, `λ(1+δ)` for every entry.
    ///
    /// This is the sampling used for finite difference group delay calculations.
    #[must_use]
    pub fn expanded_for_derivative(&self, relative_step: f64) -> Self {
        let wavelengths = self
            .wavelengths
            .iter()
            .flat_map(|w| [w * (1.0 - relative_step), *w, w * (1.0 + relative_step)])
            .collect();
        Self { wavelengths }
    }
    /// Number of wavelengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }
    /// Always `false`. A [`WavelengthSet`] cannot be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
    /// Returns the wavelengths (in nm) as slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.wavelengths
    }
    /// Returns the iterator of this [`WavelengthSet`].
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.wavelengths.iter()
    }
    /// Return the wavelength at position `i` (in nm).
    #[must_use]
    pub fn get(&self, i: usize) -> Option<f64> {
        self.wavelengths.get(i).copied()
    }
}
impl TryFrom<Vec<f64>> for WavelengthSet {
    type Error = FilmError;
    fn try_from(value: Vec<f64>) -> FilmResult<Self> {
        Self::new(value)
    }
}
impl From<WavelengthSet> for Vec<f64> {
    fn from(value: WavelengthSet) -> Self {
        value.wavelengths
    }
}
impl<'a> IntoIterator for &'a WavelengthSet {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;
    fn into_iter(self) -> Self::IntoIter {
        self.wavelengths.iter()
    }
}

/// The way the wavelengths of a filter are described in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WavelengthSpec {
    /// An explicit list of wavelengths (nm).
    List(Vec<f64>),
    /// An equidistant range `from..=to` with spacing `by` (all in nm).
    Range {
        /// first wavelength
        from: f64,
        /// last wavelength
        to: f64,
        /// spacing
        by: f64,
    },
}
impl Default for WavelengthSpec {
    fn default() -> Self {
        Self::Range {
            from: 400.0,
            to: 700.0,
            by: 1.0,
        }
    }
}
impl WavelengthSpec {
    /// Build the [`WavelengthSet`] described here.
    ///
    /// # Errors
    ///
    /// This function will return an error if the described set is invalid.
    pub fn to_wavelength_set(&self) -> FilmResult<WavelengthSet> {
        match self {
            Self::List(list) => WavelengthSet::new(list.clone()),
            Self::Range { from, to, by } => WavelengthSet::from_range_nm(*from, *to, *by),
        }
    }
}
