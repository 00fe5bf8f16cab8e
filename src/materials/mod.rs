//! Module for handling the (complex) refractive index of optical materials.
//!
//! The core only relies on a small contract: a material yields an [`Index`] curve for a
//! [`WavelengthSet`], and mixtures additionally yield `dN/dn` and their valid index range.
#![warn(missing_docs)]
use std::fmt::Display;

use num::complex::Complex64;
use serde::{Deserialize, Serialize};

pub mod cauchy;
pub mod constant;
pub mod mixture;
pub mod sellmeier;
pub mod table;

pub use cauchy::CauchyDispersion;
pub use constant::ConstantDispersion;
pub use mixture::{Mixture, MixtureKind};
pub use sellmeier::SellmeierDispersion;
pub use table::TableDispersion;

use crate::{
    error::{FilmError, FilmResult},
    index::Index,
    wavelengths::WavelengthSet,
};

/// hc in eV·nm
const PHOTON_ENERGY_FACTOR: f64 = 1_239.841_984;

pub(crate) const fn default_edge() -> f64 {
    400.0
}

/// Urbach absorption tail `Ak·exp(exponent·(E - E_edge))`, photon energies in eV.
pub(crate) fn urbach_extinction(ak: f64, exponent: f64, edge: f64, wavelength: f64) -> f64 {
    if ak == 0.0 {
        return 0.0;
    }
    let energy = PHOTON_ENERGY_FACTOR / wavelength;
    let edge_energy = PHOTON_ENERGY_FACTOR / edge;
    ak * f64::exp(exponent * (energy - edge_energy))
}

/// All dispersion models must implement this trait.
pub trait DispersionModel {
    /// Get the complex refractive index `n - i·k` at the given wavelength (in nm).
    fn complex_index(&self, wavelength: f64) -> Complex64;
    /// Create a corresponding [`Dispersion`] value.
    fn to_enum(&self) -> Dispersion;
}

/// Available models for the calculation of a (non-mixture) refractive index
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "model")]
pub enum Dispersion {
    /// Trivial model returning a wavelength-independant constant
    Constant(ConstantDispersion),
    /// Tabulated data
    Table(TableDispersion),
    /// Cauchy model
    Cauchy(CauchyDispersion),
    /// Sellmeier model
    Sellmeier(SellmeierDispersion),
}
impl Dispersion {
    /// Get the complex refractive index at the given wavelength (in nm).
    #[must_use]
    pub fn complex_index(&self, wavelength: f64) -> Complex64 {
        match self {
            Self::Constant(d) => d.complex_index(wavelength),
            Self::Table(d) => d.complex_index(wavelength),
            Self::Cauchy(d) => d.complex_index(wavelength),
            Self::Sellmeier(d) => d.complex_index(wavelength),
        }
    }
}
impl Display for Dispersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(_) => write!(f, "Constant"),
            Self::Table(_) => write!(f, "Table"),
            Self::Cauchy(_) => write!(f, "Cauchy equation"),
            Self::Sellmeier(_) => write!(f, "Sellmeier equation"),
        }
    }
}

/// The optical model of a [`Material`].
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum MaterialKind {
    /// a material with a fixed dispersion
    Simple(Dispersion),
    /// a mixture whose index can be tuned
    Mixture(Mixture),
}

/// A named optical material.
///
/// Materials are identified by name inside a filter: two materials with the same name are assumed
/// to be identical.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Material {
    name: String,
    kind: MaterialKind,
}
impl Material {
    /// Creates a new [`Material`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the name is empty or contains whitespace.
    pub fn new(name: &str, kind: MaterialKind) -> FilmResult<Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(FilmError::Material(format!(
                "invalid material name '{name}'"
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            kind,
        })
    }
    /// Convenience constructor for a non-absorbing material with a constant index.
    ///
    /// # Errors
    ///
    /// This function will return an error if the name or the index is invalid.
    pub fn constant(name: &str, n: f64) -> FilmResult<Self> {
        Self::new(
            name,
            MaterialKind::Simple(Dispersion::Constant(ConstantDispersion::new(n, 0.0)?)),
        )
    }
    /// Returns the name of this [`Material`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns the kind of this [`Material`].
    #[must_use]
    pub const fn kind(&self) -> &MaterialKind {
        &self.kind
    }
    /// Returns `true` if this [`Material`] is a mixture.
    #[must_use]
    pub const fn is_mixture(&self) -> bool {
        matches!(self.kind, MaterialKind::Mixture(_))
    }
    /// Returns the mixture of this [`Material`] (if it is one).
    #[must_use]
    pub const fn as_mixture(&self) -> Option<&Mixture> {
        match &self.kind {
            MaterialKind::Mixture(m) => Some(m),
            MaterialKind::Simple(_) => None,
        }
    }
    fn mixture(&self) -> FilmResult<&Mixture> {
        self.as_mixture().ok_or_else(|| {
            FilmError::Material(format!("material '{}' is not a mixture", self.name))
        })
    }
    /// The index of a non-mixture material at a single wavelength.
    ///
    /// # Errors
    ///
    /// This function will return an error for mixtures, which need an index value.
    pub fn index_at(&self, wavelength: f64) -> FilmResult<Complex64> {
        match &self.kind {
            MaterialKind::Simple(d) => Ok(d.complex_index(wavelength)),
            MaterialKind::Mixture(_) => Err(FilmError::Material(format!(
                "mixture '{}' needs an index value",
                self.name
            ))),
        }
    }
    /// The index curve of a non-mixture material.
    ///
    /// # Errors
    ///
    /// This function will return an error for mixtures, which need an index value.
    pub fn get_n(&self, wavelengths: &WavelengthSet) -> FilmResult<Index> {
        match &self.kind {
            MaterialKind::Simple(d) => Ok(wavelengths.iter().map(|w| d.complex_index(*w)).collect()),
            MaterialKind::Mixture(_) => Err(FilmError::Material(format!(
                "mixture '{}' needs an index value",
                self.name
            ))),
        }
    }
    /// The index curve of the material, using `index` (center index) for mixtures.
    ///
    /// # Errors
    ///
    /// This function will return an error if a mixture is given no index or an invalid one.
    pub fn index_curve(
        &self,
        wavelengths: &WavelengthSet,
        center_wavelength: f64,
        index: Option<f64>,
    ) -> FilmResult<Index> {
        match (&self.kind, index) {
            (MaterialKind::Simple(_), _) => self.get_n(wavelengths),
            (MaterialKind::Mixture(m), Some(n)) => m.index_curve(wavelengths, center_wavelength, n),
            (MaterialKind::Mixture(_), None) => Err(FilmError::Material(format!(
                "mixture '{}' needs an index value",
                self.name
            ))),
        }
    }
    /// `dN/dn` of a mixture (see [`Mixture::index_derivative`]).
    ///
    /// # Errors
    ///
    /// This function will return an error if the material is not a mixture or `n` is invalid.
    pub fn index_derivative(
        &self,
        wavelengths: &WavelengthSet,
        center_wavelength: f64,
        n: f64,
    ) -> FilmResult<Index> {
        self.mixture()?
            .index_derivative(wavelengths, center_wavelength, n)
    }
    /// Valid index range `(n_min, n_max)` at the center wavelength.
    ///
    /// For non-mixtures both values are the real index at the center wavelength.
    #[must_use]
    pub fn index_range(&self, center_wavelength: f64) -> (f64, f64) {
        match &self.kind {
            MaterialKind::Simple(d) => {
                let n = d.complex_index(center_wavelength).re;
                (n, n)
            }
            MaterialKind::Mixture(m) => m.index_range(center_wavelength),
        }
    }
    /// Check the monotonicity of a mixture. Non-mixtures are always valid.
    #[must_use]
    pub fn check_monotonicity(&self, center_wavelength: f64) -> bool {
        match &self.kind {
            MaterialKind::Simple(_) => true,
            MaterialKind::Mixture(m) => m.check_monotonicity(center_wavelength),
        }
    }
    /// The real index at the center wavelength, using `index` for mixtures.
    ///
    /// # Errors
    ///
    /// This function will return an error if a mixture is given no index.
    pub fn center_index(&self, center_wavelength: f64, index: Option<f64>) -> FilmResult<f64> {
        match (&self.kind, index) {
            (MaterialKind::Simple(d), _) => Ok(d.complex_index(center_wavelength).re),
            (MaterialKind::Mixture(_), Some(n)) => Ok(n),
            (MaterialKind::Mixture(_), None) => Err(FilmError::Material(format!(
                "mixture '{}' needs an index value",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    fn mixture() -> Material {
        Material::new(
            "SiO2-Ta2O5",
            MaterialKind::Mixture(
                Mixture::new(
                    vec![0.0, 1.0],
                    MixtureKind::Constant(vec![
                        ConstantDispersion::new(1.45, 0.0).unwrap(),
                        ConstantDispersion::new(2.1, 0.0).unwrap(),
                    ]),
                )
                .unwrap(),
            ),
        )
        .unwrap()
    }
    #[test]
    fn new() {
        assert!(Material::new("", MaterialKind::Simple(Dispersion::Constant(ConstantDispersion::new(1.5, 0.0).unwrap()))).is_err());
        assert!(Material::constant("bad name", 1.5).is_err());
        let glass = Material::constant("glass", 1.5).unwrap();
        assert_eq!(glass.name(), "glass");
        assert!(!glass.is_mixture());
        assert!(glass.as_mixture().is_none());
    }
    #[test]
    fn simple_index() {
        let glass = Material::constant("glass", 1.5).unwrap();
        let wavelengths = WavelengthSet::new(vec![400.0, 500.0]).unwrap();
        assert_eq!(glass.get_n(&wavelengths).unwrap().len(), 2);
        assert_abs_diff_eq!(glass.index_at(500.0).unwrap().re, 1.5);
        assert_eq!(glass.index_range(550.0), (1.5, 1.5));
        assert!(glass.check_monotonicity(550.0));
        assert!(glass.index_derivative(&wavelengths, 550.0, 1.5).is_err());
        assert_abs_diff_eq!(glass.center_index(550.0, None).unwrap(), 1.5);
    }
    #[test]
    fn mixture_index() {
        let mix = mixture();
        let wavelengths = WavelengthSet::new(vec![400.0, 500.0]).unwrap();
        assert!(mix.is_mixture());
        assert!(mix.get_n(&wavelengths).is_err());
        assert!(mix.index_at(500.0).is_err());
        assert!(mix.index_curve(&wavelengths, 550.0, None).is_err());
        let curve = mix.index_curve(&wavelengths, 550.0, Some(1.8)).unwrap();
        assert_abs_diff_eq!(curve[1].re, 1.8, epsilon = 1e-12);
        assert!(mix.center_index(550.0, None).is_err());
        assert_eq!(mix.index_range(550.0), (1.45, 2.1));
    }
    #[test]
    fn urbach() {
        assert_abs_diff_eq!(urbach_extinction(0.0, 1.0, 400.0, 300.0), 0.0);
        assert_abs_diff_eq!(urbach_extinction(0.1, 1.0, 400.0, 400.0), 0.1);
    }
    #[test]
    fn display() {
        assert_eq!(
            format!("{}", Dispersion::Constant(ConstantDispersion::new(1.5, 0.0).unwrap())),
            "Constant"
        );
        assert_eq!(
            format!("{}", Dispersion::Cauchy(CauchyDispersion::new(1.5, 0.0, 0.0))),
            "Cauchy equation"
        );
    }
    #[test]
    fn yaml() {
        let material: Material =
            serde_yaml::from_str("name: glass\nkind: !Simple\n  model: Constant\n  n: 1.5").unwrap();
        assert_eq!(material, Material::constant("glass", 1.5).unwrap());
        let yaml = serde_yaml::to_string(&mixture()).unwrap();
        assert_eq!(serde_yaml::from_str::<Material>(&yaml).unwrap(), mixture());
    }
}
