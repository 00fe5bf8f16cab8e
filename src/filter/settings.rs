//! Global scalar settings of a filter.
use serde::{Deserialize, Serialize};

use crate::{
    abeles::EllipsometerType,
    color::CIE_1931,
    error::{FilmError, FilmResult},
    materials::Material,
    wavelengths::WavelengthSpec,
};

/// Spacing of the discretization levels of mixtures.
///
/// In documents the deposition sentinel is written as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "f64", into = "f64")]
pub enum StepSpacing {
    /// use the deposition step spacing of every mixture
    #[default]
    Deposition,
    /// the same spacing for all mixtures
    Value(f64),
}
impl TryFrom<f64> for StepSpacing {
    type Error = FilmError;
    fn try_from(value: f64) -> FilmResult<Self> {
        #[allow(clippy::float_cmp)]
        if value == -1.0 {
            Ok(Self::Deposition)
        } else if value > 0.0 && value.is_finite() {
            Ok(Self::Value(value))
        } else {
            Err(FilmError::Configuration(format!(
                "step spacing must be positive or -1, got {value}"
            )))
        }
    }
}
impl From<StepSpacing> for f64 {
    fn from(value: StepSpacing) -> Self {
        match value {
            StepSpacing::Deposition => -1.0,
            StepSpacing::Value(v) => v,
        }
    }
}

/// Parameters of the Fourier synthesis method. They are stored with the filter but not used by
/// the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierParameters {
    /// name of the mixture used to realize the index profile
    pub material: String,
    /// name of the Q function
    pub q_function: String,
    /// total optical thickness (nm)
    pub optical_thickness: f64,
}

/// Ellipsometer configuration used to report Delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EllipsometerSettings {
    /// ellipsometer type
    pub ellipsometer_type: EllipsometerType,
    /// lower end of the Delta range (degrees, in `[-360, 360]`)
    pub delta_min: f64,
}
impl EllipsometerSettings {
    fn check(&self) -> FilmResult<()> {
        if !(-360.0..=360.0).contains(&self.delta_min) {
            return Err(FilmError::Configuration(format!(
                "Delta min must lie in [-360, 360], got {}",
                self.delta_min
            )));
        }
        Ok(())
    }
}

fn default_center_wavelength() -> f64 {
    550.0
}
fn default_true() -> bool {
    true
}
fn default_illuminant() -> String {
    "D65".into()
}
fn default_observer() -> String {
    CIE_1931.into()
}
fn default_monitoring_sublayer_thickness() -> f64 {
    1.0
}

/// Global scalar settings of a [`Filter`](crate::filter::Filter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default = "default_center_wavelength")]
    pub(crate) center_wavelength: f64,
    #[serde(default)]
    pub(crate) wavelengths: WavelengthSpec,
    #[serde(default)]
    pub(crate) step_spacing: StepSpacing,
    #[serde(default, alias = "minimum_ot")]
    pub(crate) minimum_thickness: f64,
    #[serde(default)]
    pub(crate) dont_consider_substrate: bool,
    #[serde(default = "default_true")]
    pub(crate) consider_backside: bool,
    #[serde(default = "default_true")]
    pub(crate) consider_backside_on_monitoring: bool,
    #[serde(default)]
    pub(crate) ellipsometer: EllipsometerSettings,
    #[serde(default)]
    pub(crate) monitoring_ellipsometer: EllipsometerSettings,
    #[serde(default = "default_illuminant")]
    pub(crate) illuminant: String,
    #[serde(default = "default_observer")]
    pub(crate) observer: String,
    #[serde(default = "default_monitoring_sublayer_thickness")]
    pub(crate) monitoring_sublayer_thickness: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) needle_materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) fourier: Option<FourierParameters>,
}
impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            center_wavelength: default_center_wavelength(),
            wavelengths: WavelengthSpec::default(),
            step_spacing: StepSpacing::default(),
            minimum_thickness: 0.0,
            dont_consider_substrate: false,
            consider_backside: true,
            consider_backside_on_monitoring: true,
            ellipsometer: EllipsometerSettings::default(),
            monitoring_ellipsometer: EllipsometerSettings::default(),
            illuminant: default_illuminant(),
            observer: default_observer(),
            monitoring_sublayer_thickness: default_monitoring_sublayer_thickness(),
            needle_materials: Vec::new(),
            fourier: None,
        }
    }
}
impl FilterSettings {
    /// Check the value ranges of all settings.
    ///
    /// # Errors
    ///
    /// This function will return an error if any setting is out of range.
    pub fn check(&self) -> FilmResult<()> {
        if !(self.center_wavelength > 0.0 && self.center_wavelength.is_finite()) {
            return Err(FilmError::Configuration(
                "center wavelength must be positive".into(),
            ));
        }
        self.wavelengths.to_wavelength_set()?;
        if !(self.minimum_thickness >= 0.0 && self.minimum_thickness.is_finite()) {
            return Err(FilmError::Configuration(
                "minimum thickness must not be negative".into(),
            ));
        }
        if !(self.monitoring_sublayer_thickness > 0.0
            && self.monitoring_sublayer_thickness.is_finite())
        {
            return Err(FilmError::Configuration(
                "monitoring sublayer thickness must be positive".into(),
            ));
        }
        self.ellipsometer.check()?;
        self.monitoring_ellipsometer.check()?;
        if self.needle_materials.iter().any(Material::is_mixture) {
            return Err(FilmError::Configuration(
                "needle materials must not be mixtures".into(),
            ));
        }
        Ok(())
    }
    /// Center wavelength (nm).
    #[must_use]
    pub const fn center_wavelength(&self) -> f64 {
        self.center_wavelength
    }
    /// Description of the default wavelengths of the filter.
    #[must_use]
    pub const fn wavelengths(&self) -> &WavelengthSpec {
        &self.wavelengths
    }
    /// Step spacing of the mixture discretization.
    #[must_use]
    pub const fn step_spacing(&self) -> StepSpacing {
        self.step_spacing
    }
    /// Layers thinner than this (nm) are removed during refinement.
    #[must_use]
    pub const fn minimum_thickness(&self) -> f64 {
        self.minimum_thickness
    }
    /// The substrate is ignored: the back medium acts as substrate.
    #[must_use]
    pub const fn dont_consider_substrate(&self) -> bool {
        self.dont_consider_substrate
    }
    /// The backside of the substrate contributes (incoherently) to the analysis.
    #[must_use]
    pub const fn consider_backside(&self) -> bool {
        self.consider_backside
    }
    /// The backside of the substrate contributes to monitoring curves.
    #[must_use]
    pub const fn consider_backside_on_monitoring(&self) -> bool {
        self.consider_backside_on_monitoring
    }
    /// Ellipsometer used for the analysis.
    #[must_use]
    pub const fn ellipsometer(&self) -> EllipsometerSettings {
        self.ellipsometer
    }
    /// Ellipsometer used for monitoring.
    #[must_use]
    pub const fn monitoring_ellipsometer(&self) -> EllipsometerSettings {
        self.monitoring_ellipsometer
    }
    /// Name of the illuminant used for colors.
    #[must_use]
    pub fn illuminant(&self) -> &str {
        &self.illuminant
    }
    /// Name of the observer used for colors.
    #[must_use]
    pub fn observer(&self) -> &str {
        &self.observer
    }
    /// Sublayer thickness (nm) of monitoring curves.
    #[must_use]
    pub const fn monitoring_sublayer_thickness(&self) -> f64 {
        self.monitoring_sublayer_thickness
    }
    /// Materials considered by the needle method. Empty means all materials of the front stack.
    #[must_use]
    pub fn needle_materials(&self) -> &[Material] {
        &self.needle_materials
    }
    /// Fourier method parameters.
    #[must_use]
    pub const fn fourier(&self) -> Option<&FourierParameters> {
        self.fourier.as_ref()
    }
}
