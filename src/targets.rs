#![warn(missing_docs)]
//! Optimization targets.
//!
//! A [`Target`] asks a [`Quantity`] of the filter, seen under a given [`Illumination`], to reach
//! (or stay below / above) prescribed values within a tolerance. Targets are either a single
//! wavelength, a spectrum or the three tristimulus values of a color.
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use uom::si::{
    f64::{Angle, Length},
    length::nanometer,
};

use crate::{
    abeles::{Direction, Polarization},
    color::Colorimeter,
    error::{FilmError, FilmResult},
    filter::{analysis::Measurement, Coefficient, Filter, Illumination, Quantity},
    spectrum::Spectrum,
    wavelengths::WavelengthSet,
};

/// How the calculated values are compared to the target values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumIter, Display)]
pub enum Inequality {
    /// the values should be equal
    #[default]
    Equal,
    /// the calculated values should not exceed the target
    Smaller,
    /// the calculated values should not fall below the target
    Larger,
}
impl Inequality {
    /// Residual `calculated - target` once the inequality is taken into account. Satisfied
    /// inequalities have no residual.
    #[must_use]
    pub fn residual(self, calculated: f64, target: f64) -> f64 {
        let difference = calculated - target;
        match self {
            Self::Smaller if difference <= 0.0 => 0.0,
            Self::Larger if difference >= 0.0 => 0.0,
            _ => difference,
        }
    }
}

/// Values of a [`Target`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetValues {
    /// a value at a single wavelength (nm)
    Discrete {
        /// wavelength (nm)
        wavelength: f64,
        /// target value
        value: f64,
        /// tolerance
        tolerance: f64,
    },
    /// values at several wavelengths
    Spectrum {
        /// wavelengths (nm, ascending)
        wavelengths: Vec<f64>,
        /// target values
        values: Vec<f64>,
        /// tolerances
        tolerances: Vec<f64>,
    },
    /// tristimulus values `X, Y, Z`
    Color {
        /// target tristimulus values
        xyz: [f64; 3],
        /// tolerances
        tolerances: [f64; 3],
    },
}

/// An optimization target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    quantity: Quantity,
    values: TargetValues,
    #[serde(default)]
    inequality: Inequality,
    #[serde(default)]
    illumination: Illumination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    observer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    illuminant: Option<String>,
}
impl Target {
    fn with_values(quantity: Quantity, values: TargetValues) -> FilmResult<Self> {
        let target = Self {
            quantity,
            values,
            inequality: Inequality::default(),
            illumination: Illumination::default(),
            observer: None,
            illuminant: None,
        };
        target.check_values()?;
        Ok(target)
    }
    /// Creates a target at a single wavelength, seen with unpolarized light at normal incidence.
    ///
    /// Phase, group delay and GDD targets still need a polarization (see
    /// [`Target::with_polarization`]) before they pass [`Target::validate`].
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the quantity is a color
    ///   - the wavelength or the tolerance is not positive
    pub fn discrete(
        quantity: Quantity,
        wavelength: Length,
        value: f64,
        tolerance: f64,
    ) -> FilmResult<Self> {
        Self::with_values(
            quantity,
            TargetValues::Discrete {
                wavelength: wavelength.get::<nanometer>(),
                value,
                tolerance,
            },
        )
    }
    /// Creates a spectral target. `tolerances` holds one tolerance per point of `spectrum`.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the quantity is a color
    ///   - the number of tolerances does not match the spectrum
    ///   - a tolerance is not positive
    pub fn spectrum(quantity: Quantity, spectrum: &Spectrum, tolerances: Vec<f64>) -> FilmResult<Self> {
        Self::with_values(
            quantity,
            TargetValues::Spectrum {
                wavelengths: spectrum.wavelengths(),
                values: spectrum.values(),
                tolerances,
            },
        )
    }
    /// Creates a color target on the tristimulus values of reflected or transmitted light.
    ///
    /// # Errors
    ///
    /// This function will return an error if a tolerance is not positive.
    pub fn color(coefficient: Coefficient, xyz: [f64; 3], tolerances: [f64; 3]) -> FilmResult<Self> {
        Self::with_values(
            Quantity::Color(coefficient),
            TargetValues::Color { xyz, tolerances },
        )
    }
    /// Read a spectral target from a CSV file `λ;value[;tolerance]`.
    ///
    /// Lines without tolerance use `default_tolerance`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file cannot be read or the target is invalid.
    pub fn from_csv(quantity: Quantity, path: &Path, default_tolerance: f64) -> FilmResult<Self> {
        let (spectrum, tolerances) = Spectrum::from_csv_with_tolerances(path)?;
        let tolerances = tolerances.unwrap_or_else(|| vec![default_tolerance; spectrum.len()]);
        debug!(
            "read {} target points from {}",
            spectrum.len(),
            path.display()
        );
        Self::spectrum(quantity, &spectrum, tolerances)
    }
    /// Use the given inequality.
    #[must_use]
    pub const fn with_inequality(mut self, inequality: Inequality) -> Self {
        self.inequality = inequality;
        self
    }
    /// Use the given illumination.
    ///
    /// # Errors
    ///
    /// This function will return an error if a phase related target gets a mixed polarization.
    pub fn with_illumination(mut self, illumination: Illumination) -> FilmResult<Self> {
        self.illumination = illumination;
        self.validate()?;
        Ok(self)
    }
    /// Use the given angle of incidence.
    #[must_use]
    pub const fn with_angle(mut self, angle: Angle) -> Self {
        self.illumination.angle = angle;
        self
    }
    /// Use the given polarization.
    ///
    /// # Errors
    ///
    /// This function will return an error if a phase related target gets a mixed polarization.
    pub fn with_polarization(mut self, polarization: Polarization) -> FilmResult<Self> {
        self.illumination.polarization = polarization;
        self.validate()?;
        Ok(self)
    }
    /// Use the given direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.illumination.direction = direction;
        self
    }
    /// Use a specific observer and illuminant instead of those of the filter (colors only).
    #[must_use]
    pub fn with_colorimeter(mut self, observer: &str, illuminant: &str) -> Self {
        if !self.quantity.is_color() {
            warn!("observer and illuminant ignored by a {} target", self.quantity);
        }
        self.observer = Some(observer.to_owned());
        self.illuminant = Some(illuminant.to_owned());
        self
    }
    /// Check the consistency of the target.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - color quantities and color values are not used together
    ///   - lengths of wavelengths, values and tolerances differ or are zero
    ///   - a wavelength or a tolerance is not positive
    ///   - a phase related quantity is combined with a mixed polarization
    pub fn validate(&self) -> FilmResult<()> {
        self.check_values()?;
        if self.quantity.needs_single_mode() && self.illumination.polarization.single_mode().is_none()
        {
            return Err(FilmError::Configuration(format!(
                "{} targets need s or p polarization",
                self.quantity
            )));
        }
        Ok(())
    }
    /// Check the target values, whatever the illumination.
    fn check_values(&self) -> FilmResult<()> {
        let positive = |values: &[f64], what: &str| {
            if values.iter().all(|v| *v > 0.0 && v.is_finite()) {
                Ok(())
            } else {
                Err(FilmError::Configuration(format!(
                    "target {what} must be positive"
                )))
            }
        };
        match &self.values {
            TargetValues::Color { tolerances, .. } => {
                if !self.quantity.is_color() {
                    return Err(FilmError::Configuration(format!(
                        "color values given for a {} target",
                        self.quantity
                    )));
                }
                positive(tolerances, "tolerances")?;
            }
            _ if self.quantity.is_color() => {
                return Err(FilmError::Configuration(
                    "color targets need tristimulus values".into(),
                ));
            }
            TargetValues::Discrete {
                wavelength,
                tolerance,
                ..
            } => {
                positive(&[*wavelength], "wavelengths")?;
                positive(&[*tolerance], "tolerances")?;
            }
            TargetValues::Spectrum {
                wavelengths,
                values,
                tolerances,
            } => {
                if wavelengths.is_empty()
                    || wavelengths.len() != values.len()
                    || wavelengths.len() != tolerances.len()
                {
                    return Err(FilmError::Configuration(
                        "target needs one value and one tolerance per wavelength".into(),
                    ));
                }
                WavelengthSet::new(wavelengths.clone())?;
                positive(tolerances, "tolerances")?;
            }
        }
        Ok(())
    }
    /// Returns the quantity of this [`Target`].
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }
    /// Returns the inequality of this [`Target`].
    #[must_use]
    pub const fn inequality(&self) -> Inequality {
        self.inequality
    }
    /// Returns the illumination of this [`Target`].
    #[must_use]
    pub const fn illumination(&self) -> &Illumination {
        &self.illumination
    }
    /// Returns the raw values of this [`Target`].
    #[must_use]
    pub const fn target_values(&self) -> &TargetValues {
        &self.values
    }
    /// Number of values of this [`Target`].
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.values {
            TargetValues::Discrete { .. } => 1,
            TargetValues::Spectrum { values, .. } => values.len(),
            TargetValues::Color { .. } => 3,
        }
    }
    /// Returns `true` if the target holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The target values.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        match &self.values {
            TargetValues::Discrete { value, .. } => vec![*value],
            TargetValues::Spectrum { values, .. } => values.clone(),
            TargetValues::Color { xyz, .. } => xyz.to_vec(),
        }
    }
    /// The tolerances of the target values.
    #[must_use]
    pub fn tolerances(&self) -> Vec<f64> {
        match &self.values {
            TargetValues::Discrete { tolerance, .. } => vec![*tolerance],
            TargetValues::Spectrum { tolerances, .. } => tolerances.clone(),
            TargetValues::Color { tolerances, .. } => tolerances.to_vec(),
        }
    }
    /// The wavelengths of the target (`None` for colors).
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelengths are invalid.
    pub fn wavelengths(&self) -> FilmResult<Option<WavelengthSet>> {
        match &self.values {
            TargetValues::Discrete { wavelength, .. } => {
                Ok(Some(WavelengthSet::new(vec![*wavelength])?))
            }
            TargetValues::Spectrum { wavelengths, .. } => {
                Ok(Some(WavelengthSet::new(wavelengths.clone())?))
            }
            TargetValues::Color { .. } => Ok(None),
        }
    }
    fn colorimeter(&self, filter: &Filter) -> FilmResult<Option<Colorimeter>> {
        if !self.quantity.is_color() {
            return Ok(None);
        }
        let settings = filter.settings();
        let observer = self.observer.as_deref().unwrap_or_else(|| settings.observer());
        let illuminant = self
            .illuminant
            .as_deref()
            .unwrap_or_else(|| settings.illuminant());
        Colorimeter::builtin(observer, illuminant).map(Some)
    }
    /// The evaluation of this target on `filter`.
    pub(crate) fn measurement(&self, filter: &Filter) -> FilmResult<Measurement> {
        let colorimeter = self.colorimeter(filter)?;
        let wavelengths = match (self.wavelengths()?, &colorimeter) {
            (Some(wavelengths), _) => wavelengths,
            (None, Some(colorimeter)) => colorimeter.wavelengths().clone(),
            (None, None) => {
                return Err(FilmError::Configuration(
                    "target without wavelengths".into(),
                ))
            }
        };
        Measurement::new(
            self.quantity,
            self.illumination.polarization,
            &wavelengths,
            colorimeter,
        )
    }
}

/// Merit function `χ² = Σ (residual/tolerance)² / m` of a set of calculated values.
#[must_use]
pub fn chi_2(
    calculated: &[f64],
    targets: &[f64],
    tolerances: &[f64],
    inequalities: &[Inequality],
) -> f64 {
    if calculated.is_empty() {
        return 0.0;
    }
    let sum: f64 = calculated
        .iter()
        .zip(targets)
        .zip(tolerances)
        .zip(inequalities)
        .map(|(((c, t), dt), inequality)| (inequality.residual(*c, *t) / dt).powi(2))
        .sum();
    sum / crate::utils::usize_to_f64(calculated.len())
}

impl Filter {
    /// Values of the target quantity calculated on this filter.
    ///
    /// # Errors
    ///
    /// This function will return an error if the target cannot be evaluated (see
    /// [`Filter::analyse`]).
    pub fn evaluate_target(&mut self, target: &Target) -> FilmResult<Vec<f64>> {
        let measurement = target.measurement(self)?;
        self.measure(&measurement, target.illumination())
    }
    /// Merit function of this filter for a set of targets.
    ///
    /// # Errors
    ///
    /// This function will return an error if a target cannot be evaluated.
    pub fn merit_function(&mut self, targets: &[Target]) -> FilmResult<f64> {
        let mut calculated = Vec::new();
        let mut values = Vec::new();
        let mut tolerances = Vec::new();
        let mut inequalities = Vec::new();
        for target in targets {
            calculated.extend(self.evaluate_target(target)?);
            values.extend(target.values());
            tolerances.extend(target.tolerances());
            inequalities.extend(std::iter::repeat(target.inequality()).take(target.len()));
        }
        Ok(chi_2(&calculated, &values, &tolerances, &inequalities))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::test_filters,
        nanometer,
        utils::test_helper::test_helper::{check_no_warnings, check_warnings},
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn inequality_residuals() {
        assert_eq!(Inequality::Equal.residual(0.4, 0.5), 0.4 - 0.5);
        assert_eq!(Inequality::Smaller.residual(0.4, 0.5), 0.0);
        assert_abs_diff_eq!(Inequality::Smaller.residual(0.6, 0.5), 0.1, epsilon = 1e-12);
        assert_eq!(Inequality::Larger.residual(0.6, 0.5), 0.0);
        assert_abs_diff_eq!(Inequality::Larger.residual(0.4, 0.5), -0.1, epsilon = 1e-12);
    }
    #[test]
    fn colorimeter_of_spectral_target_warns() {
        testing_logger::setup();
        let target = Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.0, 0.01)
            .unwrap()
            .with_colorimeter("CIE-1931", "D65");
        assert!(target.validate().is_ok());
        check_warnings(vec!["observer and illuminant ignored by a Reflection target"]);
        testing_logger::setup();
        let _ = Target::color(Coefficient::Reflection, [20.0, 20.0, 20.0], [1.0, 1.0, 1.0])
            .unwrap()
            .with_colorimeter("CIE-1931", "D65");
        check_no_warnings();
    }
    #[test]
    fn constructors() {
        let target =
            Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.0, 0.01).unwrap();
        assert_eq!(target.len(), 1);
        assert_eq!(target.values(), vec![0.0]);
        assert_eq!(
            target.wavelengths().unwrap().unwrap().as_slice(),
            &[550.0]
        );
        assert!(Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.0, 0.0).is_err());
        assert!(Target::discrete(
            Quantity::Color(Coefficient::Reflection),
            nanometer!(550.0),
            0.0,
            0.1
        )
        .is_err());
        let color = Target::color(Coefficient::Transmission, [95.0, 100.0, 108.0], [1.0; 3]).unwrap();
        assert_eq!(color.len(), 3);
        assert!(color.wavelengths().unwrap().is_none());
        assert_matches!(
            Target::color(Coefficient::Transmission, [0.0; 3], [1.0, 0.0, 1.0]),
            Err(FilmError::Configuration(_))
        );
        let phase = Target::discrete(
            Quantity::Phase(Coefficient::Reflection),
            nanometer!(600.0),
            180.0,
            1.0,
        )
        .unwrap();
        assert!(phase.clone().with_polarization(Polarization::Unpolarized).is_err());
        assert!(phase.with_polarization(Polarization::S).is_ok());
    }
    #[test]
    fn phase_targets_need_a_single_mode() {
        for quantity in [
            Quantity::Phase(Coefficient::Transmission),
            Quantity::GroupDelay(Coefficient::Reflection),
            Quantity::GroupDelayDispersion(Coefficient::Reflection),
        ] {
            let target = Target::discrete(quantity, nanometer!(800.0), 10.0, 1.0).unwrap();
            assert_eq!(
                target.illumination().polarization,
                Polarization::Unpolarized
            );
            assert_matches!(target.validate(), Err(FilmError::Configuration(_)));
            assert!(target
                .clone()
                .with_polarization(Polarization::Unpolarized)
                .is_err());
            for mode in [Polarization::S, Polarization::P] {
                let polarized = target.clone().with_polarization(mode).unwrap();
                assert!(polarized.validate().is_ok());
            }
        }
        let spectrum = Spectrum::from_pairs(vec![(700.0, 5.0), (800.0, 6.0)]).unwrap();
        let target = Target::spectrum(
            Quantity::GroupDelay(Coefficient::Transmission),
            &spectrum,
            vec![0.5, 0.5],
        )
        .unwrap()
        .with_polarization(Polarization::P)
        .unwrap();
        assert!(target.validate().is_ok());
    }
    #[test]
    fn spectral_target() {
        let spectrum = Spectrum::from_pairs(vec![(500.0, 0.9), (600.0, 0.95)]).unwrap();
        assert!(Target::spectrum(Quantity::Transmission, &spectrum, vec![0.01]).is_err());
        let target =
            Target::spectrum(Quantity::Transmission, &spectrum, vec![0.01, 0.02]).unwrap();
        assert_eq!(target.tolerances(), vec![0.01, 0.02]);
        assert_eq!(target.len(), 2);
    }
    #[test]
    fn from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "400;0.1\n500;0.2\n600;0.3").unwrap();
        let target = Target::from_csv(Quantity::Reflection, file.path(), 0.05).unwrap();
        assert_eq!(target.values(), vec![0.1, 0.2, 0.3]);
        assert_eq!(target.tolerances(), vec![0.05; 3]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "400;0.1;0.5\n500;0.2;0.25").unwrap();
        let target = Target::from_csv(Quantity::Reflection, file.path(), 0.05).unwrap();
        assert_eq!(target.tolerances(), vec![0.5, 0.25]);
    }
    #[test]
    fn serde() {
        let target = Target::discrete(Quantity::GroupDelay(Coefficient::Reflection), nanometer!(800.0), 10.0, 1.0)
            .unwrap()
            .with_inequality(Inequality::Smaller)
            .with_polarization(Polarization::P)
            .unwrap();
        let yaml = serde_yaml::to_string(&target).unwrap();
        let read: Target = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(read, target);
    }
    #[test]
    fn merit_function() {
        let mut filter = test_filters::bare(1.5);
        filter.set_consider_backside(false);
        let r = 0.04;
        let exact = Target::discrete(Quantity::Reflection, nanometer!(550.0), r, 0.01).unwrap();
        assert_abs_diff_eq!(filter.evaluate_target(&exact).unwrap()[0], r, epsilon = 1e-12);
        assert_abs_diff_eq!(filter.merit_function(&[exact]).unwrap(), 0.0, epsilon = 1e-12);
        let off = Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.0, 0.01).unwrap();
        assert_abs_diff_eq!(filter.merit_function(&[off.clone()]).unwrap(), 16.0, epsilon = 1e-9);
        let satisfied = off.with_inequality(Inequality::Larger);
        assert_abs_diff_eq!(filter.merit_function(&[satisfied]).unwrap(), 0.0, epsilon = 1e-12);
    }
    #[test]
    fn color_target_uses_its_colorimeter() {
        let mut filter = test_filters::bare(1.5);
        let target = Target::color(Coefficient::Transmission, [0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(filter.evaluate_target(&target).unwrap().len(), 3);
        let unknown = target.with_colorimeter("nobody", "D65");
        assert!(filter.evaluate_target(&unknown).is_err());
    }
}
