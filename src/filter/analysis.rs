//! Spectrophotometric, phase, ellipsometric and color analysis of a [`Filter`].
//!
//! Every quantity is computed from a [`FaceChain`]: the coated faces met by the light for a given
//! incidence angle and direction. The global matrices of both faces are cached per incidence
//! condition by the filter, so repeated analyses at the same angle only redo the (cheap) boundary
//! calculations.
use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use uom::si::{angle::degree, f64::Angle};

use super::{Filter, Side};
use crate::{
    abeles::{
        ellipso::normalize_delta,
        mix_modes,
        phase::{
            d_group_delay, d_group_delay_dispersion, d_phase, group_delay,
            group_delay_dispersion, phase, RELATIVE_WAVELENGTH_STEP,
        },
        spectro::substrate_transmission,
        Admittance, Amplitudes, CharacteristicMatrix, Direction, Face, FaceChain, Mode,
        OrientedFace, Polarization, Sin2,
    },
    color::Colorimeter,
    error::{FilmError, FilmResult},
    spectrum::Spectrum,
    wavelengths::WavelengthSet,
};

/// Angle, polarization and direction of the incident light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Illumination {
    /// angle of incidence in the incidence medium
    pub angle: Angle,
    /// polarization of the incident light
    pub polarization: Polarization,
    /// medium the light comes from
    pub direction: Direction,
}
impl Default for Illumination {
    fn default() -> Self {
        Self {
            angle: Angle::new::<degree>(0.0),
            polarization: Polarization::Unpolarized,
            direction: Direction::Forward,
        }
    }
}
impl Illumination {
    /// Creates a new [`Illumination`].
    #[must_use]
    pub const fn new(angle: Angle, polarization: Polarization, direction: Direction) -> Self {
        Self {
            angle,
            polarization,
            direction,
        }
    }
}

/// Reflection or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, Display)]
pub enum Coefficient {
    /// reflected light
    Reflection,
    /// transmitted light
    Transmission,
}

/// A quantity which can be computed from a filter and used as target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Quantity {
    /// reflectance
    Reflection,
    /// transmittance
    Transmission,
    /// absorptance `1 - R - T`
    Absorption,
    /// phase of the amplitude coefficient (degrees)
    Phase(Coefficient),
    /// group delay (fs)
    GroupDelay(Coefficient),
    /// group delay dispersion (fs²)
    GroupDelayDispersion(Coefficient),
    /// tristimulus values `X, Y, Z`
    Color(Coefficient),
}
impl Quantity {
    /// Returns `true` for quantities only defined for pure s or p polarization.
    #[must_use]
    pub const fn needs_single_mode(self) -> bool {
        matches!(
            self,
            Self::Phase(_) | Self::GroupDelay(_) | Self::GroupDelayDispersion(_)
        )
    }
    /// Returns `true` for colors, which yield three values regardless of the wavelengths.
    #[must_use]
    pub const fn is_color(self) -> bool {
        matches!(self, Self::Color(_))
    }
}

/// Incidence condition: Snell invariant and admittances of all semi-infinite media.
#[derive(Debug, Clone)]
pub(crate) struct Condition {
    pub sin2: Sin2,
    pub front_medium: Admittance,
    pub back_medium: Admittance,
    pub substrate: Admittance,
    pub tau: Vec<f64>,
}

/// Evaluation of one [`Quantity`] from a [`FaceChain`], including its derivative with respect to
/// a parameter of the front face.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    quantity: Quantity,
    polarization: Polarization,
    wavelengths: WavelengthSet,
    colorimeter: Option<Colorimeter>,
}
impl Measurement {
    /// Prepare the evaluation of `quantity` at `requested` wavelengths. Colors are evaluated on the
    /// wavelengths of the colorimeter instead.
    pub(crate) fn new(
        quantity: Quantity,
        polarization: Polarization,
        requested: &WavelengthSet,
        colorimeter: Option<Colorimeter>,
    ) -> FilmResult<Self> {
        if quantity.needs_single_mode() && polarization.single_mode().is_none() {
            return Err(FilmError::Analysis(format!(
                "{quantity} requires s or p polarization"
            )));
        }
        let wavelengths = match quantity {
            Quantity::GroupDelay(_) | Quantity::GroupDelayDispersion(_) => {
                requested.expanded_for_derivative(RELATIVE_WAVELENGTH_STEP)
            }
            Quantity::Color(_) => colorimeter
                .as_ref()
                .ok_or_else(|| FilmError::Analysis("color needs a colorimeter".into()))?
                .wavelengths()
                .clone(),
            _ => requested.clone(),
        };
        Ok(Self {
            quantity,
            polarization,
            wavelengths,
            colorimeter,
        })
    }
    /// The wavelengths the faces must be evaluated on.
    pub(crate) const fn wavelengths(&self) -> &WavelengthSet {
        &self.wavelengths
    }
    fn mode(&self) -> FilmResult<Mode> {
        self.polarization.single_mode().ok_or_else(|| {
            FilmError::Analysis(format!("{} requires s or p polarization", self.quantity))
        })
    }
    fn colorimeter(&self) -> FilmResult<&Colorimeter> {
        self.colorimeter
            .as_ref()
            .ok_or_else(|| FilmError::Analysis("color needs a colorimeter".into()))
    }
    fn mixed(&self, chain: &FaceChain, coefficient: Coefficient) -> Vec<f64> {
        let (r_s, t_s) = chain.intensities(Mode::S);
        let (r_p, t_p) = chain.intensities(Mode::P);
        match coefficient {
            Coefficient::Reflection => mix_modes(self.polarization, &r_s, &r_p),
            Coefficient::Transmission => mix_modes(self.polarization, &t_s, &t_p),
        }
    }
    fn d_mixed(&self, chain: &FaceChain, d_front: &Face, coefficient: Coefficient) -> Vec<f64> {
        let (d_r_s, d_t_s) = chain.d_intensities_front(Mode::S, d_front);
        let (d_r_p, d_t_p) = chain.d_intensities_front(Mode::P, d_front);
        match coefficient {
            Coefficient::Reflection => mix_modes(self.polarization, &d_r_s, &d_r_p),
            Coefficient::Transmission => mix_modes(self.polarization, &d_t_s, &d_t_p),
        }
    }
    fn phases(&self, chain: &FaceChain, coefficient: Coefficient) -> FilmResult<Vec<f64>> {
        let amplitudes = chain.amplitudes(self.mode()?);
        Ok(match coefficient {
            Coefficient::Reflection => phase(&amplitudes.r),
            Coefficient::Transmission => phase(&amplitudes.t),
        })
    }
    fn d_phases(
        &self,
        chain: &FaceChain,
        d_front: &Face,
        coefficient: Coefficient,
    ) -> FilmResult<Vec<f64>> {
        let mode = self.mode()?;
        let Some(d_amplitudes) = chain.d_amplitudes_front(mode, d_front) else {
            return Ok(vec![0.0; chain.len()]);
        };
        let amplitudes: &Amplitudes = chain.amplitudes(mode);
        Ok(match coefficient {
            Coefficient::Reflection => d_phase(&amplitudes.r, &d_amplitudes.r),
            Coefficient::Transmission => d_phase(&amplitudes.t, &d_amplitudes.t),
        })
    }
    /// Values of the quantity (one per requested wavelength, three for colors).
    pub(crate) fn values(&self, chain: &FaceChain) -> FilmResult<Vec<f64>> {
        Ok(match self.quantity {
            Quantity::Reflection => self.mixed(chain, Coefficient::Reflection),
            Quantity::Transmission => self.mixed(chain, Coefficient::Transmission),
            Quantity::Absorption => {
                let r = self.mixed(chain, Coefficient::Reflection);
                let t = self.mixed(chain, Coefficient::Transmission);
                r.iter().zip(&t).map(|(r, t)| 1.0 - r - t).collect()
            }
            Quantity::Phase(c) => self
                .phases(chain, c)?
                .into_iter()
                .map(f64::to_degrees)
                .collect(),
            Quantity::GroupDelay(c) => group_delay(&self.wavelengths, &self.phases(chain, c)?),
            Quantity::GroupDelayDispersion(c) => {
                group_delay_dispersion(&self.wavelengths, &self.phases(chain, c)?)
            }
            Quantity::Color(c) => self.colorimeter()?.xyz(&self.mixed(chain, c))?.to_vec(),
        })
    }
    /// Derivatives of [`Measurement::values`] given the derivative of the front face.
    pub(crate) fn derivatives(&self, chain: &FaceChain, d_front: &Face) -> FilmResult<Vec<f64>> {
        Ok(match self.quantity {
            Quantity::Reflection => self.d_mixed(chain, d_front, Coefficient::Reflection),
            Quantity::Transmission => self.d_mixed(chain, d_front, Coefficient::Transmission),
            Quantity::Absorption => {
                let d_r = self.d_mixed(chain, d_front, Coefficient::Reflection);
                let d_t = self.d_mixed(chain, d_front, Coefficient::Transmission);
                d_r.iter().zip(&d_t).map(|(r, t)| -r - t).collect()
            }
            Quantity::Phase(c) => self
                .d_phases(chain, d_front, c)?
                .into_iter()
                .map(f64::to_degrees)
                .collect(),
            Quantity::GroupDelay(c) => {
                d_group_delay(&self.wavelengths, &self.d_phases(chain, d_front, c)?)
            }
            Quantity::GroupDelayDispersion(c) => {
                d_group_delay_dispersion(&self.wavelengths, &self.d_phases(chain, d_front, c)?)
            }
            Quantity::Color(c) => self
                .colorimeter()?
                .xyz_derivative(&self.d_mixed(chain, d_front, c))?
                .to_vec(),
        })
    }
}

impl Filter {
    /// Snell invariant and admittances for light incident at `angle` in the medium on the side
    /// given by `direction`.
    pub(crate) fn condition(
        &mut self,
        wavelengths: &WavelengthSet,
        angle: Angle,
        direction: Direction,
    ) -> FilmResult<Condition> {
        let front = self.material_index(self.front_medium, wavelengths)?;
        let back = self.material_index(self.back_medium, wavelengths)?;
        let substrate = self.material_index(self.substrate, wavelengths)?;
        let sin2 = match direction {
            Direction::Forward => Sin2::new(&front, angle),
            Direction::Backward => Sin2::new(&back, angle),
        };
        let substrate = Admittance::new(&substrate, &sin2);
        let tau = substrate_transmission(&substrate, self.substrate_thickness, wavelengths);
        Ok(Condition {
            front_medium: Admittance::new(&front, &sin2),
            back_medium: Admittance::new(&back, &sin2),
            substrate,
            sin2,
            tau,
        })
    }
    /// The faces met by light crossing the filter.
    ///
    /// If the substrate is not considered, the front stack lies directly between both media and
    /// the back stack is ignored.
    pub(crate) fn face_chain(
        &mut self,
        wavelengths: &WavelengthSet,
        angle: Angle,
        direction: Direction,
        consider_backside: bool,
    ) -> FilmResult<FaceChain> {
        let condition = self.condition(wavelengths, angle, direction)?;
        self.face_chain_for(&condition, wavelengths, direction, consider_backside)
    }
    pub(crate) fn face_chain_for(
        &mut self,
        condition: &Condition,
        wavelengths: &WavelengthSet,
        direction: Direction,
        consider_backside: bool,
    ) -> FilmResult<FaceChain> {
        let front = self.face_matrix(Side::Front, &condition.sin2, wavelengths)?;
        let back = if consider_backside && !self.settings.dont_consider_substrate {
            Some(self.face_matrix(Side::Back, &condition.sin2, wavelengths)?)
        } else {
            None
        };
        Ok(self.chain_from_matrices(condition, &front, back.as_ref(), direction))
    }
    /// The front face of global matrix `front` in its natural orientation. Without substrate it
    /// lies between both media.
    pub(crate) fn front_face(
        &self,
        condition: &Condition,
        front: &CharacteristicMatrix,
    ) -> OrientedFace {
        let inner = if self.settings.dont_consider_substrate {
            condition.back_medium.clone()
        } else {
            condition.substrate.clone()
        };
        OrientedFace::new(front, condition.front_medium.clone(), inner)
    }
    /// Arrange explicit face matrices into a [`FaceChain`]. `back` is only used if the substrate
    /// is considered.
    pub(crate) fn chain_from_matrices(
        &self,
        condition: &Condition,
        front: &CharacteristicMatrix,
        back: Option<&CharacteristicMatrix>,
        direction: Direction,
    ) -> FaceChain {
        let front = self.front_face(condition, front);
        if self.settings.dont_consider_substrate {
            return FaceChain::new(front, None, vec![1.0; condition.tau.len()], direction);
        }
        let back = back.map(|back| {
            OrientedFace::new(
                back,
                condition.back_medium.clone(),
                condition.substrate.clone(),
            )
        });
        FaceChain::new(front, back, condition.tau.clone(), direction)
    }
    /// The colorimeter of the filter settings.
    ///
    /// # Errors
    ///
    /// This function will return an error for unknown illuminant or observer names.
    pub fn colorimeter(&self) -> FilmResult<Colorimeter> {
        Colorimeter::builtin(&self.settings.observer, &self.settings.illuminant)
    }
    pub(crate) fn measure(
        &mut self,
        measurement: &Measurement,
        illumination: &Illumination,
    ) -> FilmResult<Vec<f64>> {
        let chain = self.face_chain(
            measurement.wavelengths(),
            illumination.angle,
            illumination.direction,
            self.settings.consider_backside,
        )?;
        measurement.values(&chain)
    }
    /// Compute any [`Quantity`] at the given wavelengths.
    ///
    /// Colors ignore `wavelengths` and return the three tristimulus values.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - a phase related quantity is requested for mixed polarization
    ///   - a material cannot be evaluated at the wavelengths
    ///   - the illuminant or observer of the settings is unknown (colors)
    pub fn analyse(
        &mut self,
        quantity: Quantity,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Vec<f64>> {
        let colorimeter = if quantity.is_color() {
            Some(self.colorimeter()?)
        } else {
            None
        };
        let measurement =
            Measurement::new(quantity, illumination.polarization, wavelengths, colorimeter)?;
        debug!("analysing {quantity} on {} wavelengths", wavelengths.len());
        self.measure(&measurement, illumination)
    }
    fn spectrum(
        &mut self,
        quantity: Quantity,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Spectrum> {
        let values = self.analyse(quantity, wavelengths, illumination)?;
        Spectrum::new(wavelengths, values)
    }
    /// Reflectance spectrum.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material cannot be evaluated.
    pub fn reflection(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Spectrum> {
        self.spectrum(Quantity::Reflection, wavelengths, illumination)
    }
    /// Transmittance spectrum.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material cannot be evaluated.
    pub fn transmission(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Spectrum> {
        self.spectrum(Quantity::Transmission, wavelengths, illumination)
    }
    /// Absorptance spectrum.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material cannot be evaluated.
    pub fn absorption(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Spectrum> {
        self.spectrum(Quantity::Absorption, wavelengths, illumination)
    }
    /// Phase (degrees) of the reflection or transmission coefficient of the entrance face.
    ///
    /// # Errors
    ///
    /// This function will return an error for mixed polarizations.
    pub fn phase(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
        coefficient: Coefficient,
    ) -> FilmResult<Spectrum> {
        self.spectrum(Quantity::Phase(coefficient), wavelengths, illumination)
    }
    /// Group delay (fs).
    ///
    /// # Errors
    ///
    /// This function will return an error for mixed polarizations.
    pub fn group_delay(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
        coefficient: Coefficient,
    ) -> FilmResult<Spectrum> {
        self.spectrum(Quantity::GroupDelay(coefficient), wavelengths, illumination)
    }
    /// Group delay dispersion (fs²).
    ///
    /// # Errors
    ///
    /// This function will return an error for mixed polarizations.
    pub fn group_delay_dispersion(
        &mut self,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
        coefficient: Coefficient,
    ) -> FilmResult<Spectrum> {
        self.spectrum(
            Quantity::GroupDelayDispersion(coefficient),
            wavelengths,
            illumination,
        )
    }
    /// Tristimulus values of the reflected or transmitted light.
    ///
    /// # Errors
    ///
    /// This function will return an error if the illuminant or observer is unknown.
    pub fn color(
        &mut self,
        illumination: &Illumination,
        coefficient: Coefficient,
    ) -> FilmResult<[f64; 3]> {
        let colorimeter = self.colorimeter()?;
        let wavelengths = colorimeter.wavelengths().clone();
        let values = self.analyse(Quantity::Color(coefficient), &wavelengths, illumination)?;
        Ok([values[0], values[1], values[2]])
    }
    /// Ellipsometric angles Psi and Delta (degrees) of light reflected from the front side.
    ///
    /// Delta is brought into the range of the analysis ellipsometer.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material cannot be evaluated.
    pub fn ellipsometry(
        &mut self,
        wavelengths: &WavelengthSet,
        angle: Angle,
    ) -> FilmResult<(Spectrum, Spectrum)> {
        let chain = self.face_chain(
            wavelengths,
            angle,
            Direction::Forward,
            self.settings.consider_backside,
        )?;
        let (psi, delta) = chain.psi_delta();
        let ellipsometer = self.settings.ellipsometer;
        let delta = delta
            .into_iter()
            .map(|d| normalize_delta(d, ellipsometer.ellipsometer_type, ellipsometer.delta_min))
            .collect();
        Ok((
            Spectrum::new(wavelengths, psi)?,
            Spectrum::new(wavelengths, delta)?,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        degree,
        filter::{test_filters, Position},
        materials::Material,
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn quarter_wave() -> Filter {
        let mut filter = test_filters::bare(1.5);
        filter.set_consider_backside(false);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &Material::constant("H", 2.0).unwrap(),
                68.75,
                None,
            )
            .unwrap();
        filter
    }
    #[test]
    fn quarter_wave_reflectance() {
        let mut filter = quarter_wave();
        let wavelengths = WavelengthSet::new(vec![550.0]).unwrap();
        let r = filter
            .reflection(&wavelengths, &Illumination::default())
            .unwrap();
        let expected = ((1.0 * 1.5 - 4.0) / (1.0 * 1.5 + 4.0_f64)).powi(2);
        assert_abs_diff_eq!(r.values()[0], expected, epsilon = 1e-9);
    }
    #[test]
    fn energy_conservation() {
        let mut filter = test_filters::hl_stack(5);
        let wavelengths = WavelengthSet::from_range_nm(400.0, 800.0, 20.0).unwrap();
        for polarization in [Polarization::S, Polarization::P, Polarization::Unpolarized] {
            for direction in [Direction::Forward, Direction::Backward] {
                let illumination = Illumination::new(degree!(35.0), polarization, direction);
                let a = filter.absorption(&wavelengths, &illumination).unwrap();
                for value in a.values() {
                    assert_abs_diff_eq!(value, 0.0, epsilon = 1e-9);
                }
            }
        }
    }
    #[test]
    fn cached_conditions() {
        let mut filter = test_filters::hl_stack(3);
        let wavelengths = WavelengthSet::new(vec![500.0, 600.0]).unwrap();
        let illumination = Illumination::new(degree!(20.0), Polarization::S, Direction::Forward);
        let first = filter.reflection(&wavelengths, &illumination).unwrap();
        assert_eq!(filter.analysis_cache_len(), 1);
        let second = filter.reflection(&wavelengths, &illumination).unwrap();
        assert_eq!(filter.analysis_cache_len(), 1);
        assert_eq!(first, second);
        filter
            .transmission(&wavelengths, &Illumination::default())
            .unwrap();
        assert_eq!(filter.analysis_cache_len(), 2);
    }
    #[test]
    fn phase_needs_single_mode() {
        let mut filter = quarter_wave();
        let wavelengths = WavelengthSet::new(vec![550.0]).unwrap();
        assert_matches!(
            filter.phase(&wavelengths, &Illumination::default(), Coefficient::Reflection),
            Err(FilmError::Analysis(_))
        );
        let illumination = Illumination::new(degree!(0.0), Polarization::S, Direction::Forward);
        let phase = filter
            .phase(&wavelengths, &illumination, Coefficient::Reflection)
            .unwrap();
        // high index quarter wave on glass: r is real and negative
        assert_abs_diff_eq!(phase.values()[0].abs(), 180.0, epsilon = 1e-9);
    }
    #[test]
    fn group_delay_of_bare_substrate_vanishes() {
        let mut filter = test_filters::bare(1.5);
        let wavelengths = WavelengthSet::new(vec![500.0, 700.0]).unwrap();
        let illumination = Illumination::new(degree!(0.0), Polarization::P, Direction::Forward);
        let gd = filter
            .group_delay(&wavelengths, &illumination, Coefficient::Reflection)
            .unwrap();
        let gdd = filter
            .group_delay_dispersion(&wavelengths, &illumination, Coefficient::Reflection)
            .unwrap();
        for (gd, gdd) in gd.values().iter().zip(gdd.values()) {
            assert_abs_diff_eq!(*gd, 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(gdd, 0.0, epsilon = 1e-3);
        }
    }
    #[test]
    fn ellipsometry_of_bare_substrate() {
        let mut filter = test_filters::bare(1.5);
        filter.set_consider_backside(false);
        let wavelengths = WavelengthSet::new(vec![633.0]).unwrap();
        let brewster = 1.5_f64.atan().to_degrees();
        let (psi, _) = filter
            .ellipsometry(&wavelengths, degree!(brewster))
            .unwrap();
        assert_abs_diff_eq!(psi.values()[0], 0.0, epsilon = 1e-6);
        let (psi, delta) = filter.ellipsometry(&wavelengths, degree!(45.0)).unwrap();
        assert!(psi.values()[0] > 0.0);
        assert!((0.0..=180.0).contains(&delta.values()[0]));
    }
    #[test]
    fn color_of_transparent_plate() {
        let mut filter = test_filters::bare(1.0);
        filter.set_illuminant_and_observer("E", crate::color::CIE_1931);
        let xyz = filter
            .color(&Illumination::default(), Coefficient::Transmission)
            .unwrap();
        assert_abs_diff_eq!(xyz[1], 100.0, epsilon = 1e-9);
    }
    #[test]
    fn dont_consider_substrate() {
        let mut filter = quarter_wave();
        filter
            .set_medium(Side::Back, &Material::constant("glass", 1.5).unwrap())
            .unwrap();
        filter
            .set_substrate(&Material::constant("other", 1.9).unwrap(), 1.0e6)
            .unwrap();
        filter.set_dont_consider_substrate(true);
        let wavelengths = WavelengthSet::new(vec![550.0]).unwrap();
        let r = filter
            .reflection(&wavelengths, &Illumination::default())
            .unwrap();
        let expected = ((1.5 - 4.0) / (1.5 + 4.0_f64)).powi(2);
        assert_abs_diff_eq!(r.values()[0], expected, epsilon = 1e-9);
    }
}
