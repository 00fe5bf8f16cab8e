//! A filter seen as a least squares model of its refinable front layers.
//!
//! The derivative of a target with respect to a layer parameter only needs the derivative of that
//! layer's matrix: the global matrix derivative is `pre[i] · dL_i · post[i]` (see
//! [`PrePostMatrices`]). The same machinery evaluates the sensitivity of the merit function to
//! structural perturbations (needles, steps) which are not parameters yet.
use log::debug;
use nalgebra::DMatrix;
use strum::Display;

use crate::{
    abeles::{CharacteristicMatrix, FaceChain, OrientedFace, PrePostMatrices, Sin2},
    error::{FilmError, FilmResult},
    filter::{analysis::Measurement, Filter, Layer, Position, Side},
    optimization::LeastSquaresModel,
    targets::{Inequality, Target},
    wavelengths::WavelengthSet,
};

/// A refined quantity of a front layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Parameter {
    /// thickness of layer `i`
    Thickness(usize),
    /// index of mixture layer `i`
    Index(usize),
    /// index of mixture layer `i`, the optical thickness being preserved
    IndexConstantOt(usize),
}
impl Parameter {
    /// The layer this parameter belongs to.
    #[must_use]
    pub const fn layer(self) -> usize {
        match self {
            Self::Thickness(i) | Self::Index(i) | Self::IndexConstantOt(i) => i,
        }
    }
    /// Returns `true` for index parameters.
    #[must_use]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::Index(_) | Self::IndexConstantOt(_))
    }
}

/// Derivatives of the values of one target, and of the merit function, at the current state of
/// a filter.
pub(crate) struct TargetSensitivity {
    measurement: Measurement,
    wavelengths: WavelengthSet,
    sin2: Sin2,
    pre_post: PrePostMatrices,
    front: OrientedFace,
    chain: FaceChain,
    weights: Vec<f64>,
}
impl TargetSensitivity {
    pub(crate) fn new(filter: &mut Filter, target: &Target) -> FilmResult<Self> {
        let measurement = target.measurement(filter)?;
        let wavelengths = measurement.wavelengths().clone();
        let illumination = target.illumination();
        let condition =
            filter.condition(&wavelengths, illumination.angle, illumination.direction)?;
        let layers = filter.layer_matrices(Side::Front, &condition.sin2, &wavelengths)?;
        let pre_post = PrePostMatrices::new(&layers, wavelengths.len());
        let settings = filter.settings();
        let back = if settings.consider_backside() && !settings.dont_consider_substrate() {
            Some(filter.face_matrix(Side::Back, &condition.sin2, &wavelengths)?)
        } else {
            None
        };
        let chain = filter.chain_from_matrices(
            &condition,
            pre_post.global(),
            back.as_ref(),
            illumination.direction,
        );
        let front = filter.front_face(&condition, pre_post.global());
        let values = measurement.values(&chain)?;
        let inequality = target.inequality();
        let weights = values
            .iter()
            .zip(target.values())
            .zip(target.tolerances())
            .map(|((calculated, value), tolerance)| {
                inequality.residual(*calculated, value) / (tolerance * tolerance)
            })
            .collect();
        Ok(Self {
            measurement,
            wavelengths,
            sin2: condition.sin2,
            pre_post,
            front,
            chain,
            weights,
        })
    }
    pub(crate) const fn wavelengths(&self) -> &WavelengthSet {
        &self.wavelengths
    }
    pub(crate) const fn sin2(&self) -> &Sin2 {
        &self.sin2
    }
    /// Derivatives of the target values given the derivative `local` of the matrix of layer
    /// `layer`.
    pub(crate) fn derivatives(
        &self,
        layer: usize,
        local: &CharacteristicMatrix,
    ) -> FilmResult<Vec<f64>> {
        let mut global = CharacteristicMatrix::new(self.wavelengths.len());
        self.pre_post.propagate(layer, local, &mut global);
        let d_face = self.front.derivative(self.pre_post.global(), &global);
        self.measurement.derivatives(&self.chain, &d_face)
    }
    /// `dMF = Σ (calculated - target)/tolerance² · d(calculated)`. Satisfied inequalities do not
    /// contribute.
    pub(crate) fn merit_derivative(
        &self,
        layer: usize,
        local: &CharacteristicMatrix,
    ) -> FilmResult<f64> {
        Ok(self
            .derivatives(layer, local)?
            .iter()
            .zip(&self.weights)
            .map(|(d, w)| d * w)
            .sum())
    }
}

/// Sensitivities of all targets.
pub(crate) fn sensitivities(
    filter: &mut Filter,
    targets: &[Target],
) -> FilmResult<Vec<TargetSensitivity>> {
    targets
        .iter()
        .map(|target| TargetSensitivity::new(filter, target))
        .collect()
}

/// Matrix of a homogeneous front layer cut to `thickness`.
pub(crate) fn partial_layer_matrix(
    filter: &mut Filter,
    layer: &Layer,
    thickness: f64,
    sin2: &Sin2,
    wavelengths: &WavelengthSet,
) -> FilmResult<CharacteristicMatrix> {
    let (key, _) = homogeneous_slice(layer)?;
    let n = filter.slice_index(key, wavelengths)?;
    let mut m = CharacteristicMatrix::new(wavelengths.len());
    m.set_matrices(&n, thickness, sin2, wavelengths);
    Ok(m)
}

/// Derivative, with respect to the layer index, of the matrix of a homogeneous mixture layer cut
/// to `thickness`.
pub(crate) fn partial_index_derivative(
    filter: &mut Filter,
    layer: &Layer,
    thickness: f64,
    sin2: &Sin2,
    wavelengths: &WavelengthSet,
) -> FilmResult<CharacteristicMatrix> {
    let (key, _) = homogeneous_slice(layer)?;
    let n = filter.slice_index(key, wavelengths)?;
    let d_n = filter.layer_index_derivative(layer, wavelengths)?;
    let mut m = CharacteristicMatrix::new(wavelengths.len());
    m.set_derivative_index(&n, &d_n, thickness, sin2, wavelengths);
    Ok(m)
}

fn homogeneous_slice(layer: &Layer) -> FilmResult<(crate::filter::cache::IndexKey, f64)> {
    match layer.slices().as_slice() {
        [slice] if !layer.is_graded() => Ok(*slice),
        _ => Err(FilmError::Optimization(
            "only homogeneous layers can be refined".into(),
        )),
    }
}

/// Derivative of the matrix of the front layer of `parameter`.
pub(crate) fn layer_derivative(
    filter: &mut Filter,
    parameter: Parameter,
    sin2: &Sin2,
    wavelengths: &WavelengthSet,
) -> FilmResult<CharacteristicMatrix> {
    let layer = filter
        .layers(Side::Front)
        .get(parameter.layer())
        .cloned()
        .ok_or_else(|| FilmError::Optimization(format!("no front layer for {parameter}")))?;
    let (key, thickness) = homogeneous_slice(&layer)?;
    let n = filter.slice_index(key, wavelengths)?;
    let mut local = CharacteristicMatrix::new(wavelengths.len());
    match parameter {
        Parameter::Thickness(_) => local.set_derivative_thickness(&n, thickness, sin2, wavelengths),
        Parameter::Index(_) => {
            let d_n = filter.layer_index_derivative(&layer, wavelengths)?;
            local.set_derivative_index(&n, &d_n, thickness, sin2, wavelengths);
        }
        Parameter::IndexConstantOt(_) => {
            let d_n = filter.layer_index_derivative(&layer, wavelengths)?;
            let center = filter.center_index(&layer)?;
            local.set_derivative_index_constant_ot(&n, &d_n, thickness, center, sin2, wavelengths);
        }
    }
    Ok(local)
}

/// The front layers of a filter as a [`LeastSquaresModel`].
///
/// The model owns a working copy of the filter: parameters are written into its layers before
/// every evaluation.
#[derive(Debug, Clone)]
pub struct RefinementModel {
    filter: Filter,
    targets: Vec<Target>,
    parameters: Vec<Parameter>,
    optical_thicknesses: Vec<f64>,
}
impl RefinementModel {
    /// Collect the parameters of the flagged homogeneous front layers of `filter`.
    ///
    /// # Errors
    ///
    /// This function will return an error if a target is invalid.
    pub fn new(filter: Filter, targets: Vec<Target>) -> FilmResult<Self> {
        for target in &targets {
            target.validate()?;
        }
        let mut model = Self {
            filter,
            targets,
            parameters: Vec::new(),
            optical_thicknesses: Vec::new(),
        };
        model.collect_parameters()?;
        Ok(model)
    }
    /// Rebuild the parameter list after a structural change of the filter.
    pub(crate) fn collect_parameters(&mut self) -> FilmResult<()> {
        self.parameters.clear();
        self.optical_thicknesses.clear();
        for (i, layer) in self.filter.layers(Side::Front).iter().enumerate() {
            if layer.is_graded() {
                continue;
            }
            let flags = layer.flags();
            if flags.refine_thickness {
                self.parameters.push(Parameter::Thickness(i));
                self.optical_thicknesses.push(0.0);
            }
            if flags.refine_index {
                if flags.preserve_ot {
                    self.parameters.push(Parameter::IndexConstantOt(i));
                    self.optical_thicknesses
                        .push(self.filter.optical_thickness(layer)?);
                } else {
                    self.parameters.push(Parameter::Index(i));
                    self.optical_thicknesses.push(0.0);
                }
            }
        }
        debug!("{} refinement parameters", self.parameters.len());
        Ok(())
    }
    /// Returns the parameters of this [`RefinementModel`].
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
    /// Returns the targets of this [`RefinementModel`].
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
    /// Returns the working filter.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }
    pub(crate) fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }
    /// Current values of the parameters.
    ///
    /// # Errors
    ///
    /// This function will return an error if a parameter does not address a valid layer.
    pub fn current_values(&self) -> FilmResult<Vec<f64>> {
        self.parameters
            .iter()
            .map(|parameter| {
                let layer = self.filter.layer(Side::Front, Position::Index(parameter.layer()))?;
                match parameter {
                    Parameter::Thickness(_) => Ok(layer.thickness()),
                    Parameter::Index(_) | Parameter::IndexConstantOt(_) => {
                        self.filter.center_index(layer)
                    }
                }
            })
            .collect()
    }
    /// Bounds of the parameters: thicknesses are positive, indices stay in the range of their
    /// mixture.
    ///
    /// # Errors
    ///
    /// This function will return an error if a parameter does not address a valid layer.
    pub fn bounds(&self) -> FilmResult<(Vec<f64>, Vec<f64>)> {
        let center = self.filter.settings().center_wavelength();
        let mut lower = Vec::with_capacity(self.parameters.len());
        let mut upper = Vec::with_capacity(self.parameters.len());
        for parameter in &self.parameters {
            if parameter.is_index() {
                let layer = self.filter.layer(Side::Front, Position::Index(parameter.layer()))?;
                let material = self.filter.material(layer.material()).ok_or_else(|| {
                    FilmError::Optimization(format!("unknown material {}", layer.material()))
                })?;
                let (n_min, n_max) = material.index_range(center);
                lower.push(n_min);
                upper.push(n_max);
            } else {
                lower.push(0.0);
                upper.push(f64::INFINITY);
            }
        }
        Ok((lower, upper))
    }
    /// Target values, tolerances and inequalities, flattened in target order.
    #[must_use]
    pub fn target_values(&self) -> (Vec<f64>, Vec<f64>, Vec<Inequality>) {
        let mut values = Vec::new();
        let mut tolerances = Vec::new();
        let mut inequalities = Vec::new();
        for target in &self.targets {
            values.extend(target.values());
            tolerances.extend(target.tolerances());
            inequalities.extend(std::iter::repeat(target.inequality()).take(target.len()));
        }
        (values, tolerances, inequalities)
    }
    fn apply(&mut self, values: &[f64]) -> FilmResult<()> {
        if values.len() != self.parameters.len() {
            return Err(FilmError::Optimization(format!(
                "{} values given for {} parameters",
                values.len(),
                self.parameters.len()
            )));
        }
        let current = self.current_values()?;
        for (k, parameter) in self.parameters.clone().into_iter().enumerate() {
            if current[k].to_bits() == values[k].to_bits() {
                continue;
            }
            let position = Position::Index(parameter.layer());
            match parameter {
                Parameter::Thickness(_) => {
                    self.filter
                        .set_layer_thickness(Side::Front, position, values[k])?;
                }
                Parameter::Index(_) => {
                    self.filter.set_layer_index(Side::Front, position, values[k])?;
                }
                Parameter::IndexConstantOt(_) => {
                    self.filter.set_layer_index(Side::Front, position, values[k])?;
                    self.filter.set_layer_thickness(
                        Side::Front,
                        position,
                        self.optical_thicknesses[k] / values[k],
                    )?;
                }
            }
        }
        Ok(())
    }
}
impl LeastSquaresModel for RefinementModel {
    fn values(&mut self, parameters: &[f64]) -> FilmResult<Vec<f64>> {
        self.apply(parameters)?;
        let mut values = Vec::new();
        for target in &self.targets {
            values.extend(self.filter.evaluate_target(target)?);
        }
        Ok(values)
    }
    fn jacobian(&mut self, parameters: &[f64]) -> FilmResult<DMatrix<f64>> {
        self.apply(parameters)?;
        let nb_values = self.targets.iter().map(Target::len).sum();
        let mut jacobian = DMatrix::zeros(nb_values, self.parameters.len());
        let mut row = 0;
        for target in &self.targets {
            let sensitivity = TargetSensitivity::new(&mut self.filter, target)?;
            for (j, parameter) in self.parameters.iter().enumerate() {
                let local = layer_derivative(
                    &mut self.filter,
                    *parameter,
                    sensitivity.sin2(),
                    sensitivity.wavelengths(),
                )?;
                let column = sensitivity.derivatives(parameter.layer(), &local)?;
                for (i, d) in column.into_iter().enumerate() {
                    jacobian[(row + i, j)] = d;
                }
            }
            row += target.len();
        }
        Ok(jacobian)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        abeles::{Direction, Polarization},
        filter::{test_filters, Coefficient, LayerFlags, Quantity},
        materials::Material,
        nanometer, degree,
    };
    use approx::assert_abs_diff_eq;

    fn filter() -> Filter {
        let mut filter = test_filters::bare(1.52);
        let h = Material::constant("H", 2.3).unwrap();
        let l = Material::constant("L", 1.46).unwrap();
        let mixture = test_filters::mixture();
        filter.add_layer(Side::Front, Position::Top, &h, 60.0, None).unwrap();
        filter.add_layer(Side::Front, Position::Top, &mixture, 80.0, Some(1.8)).unwrap();
        filter.add_layer(Side::Front, Position::Top, &l, 95.0, None).unwrap();
        filter.add_layer(Side::Front, Position::Top, &mixture, 70.0, Some(1.6)).unwrap();
        filter.add_layer(Side::Back, Position::Top, &l, 94.0, None).unwrap();
        filter
            .set_layer_flags(Side::Front, Position::Index(0), LayerFlags::refinable())
            .unwrap();
        let mut both = LayerFlags::refinable();
        both.refine_index = true;
        filter
            .set_layer_flags(Side::Front, Position::Index(1), both)
            .unwrap();
        let preserve = LayerFlags {
            refine_index: true,
            preserve_ot: true,
            ..LayerFlags::default()
        };
        filter
            .set_layer_flags(Side::Front, Position::Index(3), preserve)
            .unwrap();
        filter
    }
    fn targets() -> Vec<Target> {
        vec![
            Target::discrete(Quantity::Reflection, nanometer!(520.0), 0.1, 0.01).unwrap(),
            Target::discrete(Quantity::Transmission, nanometer!(640.0), 0.9, 0.02)
                .unwrap()
                .with_angle(degree!(30.0))
                .with_direction(Direction::Backward),
            Target::discrete(
                Quantity::Phase(Coefficient::Reflection),
                nanometer!(600.0),
                0.0,
                5.0,
            )
            .unwrap()
            .with_polarization(Polarization::P)
            .unwrap(),
            Target::color(Coefficient::Transmission, [90.0, 95.0, 100.0], [1.0; 3]).unwrap(),
        ]
    }
    #[test]
    fn parameters() {
        let model = RefinementModel::new(filter(), targets()).unwrap();
        assert_eq!(
            model.parameters(),
            &[
                Parameter::Thickness(0),
                Parameter::Thickness(1),
                Parameter::Index(1),
                Parameter::IndexConstantOt(3)
            ]
        );
        assert_eq!(model.current_values().unwrap(), vec![60.0, 80.0, 1.8, 1.6]);
        let (lower, upper) = model.bounds().unwrap();
        assert_eq!(lower[0], 0.0);
        assert_abs_diff_eq!(lower[2], 1.45, epsilon = 1e-9);
        assert_abs_diff_eq!(upper[3], 2.25, epsilon = 1e-9);
        let (values, tolerances, _) = model.target_values();
        assert_eq!(values.len(), 6);
        assert_eq!(tolerances.len(), 6);
    }
    #[test]
    fn jacobian_matches_finite_differences() {
        let mut model = RefinementModel::new(filter(), targets()).unwrap();
        let p = model.current_values().unwrap();
        let jacobian = model.jacobian(&p).unwrap();
        assert_eq!(jacobian.shape(), (6, 4));
        for j in 0..p.len() {
            let h = if j >= 2 { 1e-6 } else { 1e-4 };
            let mut plus = p.clone();
            plus[j] += h;
            let mut minus = p.clone();
            minus[j] -= h;
            let v_plus = model.values(&plus).unwrap();
            let v_minus = model.values(&minus).unwrap();
            for i in 0..6 {
                let fd = (v_plus[i] - v_minus[i]) / (2.0 * h);
                assert_abs_diff_eq!(jacobian[(i, j)], fd, epsilon = 1e-4 * fd.abs().max(1.0));
            }
        }
    }
    #[test]
    fn optical_thickness_is_preserved() {
        let mut model = RefinementModel::new(filter(), targets()).unwrap();
        let mut p = model.current_values().unwrap();
        p[3] = 2.0;
        model.values(&p).unwrap();
        let layer = model.filter().layer(Side::Front, Position::Index(3)).unwrap();
        assert_abs_diff_eq!(layer.thickness(), 70.0 * 1.6 / 2.0, epsilon = 1e-9);
        assert_eq!(layer.index(), Some(2.0));
    }
}
