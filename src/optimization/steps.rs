//! Step synthesis: splitting homogeneous mixture layers into two parts of slightly different
//! index.
//!
//! Raising the index of the part of layer `i` above depth `z` changes the matrix of the layer by
//! `L(z) · dL(d - z)/dn`. Both directions are tracked: a step up and a step down. A layer whose
//! index sits on a bound of its mixture cannot move further in one direction; that direction is
//! then evaluated as a step centered on the current index, `dMF_above - dMF_layer / 2`.
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::{
    candidates::{depths, interleave, merit_slope, negative_minima, select, Candidate},
    model::{
        layer_derivative, partial_index_derivative, partial_layer_matrix, sensitivities,
        Parameter, TargetSensitivity,
    },
    BoundStatus, Refinement,
};
use crate::{
    abeles::CharacteristicMatrix,
    error::{FilmError, FilmResult},
    filter::{Filter, Layer, Position, Side},
    targets::Target,
    utils::StopToken,
};

/// Settings of the step method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// maximal distance between two sampled depths (nm)
    pub spacing: f64,
    /// maximal number of steps added at once
    pub nb_steps: usize,
    /// only steps whose derivative is at least this fraction of the best one are added
    pub min_ratio: f64,
}
impl Default for StepConfig {
    fn default() -> Self {
        Self {
            spacing: 5.0,
            nb_steps: 1,
            min_ratio: 0.1,
        }
    }
}
impl StepConfig {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spacing is not positive or the ratio is outside
    /// `[0, 1]`.
    pub fn check(&self) -> FilmResult<()> {
        if !(self.spacing > 0.0) {
            return Err(FilmError::Configuration("step spacing must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_ratio) {
            return Err(FilmError::Configuration("step ratio must be in [0, 1]".into()));
        }
        Ok(())
    }
}

/// Direction of the index change of the upper part of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StepDirection {
    /// the upper part gets a higher index
    Up,
    /// the upper part gets a lower index
    Down,
}

/// A possible step.
pub type StepCandidate = Candidate<StepDirection>;

/// Sampled `dMF` of steps inside one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProfile {
    /// sampled depths (nm)
    pub depths: Vec<f64>,
    /// `dMF` of a step up at every depth
    pub up: Vec<f64>,
    /// `dMF` of a step down at every depth
    pub down: Vec<f64>,
}

fn is_step_host(layer: &Layer) -> bool {
    !layer.is_graded() && layer.index().is_some() && layer.flags().add_steps
}

fn step_profile(
    filter: &mut Filter,
    sensitivities: &[TargetSensitivity],
    i: usize,
    depths: Vec<f64>,
    bound: BoundStatus,
    nb_values: usize,
) -> FilmResult<StepProfile> {
    let layer = filter
        .layers(Side::Front)
        .get(i)
        .cloned()
        .ok_or_else(|| FilmError::Optimization(format!("no front layer {i}")))?;
    let thickness = layer.thickness();
    let mut whole = Vec::with_capacity(sensitivities.len());
    for s in sensitivities {
        whole.push(layer_derivative(
            filter,
            Parameter::Index(i),
            s.sin2(),
            s.wavelengths(),
        )?);
    }
    let total = merit_slope(sensitivities, i, &whole, nb_values)?;
    let mut up = Vec::with_capacity(depths.len());
    let mut down = Vec::with_capacity(depths.len());
    for z in &depths {
        let mut local = Vec::with_capacity(sensitivities.len());
        for s in sensitivities {
            let mut m: CharacteristicMatrix =
                partial_layer_matrix(filter, &layer, *z, s.sin2(), s.wavelengths())?;
            let d_top =
                partial_index_derivative(filter, &layer, thickness - z, s.sin2(), s.wavelengths())?;
            m.multiply(&d_top);
            local.push(m);
        }
        let above = merit_slope(sensitivities, i, &local, nb_values)?;
        match bound {
            BoundStatus::Free => {
                up.push(above);
                down.push(-above);
            }
            BoundStatus::Upper => {
                up.push(above - total / 2.0);
                down.push(-above);
            }
            BoundStatus::Lower => {
                up.push(above);
                down.push(total / 2.0 - above);
            }
        }
    }
    Ok(StepProfile { depths, up, down })
}

/// Keep only the most negative of adjacent detections with the same direction in a layer.
fn dedupe(candidates: Vec<StepCandidate>) -> Vec<StepCandidate> {
    let mut by_depth = candidates.clone();
    by_depth.sort_by(|a, b| a.layer.cmp(&b.layer).then(a.depth.total_cmp(&b.depth)));
    let mut dropped = Vec::new();
    for pair in by_depth.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.layer == b.layer && a.kind == b.kind {
            dropped.push(if a.value <= b.value { b } else { a });
        }
    }
    candidates
        .into_iter()
        .filter(|c| !dropped.contains(c))
        .collect()
}

/// Indices of the lower and upper part of a layer of index `n` after a step of `delta` in
/// `direction`, shifted into `[n_min, n_max]`.
///
/// A layer at a bound of its mixture cannot take the centered step its profile value is computed
/// for. It gets the one-sided step ending at the bound instead: `(n - delta, n)` up from the upper
/// bound, `(n + delta, n)` down from the lower bound. To first order this step changes the merit
/// function by the profile value minus (upper bound) or plus (lower bound) half the slope of the
/// whole layer; the following refinement takes up the difference.
fn step_indices(n: f64, delta: f64, direction: StepDirection, n_min: f64, n_max: f64) -> (f64, f64) {
    match direction {
        StepDirection::Up if n + delta <= n_max => (n, n + delta),
        StepDirection::Up => ((n - delta).max(n_min), n),
        StepDirection::Down if n - delta >= n_min => (n, n - delta),
        StepDirection::Down => ((n + delta).min(n_max), n),
    }
}

impl Refinement {
    fn index_bound(&self, i: usize, layer: &Layer) -> FilmResult<BoundStatus> {
        if let Some(j) = self
            .parameters()
            .iter()
            .position(|p| p.is_index() && p.layer() == i)
        {
            return Ok(self.solver().bound_status(j));
        }
        let filter = self.filter();
        let material = filter
            .material(layer.material())
            .ok_or_else(|| FilmError::Optimization(format!("unknown material {}", layer.material())))?;
        let (n_min, n_max) = material.index_range(filter.settings().center_wavelength());
        let n = filter.center_index(layer)?;
        Ok(if n <= n_min + 1e-12 {
            BoundStatus::Lower
        } else if n >= n_max - 1e-12 {
            BoundStatus::Upper
        } else {
            BoundStatus::Free
        })
    }
    /// `dMF` of steps up and down at the sampled depths of front layer `layer`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the layer is not a homogeneous mixture layer or the
    /// targets cannot be evaluated.
    pub fn step_profile(&mut self, layer: usize, spacing: f64) -> FilmResult<StepProfile> {
        let host = self.filter().layer(Side::Front, Position::Index(layer))?.clone();
        if host.is_graded() || host.index().is_none() {
            return Err(FilmError::Optimization(
                "steps need a homogeneous mixture layer".into(),
            ));
        }
        let bound = self.index_bound(layer, &host)?;
        let targets = self.targets().to_vec();
        let filter = self.filter_mut();
        let sensitivities = sensitivities(filter, &targets)?;
        step_profile(
            filter,
            &sensitivities,
            layer,
            depths(host.thickness(), spacing, 5),
            bound,
            targets.iter().map(Target::len).sum(),
        )
    }
    /// Find the step candidates of all front layers flagged for steps.
    ///
    /// The first and last sampled intervals of a layer are never candidates. Returns `None` if
    /// stopped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn scan_steps(
        &mut self,
        config: &StepConfig,
        stop: &StopToken,
    ) -> FilmResult<Option<Vec<StepCandidate>>> {
        config.check()?;
        let layers = self.filter().layers(Side::Front).to_vec();
        let mut bounds = Vec::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            bounds.push(if is_step_host(layer) {
                self.index_bound(i, layer)?
            } else {
                BoundStatus::Free
            });
        }
        let targets = self.targets().to_vec();
        let nb_values = targets.iter().map(Target::len).sum();
        let filter = self.filter_mut();
        let sensitivities = sensitivities(filter, &targets)?;
        let mut up = Vec::new();
        let mut down = Vec::new();
        for (i, layer) in layers.iter().enumerate() {
            if stop.is_stopped() {
                info!("step scan stopped");
                return Ok(None);
            }
            if !is_step_host(layer) {
                continue;
            }
            let profile = step_profile(
                filter,
                &sensitivities,
                i,
                depths(layer.thickness(), config.spacing, 5),
                bounds[i],
                nb_values,
            )?;
            for (list, track, kind) in [
                (&mut up, &profile.up, StepDirection::Up),
                (&mut down, &profile.down, StepDirection::Down),
            ] {
                for (depth, value) in negative_minima(&profile.depths, track, 2, config.spacing) {
                    debug!("step {kind} in layer {i} at {depth} nm: dMF = {value}");
                    list.push(Candidate {
                        layer: i,
                        depth,
                        value,
                        kind,
                    });
                }
            }
        }
        up.sort_by(|a, b| a.value.total_cmp(&b.value));
        down.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Some(dedupe(interleave(up, down))))
    }
    /// Insert the best steps into the working filter.
    ///
    /// The step height is the spacing of the discretization levels of the mixture. Returns the
    /// number of inserted steps (`0` if no step can improve the merit function), or `None` if
    /// stopped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated or a mixture has
    /// less than two discretization levels.
    pub fn add_steps(&mut self, config: &StepConfig, stop: &StopToken) -> FilmResult<Option<usize>> {
        let Some(candidates) = self.scan_steps(config, stop)? else {
            return Ok(None);
        };
        let mut selected = select(candidates, config.nb_steps, config.min_ratio);
        if selected.is_empty() {
            info!("no step improves the merit function");
            return Ok(Some(0));
        }
        selected.sort_by(|a, b| b.layer.cmp(&a.layer).then(b.depth.total_cmp(&a.depth)));
        let filter = self.filter();
        let center = filter.settings().center_wavelength();
        let mut layers = filter.layers(Side::Front).to_vec();
        for candidate in &selected {
            let host = layers[candidate.layer].clone();
            let material = filter.material(host.material()).ok_or_else(|| {
                FilmError::Optimization(format!("unknown material {}", host.material()))
            })?;
            let delta = match filter.levels(host.material()) {
                [first, second, ..] => (second - first).abs(),
                _ => {
                    return Err(FilmError::Optimization(format!(
                        "mixture {} has no discretization levels",
                        material.name()
                    )))
                }
            };
            let (n_min, n_max) = material.index_range(center);
            let n = filter.center_index(&host)?;
            let (n_bottom, n_top) = step_indices(n, delta, candidate.kind, n_min, n_max);
            info!(
                "adding a step {} in layer {} at {:.3} nm: {n_bottom:.4} -> {n_top:.4} (dMF = {})",
                candidate.kind, candidate.layer, candidate.depth, candidate.value
            );
            let mut bottom = host.clone();
            bottom.set_thickness(candidate.depth)?;
            bottom.set_index(n_bottom);
            let mut top = host;
            top.set_thickness((top.thickness() - candidate.depth).max(0.0))?;
            top.set_index(n_top);
            top.set_description(Some("step".into()));
            layers.splice(candidate.layer..=candidate.layer, [bottom, top]);
        }
        self.filter_mut().replace_layers(Side::Front, layers)?;
        self.rebuild()?;
        Ok(Some(selected.len()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::{test_filters, LayerFlags, Quantity},
        nanometer,
        optimization::RefinementConfig,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn flags() -> LayerFlags {
        LayerFlags {
            refine_thickness: true,
            refine_index: true,
            add_steps: true,
            ..LayerFlags::default()
        }
    }
    fn filter(n: f64) -> Filter {
        let mut filter = test_filters::bare(1.52);
        filter.set_consider_backside(false);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &test_filters::mixture(),
                300.0,
                Some(n),
            )
            .unwrap();
        filter
            .set_layer_flags(Side::Front, Position::Top, flags())
            .unwrap();
        filter
    }
    fn split(n: f64, depth: f64, n_top: f64) -> Filter {
        let mut filter = filter(n);
        filter
            .set_layer_thickness(Side::Front, Position::Bottom, depth)
            .unwrap();
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &test_filters::mixture(),
                300.0 - depth,
                Some(n_top),
            )
            .unwrap();
        filter
    }
    fn targets() -> Vec<Target> {
        [480.0, 560.0, 640.0]
            .into_iter()
            .map(|w| Target::discrete(Quantity::Reflection, nanometer!(w), 0.02, 0.01).unwrap())
            .collect()
    }
    #[test]
    fn profile_matches_finite_difference() {
        let mut refinement =
            Refinement::new(&filter(1.8), targets(), RefinementConfig::default()).unwrap();
        let profile = refinement.step_profile(0, 20.0).unwrap();
        assert_eq!(profile.depths.len(), 16);
        let targets = targets();
        let base = filter(1.8).merit_function(&targets).unwrap();
        let epsilon = 1e-6;
        for k in [3, 8, 12] {
            let depth = profile.depths[k];
            let moved = split(1.8, depth, 1.8 + epsilon)
                .merit_function(&targets)
                .unwrap();
            assert_relative_eq!(
                (moved - base) / epsilon,
                profile.up[k],
                epsilon = 1e-5,
                max_relative = 1e-3
            );
            assert_abs_diff_eq!(profile.up[k], -profile.down[k]);
        }
    }
    #[test]
    fn blocked_direction_at_bound() {
        let mut refinement =
            Refinement::new(&filter(2.25), targets(), RefinementConfig::default()).unwrap();
        let profile = refinement.step_profile(0, 20.0).unwrap();
        // the step up is centered: its offset to the free step is the same at every depth
        let offset = profile.up[0] + profile.down[0];
        for (up, down) in profile.up.iter().zip(&profile.down) {
            assert_abs_diff_eq!(up + down, offset, epsilon = 1e-9);
        }
        // at the top of the layer the upper part vanishes
        let last = profile.depths.len() - 1;
        assert_abs_diff_eq!(profile.down[last], 0.0, epsilon = 1e-9);
    }
    #[test]
    fn upper_bound_profile_matches_finite_difference() {
        let n = 2.25;
        let mut refinement =
            Refinement::new(&filter(n), targets(), RefinementConfig::default()).unwrap();
        assert_eq!(refinement.bound_status()[1], BoundStatus::Upper);
        let profile = refinement.step_profile(0, 20.0).unwrap();
        let targets = targets();
        let base = filter(n).merit_function(&targets).unwrap();
        let epsilon = 1e-6;
        let slope = |mut f: Filter| (f.merit_function(&targets).unwrap() - base) / epsilon;
        // only lowering is possible at the upper bound
        let whole = -slope(filter(n - epsilon));
        for k in [3, 8, 12] {
            let depth = profile.depths[k];
            let above = -slope(split(n, depth, n - epsilon));
            assert_relative_eq!(
                profile.up[k],
                above - whole / 2.0,
                epsilon = 1e-4,
                max_relative = 1e-3
            );
            assert_relative_eq!(profile.down[k], -above, epsilon = 1e-4, max_relative = 1e-3);
            // the inserted step (n - δ, n)
            let (bottom, top) = step_indices(n, epsilon, StepDirection::Up, 1.45, 2.25);
            assert_relative_eq!(
                slope(split(bottom, depth, top)),
                profile.up[k] - whole / 2.0,
                epsilon = 1e-4,
                max_relative = 1e-3
            );
        }
    }
    #[test]
    fn lower_bound_profile_matches_finite_difference() {
        let n = 1.45;
        let mut refinement =
            Refinement::new(&filter(n), targets(), RefinementConfig::default()).unwrap();
        assert_eq!(refinement.bound_status()[1], BoundStatus::Lower);
        let profile = refinement.step_profile(0, 20.0).unwrap();
        let targets = targets();
        let base = filter(n).merit_function(&targets).unwrap();
        let epsilon = 1e-6;
        let slope = |mut f: Filter| (f.merit_function(&targets).unwrap() - base) / epsilon;
        // only raising is possible at the lower bound
        let whole = slope(filter(n + epsilon));
        for k in [3, 8, 12] {
            let depth = profile.depths[k];
            let above = slope(split(n, depth, n + epsilon));
            assert_relative_eq!(profile.up[k], above, epsilon = 1e-4, max_relative = 1e-3);
            assert_relative_eq!(
                profile.down[k],
                whole / 2.0 - above,
                epsilon = 1e-4,
                max_relative = 1e-3
            );
            // the inserted step (n + δ, n)
            let (bottom, top) = step_indices(n, epsilon, StepDirection::Down, 1.45, 2.25);
            assert_relative_eq!(
                slope(split(bottom, depth, top)),
                profile.down[k] + whole / 2.0,
                epsilon = 1e-4,
                max_relative = 1e-3
            );
        }
    }
    #[test]
    fn indices_stay_in_range() {
        let cases = [
            (1.8, StepDirection::Up, (1.8, 1.9)),
            (2.25, StepDirection::Up, (2.15, 2.25)),
            (1.8, StepDirection::Down, (1.8, 1.7)),
            (1.45, StepDirection::Down, (1.55, 1.45)),
        ];
        for (n, direction, (bottom, top)) in cases {
            let indices = step_indices(n, 0.1, direction, 1.45, 2.25);
            assert_abs_diff_eq!(indices.0, bottom, epsilon = 1e-12);
            assert_abs_diff_eq!(indices.1, top, epsilon = 1e-12);
        }
    }
    #[test]
    fn dedupe_keeps_alternating_detections() {
        let candidate = |depth, value, kind| Candidate {
            layer: 0,
            depth,
            value,
            kind,
        };
        let kept = dedupe(vec![
            candidate(10.0, -3.0, StepDirection::Up),
            candidate(20.0, -1.0, StepDirection::Up),
            candidate(30.0, -2.0, StepDirection::Down),
            candidate(40.0, -0.5, StepDirection::Up),
        ]);
        let depths: Vec<f64> = kept.iter().map(|c| c.depth).collect();
        assert_eq!(depths, vec![10.0, 30.0, 40.0]);
    }
    #[test]
    fn steps_keep_the_merit_function_close() {
        let mut refinement =
            Refinement::new(&filter(1.8), targets(), RefinementConfig::default()).unwrap();
        let config = StepConfig {
            spacing: 10.0,
            ..StepConfig::default()
        };
        let added = refinement
            .add_steps(&config, &StopToken::new())
            .unwrap()
            .unwrap();
        let layers = refinement.filter().layers(Side::Front);
        assert_eq!(layers.len(), 1 + added);
        for layer in layers {
            let n = layer.index().unwrap();
            assert!((1.45..=2.25).contains(&n));
            assert!(layer.flags().add_steps);
        }
        assert_eq!(refinement.parameters().len(), 2 * layers.len());
    }
    #[test]
    fn graded_or_plain_layers_have_no_profile() {
        let mut filter = test_filters::bare(1.52);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &crate::materials::Material::constant("H", 2.0).unwrap(),
                100.0,
                None,
            )
            .unwrap();
        let mut refinement = Refinement::new(&filter, targets(), RefinementConfig::default()).unwrap();
        assert!(refinement.step_profile(0, 10.0).is_err());
    }
}
