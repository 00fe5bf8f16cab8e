//! Local refinement of the thicknesses and indices of the front layers.
//!
//! A [`Refinement`] works on its own copy of the filter. The original filter only changes when
//! [`Refinement::copy_to_filter`] is called, so a stopped or failed refinement leaves it intact.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::{
    model::{Parameter, RefinementModel},
    BoundStatus, LevenbergMarquardt, LmConfig, Status,
};
use crate::{
    error::{FilmError, FilmResult},
    filter::{Filter, Layer, LayerProfile, Position, Side},
    targets::Target,
    utils::{usize_to_f64, Progress, StopToken},
};

/// Settings of a refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// maximal number of iterations of [`Refinement::go`]
    pub max_iterations: usize,
    /// adjacent homogeneous layers of the same mixture are merged if their indices differ by less
    pub min_delta_n: f64,
    /// solver settings
    pub solver: LmConfig,
}
impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            min_delta_n: 1e-3,
            solver: LmConfig::default(),
        }
    }
}

/// Why [`Refinement::go`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Termination {
    /// the merit function is acceptable or does not change anymore
    Converged,
    /// the maximal number of iterations was reached
    MaxIterations,
    /// no step decreases the merit function
    NotImproving,
    /// stopped by the caller
    Stopped,
}

/// Refinement of a filter with respect to a set of targets.
#[derive(Debug, Clone)]
pub struct Refinement {
    model: RefinementModel,
    solver: LevenbergMarquardt,
    config: RefinementConfig,
    iterations: usize,
    generation: u64,
    need_to_reset_filter: bool,
}
impl Refinement {
    /// Prepare the refinement of `filter`.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - no target is given
    ///   - a target is invalid or cannot be evaluated
    pub fn new(filter: &Filter, targets: Vec<Target>, config: RefinementConfig) -> FilmResult<Self> {
        if targets.is_empty() {
            return Err(FilmError::Optimization("refinement needs targets".into()));
        }
        let mut model = RefinementModel::new(filter.clone(), targets)?;
        let solver = build_solver(&mut model, config.solver)?;
        info!(
            "refinement of {} parameters, initial chi² = {}",
            model.parameters().len(),
            solver.chi_2()
        );
        Ok(Self {
            model,
            solver,
            config,
            iterations: 0,
            generation: 0,
            need_to_reset_filter: false,
        })
    }
    /// Rebuild the parameter list and the solver after a structural change of the working filter.
    pub(crate) fn rebuild(&mut self) -> FilmResult<()> {
        self.model.collect_parameters()?;
        self.solver = build_solver(&mut self.model, self.config.solver)?;
        self.generation += 1;
        self.need_to_reset_filter = true;
        debug!(
            "refinement rebuilt (generation {}), {} parameters",
            self.generation,
            self.model.parameters().len()
        );
        Ok(())
    }
    /// Perform one iteration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn iterate(&mut self) -> FilmResult<Status> {
        let status = self.solver.iterate(&mut self.model)?;
        self.iterations += 1;
        debug!(
            "iteration {}: chi² = {} ({status})",
            self.iterations,
            self.solver.chi_2()
        );
        Ok(status)
    }
    /// Iterate until convergence, the maximal number of iterations or a stop request.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn go(&mut self, stop: &StopToken, progress: &Progress) -> FilmResult<Termination> {
        let max_iterations = self.config.max_iterations;
        for i in 0..max_iterations {
            if stop.is_stopped() {
                info!("refinement stopped");
                return Ok(Termination::Stopped);
            }
            let status = self.iterate()?;
            progress.advance(usize_to_f64(i + 1) / usize_to_f64(max_iterations));
            let termination = match status {
                Status::Improving => continue,
                Status::Chi2IsOk | Status::Chi2ChangeTooSmall => Termination::Converged,
                Status::NotImproving => Termination::NotImproving,
            };
            info!(
                "refinement {termination} after {} iterations, chi² = {}",
                i + 1,
                self.chi_2()
            );
            return Ok(termination);
        }
        progress.advance(1.0);
        info!("refinement reached {max_iterations} iterations, chi² = {}", self.chi_2());
        Ok(Termination::MaxIterations)
    }
    /// Settings of this refinement.
    #[must_use]
    pub const fn config(&self) -> &RefinementConfig {
        &self.config
    }
    /// Current merit function.
    #[must_use]
    pub const fn chi_2(&self) -> f64 {
        self.solver.chi_2()
    }
    /// Norm of the gradient of the merit function.
    #[must_use]
    pub fn norm_gradient(&self) -> f64 {
        self.solver.norm_gradient()
    }
    /// Number of iterations performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
    /// Number of structural changes of the working filter.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
    /// The refined parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        self.model.parameters()
    }
    /// Bound status of every parameter.
    #[must_use]
    pub fn bound_status(&self) -> Vec<BoundStatus> {
        (0..self.parameters().len())
            .map(|j| self.solver.bound_status(j))
            .collect()
    }
    /// The solver of the current generation.
    #[must_use]
    pub const fn solver(&self) -> &LevenbergMarquardt {
        &self.solver
    }
    /// The working filter.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        self.model.filter()
    }
    pub(crate) fn filter_mut(&mut self) -> &mut Filter {
        self.model.filter_mut()
    }
    /// The targets.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        self.model.targets()
    }
    /// Remove the front layers thinner than the minimum thickness of the filter, then merge
    /// adjacent layers of the same material. Returns `true` if the structure changed.
    ///
    /// The optical thickness of a removed layer goes to its homogeneous neighbours (half each if
    /// both can take it). Homogeneous mixture layers are only merged if their indices differ by
    /// less than the minimal index difference.
    ///
    /// # Errors
    ///
    /// This function will return an error if the layers are inconsistent with the material table.
    pub fn remove_thin_layers(&mut self) -> FilmResult<bool> {
        let filter = self.model.filter();
        let minimum = filter.settings().minimum_thickness();
        let mut layers = filter.layers(Side::Front).to_vec();
        let mut changed = false;
        while let Some(i) = layers
            .iter()
            .position(|l| !l.is_graded() && l.thickness() < minimum)
        {
            let optical_thickness = filter.optical_thickness(&layers[i])?;
            let eligible: Vec<usize> = [i.checked_sub(1), Some(i + 1)]
                .into_iter()
                .flatten()
                .filter(|j| layers.get(*j).is_some_and(|l| !l.is_graded()))
                .collect();
            let share = if eligible.is_empty() {
                0.0
            } else {
                optical_thickness / usize_to_f64(eligible.len())
            };
            for j in eligible {
                let n = filter.center_index(&layers[j])?;
                let thickness = layers[j].thickness() + share / n;
                layers[j].set_thickness(thickness)?;
            }
            debug!("removing thin front layer {i}");
            layers.remove(i);
            changed = true;
        }
        let mut i = layers.len();
        while i > 1 {
            i -= 1;
            if let Some(merged) = self.merge(&layers[i - 1], &layers[i])? {
                debug!("merging front layers {} and {i}", i - 1);
                layers[i - 1] = merged;
                layers.remove(i);
                changed = true;
            }
        }
        if changed {
            info!(
                "thin layer removal leaves {} front layers",
                layers.len()
            );
            self.model
                .filter_mut()
                .replace_layers(Side::Front, layers)?;
            self.rebuild()?;
        }
        Ok(changed)
    }
    fn merge(&self, lower: &Layer, upper: &Layer) -> FilmResult<Option<Layer>> {
        if lower.material() != upper.material() {
            return Ok(None);
        }
        let flags = if lower.flags().any() {
            lower.flags()
        } else {
            upper.flags()
        };
        let mut merged = match (lower.profile(), upper.profile()) {
            (
                LayerProfile::Homogeneous {
                    thickness: d_1,
                    index: n_1,
                },
                LayerProfile::Homogeneous {
                    thickness: d_2,
                    index: n_2,
                },
            ) => match (n_1, n_2) {
                (None, None) => Layer::homogeneous(lower.material(), d_1 + d_2, None),
                (Some(n_1), Some(n_2)) if (n_1 - n_2).abs() < self.config.min_delta_n => {
                    let thickness = d_1 + d_2;
                    let n = if thickness > 0.0 {
                        n_1.mul_add(*d_1, n_2 * d_2) / thickness
                    } else {
                        *n_1
                    };
                    Layer::homogeneous(lower.material(), thickness, Some(n))
                }
                _ => return Ok(None),
            },
            (
                LayerProfile::Graded {
                    thicknesses: d_1,
                    steps: s_1,
                },
                LayerProfile::Graded {
                    thicknesses: d_2,
                    steps: s_2,
                },
            ) => Layer::graded(
                lower.material(),
                d_1.iter().chain(d_2).copied().collect(),
                s_1.iter().chain(s_2).copied().collect(),
            )?,
            _ => return Ok(None),
        };
        if !merged.is_graded() {
            merged.set_flags(flags)?;
        }
        merged.set_description(lower.description().map(str::to_owned));
        Ok(Some(merged))
    }
    /// Write the refined front layers into `filter`.
    ///
    /// After a structural change the whole front stack is replaced, otherwise only the refined
    /// values are updated.
    ///
    /// # Errors
    ///
    /// This function will return an error if `filter` does not match the refined filter.
    pub fn copy_to_filter(&self, filter: &mut Filter) -> FilmResult<()> {
        let working = self.model.filter();
        if self.need_to_reset_filter {
            let mut layers = Vec::with_capacity(working.layers(Side::Front).len());
            for layer in working.layers(Side::Front) {
                let material = working.material(layer.material()).ok_or_else(|| {
                    FilmError::Optimization(format!("unknown material {}", layer.material()))
                })?;
                let mut layer = layer.clone();
                layer.set_material(filter.get_material_nb(material)?);
                layers.push(layer);
            }
            return filter.replace_layers(Side::Front, layers);
        }
        if filter.layers(Side::Front).len() != working.layers(Side::Front).len() {
            warn!("the filter changed during its refinement");
            return Err(FilmError::Optimization(
                "the filter does not match the refined filter".into(),
            ));
        }
        for parameter in self.parameters() {
            let position = Position::Index(parameter.layer());
            let layer = working.layer(Side::Front, position)?;
            match parameter {
                Parameter::Thickness(_) => {
                    filter.set_layer_thickness(Side::Front, position, layer.thickness())?;
                }
                Parameter::Index(_) | Parameter::IndexConstantOt(_) => {
                    let n = working.center_index(layer)?;
                    filter.set_layer_index(Side::Front, position, n)?;
                    filter.set_layer_thickness(Side::Front, position, layer.thickness())?;
                }
            }
        }
        Ok(())
    }
}

fn build_solver(model: &mut RefinementModel, config: LmConfig) -> FilmResult<LevenbergMarquardt> {
    let (values, tolerances, inequalities) = model.target_values();
    let mut solver = LevenbergMarquardt::new(model.current_values()?, values, tolerances, config)?;
    let (lower, upper) = model.bounds()?;
    solver.set_limits(lower, upper)?;
    solver.set_inequalities(inequalities)?;
    solver.prepare(model)?;
    Ok(solver)
}
