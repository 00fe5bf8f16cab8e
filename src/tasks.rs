#![warn(missing_docs)]
//! Tasks
//!
//! A [`Task`] determines what is done with the filter of a
//! [`FilmDocument`](crate::document::FilmDocument): computing a spectral quantity, monitoring
//! curves, the electric field, or optimizing the filter against the targets of the document.
//! Tasks are run in the order of the document. Optimization tasks modify the filter, so later
//! tasks see the optimized design.
use std::fmt::Display;

use log::info;
use serde::{Deserialize, Serialize};
use strum::EnumIter;
use uom::si::{angle::degree, f64::Angle};

use crate::{
    error::{FilmError, FilmResult},
    filter::{field::ElectricField, monitoring::LayerMonitoring, Filter, Illumination, Quantity, Side},
    optimization::{
        NeedleConfig, Refinement, RefinementConfig, StepConfig, SynthesisConfig, SynthesisEnd,
        SynthesisMethod, Termination,
    },
    spectrum::Spectrum,
    targets::Target,
    utils::{Progress, StopToken},
    wavelengths::{WavelengthSet, WavelengthSpec},
};

/// Settings of a spectral analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisTask {
    /// the computed quantity
    pub quantity: Quantity,
    /// angle, polarization and direction of the incident light
    pub illumination: Illumination,
    /// wavelengths of the analysis. The wavelengths of the filter are used if not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wavelengths: Option<WavelengthSpec>,
}
impl Default for AnalysisTask {
    fn default() -> Self {
        Self {
            quantity: Quantity::Reflection,
            illumination: Illumination::default(),
            wavelengths: None,
        }
    }
}

/// Settings of the monitoring curves of one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringTask {
    /// the monitored quantity
    pub quantity: Quantity,
    /// the deposited side
    pub side: Side,
    /// angle, polarization and direction of the monitoring light
    pub illumination: Illumination,
    /// monitoring wavelengths. The wavelengths of the filter are used if not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wavelengths: Option<WavelengthSpec>,
}
impl Default for MonitoringTask {
    fn default() -> Self {
        Self {
            quantity: Quantity::Transmission,
            side: Side::Front,
            illumination: Illumination::default(),
            wavelengths: None,
        }
    }
}

/// Settings of an ellipsometric analysis of the front side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipsometryTask {
    /// angle of incidence
    pub angle: Angle,
    /// wavelengths of the analysis. The wavelengths of the filter are used if not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wavelengths: Option<WavelengthSpec>,
}
impl Default for EllipsometryTask {
    fn default() -> Self {
        Self {
            angle: Angle::new::<degree>(70.0),
            wavelengths: None,
        }
    }
}

/// Settings of an electric field calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTask {
    /// wavelength (nm)
    pub wavelength: f64,
    /// angle and polarization of the incident light
    pub illumination: Illumination,
    /// sampling distance inside the layers (nm)
    pub sublayer_thickness: f64,
}
impl Default for FieldTask {
    fn default() -> Self {
        Self {
            wavelength: 550.0,
            illumination: Illumination::default(),
            sublayer_thickness: 1.0,
        }
    }
}

/// Settings of a needle synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedleTask {
    /// settings of the refinements between insertions
    pub refinement: RefinementConfig,
    /// needle search settings
    pub needles: NeedleConfig,
    /// maximal number of insertion cycles
    pub max_cycles: usize,
}
impl Default for NeedleTask {
    fn default() -> Self {
        Self {
            refinement: RefinementConfig::default(),
            needles: NeedleConfig::default(),
            max_cycles: SynthesisConfig::default().max_cycles,
        }
    }
}

/// Settings of a step synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTask {
    /// settings of the refinements between insertions
    pub refinement: RefinementConfig,
    /// step search settings
    pub steps: StepConfig,
    /// maximal number of insertion cycles
    pub max_cycles: usize,
}
impl Default for StepTask {
    fn default() -> Self {
        Self {
            refinement: RefinementConfig::default(),
            steps: StepConfig::default(),
            max_cycles: SynthesisConfig::default().max_cycles,
        }
    }
}

/// Type of task to be performed.
#[non_exhaustive]
#[derive(EnumIter, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// Spectrum (or color) of a quantity.
    Analysis(AnalysisTask),
    /// Quantity as a function of the deposited thickness, layer by layer.
    Monitoring(MonitoringTask),
    /// Psi and Delta of the front side.
    Ellipsometry(EllipsometryTask),
    /// Electric field distribution in the front stack.
    ElectricField(FieldTask),
    /// Refinement of the flagged layers against the targets.
    Refinement(RefinementConfig),
    /// Refinement alternating with needle insertion.
    Needles(NeedleTask),
    /// Refinement alternating with step insertion.
    Steps(StepTask),
}
impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Analysis(_) => "analysis",
            Self::Monitoring(_) => "monitoring",
            Self::Ellipsometry(_) => "ellipsometry",
            Self::ElectricField(_) => "electric field",
            Self::Refinement(_) => "refinement",
            Self::Needles(_) => "needle synthesis",
            Self::Steps(_) => "step synthesis",
        };
        write!(f, "{msg}")
    }
}

/// Summary of an optimization task.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSummary {
    /// why the optimization stopped
    pub end: String,
    /// merit function before the optimization
    pub initial_chi_2: f64,
    /// merit function of the committed filter
    pub chi_2: f64,
    /// number of front layers of the committed filter
    pub nb_layers: usize,
}

/// Result of a [`Task`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    /// named spectra
    Spectra(Vec<(String, Spectrum)>),
    /// tristimulus values
    Color([f64; 3]),
    /// one monitoring curve per layer, evaluated at the given wavelengths
    Monitoring {
        /// the wavelengths of the values of every sample
        wavelengths: Vec<f64>,
        /// the curves
        curves: Vec<LayerMonitoring>,
    },
    /// electric field distribution
    Field(ElectricField),
    /// the filter was optimized
    Optimization(OptimizationSummary),
}

fn wavelengths(filter: &Filter, spec: Option<&WavelengthSpec>) -> FilmResult<WavelengthSet> {
    spec.map_or_else(|| filter.wavelengths(), WavelengthSpec::to_wavelength_set)
}

impl Task {
    /// Returns `true` if the task modifies the filter.
    #[must_use]
    pub const fn is_optimization(&self) -> bool {
        matches!(self, Self::Refinement(_) | Self::Needles(_) | Self::Steps(_))
    }
    /// Run this task on `filter`.
    ///
    /// Optimization tasks commit their result to `filter` unless they are stopped.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the wavelengths of the task are invalid
    ///   - the requested quantity cannot be computed (see [`Filter::analyse`])
    ///   - an optimization task is run without targets
    pub fn run(
        &self,
        filter: &mut Filter,
        targets: &[Target],
        stop: &StopToken,
        progress: &Progress,
    ) -> FilmResult<TaskResult> {
        info!("running {self}");
        match self {
            Self::Analysis(task) => {
                if let Quantity::Color(coefficient) = task.quantity {
                    return Ok(TaskResult::Color(
                        filter.color(&task.illumination, coefficient)?,
                    ));
                }
                let wavelengths = wavelengths(filter, task.wavelengths.as_ref())?;
                let values = filter.analyse(task.quantity, &wavelengths, &task.illumination)?;
                Ok(TaskResult::Spectra(vec![(
                    format!("{:?}", task.quantity),
                    Spectrum::new(&wavelengths, values)?,
                )]))
            }
            Self::Monitoring(task) => {
                let wavelengths = if task.quantity.is_color() {
                    filter.colorimeter()?.wavelengths().clone()
                } else {
                    wavelengths(filter, task.wavelengths.as_ref())?
                };
                let curves = filter.monitoring_with_progress(
                    task.quantity,
                    task.side,
                    &wavelengths,
                    &task.illumination,
                    stop,
                    progress,
                )?;
                let wavelengths = if task.quantity.is_color() {
                    vec![0.0, 1.0, 2.0]
                } else {
                    wavelengths.iter().copied().collect()
                };
                Ok(TaskResult::Monitoring {
                    wavelengths,
                    curves,
                })
            }
            Self::Ellipsometry(task) => {
                let wavelengths = wavelengths(filter, task.wavelengths.as_ref())?;
                let (psi, delta) = filter.ellipsometry(&wavelengths, task.angle)?;
                Ok(TaskResult::Spectra(vec![
                    ("Psi".into(), psi),
                    ("Delta".into(), delta),
                ]))
            }
            Self::ElectricField(task) => Ok(TaskResult::Field(filter.electric_field(
                task.wavelength,
                &task.illumination,
                task.sublayer_thickness,
            )?)),
            Self::Refinement(config) => {
                let mut refinement = Refinement::new(filter, targets.to_vec(), *config)?;
                let initial_chi_2 = refinement.chi_2();
                let end = refinement.go(stop, progress)?;
                commit(filter, &refinement, end == Termination::Stopped, end, initial_chi_2)
            }
            Self::Needles(task) => synthesize(
                filter,
                targets,
                task.refinement,
                &SynthesisConfig {
                    method: SynthesisMethod::Needles,
                    max_cycles: task.max_cycles,
                    needles: task.needles,
                    ..SynthesisConfig::default()
                },
                stop,
                progress,
            ),
            Self::Steps(task) => synthesize(
                filter,
                targets,
                task.refinement,
                &SynthesisConfig {
                    method: SynthesisMethod::Steps,
                    max_cycles: task.max_cycles,
                    steps: task.steps,
                    ..SynthesisConfig::default()
                },
                stop,
                progress,
            ),
        }
    }
}

fn synthesize(
    filter: &mut Filter,
    targets: &[Target],
    refinement: RefinementConfig,
    config: &SynthesisConfig,
    stop: &StopToken,
    progress: &Progress,
) -> FilmResult<TaskResult> {
    let mut refinement = Refinement::new(filter, targets.to_vec(), refinement)?;
    let initial_chi_2 = refinement.chi_2();
    let end = refinement.synthesize(config, stop, progress)?;
    commit(
        filter,
        &refinement,
        end == SynthesisEnd::Stopped,
        end,
        initial_chi_2,
    )
}

fn commit(
    filter: &mut Filter,
    refinement: &Refinement,
    stopped: bool,
    end: impl Display,
    initial_chi_2: f64,
) -> FilmResult<TaskResult> {
    if stopped {
        return Err(FilmError::Optimization(
            "optimization stopped, the filter is left unchanged".into(),
        ));
    }
    refinement.copy_to_filter(filter)?;
    info!(
        "optimization ended ({end}): chi² {initial_chi_2} -> {}",
        refinement.chi_2()
    );
    Ok(TaskResult::Optimization(OptimizationSummary {
        end: end.to_string(),
        initial_chi_2,
        chi_2: refinement.chi_2(),
        nb_layers: filter.layers(Side::Front).len(),
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::{test_filters, LayerFlags, Position},
        materials::Material,
        nanometer,
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use strum::IntoEnumIterator;

    fn single_layer(thickness: f64) -> Filter {
        let mut filter = test_filters::bare(1.52);
        filter.set_consider_backside(false);
        filter.set_consider_backside_on_monitoring(false);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &Material::constant("H", 2.1).unwrap(),
                thickness,
                None,
            )
            .unwrap();
        filter
            .set_layer_flags(Side::Front, Position::Top, LayerFlags::refinable())
            .unwrap();
        filter
    }
    #[test]
    fn display() {
        assert_eq!(format!("{}", Task::Analysis(AnalysisTask::default())), "analysis");
        assert_eq!(
            format!("{}", Task::Needles(NeedleTask::default())),
            "needle synthesis"
        );
        assert_eq!(Task::iter().count(), 7);
        assert_eq!(Task::iter().filter(Task::is_optimization).count(), 3);
    }
    #[test]
    fn serde_defaults() {
        let task: Task = serde_yaml::from_str("!Analysis\nquantity: Transmission").unwrap();
        assert_matches!(task, Task::Analysis(AnalysisTask { quantity: Quantity::Transmission, wavelengths: None, .. }));
        let task: Task = serde_yaml::from_str("!Needles\nmax_cycles: 3").unwrap();
        assert_matches!(task, Task::Needles(NeedleTask { max_cycles: 3, .. }));
        let task: Task = serde_yaml::from_str("!Refinement {}").unwrap();
        assert_eq!(task, Task::Refinement(RefinementConfig::default()));
    }
    #[test]
    fn analysis_uses_the_task_wavelengths() {
        let mut filter = single_layer(100.0);
        let task = Task::Analysis(AnalysisTask {
            wavelengths: Some(WavelengthSpec::List(vec![500.0, 600.0])),
            ..AnalysisTask::default()
        });
        let result = task
            .run(&mut filter, &[], &StopToken::new(), &Progress::new())
            .unwrap();
        let TaskResult::Spectra(spectra) = result else {
            panic!("spectra expected");
        };
        assert_eq!(spectra.len(), 1);
        assert_eq!(spectra[0].1.wavelengths(), vec![500.0, 600.0]);
        let expected = filter
            .reflection(
                &WavelengthSet::new(vec![500.0, 600.0]).unwrap(),
                &Illumination::default(),
            )
            .unwrap();
        assert_eq!(spectra[0].1, expected);
    }
    #[test]
    fn monitoring_ends_with_the_final_value() {
        let mut filter = single_layer(100.0);
        let task = Task::Monitoring(MonitoringTask {
            wavelengths: Some(WavelengthSpec::List(vec![550.0])),
            ..MonitoringTask::default()
        });
        let result = task
            .run(&mut filter, &[], &StopToken::new(), &Progress::new())
            .unwrap();
        let TaskResult::Monitoring { wavelengths, curves } = result else {
            panic!("monitoring expected");
        };
        assert_eq!(wavelengths, vec![550.0]);
        assert_eq!(curves.len(), 1);
        let last = curves[0].values.last().unwrap()[0];
        let final_t = filter
            .transmission(
                &WavelengthSet::new(vec![550.0]).unwrap(),
                &Illumination::default(),
            )
            .unwrap()
            .values()[0];
        assert_abs_diff_eq!(last, final_t, epsilon = 1e-9);
    }
    #[test]
    fn refinement_commits_to_the_filter() {
        let reference = single_layer(50.0).reflection(
            &WavelengthSet::new(vec![550.0]).unwrap(),
            &Illumination::default(),
        );
        let r = reference.unwrap().values()[0];
        let targets =
            vec![Target::discrete(Quantity::Reflection, nanometer!(550.0), r, 0.01).unwrap()];
        let mut filter = single_layer(45.0);
        let result = Task::Refinement(RefinementConfig::default())
            .run(&mut filter, &targets, &StopToken::new(), &Progress::new())
            .unwrap();
        let TaskResult::Optimization(summary) = result else {
            panic!("optimization summary expected");
        };
        assert!(summary.chi_2 < summary.initial_chi_2);
        assert_eq!(summary.nb_layers, 1);
        assert_abs_diff_eq!(
            filter.layers(Side::Front)[0].thickness(),
            50.0,
            epsilon = 1e-3
        );
    }
    #[test]
    fn optimization_needs_targets() {
        let mut filter = single_layer(45.0);
        assert!(Task::Refinement(RefinementConfig::default())
            .run(&mut filter, &[], &StopToken::new(), &Progress::new())
            .is_err());
    }
    #[test]
    fn stopped_optimization_keeps_the_filter() {
        let targets =
            vec![Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.0, 0.01).unwrap()];
        let mut filter = single_layer(45.0);
        let original = filter.clone();
        let stop = StopToken::new();
        stop.stop();
        assert_matches!(
            Task::Needles(NeedleTask::default()).run(&mut filter, &targets, &stop, &Progress::new()),
            Err(FilmError::Optimization(_))
        );
        assert_eq!(filter, original);
    }
}
