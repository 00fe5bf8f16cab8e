//! Automatic synthesis: refinement alternating with thin layer removal and needle or step
//! insertion.
use log::info;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::{NeedleConfig, Refinement, StepConfig, Termination};
use crate::{
    error::FilmResult,
    filter::Side,
    utils::{usize_to_f64, Progress, StopToken},
};

/// Structural perturbation added between refinements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter)]
pub enum SynthesisMethod {
    /// thin layers of another material
    #[default]
    Needles,
    /// index steps inside mixture layers
    Steps,
}

/// Settings of an automatic synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// the perturbation
    pub method: SynthesisMethod,
    /// maximal number of insertion cycles
    pub max_cycles: usize,
    /// needle settings
    pub needles: NeedleConfig,
    /// step settings
    pub steps: StepConfig,
}
impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            method: SynthesisMethod::default(),
            max_cycles: 20,
            needles: NeedleConfig::default(),
            steps: StepConfig::default(),
        }
    }
}
impl SynthesisConfig {
    /// Settings for `method` with `max_cycles` cycles.
    #[must_use]
    pub fn new(method: SynthesisMethod, max_cycles: usize) -> Self {
        Self {
            method,
            max_cycles,
            ..Self::default()
        }
    }
}

/// Why [`Refinement::synthesize`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SynthesisEnd {
    /// the merit function is acceptable
    Acceptable,
    /// no perturbation improves the merit function
    NoImprovement,
    /// the maximal number of cycles was reached
    MaxCycles,
    /// stopped by the caller
    Stopped,
}

impl Refinement {
    /// Refine, remove thin layers and insert perturbations until the merit function is
    /// acceptable or no perturbation helps anymore.
    ///
    /// A successful thin layer removal restarts the refinement before new perturbations are
    /// searched. The working filter is only committed through [`Refinement::copy_to_filter`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn synthesize(
        &mut self,
        config: &SynthesisConfig,
        stop: &StopToken,
        progress: &Progress,
    ) -> FilmResult<SynthesisEnd> {
        let scratch = Progress::new();
        let acceptable = self.config().solver.acceptable_chi_2;
        let mut cycle = 0;
        loop {
            scratch.restart();
            if self.go(stop, &scratch)? == Termination::Stopped {
                return Ok(SynthesisEnd::Stopped);
            }
            if self.chi_2() <= acceptable {
                info!("synthesis reached an acceptable merit function {}", self.chi_2());
                return Ok(SynthesisEnd::Acceptable);
            }
            if self.remove_thin_layers()? {
                continue;
            }
            if cycle >= config.max_cycles {
                info!("synthesis reached {} cycles", config.max_cycles);
                return Ok(SynthesisEnd::MaxCycles);
            }
            let added = match config.method {
                SynthesisMethod::Needles => self.add_needles(&config.needles, stop)?,
                SynthesisMethod::Steps => self.add_steps(&config.steps, stop)?,
            };
            match added {
                None => return Ok(SynthesisEnd::Stopped),
                Some(0) => {
                    info!("synthesis cannot improve chi² = {} any further", self.chi_2());
                    return Ok(SynthesisEnd::NoImprovement);
                }
                Some(nb) => {
                    cycle += 1;
                    info!(
                        "synthesis cycle {cycle}: {nb} {} added, {} front layers",
                        config.method,
                        self.filter().layers(Side::Front).len()
                    );
                    progress.advance(usize_to_f64(cycle) / usize_to_f64(config.max_cycles.max(1)));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::{test_filters, LayerFlags, Position, Quantity},
        materials::Material,
        nanometer,
        optimization::RefinementConfig,
        targets::Target,
    };

    fn targets() -> Vec<Target> {
        [450.0, 500.0, 550.0, 600.0, 650.0]
            .into_iter()
            .map(|w| Target::discrete(Quantity::Reflection, nanometer!(w), 0.0, 0.01).unwrap())
            .collect()
    }
    #[test]
    fn needle_synthesis_improves_an_antireflection_coating() {
        let mut filter = test_filters::bare(1.52);
        filter.set_consider_backside(false);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &Material::constant("TiO2", 2.3).unwrap(),
                250.0,
                None,
            )
            .unwrap();
        filter
            .set_layer_flags(
                Side::Front,
                Position::Top,
                LayerFlags {
                    add_needles: true,
                    ..LayerFlags::refinable()
                },
            )
            .unwrap();
        filter
            .set_needle_materials(vec![Material::constant("SiO2", 1.46).unwrap()])
            .unwrap();
        let original = filter.clone();
        let initial = filter.merit_function(&targets()).unwrap();
        let mut refinement =
            Refinement::new(&filter, targets(), RefinementConfig::default()).unwrap();
        let progress = Progress::new();
        let end = refinement
            .synthesize(
                &SynthesisConfig::new(SynthesisMethod::Needles, 3),
                &StopToken::new(),
                &progress,
            )
            .unwrap();
        assert_ne!(end, SynthesisEnd::Stopped);
        assert!(refinement.chi_2() < initial);
        assert_eq!(filter, original);
        refinement.copy_to_filter(&mut filter).unwrap();
        let committed = filter.merit_function(&targets()).unwrap();
        approx::assert_relative_eq!(committed, refinement.chi_2(), max_relative = 1e-9);
    }
    #[test]
    fn stopped_synthesis() {
        let filter = test_filters::hl_stack(2);
        let mut refinement =
            Refinement::new(&filter, targets(), RefinementConfig::default()).unwrap();
        let stop = StopToken::new();
        stop.stop();
        assert_eq!(
            refinement
                .synthesize(&SynthesisConfig::default(), &stop, &Progress::new())
                .unwrap(),
            SynthesisEnd::Stopped
        );
    }
    #[test]
    fn serde_defaults() {
        let config: SynthesisConfig = serde_yaml::from_str("method: Steps").unwrap();
        assert_eq!(config.method, SynthesisMethod::Steps);
        assert_eq!(config.max_cycles, 20);
        assert_eq!(config.needles, NeedleConfig::default());
    }
}
