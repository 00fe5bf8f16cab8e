#![warn(missing_docs)]
//! Optimization of filters with respect to targets.
//!
//! [`Refinement`] adjusts the thicknesses and indices of the flagged front layers with a bounded
//! [`LevenbergMarquardt`] solver. Needles and steps add layers where the derivative of the merit
//! function predicts an improvement, and [`Refinement::synthesize`] alternates both.
pub mod candidates;
pub mod levenberg_marquardt;
pub mod model;
pub mod needles;
pub mod refinement;
pub mod steps;
pub mod synthesis;

pub use candidates::Candidate;
pub use levenberg_marquardt::{BoundStatus, LeastSquaresModel, LevenbergMarquardt, LmConfig, Status};
pub use model::{Parameter, RefinementModel};
pub use needles::{NeedleCandidate, NeedleConfig};
pub use refinement::{Refinement, RefinementConfig, Termination};
pub use steps::{StepCandidate, StepConfig, StepDirection, StepProfile};
pub use synthesis::{SynthesisConfig, SynthesisEnd, SynthesisMethod};
