#![warn(missing_docs)]
//! Transfer matrix (Abelès) engine.
//!
//! All quantities are sampled on a [`WavelengthSet`](crate::wavelengths::WavelengthSet) and computed
//! separately for the two polarization [`Mode`]s. The engine is split into small kernels:
//!
//! - [`Sin2`]: the Snell invariant `(N_medium·sinθ)²` of an incidence condition
//! - [`Admittance`]: optical admittances of a semi-infinite medium
//! - [`CharacteristicMatrix`]: per-wavelength 2x2 matrices of a slice and their derivatives
//! - [`PrePostMatrices`]: partial products used to propagate a single layer perturbation
//! - [`monitoring`]: sublayer matrix sequences of a growing layer
//! - [`r_and_t`]: amplitude coefficients and their derivatives
//! - [`spectro`]: intensity coefficients, including the incoherent substrate backside
//! - [`chain`]: the faces met by light crossing a filter in either direction
//! - [`phase`]: phase, group delay and group delay dispersion
//! - [`ellipso`]: ellipsometric angles Psi / Delta
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

pub mod admittance;
pub mod chain;
pub mod ellipso;
pub mod matrices;
pub mod monitoring;
pub mod phase;
pub mod pool;
pub mod pre_post;
pub mod r_and_t;
pub mod sin2;
pub mod spectro;

pub use admittance::Admittance;
pub use chain::{FaceChain, OrientedFace};
pub use ellipso::EllipsometerType;
pub use matrices::CharacteristicMatrix;
pub use pool::MatrixPool;
pub use pre_post::PrePostMatrices;
pub use r_and_t::{Amplitudes, Face, RAndT};
pub use sin2::Sin2;
pub use spectro::FaceIntensities;

/// One of the two independent polarization modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Display)]
pub enum Mode {
    /// transverse electric
    S,
    /// transverse magnetic
    P,
}

/// Polarization state of the incident light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Polarization {
    /// s (TE) polarized light
    S,
    /// p (TM) polarized light
    P,
    /// natural light, average of s and p
    #[default]
    Unpolarized,
    /// linear polarization at the given angle (degrees). 90° is s, 0° is p.
    General(f64),
}
impl Polarization {
    /// Weights `(w_s, w_p)` used to mix intensity quantities of both modes.
    #[must_use]
    pub fn weights(self) -> (f64, f64) {
        match self {
            Self::S => (1.0, 0.0),
            Self::P => (0.0, 1.0),
            Self::Unpolarized => (0.5, 0.5),
            Self::General(angle) => {
                let w_s = (angle / 90.0).clamp(0.0, 1.0);
                (w_s, 1.0 - w_s)
            }
        }
    }
    /// The single mode of a pure s or p polarization.
    ///
    /// Phase related quantities are only defined for those.
    #[must_use]
    pub const fn single_mode(self) -> Option<Mode> {
        match self {
            Self::S => Some(Mode::S),
            Self::P => Some(Mode::P),
            Self::Unpolarized | Self::General(_) => None,
        }
    }
}

/// Direction of the incident light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    /// light incident from the front medium
    #[default]
    Forward,
    /// light incident from the back medium
    Backward,
}

/// Mix a quantity of both modes according to the given polarization.
#[must_use]
pub fn mix_modes(polarization: Polarization, s: &[f64], p: &[f64]) -> Vec<f64> {
    let (w_s, w_p) = polarization.weights();
    s.iter()
        .zip(p)
        .map(|(s, p)| w_s.mul_add(*s, w_p * p))
        .collect()
}
