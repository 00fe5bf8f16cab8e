//! The faces met by light crossing a filter.
//!
//! Light first meets the entrance face. If the backside of the substrate is considered it then
//! crosses the substrate incoherently and meets the exit face. The front face of the filter can
//! take any of these roles depending on the direction of the light, which matters when the
//! derivative of the front face is propagated to the measured quantities.
use super::{
    ellipso::{psi_delta, psi_delta_with_backside},
    spectro::{combine_faces, combine_faces_derivative},
    Admittance, Amplitudes, CharacteristicMatrix, Direction, Face, FaceIntensities, Mode,
};

/// A face together with the admittances on both of its sides.
///
/// `outer` is the side light comes from when it travels in the face's forward direction.
#[derive(Debug, Clone)]
pub struct OrientedFace {
    face: Face,
    outer: Admittance,
    inner: Admittance,
}
impl OrientedFace {
    /// Evaluate the face of global matrix `m` between `outer` and `inner`.
    #[must_use]
    pub fn new(m: &CharacteristicMatrix, outer: Admittance, inner: Admittance) -> Self {
        Self {
            face: Face::new(m, &outer, &inner),
            outer,
            inner,
        }
    }
    /// The same face with light coming from the inner side.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            face: self.face.flipped(),
            outer: self.inner.clone(),
            inner: self.outer.clone(),
        }
    }
    /// Returns the amplitude coefficients of this face.
    #[must_use]
    pub const fn face(&self) -> &Face {
        &self.face
    }
    /// Derivative of the face given the derivative `d_m` of the global matrix `m`.
    #[must_use]
    pub fn derivative(&self, m: &CharacteristicMatrix, d_m: &CharacteristicMatrix) -> Face {
        Face::derivative(m, d_m, &self.outer, &self.inner)
    }
    fn intensities(&self, mode: Mode) -> FaceIntensities {
        FaceIntensities::new(&self.face, mode, &self.outer, &self.inner)
    }
    fn d_intensities(&self, d_face: &Face, mode: Mode) -> FaceIntensities {
        FaceIntensities::derivative(&self.face, d_face, mode, &self.outer, &self.inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrontPlacement {
    Entrance,
    FlippedEntrance,
    Exit,
}

/// Entrance face, optional exit face and the substrate transmission in between.
#[derive(Debug, Clone)]
pub struct FaceChain {
    entrance: OrientedFace,
    exit: Option<OrientedFace>,
    tau: Vec<f64>,
    front: FrontPlacement,
}
impl FaceChain {
    /// Arrange the front face (and the back face, if the backside is considered) for light
    /// travelling in `direction`.
    ///
    /// Both faces are given in their natural orientation: outer medium outside, substrate inside.
    /// Without back face, backward light enters the front face from the substrate.
    #[must_use]
    pub fn new(
        front: OrientedFace,
        back: Option<OrientedFace>,
        tau: Vec<f64>,
        direction: Direction,
    ) -> Self {
        match (direction, back) {
            (Direction::Forward, back) => Self {
                entrance: front,
                exit: back,
                tau,
                front: FrontPlacement::Entrance,
            },
            (Direction::Backward, Some(back)) => Self {
                entrance: back,
                exit: Some(front),
                tau,
                front: FrontPlacement::Exit,
            },
            (Direction::Backward, None) => Self {
                entrance: front.flipped(),
                exit: None,
                tau,
                front: FrontPlacement::FlippedEntrance,
            },
        }
    }
    /// Returns `true` if light crosses the substrate and the second face.
    #[must_use]
    pub const fn has_exit(&self) -> bool {
        self.exit.is_some()
    }
    /// Number of wavelengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tau.len()
    }
    /// Returns `true` if no wavelength is sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }
    /// Total reflectance and transmittance of one mode.
    #[must_use]
    pub fn intensities(&self, mode: Mode) -> (Vec<f64>, Vec<f64>) {
        let a = self.entrance.intensities(mode);
        match &self.exit {
            Some(exit) => combine_faces(&a, &exit.intensities(mode), &self.tau),
            None => (a.r, a.t),
        }
    }
    fn oriented_front_derivative(&self, d_front: &Face) -> Face {
        match self.front {
            FrontPlacement::FlippedEntrance => d_front.flipped(),
            FrontPlacement::Entrance | FrontPlacement::Exit => d_front.clone(),
        }
    }
    /// Derivatives of [`FaceChain::intensities`] given the derivative of the front face (in its
    /// natural orientation, see [`OrientedFace::derivative`]).
    #[must_use]
    pub fn d_intensities_front(&self, mode: Mode, d_front: &Face) -> (Vec<f64>, Vec<f64>) {
        let d_face = self.oriented_front_derivative(d_front);
        let a = self.entrance.intensities(mode);
        match (&self.exit, self.front) {
            (None, _) => {
                let d_a = self.entrance.d_intensities(&d_face, mode);
                (d_a.r, d_a.t)
            }
            (Some(exit), FrontPlacement::Exit) => {
                let b = exit.intensities(mode);
                let d_b = exit.d_intensities(&d_face, mode);
                let zeros = FaceIntensities::zeros(self.len());
                combine_faces_derivative(&a, &zeros, &b, &d_b, &self.tau)
            }
            (Some(exit), _) => {
                let d_a = self.entrance.d_intensities(&d_face, mode);
                let zeros = FaceIntensities::zeros(self.len());
                combine_faces_derivative(&a, &d_a, &exit.intensities(mode), &zeros, &self.tau)
            }
        }
    }
    /// Coherent amplitude coefficients of the entrance face (used for phases).
    #[must_use]
    pub const fn amplitudes(&self, mode: Mode) -> &Amplitudes {
        self.entrance.face.forward.get(mode)
    }
    /// Derivative of [`FaceChain::amplitudes`] given the derivative of the front face.
    ///
    /// Returns `None` if the front face is not the entrance face, the amplitudes then do not
    /// depend on it.
    #[must_use]
    pub fn d_amplitudes_front(&self, mode: Mode, d_front: &Face) -> Option<Amplitudes> {
        match self.front {
            FrontPlacement::Exit => None,
            FrontPlacement::Entrance | FrontPlacement::FlippedEntrance => Some(
                self.oriented_front_derivative(d_front)
                    .forward
                    .get(mode)
                    .clone(),
            ),
        }
    }
    /// Psi and Delta (degrees, Delta not normalized).
    #[must_use]
    pub fn psi_delta(&self) -> (Vec<f64>, Vec<f64>) {
        match &self.exit {
            Some(exit) => {
                let (r_s, _) = self.intensities(Mode::S);
                let (r_p, _) = self.intensities(Mode::P);
                psi_delta_with_backside(&self.entrance.face, &exit.face, &r_s, &r_p, &self.tau)
            }
            None => psi_delta(&self.entrance.face),
        }
    }
}
