//! Addressing of layers inside a filter.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One of the two coated faces of the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
pub enum Side {
    /// the face towards the front medium
    Front,
    /// the face towards the back medium
    Back,
}
impl Side {
    /// The other face.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// A place in the layer stack of one [`Side`].
///
/// Layers are numbered in deposition order: layer 0 touches the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// the layer touching the substrate
    Bottom,
    /// the layer touching the medium
    Top,
    /// the layer with the given number
    Index(usize),
    /// the outer medium, beyond the last layer
    Medium,
    /// the substrate, below the first layer
    Substrate,
}
impl Position {
    /// The layer addressed in a stack of `nb_layers` layers.
    ///
    /// [`Position::Medium`] and [`Position::Substrate`] do not address a layer.
    #[must_use]
    pub const fn layer(self, nb_layers: usize) -> Option<usize> {
        match self {
            Self::Bottom if nb_layers > 0 => Some(0),
            Self::Top if nb_layers > 0 => Some(nb_layers - 1),
            Self::Index(i) if i < nb_layers => Some(i),
            _ => None,
        }
    }
    /// Where a new layer is inserted in a stack of `nb_layers` layers.
    ///
    /// A new layer takes the place of the addressed layer, which moves one step towards the
    /// medium. [`Position::Top`] and [`Position::Medium`] append the layer on top of the stack.
    #[must_use]
    pub const fn insertion_point(self, nb_layers: usize) -> Option<usize> {
        match self {
            Self::Bottom | Self::Substrate => Some(0),
            Self::Top | Self::Medium => Some(nb_layers),
            Self::Index(i) if i <= nb_layers => Some(i),
            Self::Index(_) => None,
        }
    }
}
