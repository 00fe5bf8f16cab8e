//! Layers of a filter.
use serde::{Deserialize, Serialize};

use super::cache::IndexKey;
use crate::error::{FilmError, FilmResult};

/// Thickness and index description of a [`Layer`].
///
/// A layer is either homogeneous or graded, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerProfile {
    /// a single slice
    Homogeneous {
        /// physical thickness (nm)
        thickness: f64,
        /// index at the center wavelength (mixtures only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<f64>,
    },
    /// a sequence of slices of a mixture, each at one of its discretization levels
    Graded {
        /// physical thickness of every slice (nm)
        thicknesses: Vec<f64>,
        /// discretization level of every slice
        steps: Vec<usize>,
    },
}

/// Optimization flags of a [`Layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerFlags {
    /// the thickness is a refinement parameter
    pub refine_thickness: bool,
    /// the (mixture) index is a refinement parameter
    pub refine_index: bool,
    /// refining the index keeps the optical thickness constant
    pub preserve_ot: bool,
    /// needles may be inserted in this layer
    pub add_needles: bool,
    /// steps may be inserted in this layer
    pub add_steps: bool,
}
impl LayerFlags {
    /// Flags of a layer whose thickness is refined.
    #[must_use]
    pub const fn refinable() -> Self {
        Self {
            refine_thickness: true,
            refine_index: false,
            preserve_ot: false,
            add_needles: false,
            add_steps: false,
        }
    }
    /// Check the consistency of the flags.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - optical thickness preservation is requested without index refinement, or together
    ///     with thickness refinement
    ///   - needles are requested without thickness refinement
    ///   - steps are requested without index refinement
    pub fn check(&self) -> FilmResult<()> {
        if self.preserve_ot && (!self.refine_index || self.refine_thickness) {
            return Err(FilmError::Configuration(
                "preserving the optical thickness requires index refinement without thickness refinement".into(),
            ));
        }
        if self.add_needles && !self.refine_thickness {
            return Err(FilmError::Configuration(
                "adding needles requires thickness refinement".into(),
            ));
        }
        if self.add_steps && !self.refine_index {
            return Err(FilmError::Configuration(
                "adding steps requires index refinement".into(),
            ));
        }
        Ok(())
    }
    /// Returns `true` if any flag is set.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.refine_thickness
            || self.refine_index
            || self.preserve_ot
            || self.add_needles
            || self.add_steps
    }
}

/// A layer of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    material: usize,
    profile: LayerProfile,
    #[serde(default)]
    flags: LayerFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}
impl Layer {
    /// Creates a homogeneous [`Layer`] of material number `material` (in the filter's material
    /// table).
    #[must_use]
    pub const fn homogeneous(material: usize, thickness: f64, index: Option<f64>) -> Self {
        Self {
            material,
            profile: LayerProfile::Homogeneous { thickness, index },
            flags: LayerFlags {
                refine_thickness: false,
                refine_index: false,
                preserve_ot: false,
                add_needles: false,
                add_steps: false,
            },
            description: None,
        }
    }
    /// Creates a graded [`Layer`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the profile is empty or both lists differ in length.
    pub fn graded(material: usize, thicknesses: Vec<f64>, steps: Vec<usize>) -> FilmResult<Self> {
        if thicknesses.is_empty() || thicknesses.len() != steps.len() {
            return Err(FilmError::Configuration(
                "a graded layer needs one step per sublayer thickness".into(),
            ));
        }
        Ok(Self {
            material,
            profile: LayerProfile::Graded { thicknesses, steps },
            flags: LayerFlags::default(),
            description: None,
        })
    }
    /// Returns the material number of this [`Layer`].
    #[must_use]
    pub const fn material(&self) -> usize {
        self.material
    }
    /// Returns the profile of this [`Layer`].
    #[must_use]
    pub const fn profile(&self) -> &LayerProfile {
        &self.profile
    }
    pub(crate) fn profile_mut(&mut self) -> &mut LayerProfile {
        &mut self.profile
    }
    /// Returns `true` if this is a graded layer.
    #[must_use]
    pub const fn is_graded(&self) -> bool {
        matches!(self.profile, LayerProfile::Graded { .. })
    }
    /// Total physical thickness (nm).
    #[must_use]
    pub fn thickness(&self) -> f64 {
        match &self.profile {
            LayerProfile::Homogeneous { thickness, .. } => *thickness,
            LayerProfile::Graded { thicknesses, .. } => thicknesses.iter().sum(),
        }
    }
    /// Index at the center wavelength of a homogeneous mixture layer.
    #[must_use]
    pub const fn index(&self) -> Option<f64> {
        match &self.profile {
            LayerProfile::Homogeneous { index, .. } => *index,
            LayerProfile::Graded { .. } => None,
        }
    }
    /// Index curve key and thickness of every slice of this [`Layer`].
    pub(crate) fn slices(&self) -> Vec<(IndexKey, f64)> {
        match &self.profile {
            LayerProfile::Homogeneous { thickness, index } => vec![(
                index.map_or(IndexKey::Material(self.material), |n| {
                    IndexKey::mixture(self.material, n)
                }),
                *thickness,
            )],
            LayerProfile::Graded { thicknesses, steps } => steps
                .iter()
                .zip(thicknesses)
                .map(|(step, d)| (IndexKey::Level(self.material, *step), *d))
                .collect(),
        }
    }
    pub(crate) fn set_material(&mut self, material: usize) {
        self.material = material;
    }
    /// Set the thickness of a homogeneous layer.
    ///
    /// # Errors
    ///
    /// This function will return an error for graded layers or negative thicknesses.
    pub fn set_thickness(&mut self, value: f64) -> FilmResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(FilmError::Configuration(format!(
                "invalid layer thickness {value}"
            )));
        }
        match &mut self.profile {
            LayerProfile::Homogeneous { thickness, .. } => {
                *thickness = value;
                Ok(())
            }
            LayerProfile::Graded { .. } => Err(FilmError::Configuration(
                "the thickness of a graded layer cannot be set".into(),
            )),
        }
    }
    /// Set the index of a homogeneous mixture layer. The range is checked by the filter.
    pub(crate) fn set_index(&mut self, value: f64) {
        if let LayerProfile::Homogeneous { index, .. } = &mut self.profile {
            *index = Some(value);
        }
    }
    /// Returns the flags of this [`Layer`].
    #[must_use]
    pub const fn flags(&self) -> LayerFlags {
        self.flags
    }
    /// Sets the flags of this [`Layer`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the flags are inconsistent (see
    /// [`LayerFlags::check`]) or if any flag is set on a graded layer.
    pub fn set_flags(&mut self, flags: LayerFlags) -> FilmResult<()> {
        flags.check()?;
        if self.is_graded() && flags.any() {
            return Err(FilmError::Configuration(
                "graded layers cannot be refined".into(),
            ));
        }
        self.flags = flags;
        Ok(())
    }
    /// Returns the description of this [`Layer`].
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    /// Sets the description of this [`Layer`] (e.g. the method which generated it).
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }
}
