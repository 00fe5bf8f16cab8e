#![warn(missing_docs)]
//! The filter model.
//!
//! A [`Filter`] is a substrate coated on both faces, placed between a front and a back medium. It
//! owns a material table (materials are referenced by number from layers), the two layer stacks,
//! the global [`FilterSettings`] and the caches of every derived quantity. Every mutation goes
//! through a method of [`Filter`] which drops exactly the cache entries depending on it.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod cache;
pub mod field;
pub mod layer;
pub mod monitoring;
pub mod position;
pub mod settings;
pub mod stack_formula;

pub use analysis::{Coefficient, Illumination, Quantity};
pub use layer::{Layer, LayerFlags, LayerProfile};
pub use position::{Position, Side};
pub use settings::{EllipsometerSettings, FilterSettings, FourierParameters, StepSpacing};

use self::cache::{FilterCache, IndexKey};
use crate::{
    abeles::{CharacteristicMatrix, MatrixPool, Sin2},
    error::{FilmError, FilmResult},
    index::Index,
    materials::{Material, Mixture},
    wavelengths::{WavelengthSet, WavelengthSpec},
};

/// Default substrate thickness: 1 mm.
const DEFAULT_SUBSTRATE_THICKNESS: f64 = 1.0e6;

/// A multilayer optical filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    materials: Vec<Material>,
    substrate: usize,
    substrate_thickness: f64,
    front_medium: usize,
    back_medium: usize,
    #[serde(default)]
    front_layers: Vec<Layer>,
    #[serde(default)]
    back_layers: Vec<Layer>,
    #[serde(default)]
    settings: FilterSettings,
    #[serde(skip)]
    levels: Vec<Vec<f64>>,
    #[serde(skip)]
    cache: FilterCache,
    #[serde(skip)]
    pool: MatrixPool,
    #[serde(skip)]
    modified: bool,
}
impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.materials == other.materials
            && self.substrate == other.substrate
            && self.substrate_thickness.to_bits() == other.substrate_thickness.to_bits()
            && self.front_medium == other.front_medium
            && self.back_medium == other.back_medium
            && self.front_layers == other.front_layers
            && self.back_layers == other.back_layers
            && self.settings == other.settings
            && self.levels == other.levels
    }
}

fn check_not_mixture(material: &Material, role: &str) -> FilmResult<()> {
    if material.is_mixture() {
        return Err(FilmError::Configuration(format!(
            "the {role} ({}) must not be a mixture",
            material.name()
        )));
    }
    Ok(())
}

fn check_thickness(thickness: f64) -> FilmResult<()> {
    if !thickness.is_finite() || thickness < 0.0 {
        return Err(FilmError::Configuration(format!(
            "invalid thickness {thickness}"
        )));
    }
    Ok(())
}

fn spacing_for(mixture: &Mixture, step_spacing: StepSpacing) -> f64 {
    match step_spacing {
        StepSpacing::Deposition => mixture.deposition_step_spacing(),
        StepSpacing::Value(spacing) => spacing,
    }
}

/// Discretization levels of a material. Non-mixtures have none.
fn discretize(
    material: &Material,
    center_wavelength: f64,
    step_spacing: StepSpacing,
) -> FilmResult<Vec<f64>> {
    let Some(mixture) = material.as_mixture() else {
        return Ok(Vec::new());
    };
    if !mixture.check_monotonicity(center_wavelength) {
        return Err(FilmError::Configuration(format!(
            "mixture {} is not monotonic at {center_wavelength} nm",
            material.name()
        )));
    }
    mixture.discretize(center_wavelength, spacing_for(mixture, step_spacing))
}

/// The level of `levels` closest to `n`.
fn nearest_level(levels: &[f64], n: f64) -> usize {
    levels
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - n).abs().total_cmp(&(b.1 - n).abs()))
        .map_or(0, |(i, _)| i)
}

/// Index curve of a cache key.
fn compute_index(
    materials: &[Material],
    levels: &[Vec<f64>],
    center_wavelength: f64,
    wavelengths: &WavelengthSet,
    key: IndexKey,
) -> FilmResult<Index> {
    let material = |nb: usize| {
        materials
            .get(nb)
            .ok_or_else(|| FilmError::Analysis(format!("unknown material number {nb}")))
    };
    match key {
        IndexKey::Material(nb) => material(nb)?.get_n(wavelengths),
        IndexKey::Mixture(nb, bits) => {
            material(nb)?.index_curve(wavelengths, center_wavelength, Some(f64::from_bits(bits)))
        }
        IndexKey::Level(nb, level) => {
            let n = levels.get(nb).and_then(|l| l.get(level)).ok_or_else(|| {
                FilmError::Analysis(format!("material {nb} has no level {level}"))
            })?;
            material(nb)?.index_curve(wavelengths, center_wavelength, Some(*n))
        }
    }
}

impl Filter {
    /// Creates an uncoated [`Filter`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the substrate or a medium is a mixture or the
    /// substrate thickness is negative.
    pub fn new(
        substrate: &Material,
        substrate_thickness: f64,
        front_medium: &Material,
        back_medium: &Material,
    ) -> FilmResult<Self> {
        check_not_mixture(substrate, "substrate")?;
        check_not_mixture(front_medium, "front medium")?;
        check_not_mixture(back_medium, "back medium")?;
        check_thickness(substrate_thickness)?;
        let mut filter = Self {
            materials: Vec::new(),
            substrate: 0,
            substrate_thickness,
            front_medium: 0,
            back_medium: 0,
            front_layers: Vec::new(),
            back_layers: Vec::new(),
            settings: FilterSettings::default(),
            levels: Vec::new(),
            cache: FilterCache::default(),
            pool: MatrixPool::new(),
            modified: false,
        };
        filter.substrate = filter.get_material_nb(substrate)?;
        filter.front_medium = filter.get_material_nb(front_medium)?;
        filter.back_medium = filter.get_material_nb(back_medium)?;
        Ok(filter)
    }
    /// Creates an uncoated [`Filter`] with a 1 mm substrate.
    ///
    /// # Errors
    ///
    /// See [`Filter::new`].
    pub fn with_default_substrate_thickness(
        substrate: &Material,
        front_medium: &Material,
        back_medium: &Material,
    ) -> FilmResult<Self> {
        Self::new(substrate, DEFAULT_SUBSTRATE_THICKNESS, front_medium, back_medium)
    }
    /// Number of a material in the material table of this [`Filter`].
    ///
    /// Materials are identified by name. An unknown material is checked (mixtures must be
    /// monotonic at the center wavelength), discretized and appended to the table.
    ///
    /// # Errors
    ///
    /// This function will return an error if a new mixture cannot be discretized.
    pub fn get_material_nb(&mut self, material: &Material) -> FilmResult<usize> {
        if let Some(nb) = self.materials.iter().position(|m| m.name() == material.name()) {
            return Ok(nb);
        }
        let levels = discretize(
            material,
            self.settings.center_wavelength,
            self.settings.step_spacing,
        )?;
        debug!("adding material {} to the filter", material.name());
        self.materials.push(material.clone());
        self.levels.push(levels);
        Ok(self.materials.len() - 1)
    }
    /// Returns the material table of this [`Filter`].
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }
    /// Returns material number `nb`.
    #[must_use]
    pub fn material(&self, nb: usize) -> Option<&Material> {
        self.materials.get(nb)
    }
    /// Discretization levels (center indices) of material number `nb`. Empty for non-mixtures.
    #[must_use]
    pub fn levels(&self, nb: usize) -> &[f64] {
        self.levels.get(nb).map_or(&[], Vec::as_slice)
    }
    fn material_ref(&self, nb: usize) -> FilmResult<&Material> {
        self.materials
            .get(nb)
            .ok_or_else(|| FilmError::Configuration(format!("unknown material number {nb}")))
    }
    /// Returns the substrate material.
    ///
    /// # Panics
    ///
    /// Panics if the material table is inconsistent, which [`Filter::after_deserialization_hook`]
    /// rules out.
    #[must_use]
    pub fn substrate(&self) -> &Material {
        &self.materials[self.substrate]
    }
    /// Substrate thickness (nm).
    #[must_use]
    pub const fn substrate_thickness(&self) -> f64 {
        self.substrate_thickness
    }
    /// Returns the medium on one side.
    ///
    /// # Panics
    ///
    /// Panics if the material table is inconsistent (see [`Filter::substrate`]).
    #[must_use]
    pub fn medium(&self, side: Side) -> &Material {
        match side {
            Side::Front => &self.materials[self.front_medium],
            Side::Back => &self.materials[self.back_medium],
        }
    }
    pub(crate) const fn medium_nb(&self, side: Side) -> usize {
        match side {
            Side::Front => self.front_medium,
            Side::Back => self.back_medium,
        }
    }
    pub(crate) const fn substrate_nb(&self) -> usize {
        self.substrate
    }
    /// Replace the substrate.
    ///
    /// # Errors
    ///
    /// This function will return an error if the material is a mixture or the thickness is
    /// negative.
    pub fn set_substrate(&mut self, material: &Material, thickness: f64) -> FilmResult<()> {
        check_not_mixture(material, "substrate")?;
        check_thickness(thickness)?;
        self.substrate = self.get_material_nb(material)?;
        self.substrate_thickness = thickness;
        self.cache.clear_monitoring(None);
        self.modified = true;
        Ok(())
    }
    /// Replace the medium on one side.
    ///
    /// # Errors
    ///
    /// This function will return an error if the material is a mixture.
    pub fn set_medium(&mut self, side: Side, material: &Material) -> FilmResult<()> {
        check_not_mixture(material, "medium")?;
        let nb = self.get_material_nb(material)?;
        match side {
            Side::Front => self.front_medium = nb,
            Side::Back => self.back_medium = nb,
        }
        self.cache.clear_monitoring(None);
        self.modified = true;
        Ok(())
    }
    /// Returns the settings of this [`Filter`].
    #[must_use]
    pub const fn settings(&self) -> &FilterSettings {
        &self.settings
    }
    /// Returns `true` if the filter was modified since it was created, loaded or marked as saved.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }
    /// Mark the filter as modified or saved.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }
    /// The wavelengths described by the settings.
    ///
    /// # Errors
    ///
    /// This function will return an error if the description is invalid.
    pub fn wavelengths(&self) -> FilmResult<WavelengthSet> {
        self.settings.wavelengths.to_wavelength_set()
    }
    /// Number of entries in the analysis cache (one per incidence condition).
    #[must_use]
    pub fn analysis_cache_len(&self) -> usize {
        self.cache.analysis_len()
    }
    /// Number of cached index curves.
    #[must_use]
    pub fn index_cache_len(&self) -> usize {
        self.cache.indices.len()
    }
    /// Number of entries in the monitoring cache.
    #[must_use]
    pub fn monitoring_cache_len(&self) -> usize {
        self.cache.monitoring_len()
    }
    /// Returns `true` if any layer is graded.
    #[must_use]
    pub fn has_graded_layers(&self) -> bool {
        self.front_layers
            .iter()
            .chain(&self.back_layers)
            .any(Layer::is_graded)
    }

    /// Change the center wavelength.
    ///
    /// The index of homogeneous mixture layers is converted such that their composition is kept,
    /// and graded layers are mapped to the nearest discretization level at the new center
    /// wavelength. The change is atomic: if any conversion fails, nothing is modified.
    ///
    /// # Errors
    ///
    /// This function will return an error if the wavelength is not positive or a mixture is not
    /// monotonic at the new center wavelength.
    pub fn set_center_wavelength(&mut self, center_wavelength: f64) -> FilmResult<()> {
        if !(center_wavelength > 0.0 && center_wavelength.is_finite()) {
            return Err(FilmError::Configuration(
                "center wavelength must be positive".into(),
            ));
        }
        let old_center = self.settings.center_wavelength;
        let (levels, front, back) = self.convert_mixtures(
            old_center,
            center_wavelength,
            self.settings.step_spacing,
        )?;
        self.settings.center_wavelength = center_wavelength;
        self.commit_mixture_conversion(levels, front, back);
        info!("center wavelength changed from {old_center} nm to {center_wavelength} nm");
        Ok(())
    }
    /// Change the step spacing of the mixture discretization. Atomic like
    /// [`Filter::set_center_wavelength`].
    ///
    /// # Errors
    ///
    /// This function will return an error if a mixture cannot be discretized.
    pub fn set_step_spacing(&mut self, step_spacing: StepSpacing) -> FilmResult<()> {
        let center = self.settings.center_wavelength;
        let (levels, front, back) = self.convert_mixtures(center, center, step_spacing)?;
        self.settings.step_spacing = step_spacing;
        self.commit_mixture_conversion(levels, front, back);
        Ok(())
    }
    /// New levels and converted layer stacks. Nothing is modified.
    fn convert_mixtures(
        &self,
        old_center: f64,
        new_center: f64,
        step_spacing: StepSpacing,
    ) -> FilmResult<(Vec<Vec<f64>>, Vec<Layer>, Vec<Layer>)> {
        let levels = self
            .materials
            .iter()
            .map(|m| discretize(m, new_center, step_spacing))
            .collect::<FilmResult<Vec<_>>>()?;
        let convert = |layers: &[Layer]| -> FilmResult<Vec<Layer>> {
            layers
                .iter()
                .map(|layer| {
                    let material = self.material_ref(layer.material())?;
                    let Some(mixture) = material.as_mixture() else {
                        return Ok(layer.clone());
                    };
                    let convert_index = |n: f64| -> FilmResult<f64> {
                        let fraction = mixture.fraction_for_index(old_center, n)?;
                        mixture.index_for_fraction(new_center, fraction)
                    };
                    let mut converted = layer.clone();
                    match converted.profile_mut() {
                        LayerProfile::Homogeneous { index, .. } => {
                            if let Some(n) = index {
                                *n = convert_index(*n)?;
                            }
                        }
                        LayerProfile::Graded { steps, .. } => {
                            let old_levels = self.levels(layer.material());
                            let new_levels = &levels[layer.material()];
                            for step in steps.iter_mut() {
                                let n = old_levels.get(*step).ok_or_else(|| {
                                    FilmError::Configuration(format!(
                                        "step {step} outside the levels of {}",
                                        material.name()
                                    ))
                                })?;
                                *step = nearest_level(new_levels, convert_index(*n)?);
                            }
                        }
                    }
                    Ok(converted)
                })
                .collect()
        };
        let front = convert(&self.front_layers)?;
        let back = convert(&self.back_layers)?;
        Ok((levels, front, back))
    }
    fn commit_mixture_conversion(
        &mut self,
        levels: Vec<Vec<f64>>,
        front: Vec<Layer>,
        back: Vec<Layer>,
    ) {
        self.levels = levels;
        self.front_layers = front;
        self.back_layers = back;
        self.cache.indices.clear();
        if self.has_graded_layers() {
            self.cache.clear_analysis();
            self.cache.clear_monitoring(None);
        }
        self.modified = true;
    }
    /// Set the thickness below which layers are removed during refinement.
    ///
    /// # Errors
    ///
    /// This function will return an error if the thickness is negative.
    pub fn set_minimum_thickness(&mut self, thickness: f64) -> FilmResult<()> {
        check_thickness(thickness)?;
        self.settings.minimum_thickness = thickness;
        self.modified = true;
        Ok(())
    }
    /// Set the default wavelengths of the filter.
    ///
    /// # Errors
    ///
    /// This function will return an error if the description is invalid.
    pub fn set_wavelengths(&mut self, wavelengths: WavelengthSpec) -> FilmResult<()> {
        wavelengths.to_wavelength_set()?;
        self.settings.wavelengths = wavelengths;
        self.cache.indices.clear();
        self.cache.clear_analysis();
        self.modified = true;
        Ok(())
    }
    /// Consider the substrate backside in the analysis.
    pub fn set_consider_backside(&mut self, consider: bool) {
        self.settings.consider_backside = consider;
        self.modified = true;
    }
    /// Consider the substrate backside in monitoring curves.
    pub fn set_consider_backside_on_monitoring(&mut self, consider: bool) {
        if self.settings.consider_backside_on_monitoring != consider {
            self.cache.clear_monitoring(None);
        }
        self.settings.consider_backside_on_monitoring = consider;
        self.modified = true;
    }
    /// Ignore the substrate: the back medium then touches the front stack.
    pub fn set_dont_consider_substrate(&mut self, dont_consider: bool) {
        self.settings.dont_consider_substrate = dont_consider;
        self.cache.clear_monitoring(None);
        self.modified = true;
    }
    /// Set the ellipsometers used for the analysis and for monitoring.
    ///
    /// # Errors
    ///
    /// This function will return an error if a Delta min lies outside `[-360, 360]`.
    pub fn set_ellipsometers(
        &mut self,
        analysis: EllipsometerSettings,
        monitoring: EllipsometerSettings,
    ) -> FilmResult<()> {
        let mut settings = self.settings.clone();
        settings.ellipsometer = analysis;
        settings.monitoring_ellipsometer = monitoring;
        settings.check()?;
        self.settings = settings;
        self.modified = true;
        Ok(())
    }
    /// Set the illuminant and observer used for colors.
    pub fn set_illuminant_and_observer(&mut self, illuminant: &str, observer: &str) {
        illuminant.clone_into(&mut self.settings.illuminant);
        observer.clone_into(&mut self.settings.observer);
        self.modified = true;
    }
    /// Set the sublayer thickness of monitoring curves.
    ///
    /// # Errors
    ///
    /// This function will return an error if the thickness is not positive.
    pub fn set_monitoring_sublayer_thickness(&mut self, thickness: f64) -> FilmResult<()> {
        if !(thickness > 0.0 && thickness.is_finite()) {
            return Err(FilmError::Configuration(
                "monitoring sublayer thickness must be positive".into(),
            ));
        }
        self.settings.monitoring_sublayer_thickness = thickness;
        self.cache.clear_monitoring(None);
        self.modified = true;
        Ok(())
    }
    /// Set the materials considered by the needle method. An empty list means all non-mixture
    /// materials of the front stack.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material is a mixture.
    pub fn set_needle_materials(&mut self, materials: Vec<Material>) -> FilmResult<()> {
        for material in &materials {
            check_not_mixture(material, "needle material")?;
        }
        self.settings.needle_materials = materials;
        self.modified = true;
        Ok(())
    }
    /// Set the Fourier method parameters.
    pub fn set_fourier(&mut self, fourier: Option<FourierParameters>) {
        self.settings.fourier = fourier;
        self.modified = true;
    }

    /// Returns the layers of one side in deposition order.
    #[must_use]
    pub fn layers(&self, side: Side) -> &[Layer] {
        match side {
            Side::Front => &self.front_layers,
            Side::Back => &self.back_layers,
        }
    }
    fn layers_mut(&mut self, side: Side) -> &mut Vec<Layer> {
        match side {
            Side::Front => &mut self.front_layers,
            Side::Back => &mut self.back_layers,
        }
    }
    fn layers_changed(&mut self, side: Side) {
        self.cache.invalidate_side(side);
        let used: Vec<IndexKey> = self
            .front_layers
            .iter()
            .chain(&self.back_layers)
            .flat_map(Layer::slices)
            .map(|(key, _)| key)
            .filter(|key| matches!(key, IndexKey::Mixture(..)))
            .collect();
        self.cache.indices.retain_mixtures(&used);
        self.modified = true;
    }
    fn layer_number(&self, side: Side, position: Position) -> FilmResult<usize> {
        position
            .layer(self.layers(side).len())
            .ok_or_else(|| FilmError::Configuration(format!("no {side} layer at {position:?}")))
    }
    /// The layer at `position`.
    ///
    /// # Errors
    ///
    /// This function will return an error if `position` does not address a layer.
    pub fn layer(&self, side: Side, position: Position) -> FilmResult<&Layer> {
        Ok(&self.layers(side)[self.layer_number(side, position)?])
    }
    /// Total physical thickness of one side (nm).
    #[must_use]
    pub fn total_thickness(&self, side: Side) -> f64 {
        self.layers(side).iter().map(Layer::thickness).sum()
    }
    fn check_mixture_index(&self, material: &Material, n: f64) -> FilmResult<()> {
        let (n_min, n_max) = material.index_range(self.settings.center_wavelength);
        if !(n >= n_min - 1e-9 && n <= n_max + 1e-9) {
            return Err(FilmError::Configuration(format!(
                "index {n} outside the range [{n_min}, {n_max}] of {}",
                material.name()
            )));
        }
        Ok(())
    }
    /// Insert a homogeneous layer. Mixtures require an `index` (real index at the center
    /// wavelength). Returns the number of the new layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the position is invalid
    ///   - the thickness is negative
    ///   - a mixture is given no index or an index outside its range
    pub fn add_layer(
        &mut self,
        side: Side,
        position: Position,
        material: &Material,
        thickness: f64,
        index: Option<f64>,
    ) -> FilmResult<usize> {
        let at = position
            .insertion_point(self.layers(side).len())
            .ok_or_else(|| FilmError::Configuration(format!("cannot insert at {position:?}")))?;
        check_thickness(thickness)?;
        let index = if material.is_mixture() {
            let n = index.ok_or_else(|| {
                FilmError::Configuration(format!("mixture {} needs an index", material.name()))
            })?;
            self.check_mixture_index(material, n)?;
            Some(n)
        } else {
            if index.is_some() {
                warn!("index ignored for material {}", material.name());
            }
            None
        };
        let nb = self.get_material_nb(material)?;
        self.layers_mut(side)
            .insert(at, Layer::homogeneous(nb, thickness, index));
        self.layers_changed(side);
        Ok(at)
    }
    /// Insert a graded layer of a mixture. `steps` are discretization levels (see
    /// [`Filter::levels`]). Returns the number of the new layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if the material is not a mixture, a step is not a level
    /// of the mixture, or the profile is invalid.
    pub fn add_graded_layer(
        &mut self,
        side: Side,
        position: Position,
        material: &Material,
        thicknesses: Vec<f64>,
        steps: Vec<usize>,
    ) -> FilmResult<usize> {
        let at = position
            .insertion_point(self.layers(side).len())
            .ok_or_else(|| FilmError::Configuration(format!("cannot insert at {position:?}")))?;
        if !material.is_mixture() {
            return Err(FilmError::Configuration(format!(
                "graded layers need a mixture, {} is not one",
                material.name()
            )));
        }
        for thickness in &thicknesses {
            check_thickness(*thickness)?;
        }
        let nb = self.get_material_nb(material)?;
        let nb_levels = self.levels(nb).len();
        if let Some(step) = steps.iter().find(|s| **s >= nb_levels) {
            return Err(FilmError::Configuration(format!(
                "step {step} outside the {nb_levels} levels of {}",
                material.name()
            )));
        }
        let layer = Layer::graded(nb, thicknesses, steps)?;
        self.layers_mut(side).insert(at, layer);
        self.layers_changed(side);
        Ok(at)
    }
    /// Remove a layer and return it.
    ///
    /// # Errors
    ///
    /// This function will return an error if `position` does not address a layer.
    pub fn remove_layer(&mut self, side: Side, position: Position) -> FilmResult<Layer> {
        let i = self.layer_number(side, position)?;
        let layer = self.layers_mut(side).remove(i);
        self.layers_changed(side);
        Ok(layer)
    }
    /// Move a layer to another position of the same side.
    ///
    /// # Errors
    ///
    /// This function will return an error if one of the positions is invalid.
    pub fn move_layer(&mut self, side: Side, from: Position, to: Position) -> FilmResult<()> {
        let i = self.layer_number(side, from)?;
        let nb_layers = self.layers(side).len();
        let at = to
            .insertion_point(nb_layers - 1)
            .ok_or_else(|| FilmError::Configuration(format!("cannot move to {to:?}")))?;
        let layer = self.layers_mut(side).remove(i);
        self.layers_mut(side).insert(at, layer);
        self.layers_changed(side);
        Ok(())
    }
    /// Set the thickness of a homogeneous layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if the layer does not exist, is graded or the thickness
    /// is negative.
    pub fn set_layer_thickness(
        &mut self,
        side: Side,
        position: Position,
        thickness: f64,
    ) -> FilmResult<()> {
        let i = self.layer_number(side, position)?;
        self.layers_mut(side)[i].set_thickness(thickness)?;
        self.layers_changed(side);
        Ok(())
    }
    /// Set the index of a homogeneous mixture layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if the layer does not exist, is not a homogeneous
    /// mixture layer or the index is outside the range of the mixture.
    pub fn set_layer_index(&mut self, side: Side, position: Position, index: f64) -> FilmResult<()> {
        let i = self.layer_number(side, position)?;
        let layer = &self.layers(side)[i];
        let material = self.material_ref(layer.material())?;
        if !material.is_mixture() || layer.is_graded() {
            return Err(FilmError::Configuration(
                "only homogeneous mixture layers have an adjustable index".into(),
            ));
        }
        self.check_mixture_index(material, index)?;
        self.layers_mut(side)[i].set_index(index);
        self.layers_changed(side);
        Ok(())
    }
    /// Set the optimization flags of a layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if the flags are inconsistent, if they are set on a
    /// graded layer, or if index refinement is requested for a non-mixture.
    pub fn set_layer_flags(
        &mut self,
        side: Side,
        position: Position,
        flags: LayerFlags,
    ) -> FilmResult<()> {
        let i = self.layer_number(side, position)?;
        let layer = &self.layers(side)[i];
        if flags.refine_index && !self.material_ref(layer.material())?.is_mixture() {
            return Err(FilmError::Configuration(
                "index refinement requires a mixture".into(),
            ));
        }
        self.layers_mut(side)[i].set_flags(flags)?;
        self.modified = true;
        Ok(())
    }
    /// Set the description of a layer.
    ///
    /// # Errors
    ///
    /// This function will return an error if `position` does not address a layer.
    pub fn set_layer_description(
        &mut self,
        side: Side,
        position: Position,
        description: Option<String>,
    ) -> FilmResult<()> {
        let i = self.layer_number(side, position)?;
        self.layers_mut(side)[i].set_description(description);
        self.modified = true;
        Ok(())
    }
    /// Remove all layers of one side.
    pub fn clear_layers(&mut self, side: Side) {
        self.layers_mut(side).clear();
        self.layers_changed(side);
    }
    /// Replace the whole stack of one side (used when committing a synthesis result).
    pub(crate) fn replace_layers(&mut self, side: Side, layers: Vec<Layer>) -> FilmResult<()> {
        if let Some(layer) = layers.iter().find(|l| l.material() >= self.materials.len()) {
            return Err(FilmError::Configuration(format!(
                "unknown material number {}",
                layer.material()
            )));
        }
        *self.layers_mut(side) = layers;
        self.layers_changed(side);
        Ok(())
    }
    /// Real index at the center wavelength of a homogeneous layer.
    ///
    /// # Errors
    ///
    /// This function will return an error for graded layers or inconsistent mixtures.
    pub fn center_index(&self, layer: &Layer) -> FilmResult<f64> {
        if layer.is_graded() {
            return Err(FilmError::Configuration(
                "graded layers have no single index".into(),
            ));
        }
        self.material_ref(layer.material())?
            .center_index(self.settings.center_wavelength, layer.index())
    }
    /// Optical thickness `n·d` at the center wavelength of any layer (nm).
    ///
    /// # Errors
    ///
    /// This function will return an error if the layer is inconsistent with the material table.
    pub fn optical_thickness(&self, layer: &Layer) -> FilmResult<f64> {
        match layer.profile() {
            LayerProfile::Homogeneous { thickness, .. } => Ok(self.center_index(layer)? * thickness),
            LayerProfile::Graded { thicknesses, steps } => {
                let levels = self.levels(layer.material());
                steps
                    .iter()
                    .zip(thicknesses)
                    .map(|(step, d)| {
                        levels.get(*step).map(|n| n * d).ok_or_else(|| {
                            FilmError::Configuration(format!("unknown level {step}"))
                        })
                    })
                    .sum()
            }
        }
    }

    /// Check and complete a deserialized filter.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the settings are invalid
    ///   - a material number is unknown
    ///   - the substrate or a medium is a mixture
    ///   - a mixture is not monotonic at the center wavelength
    ///   - a layer is inconsistent with its material or carries inconsistent flags
    pub fn after_deserialization_hook(&mut self) -> FilmResult<()> {
        self.settings.check()?;
        check_thickness(self.substrate_thickness)?;
        check_not_mixture(self.material_ref(self.substrate)?, "substrate")?;
        check_not_mixture(self.material_ref(self.front_medium)?, "front medium")?;
        check_not_mixture(self.material_ref(self.back_medium)?, "back medium")?;
        self.levels = self
            .materials
            .iter()
            .map(|m| {
                discretize(
                    m,
                    self.settings.center_wavelength,
                    self.settings.step_spacing,
                )
            })
            .collect::<FilmResult<Vec<_>>>()?;
        for side in [Side::Front, Side::Back] {
            for layer in self.layers(side) {
                self.check_layer(layer)?;
            }
        }
        self.cache.clear();
        self.modified = false;
        Ok(())
    }
    fn check_layer(&self, layer: &Layer) -> FilmResult<()> {
        let material = self.material_ref(layer.material())?;
        let flags = layer.flags();
        flags.check()?;
        if flags.refine_index && !material.is_mixture() {
            return Err(FilmError::Configuration(
                "index refinement requires a mixture".into(),
            ));
        }
        match layer.profile() {
            LayerProfile::Homogeneous { thickness, index } => {
                check_thickness(*thickness)?;
                match (material.is_mixture(), index) {
                    (true, Some(n)) => self.check_mixture_index(material, *n),
                    (true, None) => Err(FilmError::Configuration(format!(
                        "mixture layer of {} without index",
                        material.name()
                    ))),
                    (false, Some(_)) => Err(FilmError::Configuration(format!(
                        "{} is not a mixture and takes no index",
                        material.name()
                    ))),
                    (false, None) => Ok(()),
                }
            }
            LayerProfile::Graded { thicknesses, steps } => {
                if !material.is_mixture() {
                    return Err(FilmError::Configuration(format!(
                        "graded layer of non-mixture {}",
                        material.name()
                    )));
                }
                if flags.any() {
                    return Err(FilmError::Configuration(
                        "graded layers cannot be refined".into(),
                    ));
                }
                if thicknesses.len() != steps.len() || thicknesses.is_empty() {
                    return Err(FilmError::Configuration(
                        "graded layer with inconsistent profile".into(),
                    ));
                }
                let nb_levels = self.levels(layer.material()).len();
                if steps.iter().any(|s| *s >= nb_levels) {
                    return Err(FilmError::Configuration(format!(
                        "graded layer step outside the {nb_levels} levels of {}",
                        material.name()
                    )));
                }
                for thickness in thicknesses {
                    check_thickness(*thickness)?;
                }
                Ok(())
            }
        }
    }

    /// Index curve of a slice (cached).
    pub(crate) fn slice_index(
        &mut self,
        key: IndexKey,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<Index> {
        let center = self.settings.center_wavelength;
        let (materials, levels) = (&self.materials, &self.levels);
        self.cache
            .indices
            .get_or_compute(wavelengths, key, || {
                compute_index(materials, levels, center, wavelengths, key)
            })
            .cloned()
    }
    /// Index curve of material number `nb` (non-mixtures).
    pub(crate) fn material_index(
        &mut self,
        nb: usize,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<Index> {
        self.slice_index(IndexKey::Material(nb), wavelengths)
    }
    /// `dN/dn` of a homogeneous mixture layer with respect to its center index.
    pub(crate) fn layer_index_derivative(
        &self,
        layer: &Layer,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<Index> {
        let n = layer.index().ok_or_else(|| {
            FilmError::Optimization("only homogeneous mixture layers have an index".into())
        })?;
        self.material_ref(layer.material())?.index_derivative(
            wavelengths,
            self.settings.center_wavelength,
            n,
        )
    }
    /// Characteristic matrix of layer `i` of one side.
    pub(crate) fn layer_matrix(
        &mut self,
        side: Side,
        i: usize,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<CharacteristicMatrix> {
        let slices = self.layers(side)[i].slices();
        let mut product = CharacteristicMatrix::new(wavelengths.len());
        let mut slice = self.pool.take(wavelengths.len());
        for (key, thickness) in slices {
            let n = self.slice_index(key, wavelengths)?;
            slice.set_matrices(&n, thickness, sin2, wavelengths);
            product.multiply(&slice);
        }
        self.pool.give_back(slice);
        Ok(product)
    }
    /// Characteristic matrices of all layers of one side.
    pub(crate) fn layer_matrices(
        &mut self,
        side: Side,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<Vec<CharacteristicMatrix>> {
        (0..self.layers(side).len())
            .map(|i| self.layer_matrix(side, i, sin2, wavelengths))
            .collect()
    }
    /// Global matrix of one side, taken from the analysis cache if possible.
    pub(crate) fn face_matrix(
        &mut self,
        side: Side,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) -> FilmResult<CharacteristicMatrix> {
        if let Some(matrix) = self.cache.face_matrix(wavelengths, sin2, side) {
            return Ok(matrix.clone());
        }
        debug!("computing the {side} matrix");
        let mut global = CharacteristicMatrix::new(wavelengths.len());
        for i in 0..self.layers(side).len() {
            global.multiply(&self.layer_matrix(side, i, sin2, wavelengths)?);
        }
        self.cache
            .store_face_matrix(wavelengths, sin2, side, global.clone());
        Ok(global)
    }
}

#[cfg(test)]
pub(crate) mod test_filters {
    use super::*;
    use crate::materials::{ConstantDispersion, MaterialKind, MixtureKind};

    /// A mixture from 1.45 to 2.25 with constant dispersion.
    pub fn mixture() -> Material {
        Material::new(
            "SiO2-Nb2O5",
            MaterialKind::Mixture(
                Mixture::new(
                    vec![0.0, 1.0],
                    MixtureKind::Constant(vec![
                        ConstantDispersion::new(1.45, 0.0).unwrap(),
                        ConstantDispersion::new(2.25, 0.0).unwrap(),
                    ]),
                )
                .unwrap(),
            ),
        )
        .unwrap()
    }
    /// An uncoated 1 mm substrate of index `n` in air.
    pub fn bare(n: f64) -> Filter {
        Filter::with_default_substrate_thickness(
            &Material::constant("substrate", n).unwrap(),
            &Material::constant("air", 1.0).unwrap(),
            &Material::constant("air", 1.0).unwrap(),
        )
        .unwrap()
    }
    /// `nb_pairs` quarter wave pairs (2.35 / 1.46 at 550 nm) on glass, with a single layer
    /// antireflection coating on the back.
    pub fn hl_stack(nb_pairs: usize) -> Filter {
        let mut filter = bare(1.52);
        let high = Material::constant("TiO2", 2.35).unwrap();
        let low = Material::constant("SiO2", 1.46).unwrap();
        for _ in 0..nb_pairs {
            filter
                .add_layer(Side::Front, Position::Top, &high, 550.0 / (4.0 * 2.35), None)
                .unwrap();
            filter
                .add_layer(Side::Front, Position::Top, &low, 550.0 / (4.0 * 1.46), None)
                .unwrap();
        }
        filter
            .add_layer(Side::Back, Position::Top, &low, 550.0 / (4.0 * 1.46), None)
            .unwrap();
        filter
    }
}
