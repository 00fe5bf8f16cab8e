//! Needle synthesis: insertion of thin layers of another material inside the front layers.
//!
//! The derivative of the merit function with respect to the thickness of a needle of zero
//! thickness placed at depth `z` inside layer `i` only needs the derivative of that layer's
//! matrix, `L(z) · N · L(d - z)`, where `N` is the needle matrix. Needles are only proposed where
//! this derivative has a negative local minimum.
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    candidates::{depths, merit_slope, negative_minima, select, Candidate},
    model::{partial_layer_matrix, sensitivities, TargetSensitivity},
    Refinement,
};
use crate::{
    abeles::CharacteristicMatrix,
    error::{FilmError, FilmResult},
    filter::{Filter, Layer, LayerFlags, Side},
    materials::Material,
    targets::Target,
    utils::StopToken,
};

/// Settings of the needle method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedleConfig {
    /// maximal distance between two sampled depths (nm)
    pub spacing: f64,
    /// maximal number of needles added at once
    pub nb_needles: usize,
    /// only needles whose derivative is at least this fraction of the best one are added
    pub min_ratio: f64,
}
impl Default for NeedleConfig {
    fn default() -> Self {
        Self {
            spacing: 5.0,
            nb_needles: 1,
            min_ratio: 0.1,
        }
    }
}
impl NeedleConfig {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spacing is not positive or the ratio is outside
    /// `[0, 1]`.
    pub fn check(&self) -> FilmResult<()> {
        if !(self.spacing > 0.0) {
            return Err(FilmError::Configuration(
                "needle spacing must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_ratio) {
            return Err(FilmError::Configuration(
                "needle ratio must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// A possible needle. The kind is the material number of the needle in the working filter.
pub type NeedleCandidate = Candidate<usize>;

fn nb_values(targets: &[Target]) -> usize {
    targets.iter().map(Target::len).sum()
}

/// Needle matrices of material `nb`, one per target.
fn needle_matrices(
    filter: &mut Filter,
    sensitivities: &[TargetSensitivity],
    nb: usize,
) -> FilmResult<Vec<CharacteristicMatrix>> {
    sensitivities
        .iter()
        .map(|s| {
            let n = filter.material_index(nb, s.wavelengths())?;
            let mut needle = CharacteristicMatrix::new(s.wavelengths().len());
            needle.set_needle(&n, s.sin2(), s.wavelengths());
            Ok(needle)
        })
        .collect()
}

/// `dMF` of a needle at every depth of front layer `i`, for every set of needle matrices.
fn needle_tracks(
    filter: &mut Filter,
    sensitivities: &[TargetSensitivity],
    i: usize,
    depths: &[f64],
    needles: &[Vec<CharacteristicMatrix>],
    nb_values: usize,
) -> FilmResult<Vec<Vec<f64>>> {
    let layer = filter
        .layers(Side::Front)
        .get(i)
        .cloned()
        .ok_or_else(|| FilmError::Optimization(format!("no front layer {i}")))?;
    let thickness = layer.thickness();
    let mut tracks = vec![Vec::with_capacity(depths.len()); needles.len()];
    for z in depths {
        let mut parts = Vec::with_capacity(sensitivities.len());
        for s in sensitivities {
            let bottom = partial_layer_matrix(filter, &layer, *z, s.sin2(), s.wavelengths())?;
            let top =
                partial_layer_matrix(filter, &layer, thickness - z, s.sin2(), s.wavelengths())?;
            parts.push((bottom, top));
        }
        for (track, needle) in tracks.iter_mut().zip(needles) {
            let local: Vec<CharacteristicMatrix> = parts
                .iter()
                .zip(needle)
                .map(|((bottom, top), needle)| {
                    let mut local = CharacteristicMatrix::new(needle.len());
                    local.set_product(bottom, needle);
                    local.multiply(top);
                    local
                })
                .collect();
            track.push(merit_slope(sensitivities, i, &local, nb_values)?);
        }
    }
    Ok(tracks)
}

/// Split `layers[candidate.layer]` at the candidate depth around a needle of zero thickness.
fn insert_needle(layers: &mut Vec<Layer>, candidate: &NeedleCandidate) -> FilmResult<()> {
    let host = layers
        .get(candidate.layer)
        .cloned()
        .ok_or_else(|| FilmError::Optimization(format!("no front layer {}", candidate.layer)))?;
    let mut bottom = host.clone();
    bottom.set_thickness(candidate.depth)?;
    let mut top = host;
    top.set_thickness((top.thickness() - candidate.depth).max(0.0))?;
    let mut needle = Layer::homogeneous(candidate.kind, 0.0, None);
    needle.set_flags(LayerFlags {
        add_needles: true,
        ..LayerFlags::refinable()
    })?;
    needle.set_description(Some("needle".into()));
    layers.splice(candidate.layer..=candidate.layer, [bottom, needle, top]);
    Ok(())
}

impl Refinement {
    /// Material numbers of the needle materials in the working filter: the needle materials of
    /// the filter settings, or all non-mixture materials of the front stack.
    fn needle_materials(&mut self) -> FilmResult<Vec<usize>> {
        let filter = self.filter_mut();
        let materials: Vec<Material> = if filter.settings().needle_materials().is_empty() {
            let mut numbers: Vec<usize> = filter
                .layers(Side::Front)
                .iter()
                .map(Layer::material)
                .collect();
            numbers.sort_unstable();
            numbers.dedup();
            numbers
                .into_iter()
                .filter_map(|nb| filter.material(nb))
                .filter(|m| !m.is_mixture())
                .cloned()
                .collect()
        } else {
            filter.settings().needle_materials().to_vec()
        };
        materials
            .iter()
            .map(|m| filter.get_material_nb(m))
            .collect()
    }
    /// Derivative of the merit function with respect to the thickness of a needle of `material`
    /// inserted at each of `depths` inside front layer `layer`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the layer is not homogeneous or the targets cannot
    /// be evaluated.
    pub fn needle_derivatives(
        &mut self,
        layer: usize,
        material: &Material,
        depths: &[f64],
    ) -> FilmResult<Vec<f64>> {
        let targets = self.targets().to_vec();
        let filter = self.filter_mut();
        let nb = filter.get_material_nb(material)?;
        let sensitivities = sensitivities(filter, &targets)?;
        let needles = needle_matrices(filter, &sensitivities, nb)?;
        let mut tracks = needle_tracks(
            filter,
            &sensitivities,
            layer,
            depths,
            &[needles],
            nb_values(&targets),
        )?;
        Ok(tracks.pop().unwrap_or_default())
    }
    /// Find the needle candidates of all front layers flagged for needles.
    ///
    /// Returns `None` if stopped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn scan_needles(
        &mut self,
        config: &NeedleConfig,
        stop: &StopToken,
    ) -> FilmResult<Option<Vec<NeedleCandidate>>> {
        config.check()?;
        let materials = self.needle_materials()?;
        let targets = self.targets().to_vec();
        let nb_values = nb_values(&targets);
        let filter = self.filter_mut();
        let sensitivities = sensitivities(filter, &targets)?;
        let mut needles = Vec::with_capacity(materials.len());
        for nb in &materials {
            needles.push(needle_matrices(filter, &sensitivities, *nb)?);
        }
        let layers = filter.layers(Side::Front).to_vec();
        let mut candidates = Vec::new();
        for (i, layer) in layers.iter().enumerate() {
            if stop.is_stopped() {
                info!("needle scan stopped");
                return Ok(None);
            }
            if layer.is_graded() || !layer.flags().add_needles {
                continue;
            }
            let depths = depths(layer.thickness(), config.spacing, 3);
            let tracks = needle_tracks(filter, &sensitivities, i, &depths, &needles, nb_values)?;
            for (nb, track) in materials.iter().zip(&tracks) {
                if *nb == layer.material() {
                    continue;
                }
                for (depth, value) in negative_minima(&depths, track, 1, config.spacing) {
                    debug!("needle of material {nb} in layer {i} at {depth} nm: dMF = {value}");
                    candidates.push(Candidate {
                        layer: i,
                        depth,
                        value,
                        kind: *nb,
                    });
                }
            }
        }
        Ok(Some(candidates))
    }
    /// Insert the best needles into the working filter.
    ///
    /// Returns the number of inserted needles (`0` if no needle can improve the merit function),
    /// or `None` if stopped. The working filter is unchanged when stopped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the targets cannot be evaluated.
    pub fn add_needles(
        &mut self,
        config: &NeedleConfig,
        stop: &StopToken,
    ) -> FilmResult<Option<usize>> {
        let Some(candidates) = self.scan_needles(config, stop)? else {
            return Ok(None);
        };
        let mut selected = select(candidates, config.nb_needles, config.min_ratio);
        if selected.is_empty() {
            info!("no needle improves the merit function");
            return Ok(Some(0));
        }
        // deepest first: an insertion never shifts the layers of the needles still to insert
        selected.sort_by(|a, b| b.layer.cmp(&a.layer).then(b.depth.total_cmp(&a.depth)));
        let mut layers = self.filter().layers(Side::Front).to_vec();
        for candidate in &selected {
            info!(
                "adding a needle of material {} in layer {} at {:.3} nm (dMF = {})",
                candidate.kind, candidate.layer, candidate.depth, candidate.value
            );
            insert_needle(&mut layers, candidate)?;
        }
        self.filter_mut().replace_layers(Side::Front, layers)?;
        self.rebuild()?;
        Ok(Some(selected.len()))
    }
}
