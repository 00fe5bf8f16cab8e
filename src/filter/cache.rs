//! Result caches of a [`Filter`](super::Filter).
//!
//! Nothing in here is persisted. Every entry is derived from the filter description and is dropped
//! by the filter whenever the description it depends on changes.
use std::collections::HashMap;

use log::debug;

use super::Side;
use crate::{
    abeles::{monitoring::MonitoringMatrices, CharacteristicMatrix, Sin2},
    error::FilmResult,
    index::Index,
    wavelengths::WavelengthSet,
};

/// Identifies an index curve of a material of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// a non-mixture material
    Material(usize),
    /// a mixture tuned to a center index (stored as bits)
    Mixture(usize, u64),
    /// a discretization level of a mixture
    Level(usize, usize),
}
impl IndexKey {
    /// Key of a mixture tuned to the center index `n`.
    #[must_use]
    pub fn mixture(material: usize, n: f64) -> Self {
        Self::Mixture(material, n.to_bits())
    }
}

/// Index curves, per wavelength set.
#[derive(Debug, Clone, Default)]
pub struct IndexCache {
    entries: Vec<(WavelengthSet, HashMap<IndexKey, Index>)>,
}
impl IndexCache {
    /// Returns the cached curve or computes (and stores) it.
    ///
    /// # Errors
    ///
    /// This function will return the error of `compute`.
    pub fn get_or_compute<F>(
        &mut self,
        wavelengths: &WavelengthSet,
        key: IndexKey,
        compute: F,
    ) -> FilmResult<&Index>
    where
        F: FnOnce() -> FilmResult<Index>,
    {
        let position = if let Some(position) =
            self.entries.iter().position(|(w, _)| w == wavelengths)
        {
            position
        } else {
            self.entries.push((wavelengths.clone(), HashMap::new()));
            self.entries.len() - 1
        };
        let curves = &mut self.entries[position].1;
        if !curves.contains_key(&key) {
            curves.insert(key, compute()?);
        }
        Ok(&curves[&key])
    }
    /// Number of cached curves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, c)| c.len()).sum()
    }
    /// Returns `true` if no curve is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Drop all curves.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
    /// Drop the mixture curves whose key is not in `used`. Other curves are kept.
    pub fn retain_mixtures(&mut self, used: &[IndexKey]) {
        for (_, curves) in &mut self.entries {
            curves.retain(|key, _| !matches!(key, IndexKey::Mixture(..)) || used.contains(key));
        }
    }
}

/// Global matrices of both faces for one incidence condition.
#[derive(Debug, Clone)]
pub struct AnalysisEntry {
    wavelengths: WavelengthSet,
    sin2: Sin2,
    front: Option<CharacteristicMatrix>,
    back: Option<CharacteristicMatrix>,
}
impl AnalysisEntry {
    /// The matrix of one face, if it was computed.
    #[must_use]
    pub const fn matrix(&self, side: Side) -> Option<&CharacteristicMatrix> {
        match side {
            Side::Front => self.front.as_ref(),
            Side::Back => self.back.as_ref(),
        }
    }
    fn matrix_mut(&mut self, side: Side) -> &mut Option<CharacteristicMatrix> {
        match side {
            Side::Front => &mut self.front,
            Side::Back => &mut self.back,
        }
    }
}

/// Monitoring matrices of every layer of one side.
#[derive(Debug, Clone)]
struct MonitoringEntry {
    side: Side,
    wavelengths: WavelengthSet,
    sin2: Sin2,
    layers: Vec<MonitoringMatrices>,
}

/// All caches of a filter.
#[derive(Debug, Clone, Default)]
pub struct FilterCache {
    /// index curves
    pub indices: IndexCache,
    analysis: Vec<AnalysisEntry>,
    monitoring: Vec<MonitoringEntry>,
}
impl FilterCache {
    fn analysis_position(&self, wavelengths: &WavelengthSet, sin2: &Sin2) -> Option<usize> {
        self.analysis
            .iter()
            .position(|e| e.sin2 == *sin2 && e.wavelengths == *wavelengths)
    }
    /// The cached global matrix of one face.
    #[must_use]
    pub fn face_matrix(
        &self,
        wavelengths: &WavelengthSet,
        sin2: &Sin2,
        side: Side,
    ) -> Option<&CharacteristicMatrix> {
        let entry = &self.analysis[self.analysis_position(wavelengths, sin2)?];
        let matrix = entry.matrix(side);
        if matrix.is_some() {
            debug!("{side} matrix taken from the analysis cache");
        }
        matrix
    }
    /// Store the global matrix of one face. The condition entry is created if necessary.
    pub fn store_face_matrix(
        &mut self,
        wavelengths: &WavelengthSet,
        sin2: &Sin2,
        side: Side,
        matrix: CharacteristicMatrix,
    ) {
        let position = if let Some(position) = self.analysis_position(wavelengths, sin2) {
            position
        } else {
            self.analysis.push(AnalysisEntry {
                wavelengths: wavelengths.clone(),
                sin2: sin2.clone(),
                front: None,
                back: None,
            });
            self.analysis.len() - 1
        };
        *self.analysis[position].matrix_mut(side) = Some(matrix);
    }
    /// Number of cached incidence conditions.
    #[must_use]
    pub fn analysis_len(&self) -> usize {
        self.analysis.len()
    }
    /// Forget the matrices of one face for every condition.
    pub fn invalidate_side(&mut self, side: Side) {
        for entry in &mut self.analysis {
            *entry.matrix_mut(side) = None;
        }
        self.clear_monitoring(Some(side));
    }
    /// Drop all analysis entries.
    pub fn clear_analysis(&mut self) {
        self.analysis.clear();
    }
    /// The cached monitoring matrices of one side.
    #[must_use]
    pub fn monitoring(
        &self,
        side: Side,
        wavelengths: &WavelengthSet,
        sin2: &Sin2,
    ) -> Option<&[MonitoringMatrices]> {
        self.monitoring
            .iter()
            .find(|e| e.side == side && e.sin2 == *sin2 && e.wavelengths == *wavelengths)
            .map(|e| e.layers.as_slice())
    }
    /// Store the monitoring matrices of one side.
    pub fn store_monitoring(
        &mut self,
        side: Side,
        wavelengths: &WavelengthSet,
        sin2: &Sin2,
        layers: Vec<MonitoringMatrices>,
    ) {
        self.monitoring.push(MonitoringEntry {
            side,
            wavelengths: wavelengths.clone(),
            sin2: sin2.clone(),
            layers,
        });
    }
    /// Number of cached monitoring entries.
    #[must_use]
    pub fn monitoring_len(&self) -> usize {
        self.monitoring.len()
    }
    /// Drop the monitoring matrices of one side, or of both sides if `side` is `None`.
    pub fn clear_monitoring(&mut self, side: Option<Side>) {
        match side {
            Some(side) => self.monitoring.retain(|e| e.side != side),
            None => self.monitoring.clear(),
        }
    }
    /// Drop everything.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.analysis.clear();
        self.monitoring.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn index_cache() {
        let mut cache = IndexCache::default();
        let wavelengths = WavelengthSet::new(vec![500.0, 600.0]).unwrap();
        let mut calls = 0;
        for _ in 0..2 {
            let index = cache
                .get_or_compute(&wavelengths, IndexKey::Material(0), || {
                    calls += 1;
                    Ok(Index::constant(1.5, 2))
                })
                .unwrap();
            assert_eq!(index.len(), 2);
        }
        assert_eq!(calls, 1);
        cache
            .get_or_compute(&wavelengths, IndexKey::mixture(1, 1.7), || {
                Ok(Index::constant(1.7, 2))
            })
            .unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
    #[test]
    fn face_matrices() {
        let mut cache = FilterCache::default();
        let wavelengths = WavelengthSet::new(vec![500.0]).unwrap();
        let sin2 = Sin2::normal(1);
        assert!(cache.face_matrix(&wavelengths, &sin2, Side::Front).is_none());
        cache.store_face_matrix(&wavelengths, &sin2, Side::Front, CharacteristicMatrix::new(1));
        cache.store_face_matrix(&wavelengths, &sin2, Side::Back, CharacteristicMatrix::new(1));
        assert_eq!(cache.analysis_len(), 1);
        cache.invalidate_side(Side::Front);
        assert!(cache.face_matrix(&wavelengths, &sin2, Side::Front).is_none());
        assert!(cache.face_matrix(&wavelengths, &sin2, Side::Back).is_some());
        assert_eq!(cache.analysis_len(), 1);
    }
    #[test]
    fn monitoring() {
        let mut cache = FilterCache::default();
        let wavelengths = WavelengthSet::new(vec![500.0]).unwrap();
        let sin2 = Sin2::normal(1);
        cache.store_monitoring(Side::Front, &wavelengths, &sin2, vec![]);
        cache.store_monitoring(Side::Back, &wavelengths, &sin2, vec![]);
        assert!(cache.monitoring(Side::Front, &wavelengths, &sin2).is_some());
        cache.invalidate_side(Side::Back);
        assert_eq!(cache.monitoring_len(), 1);
        cache.clear_monitoring(None);
        assert_eq!(cache.monitoring_len(), 0);
    }
}
