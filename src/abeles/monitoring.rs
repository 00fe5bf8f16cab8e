//! Matrix sequences of a layer during its deposition.
//!
//! The deposited thickness of a layer grows from zero to its final value. For every sampled
//! thickness the global matrix of the partial stack is kept so that any photometric quantity can be
//! evaluated as a function of the deposited thickness.
use super::{CharacteristicMatrix, Sin2};
use crate::{index::Index, wavelengths::WavelengthSet};

/// Sampled thicknesses `0, Δ, 2Δ, …, d` (the last one always being `d`).
#[must_use]
pub fn sublayer_thicknesses(thickness: f64, sublayer_thickness: f64) -> Vec<f64> {
    let mut thicknesses = vec![0.0];
    if thickness <= 0.0 {
        return thicknesses;
    }
    let mut current = sublayer_thickness;
    while current < thickness - 1e-9 * sublayer_thickness {
        thicknesses.push(current);
        current += sublayer_thickness;
    }
    thicknesses.push(thickness);
    thicknesses
}

/// Global matrices of a partial stack while one layer is deposited.
#[derive(Debug, Clone)]
pub struct MonitoringMatrices {
    thicknesses: Vec<f64>,
    matrices: Vec<CharacteristicMatrix>,
}
impl MonitoringMatrices {
    /// A homogeneous layer deposited on top of the stack `below`.
    ///
    /// Every sample is `below · L(z_k)`.
    #[must_use]
    pub fn homogeneous(
        below: &CharacteristicMatrix,
        n: &Index,
        thickness: f64,
        sublayer_thickness: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) -> Self {
        let thicknesses = sublayer_thicknesses(thickness, sublayer_thickness);
        let mut layer = CharacteristicMatrix::new(wavelengths.len());
        let matrices = thicknesses
            .iter()
            .map(|z| {
                layer.set_matrices(n, *z, sin2, wavelengths);
                let mut m = below.clone();
                m.multiply(&layer);
                m
            })
            .collect();
        Self {
            thicknesses,
            matrices,
        }
    }
    /// A graded layer made of `steps` (index, thickness) deposited on top of the stack `below`.
    ///
    /// The layer grows by cumulative thickness: finished steps are multiplied into the running
    /// product, the current step is sampled like a homogeneous layer.
    #[must_use]
    pub fn graded(
        below: &CharacteristicMatrix,
        steps: &[(&Index, f64)],
        sublayer_thickness: f64,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
    ) -> Self {
        let mut running = below.clone();
        let mut layer = CharacteristicMatrix::new(wavelengths.len());
        let mut thicknesses = vec![0.0];
        let mut matrices = vec![below.clone()];
        let mut offset = 0.0;
        for (n, thickness) in steps {
            for z in sublayer_thicknesses(*thickness, sublayer_thickness)
                .into_iter()
                .skip(1)
            {
                layer.set_matrices(n, z, sin2, wavelengths);
                let mut m = running.clone();
                m.multiply(&layer);
                thicknesses.push(offset + z);
                matrices.push(m);
            }
            layer.set_matrices(n, *thickness, sin2, wavelengths);
            running.multiply(&layer);
            offset += thickness;
        }
        Self {
            thicknesses,
            matrices,
        }
    }
    /// Deposited thickness of every sample.
    #[must_use]
    pub fn thicknesses(&self) -> &[f64] {
        &self.thicknesses
    }
    /// Global matrix of every sample.
    #[must_use]
    pub fn matrices(&self) -> &[CharacteristicMatrix] {
        &self.matrices
    }
    /// The matrix of the complete layer.
    #[must_use]
    pub fn last(&self) -> Option<&CharacteristicMatrix> {
        self.matrices.last()
    }
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }
    /// Returns `true` if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::abeles::Mode;
    use approx::assert_abs_diff_eq;
    #[test]
    fn thicknesses() {
        assert_eq!(sublayer_thicknesses(0.0, 1.0), vec![0.0]);
        assert_eq!(sublayer_thicknesses(3.0, 1.0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(sublayer_thicknesses(2.5, 1.0), vec![0.0, 1.0, 2.0, 2.5]);
    }
    #[test]
    fn homogeneous_ends_with_full_layer() {
        let wavelengths = WavelengthSet::new(vec![500.0, 600.0]).unwrap();
        let sin2 = Sin2::normal(2);
        let n = Index::constant(2.0, 2);
        let mut below = CharacteristicMatrix::new(2);
        below.set_matrices(&Index::constant(1.46, 2), 85.0, &sin2, &wavelengths);
        let monitoring = MonitoringMatrices::homogeneous(&below, &n, 70.0, 1.0, &sin2, &wavelengths);
        assert_eq!(monitoring.len(), 71);
        assert_eq!(monitoring.matrices()[0], below);
        let mut full = below.clone();
        let mut layer = CharacteristicMatrix::new(2);
        layer.set_matrices(&n, 70.0, &sin2, &wavelengths);
        full.multiply(&layer);
        let last = monitoring.last().unwrap();
        for (a, b) in last.get(Mode::S).iter().zip(full.get(Mode::S)) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-14);
        }
    }
    #[test]
    fn graded_is_cumulative() {
        let wavelengths = WavelengthSet::new(vec![550.0]).unwrap();
        let sin2 = Sin2::normal(1);
        let (low, high) = (Index::constant(1.6, 1), Index::constant(1.8, 1));
        let below = CharacteristicMatrix::new(1);
        let monitoring = MonitoringMatrices::graded(
            &below,
            &[(&low, 2.5), (&high, 2.0)],
            1.0,
            &sin2,
            &wavelengths,
        );
        assert_eq!(monitoring.thicknesses(), &[0.0, 1.0, 2.0, 2.5, 3.5, 4.5]);
        let mut full = CharacteristicMatrix::new(1);
        let mut layer = CharacteristicMatrix::new(1);
        layer.set_matrices(&low, 2.5, &sin2, &wavelengths);
        full.multiply(&layer);
        layer.set_matrices(&high, 2.0, &sin2, &wavelengths);
        full.multiply(&layer);
        let last = monitoring.last().unwrap();
        for mode in [Mode::S, Mode::P] {
            assert_abs_diff_eq!((last.get(mode)[0] - full.get(mode)[0]).norm(), 0.0, epsilon = 1e-14);
        }
    }
}
