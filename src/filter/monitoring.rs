//! Monitoring curves: quantities as a function of the deposited thickness.
//!
//! Layers of one side are deposited in order, each growing from zero to its final thickness
//! while the other side is complete. Monitoring matrices are cached per side, wavelengths and
//! incidence condition.
use log::{debug, info};

use super::{analysis::Measurement, Filter, Illumination, Quantity, Side};
use crate::{
    abeles::{
        ellipso::normalize_delta, monitoring::MonitoringMatrices, CharacteristicMatrix,
        Direction, FaceChain, PrePostMatrices, Sin2,
    },
    error::{FilmError, FilmResult},
    index::Index,
    utils::{usize_to_f64, Progress, StopToken},
    wavelengths::WavelengthSet,
};
use uom::si::f64::Angle;

/// Values of a quantity while one layer is deposited.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMonitoring {
    /// number of the layer
    pub layer: usize,
    /// deposited thickness of every sample (nm)
    pub thicknesses: Vec<f64>,
    /// values of every sample (one per wavelength, three for colors)
    pub values: Vec<Vec<f64>>,
}

impl Filter {
    /// Monitoring matrices of every layer of `side`, or `None` if stopped.
    fn monitoring_matrices(
        &mut self,
        side: Side,
        sin2: &Sin2,
        wavelengths: &WavelengthSet,
        stop: &StopToken,
    ) -> FilmResult<Option<Vec<MonitoringMatrices>>> {
        if let Some(cached) = self.cache.monitoring(side, wavelengths, sin2) {
            debug!("{side} monitoring matrices taken from the cache");
            return Ok(Some(cached.to_vec()));
        }
        let layer_matrices = self.layer_matrices(side, sin2, wavelengths)?;
        let partial = PrePostMatrices::new(&layer_matrices, wavelengths.len());
        let sublayer = self.settings.monitoring_sublayer_thickness;
        let mut all = Vec::with_capacity(layer_matrices.len());
        for i in 0..layer_matrices.len() {
            if stop.is_stopped() {
                return Ok(None);
            }
            let slices = self.layers(side)[i].slices();
            let indices = slices
                .iter()
                .map(|(key, thickness)| Ok((self.slice_index(*key, wavelengths)?, *thickness)))
                .collect::<FilmResult<Vec<(Index, f64)>>>()?;
            let below = partial.pre(i);
            let matrices = if self.layers(side)[i].is_graded() {
                let steps: Vec<(&Index, f64)> = indices.iter().map(|(n, d)| (n, *d)).collect();
                MonitoringMatrices::graded(below, &steps, sublayer, sin2, wavelengths)
            } else {
                let (n, thickness) = &indices[0];
                MonitoringMatrices::homogeneous(below, n, *thickness, sublayer, sin2, wavelengths)
            };
            all.push(matrices);
        }
        self.cache
            .store_monitoring(side, wavelengths, sin2, all.clone());
        Ok(Some(all))
    }
    /// Evaluate `eval` for every deposition sample of every layer of `side`.
    #[allow(clippy::too_many_arguments)]
    fn monitor_with<F>(
        &mut self,
        side: Side,
        wavelengths: &WavelengthSet,
        angle: Angle,
        direction: Direction,
        stop: &StopToken,
        progress: &Progress,
        mut eval: F,
    ) -> FilmResult<Vec<LayerMonitoring>>
    where
        F: FnMut(&FaceChain) -> FilmResult<Vec<f64>>,
    {
        if side == Side::Back && self.settings.dont_consider_substrate {
            return Err(FilmError::Configuration(
                "the back side is ignored when the substrate is not considered".into(),
            ));
        }
        progress.restart();
        let condition = self.condition(wavelengths, angle, direction)?;
        let Some(monitoring) =
            self.monitoring_matrices(side, &condition.sin2, wavelengths, stop)?
        else {
            info!("monitoring stopped");
            return Ok(Vec::new());
        };
        let backside = side == Side::Back || self.settings.consider_backside_on_monitoring;
        let other: Option<CharacteristicMatrix> = match side {
            Side::Front if backside => {
                Some(self.face_matrix(Side::Back, &condition.sin2, wavelengths)?)
            }
            Side::Front => None,
            Side::Back => Some(self.face_matrix(Side::Front, &condition.sin2, wavelengths)?),
        };
        let nb_layers = monitoring.len();
        let mut curves = Vec::with_capacity(nb_layers);
        for (layer, matrices) in monitoring.iter().enumerate() {
            let mut values = Vec::with_capacity(matrices.len());
            for m in matrices.matrices() {
                if stop.is_stopped() {
                    info!("monitoring stopped");
                    return Ok(Vec::new());
                }
                let chain = match (side, &other) {
                    (Side::Front, back) => {
                        self.chain_from_matrices(&condition, m, back.as_ref(), direction)
                    }
                    (Side::Back, Some(front)) => {
                        self.chain_from_matrices(&condition, front, Some(m), direction)
                    }
                    (Side::Back, None) => {
                        return Err(FilmError::Analysis("front matrix missing".into()))
                    }
                };
                values.push(eval(&chain)?);
            }
            curves.push(LayerMonitoring {
                layer,
                thicknesses: matrices.thicknesses().to_vec(),
                values,
            });
            progress.advance(usize_to_f64(layer + 1) / usize_to_f64(nb_layers));
        }
        Ok(curves)
    }
    /// Monitoring curves of `quantity` for every layer of `side`, with cancellation and progress.
    ///
    /// A stopped computation returns an empty list.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the quantity cannot be computed for the illumination (see [`Filter::analyse`])
    ///   - the back side is monitored while the substrate is not considered
    pub fn monitoring_with_progress(
        &mut self,
        quantity: Quantity,
        side: Side,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
        stop: &StopToken,
        progress: &Progress,
    ) -> FilmResult<Vec<LayerMonitoring>> {
        let colorimeter = if quantity.is_color() {
            Some(self.colorimeter()?)
        } else {
            None
        };
        let measurement =
            Measurement::new(quantity, illumination.polarization, wavelengths, colorimeter)?;
        let evaluated = measurement.wavelengths().clone();
        self.monitor_with(
            side,
            &evaluated,
            illumination.angle,
            illumination.direction,
            stop,
            progress,
            |chain| measurement.values(chain),
        )
    }
    /// Monitoring curves of `quantity` for every layer of `side`.
    ///
    /// # Errors
    ///
    /// See [`Filter::monitoring_with_progress`].
    pub fn monitoring(
        &mut self,
        quantity: Quantity,
        side: Side,
        wavelengths: &WavelengthSet,
        illumination: &Illumination,
    ) -> FilmResult<Vec<LayerMonitoring>> {
        self.monitoring_with_progress(
            quantity,
            side,
            wavelengths,
            illumination,
            &StopToken::new(),
            &Progress::new(),
        )
    }
    /// Psi and Delta monitoring curves of the front side, using the monitoring ellipsometer.
    ///
    /// # Errors
    ///
    /// This function will return an error if a material cannot be evaluated.
    pub fn ellipsometry_monitoring(
        &mut self,
        wavelengths: &WavelengthSet,
        angle: Angle,
        stop: &StopToken,
        progress: &Progress,
    ) -> FilmResult<(Vec<LayerMonitoring>, Vec<LayerMonitoring>)> {
        let ellipsometer = self.settings.monitoring_ellipsometer;
        let len = wavelengths.len();
        let both = self.monitor_with(
            Side::Front,
            wavelengths,
            angle,
            Direction::Forward,
            stop,
            progress,
            |chain| {
                let (mut psi, delta) = chain.psi_delta();
                psi.extend(delta.into_iter().map(|d| {
                    normalize_delta(d, ellipsometer.ellipsometer_type, ellipsometer.delta_min)
                }));
                Ok(psi)
            },
        )?;
        let split = |take_delta: bool| -> Vec<LayerMonitoring> {
            both.iter()
                .map(|curve| LayerMonitoring {
                    layer: curve.layer,
                    thicknesses: curve.thicknesses.clone(),
                    values: curve
                        .values
                        .iter()
                        .map(|v| {
                            if take_delta {
                                v[len..].to_vec()
                            } else {
                                v[..len].to_vec()
                            }
                        })
                        .collect(),
                })
                .collect()
        };
        Ok((split(false), split(true)))
    }
}
