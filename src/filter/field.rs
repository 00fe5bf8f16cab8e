//! Electric field distribution inside the front stack.
use nalgebra::Vector2;
use num::complex::Complex64;

use super::{Filter, Illumination, Side};
use crate::{
    abeles::{monitoring::sublayer_thicknesses, CharacteristicMatrix, Direction, Mode},
    error::{FilmError, FilmResult},
    wavelengths::WavelengthSet,
};

/// Squared tangential electric field, normalized to the incident field.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricField {
    /// distance from the substrate (nm)
    pub positions: Vec<f64>,
    /// `|E/E_incident|²` at every position
    pub intensity: Vec<f64>,
}

impl Filter {
    /// Electric field distribution in the front stack at a single wavelength.
    ///
    /// Positions are measured from the substrate interface towards the front medium and sampled
    /// every `sublayer_thickness` inside each layer (layer boundaries always included). The field
    /// of both modes is mixed according to the polarization.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the light comes from the back medium
    ///   - the wavelength or the sublayer thickness is not positive
    ///   - a material cannot be evaluated
    pub fn electric_field(
        &mut self,
        wavelength: f64,
        illumination: &Illumination,
        sublayer_thickness: f64,
    ) -> FilmResult<ElectricField> {
        if illumination.direction != Direction::Forward {
            return Err(FilmError::Analysis(
                "the electric field is computed for light coming from the front medium".into(),
            ));
        }
        if !(sublayer_thickness > 0.0 && sublayer_thickness.is_finite()) {
            return Err(FilmError::Analysis(
                "sublayer thickness must be positive".into(),
            ));
        }
        let wavelengths = WavelengthSet::new(vec![wavelength])?;
        let condition = self.condition(&wavelengths, illumination.angle, Direction::Forward)?;
        let exit = if self.settings.dont_consider_substrate {
            &condition.back_medium
        } else {
            &condition.substrate
        };
        let mut positions = vec![0.0];
        let mut fields: [Vec<Vector2<Complex64>>; 2] = [Vec::new(), Vec::new()];
        let modes = [Mode::S, Mode::P];
        let mut bottom: [Vector2<Complex64>; 2] =
            modes.map(|mode| Vector2::new(Complex64::new(1.0, 0.0), exit.get(mode)[0]));
        for (field, v) in fields.iter_mut().zip(&bottom) {
            field.push(*v);
        }
        let mut slice = CharacteristicMatrix::new(1);
        let mut offset = 0.0;
        for i in 0..self.layers(Side::Front).len() {
            for (key, thickness) in self.layers(Side::Front)[i].slices() {
                let n = self.slice_index(key, &wavelengths)?;
                for z in sublayer_thicknesses(thickness, sublayer_thickness)
                    .into_iter()
                    .skip(1)
                {
                    slice.set_matrices(&n, z, &condition.sin2, &wavelengths);
                    for (k, mode) in modes.iter().enumerate() {
                        fields[k].push(slice.get(*mode)[0] * bottom[k]);
                    }
                    positions.push(offset + z);
                }
                slice.set_matrices(&n, thickness, &condition.sin2, &wavelengths);
                for (k, mode) in modes.iter().enumerate() {
                    bottom[k] = slice.get(*mode)[0] * bottom[k];
                }
                offset += thickness;
            }
        }
        // incident amplitude (η_m·B + C) / (2η_m) with (B, C) the field at the top
        let incident: Vec<f64> = modes
            .iter()
            .enumerate()
            .map(|(k, mode)| {
                let eta = condition.front_medium.get(*mode)[0];
                ((eta * bottom[k][0] + bottom[k][1]) / (2.0 * eta)).norm_sqr()
            })
            .collect();
        let (w_s, w_p) = illumination.polarization.weights();
        let intensity = (0..positions.len())
            .map(|j| {
                w_s * fields[0][j][0].norm_sqr() / incident[0]
                    + w_p * fields[1][j][0].norm_sqr() / incident[1]
            })
            .collect();
        Ok(ElectricField {
            positions,
            intensity,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        abeles::Polarization,
        degree,
        filter::{test_filters, Position},
        materials::Material,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn bare_substrate() {
        let mut filter = test_filters::bare(1.5);
        let field = filter
            .electric_field(550.0, &Illumination::default(), 10.0)
            .unwrap();
        assert_eq!(field.positions, vec![0.0]);
        assert_abs_diff_eq!(field.intensity[0], 0.64, epsilon = 1e-12);
    }
    #[test]
    fn field_at_top_matches_standing_wave() {
        let mut filter = test_filters::bare(1.5);
        filter
            .add_layer(
                Side::Front,
                Position::Top,
                &Material::constant("H", 2.0).unwrap(),
                68.75,
                None,
            )
            .unwrap();
        let field = filter
            .electric_field(550.0, &Illumination::default(), 5.0)
            .unwrap();
        assert_abs_diff_eq!(*field.positions.last().unwrap(), 68.75);
        // at the top of a quarter wave layer E = 1 + r with r real and negative
        let r = (1.5 - 4.0) / (1.5 + 4.0);
        assert_abs_diff_eq!(*field.intensity.last().unwrap(), (1.0 + r) * (1.0 + r), epsilon = 1e-9);
    }
    #[test]
    fn backward_is_rejected() {
        let mut filter = test_filters::bare(1.5);
        let illumination = Illumination::new(degree!(0.0), Polarization::S, Direction::Backward);
        assert!(filter.electric_field(550.0, &illumination, 1.0).is_err());
        assert!(filter
            .electric_field(550.0, &Illumination::default(), 0.0)
            .is_err());
    }
}
