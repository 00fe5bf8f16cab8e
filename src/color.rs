#![warn(missing_docs)]
//! Tristimulus values (CIE XYZ) of reflection and transmission spectra.
//!
//! A [`Colorimeter`] combines an observer (color matching functions) with an illuminant. Since XYZ
//! are linear in the spectrum, the same weights yield the derivative of a color from the derivative
//! of the spectrum.
use kahan::KahanSummator;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FilmError, FilmResult},
    wavelengths::WavelengthSet,
};

const CIE_1931_WAVELENGTHS: [f64; 21] = [
    380.0, 400.0, 420.0, 440.0, 460.0, 480.0, 500.0, 520.0, 540.0, 560.0, 580.0, 600.0, 620.0,
    640.0, 660.0, 680.0, 700.0, 720.0, 740.0, 760.0, 780.0,
];
const CIE_1931_X: [f64; 21] = [
    0.001_368, 0.014_310, 0.134_380, 0.348_280, 0.290_800, 0.095_640, 0.004_900, 0.063_270,
    0.290_400, 0.594_500, 0.916_300, 1.062_200, 0.854_450, 0.447_900, 0.164_900, 0.046_770,
    0.011_359, 0.002_899, 0.000_690, 0.000_166, 0.000_042,
];
const CIE_1931_Y: [f64; 21] = [
    0.000_039, 0.000_396, 0.004_000, 0.023_000, 0.060_000, 0.139_020, 0.323_000, 0.710_000,
    0.954_000, 0.995_000, 0.870_000, 0.631_000, 0.381_000, 0.175_000, 0.061_000, 0.017_000,
    0.004_102, 0.001_047, 0.000_249, 0.000_060, 0.000_015,
];
const CIE_1931_Z: [f64; 21] = [
    0.006_450, 0.067_850, 0.645_600, 1.747_060, 1.669_200, 0.812_950, 0.272_000, 0.078_250,
    0.020_300, 0.003_900, 0.001_650, 0.000_800, 0.000_190, 0.000_020, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0,
];
const D65: [f64; 21] = [
    49.975_5, 82.754_9, 93.431_8, 104.865, 117.812, 115.923, 109.354, 104.790, 104.405, 100.0,
    95.788_0, 90.006_2, 87.698_7, 83.699_2, 80.214_6, 78.284_2, 71.609_1, 61.604_0, 75.087_3,
    46.418_3, 63.592_7,
];

/// Name of the builtin observer.
pub const CIE_1931: &str = "CIE-1931";

/// Illuminant weighted color matching functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colorimeter {
    wavelengths: WavelengthSet,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}
impl Colorimeter {
    /// Creates a [`Colorimeter`] from tabulated observer functions and an illuminant.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the tables do not all have the length of `wavelengths`
    ///   - the weighted `ȳ` function sums to zero
    pub fn new(
        wavelengths: WavelengthSet,
        observer: [&[f64]; 3],
        illuminant: &[f64],
    ) -> FilmResult<Self> {
        let len = wavelengths.len();
        if observer.iter().any(|o| o.len() != len) || illuminant.len() != len {
            return Err(FilmError::Other(
                "observer and illuminant tables must match the wavelengths".into(),
            ));
        }
        let weigh = |o: &[f64]| -> Vec<f64> {
            o.iter().zip(illuminant).map(|(o, i)| o * i).collect()
        };
        let colorimeter = Self {
            wavelengths,
            x: weigh(observer[0]),
            y: weigh(observer[1]),
            z: weigh(observer[2]),
        };
        if colorimeter.normalization() <= 0.0 {
            return Err(FilmError::Other(
                "illuminant weighted y function must not vanish".into(),
            ));
        }
        Ok(colorimeter)
    }
    /// Creates one of the builtin colorimeters.
    ///
    /// The observer must be `CIE-1931` (2°, sampled every 20 nm); the illuminant `E` (equal
    /// energy) or `D65`.
    ///
    /// # Errors
    ///
    /// This function will return an error for unknown observer or illuminant names.
    pub fn builtin(observer: &str, illuminant: &str) -> FilmResult<Self> {
        if observer != CIE_1931 {
            return Err(FilmError::Other(format!("unknown observer '{observer}'")));
        }
        let illuminant: Vec<f64> = match illuminant {
            "E" => vec![1.0; CIE_1931_WAVELENGTHS.len()],
            "D65" => D65.to_vec(),
            _ => {
                return Err(FilmError::Other(format!(
                    "unknown illuminant '{illuminant}'"
                )))
            }
        };
        Self::new(
            WavelengthSet::new(CIE_1931_WAVELENGTHS.to_vec())?,
            [&CIE_1931_X, &CIE_1931_Y, &CIE_1931_Z],
            &illuminant,
        )
    }
    /// The wavelengths a spectrum must be sampled on.
    #[must_use]
    pub const fn wavelengths(&self) -> &WavelengthSet {
        &self.wavelengths
    }
    fn normalization(&self) -> f64 {
        let sum: kahan::KahanSum<f64> = self.y.iter().kahan_sum();
        sum.sum()
    }
    /// Tristimulus values `[X, Y, Z]` of a spectrum (fractions in `[0, 1]`) sampled on
    /// [`Colorimeter::wavelengths`]. A perfect reflector has `Y = 100`.
    ///
    /// The map is linear: applied to a derivative spectrum it yields the derivative of the color.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spectrum has the wrong length.
    pub fn xyz(&self, spectrum: &[f64]) -> FilmResult<[f64; 3]> {
        if spectrum.len() != self.wavelengths.len() {
            return Err(FilmError::Analysis(format!(
                "color needs {} spectrum values, got {}",
                self.wavelengths.len(),
                spectrum.len()
            )));
        }
        let k = 100.0 / self.normalization();
        let weighted = |w: &[f64]| -> f64 {
            let sum: kahan::KahanSum<f64> = w.iter().zip(spectrum).map(|(w, s)| w * s).kahan_sum();
            k * sum.sum()
        };
        Ok([weighted(&self.x), weighted(&self.y), weighted(&self.z)])
    }
    /// Derivative of [`Colorimeter::xyz`] given the derivative of the spectrum.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spectrum has the wrong length.
    pub fn xyz_derivative(&self, d_spectrum: &[f64]) -> FilmResult<[f64; 3]> {
        self.xyz(d_spectrum)
    }
}

/// Chromaticity coordinates `(x, y)` of tristimulus values.
#[must_use]
pub fn chromaticity(xyz: [f64; 3]) -> Option<(f64, f64)> {
    let sum = xyz[0] + xyz[1] + xyz[2];
    if sum == 0.0 {
        None
    } else {
        Some((xyz[0] / sum, xyz[1] / sum))
    }
}
