use num::complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{Dispersion, DispersionModel};
use crate::error::{FilmError, FilmResult};

/// Tabulated `n` and `k` values, linearly interpolated in wavelength.
///
/// Outside the tabulated range the first (last) entry is used.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TableDispersion {
    wavelengths: Vec<f64>,
    n: Vec<f64>,
    k: Vec<f64>,
}
impl TableDispersion {
    /// Creates a new [`TableDispersion`] from wavelengths (nm) and the corresponding `n` and `k`.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the three lists differ in length or are empty
    ///   - the wavelengths are not strictly increasing
    ///   - any `n` is not positive or any `k` is negative
    pub fn new(wavelengths: Vec<f64>, n: Vec<f64>, k: Vec<f64>) -> FilmResult<Self> {
        if wavelengths.is_empty() || wavelengths.len() != n.len() || n.len() != k.len() {
            return Err(FilmError::Material(
                "table needs non-empty wavelength, n and k columns of equal length".into(),
            ));
        }
        if wavelengths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FilmError::Material(
                "table wavelengths must be strictly increasing".into(),
            ));
        }
        if n.iter().any(|n| *n <= 0.0 || !n.is_finite()) || k.iter().any(|k| *k < 0.0 || !k.is_finite())
        {
            return Err(FilmError::Material(
                "table requires n > 0 and k >= 0 (finite)".into(),
            ));
        }
        Ok(Self { wavelengths, n, k })
    }
    /// Returns the tabulated wavelengths.
    #[must_use]
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }
}
impl DispersionModel for TableDispersion {
    fn complex_index(&self, wavelength: f64) -> Complex64 {
        let last = self.wavelengths.len() - 1;
        if wavelength <= self.wavelengths[0] {
            return Complex64::new(self.n[0], -self.k[0]);
        }
        if wavelength >= self.wavelengths[last] {
            return Complex64::new(self.n[last], -self.k[last]);
        }
        let idx = self.wavelengths.partition_point(|w| *w < wavelength);
        let (lower, upper) = (idx - 1, idx);
        let ratio = (wavelength - self.wavelengths[lower])
            / (self.wavelengths[upper] - self.wavelengths[lower]);
        let n = self.n[lower].mul_add(1.0 - ratio, self.n[upper] * ratio);
        let k = self.k[lower].mul_add(1.0 - ratio, self.k[upper] * ratio);
        Complex64::new(n, -k)
    }
    fn to_enum(&self) -> Dispersion {
        Dispersion::Table(self.clone())
    }
}
