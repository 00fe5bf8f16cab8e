use num::complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{Dispersion, DispersionModel};
use crate::error::{FilmError, FilmResult};

/// Wavelength-independent complex index `n - i·k`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct ConstantDispersion {
    n: f64,
    #[serde(default)]
    k: f64,
}
impl ConstantDispersion {
    /// Creates a new [`ConstantDispersion`].
    ///
    /// # Errors
    ///
    /// This function will return an error if `n` is not positive or `k` is negative (or any is
    /// not finite).
    pub fn new(n: f64, k: f64) -> FilmResult<Self> {
        if n <= 0.0 || !n.is_finite() || k < 0.0 || !k.is_finite() {
            return Err(FilmError::Material(
                "constant index requires n > 0 and k >= 0 (finite)".into(),
            ));
        }
        Ok(Self { n, k })
    }
}
impl DispersionModel for ConstantDispersion {
    fn complex_index(&self, _wavelength: f64) -> Complex64 {
        Complex64::new(self.n, -self.k)
    }
    fn to_enum(&self) -> Dispersion {
        Dispersion::Constant(*self)
    }
}
