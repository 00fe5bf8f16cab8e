use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::micrometer, length::nanometer};

use super::{urbach_extinction, Dispersion, DispersionModel};

/// Three-term Sellmeier model `n² = 1 + Σ Bᵢλ²/(λ² - Cᵢ)` (λ in µm, Cᵢ in µm²) with an Urbach
/// absorption tail.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct SellmeierDispersion {
    b: [f64; 3],
    c: [f64; 3],
    #[serde(default)]
    ak: f64,
    #[serde(default)]
    exponent: f64,
    #[serde(default = "super::default_edge")]
    edge: f64,
}
impl SellmeierDispersion {
    /// Creates a new non-absorbing [`SellmeierDispersion`].
    #[must_use]
    pub const fn new(b: [f64; 3], c: [f64; 3]) -> Self {
        Self {
            b,
            c,
            ak: 0.0,
            exponent: 0.0,
            edge: 400.0,
        }
    }
    /// Add an Urbach absorption tail `k = Ak·exp(exponent·(E - E_edge))` (photon energies in eV).
    #[must_use]
    pub fn with_urbach_tail(mut self, ak: f64, exponent: f64, edge: Length) -> Self {
        self.ak = ak;
        self.exponent = exponent;
        self.edge = edge.get::<nanometer>();
        self
    }
}
impl DispersionModel for SellmeierDispersion {
    fn complex_index(&self, wavelength: f64) -> Complex64 {
        let lambda = Length::new::<nanometer>(wavelength).get::<micrometer>();
        let l_sq = lambda * lambda;
        let n_sq = 1.0
            + self
                .b
                .iter()
                .zip(self.c.iter())
                .map(|(b, c)| b * l_sq / (l_sq - c))
                .sum::<f64>();
        let k = urbach_extinction(self.ak, self.exponent, self.edge, wavelength);
        Complex64::new(n_sq.max(0.0).sqrt(), -k)
    }
    fn to_enum(&self) -> Dispersion {
        Dispersion::Sellmeier(*self)
    }
}
