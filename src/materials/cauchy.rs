use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::micrometer, length::nanometer};

use super::{urbach_extinction, Dispersion, DispersionModel};

/// Cauchy model `n = A + B/λ² + C/λ⁴` (λ in µm) with an Urbach absorption tail.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct CauchyDispersion {
    a: f64,
    b: f64,
    c: f64,
    #[serde(default)]
    ak: f64,
    #[serde(default)]
    exponent: f64,
    #[serde(default = "super::default_edge")]
    edge: f64,
}
impl CauchyDispersion {
    /// Creates a new non-absorbing [`CauchyDispersion`].
    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self {
            a,
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
impl DispersionModel for CauchyDispersion {
    fn complex_index(&self, wavelength: f64) -> Complex64 {
        let lambda = Length::new::<nanometer>(wavelength).get::<micrometer>();
        let l_sq = lambda * lambda;
        let n = self.a + self.b / l_sq + self.c / (l_sq * l_sq);
        let k = urbach_extinction(self.ak, self.exponent, self.edge, wavelength);
        Complex64::new(n, -k)
    }
    fn to_enum(&self) -> Dispersion {
        Dispersion::Cauchy(*self)
    }
}
