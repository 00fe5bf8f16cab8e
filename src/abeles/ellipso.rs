//! Ellipsometric angles Psi and Delta.
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::{Face, Mode};
use crate::utils::math_utils::wrap_degrees;

/// Ellipsometer configuration. It determines the range Delta can be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, EnumIter, Display)]
pub enum EllipsometerType {
    /// rotating analyzer: only `cos Δ` is measured, Delta lies in `[0°, 180°]`
    #[default]
    Rae,
    /// rotating polarizer: same range as [`EllipsometerType::Rae`]
    Rpe,
    /// rotating compensator: the full 360° range is measured
    Rce,
}

/// Bring Delta (degrees) into the range of the given ellipsometer.
///
/// Delta is first shifted into `[delta_min, delta_min + 360)`. Rotating analyzer and rotating
/// polarizer instruments cannot distinguish `Δ` from `-Δ`, their values are reflected into
/// `[0°, 180°]`.
#[must_use]
pub fn normalize_delta(delta: f64, ellipsometer: EllipsometerType, delta_min: f64) -> f64 {
    match ellipsometer {
        EllipsometerType::Rce => wrap_degrees(delta, delta_min),
        EllipsometerType::Rae | EllipsometerType::Rpe => {
            let wrapped = wrap_degrees(delta, 0.0);
            if wrapped > 180.0 {
                360.0 - wrapped
            } else {
                wrapped
            }
        }
    }
}

/// Psi and Delta (degrees, Delta not normalized) of a single face: `tanΨ·e^{iΔ} = r_p / r_s`.
#[must_use]
pub fn psi_delta(face: &Face) -> (Vec<f64>, Vec<f64>) {
    face.forward
        .get(Mode::P)
        .r
        .iter()
        .zip(&face.forward.get(Mode::S).r)
        .map(|(r_p, r_s)| {
            let rho = r_p / r_s;
            (rho.norm().atan().to_degrees(), rho.arg().to_degrees())
        })
        .unzip()
}

/// Psi and Delta (degrees, Delta not normalized) of a substrate with two faces.
///
/// Light enters through face `a`, `reflectance_s` and `reflectance_p` are the total (incoherent)
/// reflectances of the substrate. Psi follows from the ratio of the reflectances, Delta from the
/// phase of the s/p cross term summed over all incoherent bounces (Yang et al., 1995).
#[must_use]
pub fn psi_delta_with_backside(
    a: &Face,
    b: &Face,
    reflectance_s: &[f64],
    reflectance_p: &[f64],
    tau: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let (fs, fp) = (a.forward.get(Mode::S), a.forward.get(Mode::P));
    let (rs, rp) = (a.reverse.get(Mode::S), a.reverse.get(Mode::P));
    let (bs, bp) = (b.reverse.get(Mode::S), b.reverse.get(Mode::P));
    (0..tau.len())
        .map(|i| {
            let tau2 = tau[i] * tau[i];
            let cross_p = fp.t[i] * rp.t[i] * bp.r[i];
            let cross_s = fs.t[i] * rs.t[i] * bs.r[i];
            let bounce = (rp.r[i] * bp.r[i]) * (rs.r[i] * bs.r[i]).conj() * tau2;
            let x: Complex64 = fp.r[i] * fs.r[i].conj()
                + cross_p * cross_s.conj() * tau2 / (1.0 - bounce);
            let psi = (reflectance_p[i] / reflectance_s[i]).sqrt().atan().to_degrees();
            (psi, x.arg().to_degrees())
        })
        .unzip()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        abeles::{Admittance, CharacteristicMatrix, Sin2},
        degree,
        index::Index,
    };
    use approx::assert_abs_diff_eq;
    #[test]
    fn normalize() {
        assert_abs_diff_eq!(normalize_delta(-90.0, EllipsometerType::Rce, 0.0), 270.0);
        assert_abs_diff_eq!(normalize_delta(270.0, EllipsometerType::Rce, -180.0), -90.0);
        assert_abs_diff_eq!(normalize_delta(-90.0, EllipsometerType::Rae, 0.0), 90.0);
        assert_abs_diff_eq!(normalize_delta(200.0, EllipsometerType::Rpe, 0.0), 160.0);
        assert_abs_diff_eq!(normalize_delta(100.0, EllipsometerType::Rae, -360.0), 100.0);
    }
    #[test]
    fn bare_substrate() {
        let air = Index::constant(1.0, 1);
        let glass = Index::constant(1.5, 1);
        let brewster = 1.5_f64.atan().to_degrees();
        for (angle, expected_delta) in [(brewster - 10.0, 0.0), (brewster + 10.0, 180.0)] {
            let sin2 = Sin2::new(&air, degree!(angle));
            let face = Face::new(
                &CharacteristicMatrix::new(1),
                &Admittance::new(&air, &sin2),
                &Admittance::new(&glass, &sin2),
            );
            let (psi, delta) = psi_delta(&face);
            let delta = normalize_delta(delta[0], EllipsometerType::Rae, 0.0);
            assert!(psi[0] > 0.0 && psi[0] < 45.0);
            assert_abs_diff_eq!(delta, expected_delta, epsilon = 1e-9);
        }
    }
    #[test]
    fn opaque_backside_matches_single_face() {
        let air = Index::constant(1.0, 1);
        let glass = Index::constant(1.5, 1);
        let sin2 = Sin2::new(&air, degree!(65.0));
        let (medium, substrate) = (Admittance::new(&air, &sin2), Admittance::new(&glass, &sin2));
        let mut m = CharacteristicMatrix::new(1);
        m.set_matrices(
            &Index::constant(2.0, 1),
            80.0,
            &sin2,
            &crate::wavelengths::WavelengthSet::new(vec![600.0]).unwrap(),
        );
        let face = Face::new(&m, &medium, &substrate);
        let back = Face::new(&CharacteristicMatrix::new(1), &medium, &substrate);
        let (psi, delta) = psi_delta(&face);
        let r_s = face.forward.get(Mode::S).r[0].norm_sqr();
        let r_p = face.forward.get(Mode::P).r[0].norm_sqr();
        let (psi_b, delta_b) = psi_delta_with_backside(&face, &back, &[r_s], &[r_p], &[0.0]);
        assert_abs_diff_eq!(psi[0], psi_b[0], epsilon = 1e-10);
        assert_abs_diff_eq!(delta[0], delta_b[0], epsilon = 1e-10);
    }
}
