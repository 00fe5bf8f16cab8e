use approx::assert_relative_eq;
use openfilters::{
    abeles::{
        r_and_t::{calculate_r_and_t, calculate_r_and_t_reverse},
        spectro::transmittance,
        Admittance, CharacteristicMatrix, Mode, PrePostMatrices, Sin2,
    },
    degree,
    index::Index,
    wavelengths::WavelengthSet,
};
use strum::IntoEnumIterator;

fn wavelengths() -> WavelengthSet {
    WavelengthSet::from_range_nm(400.0, 800.0, 50.0).unwrap()
}

/// Matrices of a H L H stack on top of each other, at 30° in air.
fn stack(wavelengths: &WavelengthSet) -> (Vec<CharacteristicMatrix>, Sin2) {
    let len = wavelengths.len();
    let sin2 = Sin2::new(&Index::constant(1.0, len), degree!(30.0));
    let layers = [(2.35, 58.5), (1.46, 94.2), (2.35, 120.0)]
        .iter()
        .map(|(n, d)| {
            let mut m = CharacteristicMatrix::new(len);
            m.set_matrices(&Index::constant(*n, len), *d, &sin2, wavelengths);
            m
        })
        .collect();
    (layers, sin2)
}

#[test]
fn unity_is_neutral() {
    let wavelengths = wavelengths();
    let (layers, _) = stack(&wavelengths);
    let unity = CharacteristicMatrix::new(wavelengths.len());
    let mut product = layers[0].clone();
    product.multiply(&unity);
    assert_eq!(product, layers[0]);
    product.pre_multiply(&unity);
    assert_eq!(product, layers[0]);
    let mut m = layers[1].clone();
    m.set_unity();
    m.multiply(&layers[2]);
    assert_eq!(m, layers[2]);
}

#[test]
fn zero_thickness_is_unity() {
    let wavelengths = wavelengths();
    let len = wavelengths.len();
    let sin2 = Sin2::normal(len);
    let mut m = CharacteristicMatrix::new(len);
    m.set_matrices(&Index::constant(2.0, len), 0.0, &sin2, &wavelengths);
    assert_eq!(m, CharacteristicMatrix::new(len));
}

#[test]
fn reverse_transmission_is_reciprocal() {
    let wavelengths = wavelengths();
    let len = wavelengths.len();
    let (layers, sin2) = stack(&wavelengths);
    let global = PrePostMatrices::new(&layers, len).global().clone();
    let medium = Admittance::new(&Index::constant(1.0, len), &sin2);
    let substrate = Admittance::new(&Index::constant(1.52, len), &sin2);
    let forward = calculate_r_and_t(&global, &medium, &substrate);
    let reverse = calculate_r_and_t_reverse(&global, &medium, &substrate);
    for mode in Mode::iter() {
        let t_forward = transmittance(forward.get(mode), medium.get(mode), substrate.get(mode));
        let t_reverse = transmittance(reverse.get(mode), substrate.get(mode), medium.get(mode));
        for (f, r) in t_forward.iter().zip(&t_reverse) {
            assert_relative_eq!(f, r, max_relative = 1e-9);
        }
    }
    // same medium on both sides: equal amplitudes
    let forward = calculate_r_and_t(&global, &medium, &medium);
    let reverse = calculate_r_and_t_reverse(&global, &medium, &medium);
    for mode in Mode::iter() {
        for (f, r) in forward.get(mode).t.iter().zip(&reverse.get(mode).t) {
            assert_relative_eq!(f.norm(), r.norm(), max_relative = 1e-9);
        }
    }
}
