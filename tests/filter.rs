use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use openfilters::{
    abeles::{Direction, Polarization},
    degree,
    filter::{
        analysis::{Illumination, Quantity},
        Filter, Position, Side,
    },
    materials::{
        CauchyDispersion, ConstantDispersion, Dispersion, Material, MaterialKind, Mixture,
        MixtureKind,
    },
    wavelengths::WavelengthSet,
};

fn constant(name: &str, n: f64) -> Material {
    Material::constant(name, n).unwrap()
}
fn absorbing(name: &str, n: f64, k: f64) -> Material {
    Material::new(
        name,
        MaterialKind::Simple(Dispersion::Constant(ConstantDispersion::new(n, k).unwrap())),
    )
    .unwrap()
}
fn normal() -> Illumination {
    Illumination::default()
}
fn visible() -> WavelengthSet {
    WavelengthSet::from_range_nm(400.0, 700.0, 10.0).unwrap()
}
fn hl_filter(substrate: &Material) -> Filter {
    let air = constant("air", 1.0);
    let mut filter = Filter::with_default_substrate_thickness(substrate, &air, &air).unwrap();
    let high = constant("TiO2", 2.35);
    let low = constant("SiO2", 1.46);
    for (material, thickness) in [(&high, 58.5), (&low, 94.2), (&high, 120.0), (&low, 40.0)] {
        filter
            .add_layer(Side::Front, Position::Top, material, thickness, None)
            .unwrap();
    }
    filter
        .add_layer(Side::Back, Position::Top, &low, 94.2, None)
        .unwrap();
    filter
}

#[test]
fn quarter_wave_layer() {
    let air = constant("air", 1.0);
    let mut filter =
        Filter::with_default_substrate_thickness(&constant("glass", 1.5), &air, &air).unwrap();
    filter.set_consider_backside(false);
    filter
        .add_layer(Side::Front, Position::Top, &constant("H", 2.0), 68.75, None)
        .unwrap();
    let wavelengths = WavelengthSet::new(vec![550.0]).unwrap();
    let r = filter.reflection(&wavelengths, &normal()).unwrap();
    let expected = ((1.0f64 * 1.5 - 4.0) / (1.0 * 1.5 + 4.0)).powi(2);
    assert_abs_diff_eq!(r.values()[0], expected, epsilon = 1e-6);
    let t = filter.transmission(&wavelengths, &normal()).unwrap();
    assert_abs_diff_eq!(t.values()[0], 1.0 - expected, epsilon = 1e-6);
}

#[test]
fn energy_is_conserved_without_absorption() {
    let mut filter = hl_filter(&constant("glass", 1.52));
    let wavelengths = visible();
    for consider_backside in [false, true] {
        filter.set_consider_backside(consider_backside);
        for polarization in [Polarization::S, Polarization::P, Polarization::Unpolarized] {
            for direction in [Direction::Forward, Direction::Backward] {
                let illumination = Illumination::new(degree!(30.0), polarization, direction);
                let r = filter.reflection(&wavelengths, &illumination).unwrap();
                let t = filter.transmission(&wavelengths, &illumination).unwrap();
                for (r, t) in r.values().iter().zip(t.values()) {
                    assert_abs_diff_eq!(r + t, 1.0, epsilon = 1e-9);
                }
            }
        }
    }
}

#[test]
fn opaque_substrate_hides_the_backside() {
    // k = 1e-3 over the default 1 mm substrate
    let mut filter = hl_filter(&absorbing("dark_glass", 1.52, 1e-3));
    let wavelengths = visible();
    filter.set_consider_backside(true);
    let with_backside = filter.reflection(&wavelengths, &normal()).unwrap();
    filter.set_consider_backside(false);
    let without_backside = filter.reflection(&wavelengths, &normal()).unwrap();
    for (a, b) in with_backside.values().iter().zip(without_backside.values()) {
        assert_abs_diff_eq!(*a, b, epsilon = 1e-6);
    }
}

#[test]
fn monitoring_ends_with_the_analysis() {
    let mut filter = hl_filter(&constant("glass", 1.52));
    filter.set_consider_backside(false);
    filter.set_consider_backside_on_monitoring(false);
    let wavelengths = WavelengthSet::new(vec![450.0, 550.0, 650.0]).unwrap();
    let curves = filter
        .monitoring(Quantity::Reflection, Side::Front, &wavelengths, &normal())
        .unwrap();
    assert_eq!(curves.len(), 4);
    let last = curves.last().unwrap();
    assert_abs_diff_eq!(*last.thicknesses.last().unwrap(), 40.0, epsilon = 1e-9);
    let r = filter.reflection(&wavelengths, &normal()).unwrap();
    for (monitored, analysed) in last.values.last().unwrap().iter().zip(r.values()) {
        assert_abs_diff_eq!(monitored, &analysed, epsilon = 1e-9);
    }
    // every layer starts where the previous one ended
    for pair in curves.windows(2) {
        let end = pair[0].values.last().unwrap();
        let start = pair[1].values.first().unwrap();
        for (a, b) in end.iter().zip(start) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }
}

#[test]
fn repeated_analysis_uses_the_cache() {
    let mut filter = hl_filter(&constant("glass", 1.52));
    let wavelengths = visible();
    let first = filter.reflection(&wavelengths, &normal()).unwrap();
    let cached = filter.analysis_cache_len();
    assert!(cached > 0);
    let second = filter.reflection(&wavelengths, &normal()).unwrap();
    assert_eq!(first, second);
    assert_eq!(filter.analysis_cache_len(), cached);
    filter
        .set_layer_thickness(Side::Front, Position::Top, 45.0)
        .unwrap();
    let third = filter.reflection(&wavelengths, &normal()).unwrap();
    assert_ne!(first, third);
}

#[test]
fn failed_center_wavelength_change_is_atomic() {
    // monotonic at 550 nm (1.45, 1.466, 1.50) but not at 1000 nm (1.45, 1.42, 1.50)
    let mixture = Material::new(
        "graded",
        MaterialKind::Mixture(
            Mixture::new(
                vec![0.0, 0.5, 1.0],
                MixtureKind::Cauchy(vec![
                    CauchyDispersion::new(1.45, 0.0, 0.0),
                    CauchyDispersion::new(1.40, 0.02, 0.0),
                    CauchyDispersion::new(1.50, 0.0, 0.0),
                ]),
            )
            .unwrap(),
        ),
    )
    .unwrap();
    let air = constant("air", 1.0);
    let mut filter =
        Filter::with_default_substrate_thickness(&constant("glass", 1.52), &air, &air).unwrap();
    filter
        .add_layer(Side::Front, Position::Top, &mixture, 100.0, Some(1.48))
        .unwrap();
    filter
        .monitoring(Quantity::Transmission, Side::Front, &visible(), &normal())
        .unwrap();
    filter.reflection(&visible(), &normal()).unwrap();
    let before = filter.clone();
    let (analysis, monitoring) = (filter.analysis_cache_len(), filter.monitoring_cache_len());

    assert!(filter.set_center_wavelength(1000.0).is_err());
    assert_eq!(filter, before);
    assert_abs_diff_eq!(filter.settings().center_wavelength(), 550.0);
    assert_eq!(filter.analysis_cache_len(), analysis);
    assert_eq!(filter.monitoring_cache_len(), monitoring);

    filter.set_center_wavelength(600.0).unwrap();
    assert_abs_diff_eq!(filter.settings().center_wavelength(), 600.0);
}

#[test]
fn stack_formula_matches_explicit_stack() {
    let air = constant("air", 1.0);
    let glass = constant("glass", 1.52);
    let mut materials = HashMap::new();
    materials.insert('H', (constant("TiO2", 2.35), None));
    materials.insert('L', (constant("SiO2", 1.46), None));

    let mut compact = Filter::with_default_substrate_thickness(&glass, &air, &air).unwrap();
    compact
        .apply_stack_formula(Side::Front, "2H(LH)^3L", &materials)
        .unwrap();
    let mut expanded = Filter::with_default_substrate_thickness(&glass, &air, &air).unwrap();
    expanded
        .apply_stack_formula(Side::Front, "H H L H L H L H L", &materials)
        .unwrap();
    assert_eq!(compact.layers(Side::Front), expanded.layers(Side::Front));

    let wavelengths = visible();
    let a = compact.reflection(&wavelengths, &normal()).unwrap();
    let b = expanded.reflection(&wavelengths, &normal()).unwrap();
    assert_eq!(a, b);
}
