use std::path::Path;

use approx::assert_relative_eq;
use assert_matches::assert_matches;
use openfilters::{
    filter::{Filter, Position, Quantity, Side},
    materials::Material,
    optimization::{NeedleConfig, Refinement, RefinementConfig},
    spectrum::Spectrum,
    targets::Target,
    tasks::TaskResult,
    utils::{Progress, StopToken},
    FilmDocument,
};
use tempfile::NamedTempFile;

fn two_layer_filter() -> Filter {
    let air = Material::constant("air", 1.0).unwrap();
    let mut filter = Filter::with_default_substrate_thickness(
        &Material::constant("glass", 1.52).unwrap(),
        &air,
        &air,
    )
    .unwrap();
    filter.set_consider_backside(false);
    filter
        .add_layer(
            Side::Front,
            Position::Top,
            &Material::constant("TiO2", 2.3).unwrap(),
            20.0,
            None,
        )
        .unwrap();
    filter
        .add_layer(
            Side::Front,
            Position::Top,
            &Material::constant("SiO2", 1.46).unwrap(),
            90.0,
            None,
        )
        .unwrap();
    filter
}
fn antireflection_target() -> Target {
    let spectrum = Spectrum::from_pairs(
        [450.0, 500.0, 550.0, 600.0, 650.0]
            .iter()
            .map(|w| (*w, 0.0))
            .collect(),
    )
    .unwrap();
    Target::spectrum(Quantity::Reflection, &spectrum, vec![0.01; 5]).unwrap()
}

#[test]
fn needle_of_the_host_material_does_not_depend_on_depth() {
    let filter = two_layer_filter();
    let mut refinement =
        Refinement::new(&filter, vec![antireflection_target()], RefinementConfig::default())
            .unwrap();
    let host = Material::constant("SiO2", 1.46).unwrap();
    let derivatives = refinement
        .needle_derivatives(1, &host, &[0.0, 22.5, 45.0, 67.5, 90.0])
        .unwrap();
    assert_eq!(derivatives.len(), 5);
    for d in &derivatives[1..] {
        assert_relative_eq!(*d, derivatives[0], max_relative = 1e-6, epsilon = 1e-12);
    }
}

#[test]
fn needles_are_inserted_with_zero_thickness() {
    let filter = two_layer_filter();
    let mut refinement =
        Refinement::new(&filter, vec![antireflection_target()], RefinementConfig::default())
            .unwrap();
    refinement
        .go(&StopToken::new(), &Progress::new())
        .unwrap();
    let before = refinement.filter().layers(Side::Front).len();
    let added = refinement
        .add_needles(&NeedleConfig::default(), &StopToken::new())
        .unwrap()
        .unwrap();
    let layers = refinement.filter().layers(Side::Front);
    assert_eq!(layers.len(), before + 2 * added);
    let needles: Vec<_> = layers
        .iter()
        .filter(|l| l.description() == Some("needle"))
        .collect();
    assert_eq!(needles.len(), added);
    assert!(needles.iter().all(|l| l.thickness().abs() < f64::EPSILON));
    // the caller's filter is untouched until the result is committed
    assert_eq!(filter.layers(Side::Front).len(), 2);
}

#[test]
fn stopped_needle_scan_inserts_nothing() {
    let filter = two_layer_filter();
    let mut refinement =
        Refinement::new(&filter, vec![antireflection_target()], RefinementConfig::default())
            .unwrap();
    let stop = StopToken::new();
    stop.stop();
    assert_eq!(
        refinement.add_needles(&NeedleConfig::default(), &stop).unwrap(),
        None
    );
    assert_eq!(refinement.filter().layers(Side::Front).len(), 2);
}

#[test]
fn antireflection_project() {
    let mut document =
        FilmDocument::from_file(Path::new("./files_for_testing/CLI/antireflection.yaml")).unwrap();
    let targets = document.targets().to_vec();
    let initial = document.filter_mut().merit_function(&targets).unwrap();

    let results = document.run_tasks(&StopToken::new()).unwrap();
    assert_eq!(results.len(), 4);
    let summary = assert_matches!(&results[1].1, TaskResult::Optimization(s) => s.clone());
    assert_relative_eq!(summary.initial_chi_2, initial, max_relative = 1e-9);
    assert!(summary.chi_2 <= summary.initial_chi_2);
    assert_eq!(
        summary.nb_layers,
        document.filter().layers(Side::Front).len()
    );
    let final_chi_2 = document.filter_mut().merit_function(&targets).unwrap();
    assert_relative_eq!(final_chi_2, summary.chi_2, max_relative = 1e-6);

    let (before, after) = match (&results[0].1, &results[2].1) {
        (TaskResult::Spectra(before), TaskResult::Spectra(after)) => (before, after),
        _ => panic!("analysis tasks must return spectra"),
    };
    assert_eq!(before.len(), after.len());
    assert_matches!(&results[3].1, TaskResult::Monitoring { curves, .. } => {
        assert_eq!(curves.len(), summary.nb_layers);
    });

    let file = NamedTempFile::new().unwrap();
    document.save_to_file(file.path()).unwrap();
    let reloaded = FilmDocument::from_file(file.path()).unwrap();
    assert_eq!(reloaded, document);
}
