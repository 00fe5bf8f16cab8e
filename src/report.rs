//! Export of task results as CSV files and SVG plots.
use std::{
    fs::File,
    path::{Path, PathBuf},
};

use csv::{Writer, WriterBuilder};
use log::{info, warn};
use plotters::{
    chart::{ChartBuilder, SeriesLabelPosition},
    prelude::{IntoDrawingArea, PathElement, SVGBackend},
    series::LineSeries,
    style::{Color, Palette, Palette99, BLACK, WHITE},
};

use crate::{
    error::{FilmError, FilmResult},
    spectrum::Spectrum,
    tasks::{Task, TaskResult},
    utils::{
        filter_data::{axis_limits, get_min_max_filter_nonfinite},
        usize_to_f64,
    },
};

fn csv_writer(path: &Path) -> FilmResult<Writer<File>> {
    WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| FilmError::Other(format!("cannot create {}: {e}", path.display())))
}

fn write_rows(path: &Path, header: &[String], rows: &[Vec<f64>]) -> FilmResult<()> {
    let mut writer = csv_writer(path)?;
    let err = |e: csv::Error| FilmError::Other(format!("writing {} failed: {e}", path.display()));
    writer.write_record(header).map_err(err)?;
    for row in rows {
        writer
            .write_record(row.iter().map(ToString::to_string))
            .map_err(err)?;
    }
    writer
        .flush()
        .map_err(|e| FilmError::Other(format!("writing {} failed: {e}", path.display())))
}

fn file_name(directory: &Path, stem: &str, index: usize, task: &Task, extension: &str) -> PathBuf {
    let mut path = directory.to_path_buf();
    path.push(format!(
        "{stem}_{}_{}",
        index + 1,
        task.to_string().replace(' ', "_")
    ));
    path.set_extension(extension);
    path
}

/// Write the result of the `index`th task to `directory`.
///
/// Every result is written as `;` separated CSV file named after the project file stem, the
/// number and the type of the task. Spectra are additionally plotted into an SVG file of the same
/// name. A failing plot is only reported as warning.
///
/// # Errors
///
/// This function will return an error if the CSV file cannot be written.
pub fn write_result(
    directory: &Path,
    stem: &str,
    index: usize,
    task: &Task,
    result: &TaskResult,
) -> FilmResult<Vec<PathBuf>> {
    let csv_path = file_name(directory, stem, index, task, "csv");
    let mut written = vec![csv_path.clone()];
    match result {
        TaskResult::Spectra(spectra) => {
            let mut header = vec!["wavelength (nm)".to_string()];
            header.extend(spectra.iter().map(|(name, _)| name.clone()));
            let wavelengths = spectra
                .first()
                .map(|(_, spectrum)| spectrum.wavelengths())
                .unwrap_or_default();
            let columns: Vec<Vec<f64>> = spectra.iter().map(|(_, s)| s.values()).collect();
            let rows: Vec<Vec<f64>> = wavelengths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let mut row = vec![*w];
                    row.extend(columns.iter().map(|c| c[i]));
                    row
                })
                .collect();
            write_rows(&csv_path, &header, &rows)?;
            let svg_path = file_name(directory, stem, index, task, "svg");
            match plot_spectra(&svg_path, spectra) {
                Ok(()) => written.push(svg_path),
                Err(e) => warn!("{e}"),
            }
        }
        TaskResult::Color(xyz) => {
            write_rows(
                &csv_path,
                &["X".to_string(), "Y".to_string(), "Z".to_string()],
                &[xyz.to_vec()],
            )?;
        }
        TaskResult::Monitoring {
            wavelengths,
            curves,
        } => {
            let mut header = vec!["layer".to_string(), "thickness (nm)".to_string()];
            header.extend(wavelengths.iter().map(ToString::to_string));
            let rows: Vec<Vec<f64>> = curves
                .iter()
                .flat_map(|curve| {
                    curve
                        .thicknesses
                        .iter()
                        .zip(&curve.values)
                        .map(move |(thickness, values)| {
                            let mut row = vec![usize_to_f64(curve.layer), *thickness];
                            row.extend_from_slice(values);
                            row
                        })
                })
                .collect();
            write_rows(&csv_path, &header, &rows)?;
        }
        TaskResult::Field(field) => {
            let rows: Vec<Vec<f64>> = field
                .positions
                .iter()
                .zip(&field.intensity)
                .map(|(p, i)| vec![*p, *i])
                .collect();
            write_rows(
                &csv_path,
                &["position (nm)".to_string(), "|E|²".to_string()],
                &rows,
            )?;
        }
        TaskResult::Optimization(summary) => {
            let mut writer = csv_writer(&csv_path)?;
            let err = |e: csv::Error| FilmError::Other(format!("writing summary failed: {e}"));
            for record in [
                ["end".to_string(), summary.end.clone()],
                ["initial chi²".into(), summary.initial_chi_2.to_string()],
                ["chi²".into(), summary.chi_2.to_string()],
                ["front layers".into(), summary.nb_layers.to_string()],
            ] {
                writer.write_record(&record).map_err(err)?;
            }
            writer
                .flush()
                .map_err(|e| FilmError::Other(format!("writing summary failed: {e}")))?;
        }
    }
    info!("{task} written to {}", csv_path.display());
    Ok(written)
}

/// Plot spectra into an SVG file.
///
/// # Errors
///
/// This function will return an error if
///   - no spectrum is given
///   - the plot cannot be drawn or written
pub fn plot_spectra(path: &Path, spectra: &[(String, Spectrum)]) -> FilmResult<()> {
    let plot_err = |e: String| FilmError::Other(format!("creation of plot failed: {e}"));
    let wavelengths: Vec<f64> = spectra.iter().flat_map(|(_, s)| s.wavelengths()).collect();
    let (x_min, x_max) = get_min_max_filter_nonfinite(&wavelengths)
        .ok_or_else(|| plot_err("no spectrum given".into()))?;
    let values: Vec<f64> = spectra.iter().flat_map(|(_, s)| s.values()).collect();
    let (y_min, y_max) = axis_limits(&values, 0.05).unwrap_or((0.0, 1.0));
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_err(e.to_string()))?;
    let mut chart = ChartBuilder::on(&root)
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| plot_err(e.to_string()))?;
    chart
        .configure_mesh()
        .x_desc("wavelength (nm)")
        .draw()
        .map_err(|e| plot_err(e.to_string()))?;
    for (i, (name, spectrum)) in spectra.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                spectrum.wavelengths().into_iter().zip(spectrum.values()),
                color,
            ))
            .map_err(|e| plot_err(e.to_string()))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| plot_err(e.to_string()))?;
    root.present().map_err(|e| plot_err(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::monitoring::LayerMonitoring,
        tasks::{AnalysisTask, MonitoringTask, OptimizationSummary},
        wavelengths::WavelengthSet,
        optimization::RefinementConfig,
    };
    use tempfile::tempdir;

    fn read(path: &Path) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_path(path)
            .unwrap()
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }
    #[test]
    fn spectra() {
        let dir = tempdir().unwrap();
        let wavelengths = WavelengthSet::new(vec![500.0, 600.0]).unwrap();
        let result = TaskResult::Spectra(vec![
            ("Psi".into(), Spectrum::new(&wavelengths, vec![10.0, 20.0]).unwrap()),
            ("Delta".into(), Spectrum::new(&wavelengths, vec![30.0, 40.0]).unwrap()),
        ]);
        let task = Task::Analysis(AnalysisTask::default());
        let written = write_result(dir.path(), "design", 0, &task, &result).unwrap();
        assert_eq!(written[0], dir.path().join("design_1_analysis.csv"));
        let records = read(&written[0]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], vec!["wavelength (nm)", "Psi", "Delta"]);
        assert_eq!(records[2], vec!["600", "20", "40"]);
    }
    #[test]
    fn monitoring() {
        let dir = tempdir().unwrap();
        let result = TaskResult::Monitoring {
            wavelengths: vec![550.0],
            curves: vec![LayerMonitoring {
                layer: 0,
                thicknesses: vec![0.0, 1.0],
                values: vec![vec![0.9], vec![0.8]],
            }],
        };
        let task = Task::Monitoring(MonitoringTask::default());
        let written = write_result(dir.path(), "design", 1, &task, &result).unwrap();
        assert_eq!(written.len(), 1);
        let records = read(&written[0]);
        assert_eq!(records[0], vec!["layer", "thickness (nm)", "550"]);
        assert_eq!(records[2], vec!["0", "1", "0.8"]);
    }
    #[test]
    fn optimization() {
        let dir = tempdir().unwrap();
        let result = TaskResult::Optimization(OptimizationSummary {
            end: "Converged".into(),
            initial_chi_2: 2.0,
            chi_2: 0.5,
            nb_layers: 3,
        });
        let task = Task::Refinement(RefinementConfig::default());
        let written = write_result(dir.path(), "design", 2, &task, &result).unwrap();
        assert_eq!(written[0], dir.path().join("design_3_refinement.csv"));
        let records = read(&written[0]);
        assert_eq!(records[0], vec!["end", "Converged"]);
        assert_eq!(records[3], vec!["front layers", "3"]);
    }
    #[test]
    fn plot_without_spectra() {
        let dir = tempdir().unwrap();
        assert!(plot_spectra(&dir.path().join("empty.svg"), &[]).is_err());
    }
}
