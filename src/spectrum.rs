#![warn(missing_docs)]
//! Module for handling spectral curves (computed results and target spectra).
use crate::error::{FilmError, FilmResult};
use crate::wavelengths::WavelengthSet;
use csv::{ReaderBuilder, WriterBuilder};
use kahan::KahanSummator;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::path::Path;
use uom::fmt::DisplayStyle::Abbreviation;
use uom::si::{f64::Length, length::nanometer};

/// Structure for handling spectral data.
///
/// A [`Spectrum`] holds values over a (not necessarily equidistant) list of wavelengths in
/// ascending order.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Spectrum {
    data: Vec<(f64, f64)>, // (wavelength in nm, value)
}
impl Spectrum {
    /// Create a new [`Spectrum`] from values sampled on a [`WavelengthSet`].
    ///
    /// # Errors
    ///
    /// This function will return an [`FilmError::Spectrum`] if the number of values does not match
    /// the number of wavelengths.
    pub fn new(wavelengths: &WavelengthSet, values: Vec<f64>) -> FilmResult<Self> {
        if wavelengths.len() != values.len() {
            return Err(FilmError::Spectrum(format!(
                "{} values given for {} wavelengths",
                values.len(),
                wavelengths.len()
            )));
        }
        Ok(Self {
            data: wavelengths.iter().copied().zip(values).collect(),
        })
    }
    /// Create a new [`Spectrum`] from `(wavelength, value)` pairs (wavelengths in nm).
    ///
    /// # Errors
    ///
    /// This function will return an [`FilmError::Spectrum`] if
    ///   - no pair is given
    ///   - the wavelengths are not strictly ascending and positive
    pub fn from_pairs(data: Vec<(f64, f64)>) -> FilmResult<Self> {
        if data.is_empty() {
            return Err(FilmError::Spectrum("spectrum must not be empty".into()));
        }
        if data[0].0 <= 0.0 || data.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(FilmError::Spectrum(
                "spectrum wavelengths must be positive and strictly ascending".into(),
            ));
        }
        Ok(Self { data })
    }
    /// Create a new [`Spectrum`] from a CSV (comma-separated values) file.
    ///
    /// The file must use `;` as separator. The first column holds the wavelength in nm, the second
    /// one the value. A third column (tolerances) is ignored here, see
    /// [`Spectrum::from_csv_with_tolerances`].
    ///
    /// # Errors
    ///
    /// This function will return an [`FilmError::Spectrum`] if
    ///   - the file path is not found or could not be read.
    ///   - the file is empty.
    ///   - the file could not be parsed.
    pub fn from_csv(path: &Path) -> FilmResult<Self> {
        Self::from_csv_with_tolerances(path).map(|(spectrum, _)| spectrum)
    }
    /// Create a new [`Spectrum`] from a CSV file `λ;value[;tolerance]`.
    ///
    /// The tolerances are returned if every line has a third column.
    ///
    /// # Errors
    ///
    /// Same as [`Spectrum::from_csv`], and additionally if only some lines carry a tolerance.
    pub fn from_csv_with_tolerances(path: &Path) -> FilmResult<(Self, Option<Vec<f64>>)> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b';')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| FilmError::Spectrum(e.to_string()))?;
        let mut data: Vec<(f64, f64)> = Vec::new();
        let mut tolerances: Vec<f64> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| FilmError::Spectrum(e.to_string()))?;
            let column = |i: usize| -> FilmResult<Option<f64>> {
                record
                    .get(i)
                    .map(|field| {
                        field
                            .parse::<f64>()
                            .map_err(|e| FilmError::Spectrum(format!("{field}: {e}")))
                    })
                    .transpose()
            };
            let (Some(wavelength), Some(value)) = (column(0)?, column(1)?) else {
                return Err(FilmError::Spectrum(
                    "every line needs a wavelength and a value".into(),
                ));
            };
            data.push((wavelength, value));
            if let Some(tolerance) = column(2)? {
                tolerances.push(tolerance);
            }
        }
        if data.is_empty() {
            return Err(FilmError::Spectrum("no csv data was found in file".into()));
        }
        let tolerances = match tolerances.len() {
            0 => None,
            n if n == data.len() => Some(tolerances),
            _ => {
                return Err(FilmError::Spectrum(
                    "tolerances must be given for all or none of the lines".into(),
                ))
            }
        };
        Ok((Self::from_pairs(data)?, tolerances))
    }
    /// Write the [`Spectrum`] to a CSV file (`;` separated, wavelength in nm).
    ///
    /// # Errors
    ///
    /// This function will return an error if the file cannot be written.
    pub fn to_csv(&self, path: &Path) -> FilmResult<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .map_err(|e| FilmError::Spectrum(e.to_string()))?;
        for (wavelength, value) in &self.data {
            writer
                .write_record(&[wavelength.to_string(), value.to_string()])
                .map_err(|e| FilmError::Spectrum(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| FilmError::Spectrum(e.to_string()))
    }
    /// Get a vector of all wavelengths (nm).
    #[must_use]
    pub fn wavelengths(&self) -> Vec<f64> {
        self.data.iter().map(|data| data.0).collect()
    }
    /// Get a vector of all values.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().map(|data| data.1).collect()
    }
    /// The wavelengths of this [`Spectrum`] as [`WavelengthSet`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the spectrum is empty.
    pub fn wavelength_set(&self) -> FilmResult<WavelengthSet> {
        WavelengthSet::new(self.wavelengths())
    }
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    /// Returns `true` if the spectrum has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Returns the iterator of this [`Spectrum`].
    pub fn iter(&self) -> std::slice::Iter<'_, (f64, f64)> {
        self.data.iter()
    }
    /// Return the value at a given wavelength.
    ///
    /// The value is linearly interpolated between the neighbouring samples. If the wavelength is
    /// outside the spectrum range `None` is returned.
    #[must_use]
    pub fn get_value(&self, wavelength: Length) -> Option<f64> {
        self.interpolate(wavelength.get::<nanometer>())
    }
    /// Same as [`Spectrum::get_value`] with a wavelength in nm.
    #[must_use]
    pub fn interpolate(&self, wavelength: f64) -> Option<f64> {
        let first = self.data.first()?;
        let last = self.data.last()?;
        if wavelength < first.0 || wavelength > last.0 {
            return None;
        }
        let idx = self.data.partition_point(|d| d.0 < wavelength);
        if idx == 0 {
            return Some(first.1);
        }
        let (left, right) = (self.data[idx - 1], self.data[idx]);
        let ratio = (wavelength - left.0) / (right.0 - left.0);
        Some(left.1.mul_add(1.0 - ratio, right.1 * ratio))
    }
    /// Resample this [`Spectrum`] on another set of wavelengths by linear interpolation.
    ///
    /// # Errors
    ///
    /// This function will return an error if a wavelength lies outside the spectrum range.
    pub fn resample(&self, wavelengths: &WavelengthSet) -> FilmResult<Self> {
        let values = wavelengths
            .iter()
            .map(|w| {
                self.interpolate(*w).ok_or_else(|| {
                    FilmError::Spectrum(format!("wavelength {w} nm outside the spectrum range"))
                })
            })
            .collect::<FilmResult<Vec<f64>>>()?;
        Self::new(wavelengths, values)
    }
    /// Average value over the samples (compensated summation).
    #[must_use]
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: kahan::KahanSum<f64> = self.data.iter().map(|d| d.1).kahan_sum();
        sum.sum() / crate::utils::usize_to_f64(self.data.len())
    }
    /// Modify the values by a given function or closure.
    pub fn map_values<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for data in &mut self.data {
            data.1 = f(data.1);
        }
    }
}

impl<'a> IntoIterator for &'a Spectrum {
    type IntoIter = std::slice::Iter<'a, (f64, f64)>;
    type Item = &'a (f64, f64);
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
impl Display for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_length = Length::format_args(nanometer, Abbreviation);
        for value in &self.data {
            writeln!(
                f,
                "{:7.2} -> {}",
                fmt_length.with(Length::new::<nanometer>(value.0)),
                value.1
            )?;
        }
        write!(f, "\nAverage: {}", self.average())
    }
}
impl Debug for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_length = Length::format_args(nanometer, Abbreviation);
        for value in &self.data {
            writeln!(
                f,
                "{:7.2} -> {}",
                fmt_length.with(Length::new::<nanometer>(value.0)),
                value.1
            )?;
        }
        Ok(())
    }
}
