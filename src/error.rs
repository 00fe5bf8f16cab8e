#![warn(missing_docs)]
//! OpenFilters specific error structures
use std::{error::Error, fmt::Display};

/// Application specific Result type
pub type FilmResult<T> = std::result::Result<T, FilmError>;

/// Errors that can be returned by various functions of this crate.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum FilmError {
    /// invalid filter settings or layer configuration. Mutations raising this error are rolled back.
    Configuration(String),
    /// errors while evaluating or validating a material (e.g. non-monotonic mixtures)
    Material(String),
    /// mostly runtime errors occuring during the analysis of a filter
    Analysis(String),
    /// errors raised by the refinement or synthesis methods
    Optimization(String),
    /// errors while handling spectra or wavelength sets
    Spectrum(String),
    /// errors while reading, parsing or writing documents
    Document(String),
    /// errors console io
    Console(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for FilmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(m) => {
                write!(f, "Configuration:{m}")
            }
            Self::Material(m) => {
                write!(f, "Material:{m}")
            }
            Self::Analysis(m) => {
                write!(f, "Analysis:{m}")
            }
            Self::Optimization(m) => {
                write!(f, "Optimization:{m}")
            }
            Self::Spectrum(m) => {
                write!(f, "Spectrum:{m}")
            }
            Self::Document(m) => {
                write!(f, "Document:{m}")
            }
            Self::Console(m) => {
                write!(f, "Console:{m}")
            }
            Self::Other(m) => write!(f, "OpenFilters Error:Other:{m}"),
        }
    }
}
impl Error for FilmError {}

impl std::convert::From<String> for FilmError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
