//! This is the documentation for the **OpenFilters** software package, a library and command line
//! tool for the design, analysis and synthesis of multilayer optical thin film filters.
//!
//! A [`Filter`](filter::Filter) is analysed with the transfer matrix engine in [`abeles`] and can
//! be refined against [`Target`](targets::Target)s or synthesized by needle and step insertion
//! (see [`optimization`]). Projects are stored as [`FilmDocument`] YAML files.
#![allow(clippy::module_name_repetitions)]

pub mod abeles;
pub mod color;
pub mod console;
pub mod document;
pub mod error;
pub mod filter;
pub mod index;
pub mod materials;
pub mod optimization;
pub mod report;
pub mod spectrum;
pub mod targets;
pub mod tasks;
pub mod utils;
pub mod wavelengths;

pub use document::FilmDocument;

/// Return the version information of the currently built OpenFilters executable.
#[must_use]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
