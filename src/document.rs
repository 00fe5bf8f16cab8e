#![warn(missing_docs)]
//! The basic structure of an OpenFilters project.
//!
//! It contains the [`FilmDocument`] structure, which holds the [`Filter`] to be analysed, the
//! optimization [`Target`]s and an ordered list of [`Task`]s.
//!
//! This module also handles reading and writing of `.yaml` project files.
use crate::{
    error::{FilmError, FilmResult},
    filter::Filter,
    targets::Target,
    tasks::{Task, TaskResult},
    utils::{Progress, StopToken},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

/// Version of the project file format written by this crate.
pub const FILE_VERSION: &str = "1.0";

fn file_version() -> String {
    FILE_VERSION.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
/// The main structure of an OpenFilters project.
pub struct FilmDocument {
    #[serde(default = "file_version")]
    file_version: String,
    filter: Filter,
    #[serde(default)]
    targets: Vec<Target>,
    #[serde(default)]
    tasks: Vec<Task>,
}
impl FilmDocument {
    /// Creates a new [`FilmDocument`] for the given filter, without targets or tasks.
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            file_version: file_version(),
            filter,
            targets: Vec::new(),
            tasks: Vec::new(),
        }
    }
    /// Create a new [`FilmDocument`] from a project file at the given path.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the given path is not found or readable.
    ///   - the parsing / deserialization of the file failed.
    pub fn from_file(path: &Path) -> FilmResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FilmError::Document(format!("cannot read file {} : {}", path.display(), e))
        })?;
        Self::from_string(&contents)
    }
    /// Create a new [`FilmDocument`] from the given project file string.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the parsing of the string failed.
    ///   - the filter violates the load time constraints (see [`Filter::after_deserialization_hook`]).
    ///   - a target is invalid.
    pub fn from_string(file_string: &str) -> FilmResult<Self> {
        let mut document: Self = serde_yaml::from_str(file_string)
            .map_err(|e| FilmError::Document(format!("parsing of project failed: {e}")))?;
        if document.file_version != FILE_VERSION {
            warn!(
                "read file version '{}' <-> program file version '{}'",
                document.file_version, FILE_VERSION
            );
            warn!("This file might have been written by an older or newer version of OpenFilters. The import might not be correct.");
        }
        document.filter.after_deserialization_hook()?;
        for target in &document.targets {
            target.validate()?;
        }
        Ok(document)
    }
    /// Save this [`FilmDocument`] to a project file with the given path
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the serialization of the document failed.
    ///   - the file path cannot be created.
    ///   - it cannot write into the file (e.g. no space).
    pub fn save_to_file(&self, path: &Path) -> FilmResult<()> {
        let serialized = self.to_yaml_string()?;
        let mut output = File::create(path).map_err(|e| {
            FilmError::Document(format!(
                "could not create file path: {}: {}",
                path.display(),
                e
            ))
        })?;
        write!(output, "{serialized}").map_err(|e| {
            FilmError::Document(format!(
                "writing to file path {} failed: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
    /// Return the content of the project file from this [`FilmDocument`]
    ///
    /// # Errors
    ///
    /// This function will return an error if the serialization of the internal structures fail.
    pub fn to_yaml_string(&self) -> FilmResult<String> {
        serde_yaml::to_string(&self)
            .map_err(|e| FilmError::Document(format!("serialization of FilmDocument failed: {e}")))
    }
    /// Returns a reference to the filter of this [`FilmDocument`].
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }
    /// Returns a mutable reference to the filter of this [`FilmDocument`].
    pub fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }
    /// Returns the targets of this [`FilmDocument`].
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
    /// Add a target.
    ///
    /// # Errors
    ///
    /// This function will return an error if the target is invalid.
    pub fn add_target(&mut self, target: Target) -> FilmResult<()> {
        target.validate()?;
        self.targets.push(target);
        Ok(())
    }
    /// Returns the tasks of this [`FilmDocument`].
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
    /// Append a task.
    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }
    /// Run all tasks in order on the filter of this document.
    ///
    /// Optimization tasks modify the filter of the document.
    ///
    /// # Errors
    ///
    /// This function will return an error if one of the tasks fails. Tasks following a failed one
    /// are not run.
    pub fn run_tasks(&mut self, stop: &StopToken) -> FilmResult<Vec<(Task, TaskResult)>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            info!("task {}/{}: {task}", i + 1, self.tasks.len());
            let result = task.run(&mut self.filter, &self.targets, stop, &Progress::new())?;
            results.push((task.clone(), result));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        filter::{test_filters, Quantity, Side},
        nanometer,
        tasks::AnalysisTask,
        utils::test_helper::test_helper::check_warnings,
    };
    use assert_matches::assert_matches;
    use tempfile::NamedTempFile;

    fn document() -> FilmDocument {
        let mut document = FilmDocument::new(test_filters::hl_stack(2));
        document
            .add_target(
                Target::discrete(Quantity::Reflection, nanometer!(550.0), 0.9, 0.01).unwrap(),
            )
            .unwrap();
        document.add_task(Task::Analysis(AnalysisTask::default()));
        document
    }
    #[test]
    fn new() {
        let document = FilmDocument::new(test_filters::bare(1.52));
        assert_eq!(document.file_version, FILE_VERSION);
        assert!(document.targets().is_empty());
        assert!(document.tasks().is_empty());
        assert!(document.filter().layers(Side::Front).is_empty());
    }
    #[test]
    fn from_file() {
        assert_matches!(
            FilmDocument::from_file(Path::new("./invalid_file_path/file.yaml")),
            Err(FilmError::Document(_))
        );
    }
    #[test]
    fn from_string_invalid() {
        assert_matches!(
            FilmDocument::from_string("filter: 3"),
            Err(FilmError::Document(_))
        );
    }
    #[test]
    fn save_and_load() {
        let document = document();
        let file = NamedTempFile::new().unwrap();
        document.save_to_file(file.path()).unwrap();
        let loaded = FilmDocument::from_file(file.path()).unwrap();
        assert_eq!(loaded, document);
        assert_eq!(loaded.tasks().len(), 1);
        assert_eq!(loaded.targets().len(), 1);
    }
    #[test]
    fn version_mismatch_warns() {
        testing_logger::setup();
        let mut document = document();
        document.file_version = "0.1".into();
        let yaml = document.to_yaml_string().unwrap();
        let loaded = FilmDocument::from_string(&yaml).unwrap();
        assert_eq!(loaded.file_version, "0.1");
        check_warnings(vec![
            "read file version '0.1' <-> program file version '1.0'",
            "This file might have been written by an older or newer version of OpenFilters. The import might not be correct.",
        ]);
    }
    #[test]
    fn run_tasks() {
        let mut document = document();
        let results = document.run_tasks(&StopToken::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_matches!(results[0].1, TaskResult::Spectra(_));
    }
}
