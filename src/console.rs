//! Handling the OpenFilters CLI
//!
//! This module handles the command line parsing as well as basic information (e.g. help dialog, version information, etc.).
use crate::{
    error::{FilmError, FilmResult},
    get_version,
};
use std::io::{BufReader, BufWriter};

use clap::{builder::Str, Parser};
use rprompt::prompt_reply_from_bufread;
use std::{io::Write, string::String};
use std::{
    io::{stdin, stdout, BufRead},
    path::{Path, PathBuf},
};

/// Command line arguments for the OpenFilters application.
pub struct Args {
    /// file path of the project, which should be read in
    pub file_path: PathBuf,

    /// destination directory of the report. if not defined, same directory as the project file is used
    pub report_directory: PathBuf,
}

#[derive(Parser)]
#[command(author, version = Str::from(get_version()), about, long_about = None)]
pub struct PartialArgs {
    /// filepath of the project to read in
    #[arg(short, long)]
    file_path: Option<String>,

    /// destination directory of the report. if not defined, same directory as the project file is used
    #[arg(short, long)]
    report_directory: Option<String>,
}

/// Checks if the passed file path is valid.
/// # Attributes
/// * `path`: Path to the file
/// # Returns
/// Returns True if the file path points to an existing `.yaml` or `.yml` file, false otherwise
fn file_path_is_valid(path: &Path) -> bool {
    Path::exists(path)
        && Path::is_file(path)
        && path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn eval_file_path_input(file_path: &str) -> Option<PathBuf> {
    if file_path_is_valid(Path::new(file_path)) {
        Some(PathBuf::from(file_path))
    } else {
        None
    }
}

/// Evaluates if the passed report-directory string is valid.
/// # Attributes
/// * `report_path`: String description of the directory to the report
/// # Returns
/// * [`Option<PathBuf>`] with the defined directory string if valid or an empty path which will be replaced by the directory of the file path later on.
/// * None if the directory does not exist
fn eval_report_directory_input(report_path: &str) -> Option<PathBuf> {
    let r_path = Path::new(&report_path);
    if Path::is_dir(r_path) {
        Some(PathBuf::from(report_path))
    } else if report_path.is_empty() {
        Some(PathBuf::from(""))
    } else {
        None
    }
}

/// Creates the prompt string that is displayed in the console, depending on the flag and if the passed input for the respective flag is valid
/// # Attributes
/// * `flag`:       Respective argument flag. "f" for file path of the project and "r" for the report directory.
/// * `init_str`:   Prepended String. Used if some messages schould be displayed beforehand.
/// # Errors
/// Errors if an invalid flag type has been used
fn create_prompt_str(flag: &str, init_str: &str) -> FilmResult<String> {
    let prompt_str = init_str.to_owned();
    match flag {
        "f" => Ok(prompt_str + "Please insert path to the project file (.yaml):\n"),
        "r" => Ok(prompt_str
            + "Please insert a report directory or nothing to select the same directory as the project file\n"),
        _ => Err(FilmError::Console(
            "Invalid flag type! Cannot create prompt string!".into(),
        )),
    }
}

/// Extracts the arguments from the [`PartialArgs`] struct
/// # Attributes
/// * `func`:       Function to evaluate the input string of the given argument.
/// * `input`:      String-Option of the argument
/// * `arg_flag`:   Respective argument flag. "f" for file path of the project and "r" for the report directory.
/// * `reader`:     Type that implements the `BufRead` trait to read from. May be stdin().lock() for user input or a `BufReader` from a static String for tests
/// * `writer`:     Type  that implements the Write trait to write into.
/// # Errors
/// Returns an [`FilmError::Console`] if the prompt cannot be read (e.g. end of input).
fn get_args<T>(
    func: fn(&str) -> Option<T>,
    input: Option<&str>,
    arg_flag: &str,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
) -> FilmResult<T> {
    let prompt_str = match input {
        Some(i) => match func(i) {
            Some(arg) => return Ok(arg),
            None => create_prompt_str(arg_flag, "Invalid input!\n")?,
        },
        None => create_prompt_str(arg_flag, "")?,
    };
    let input: String = prompt_reply_from_bufread(reader, writer, prompt_str)
        .map_err(|e| FilmError::Console(format!("reading input failed: {e}")))?;
    get_args(func, Some(input.as_str()), arg_flag, reader, writer)
}

/// Gets the parent directory of the passed file path
/// # Arguments
/// * `path`: Path to a file.
///
/// # Errors
/// Returns an [`FilmError::Console`] if no parent directory can be determined.
fn get_parent_dir(path: &Path) -> FilmResult<PathBuf> {
    Path::parent(path)
        .map(PathBuf::from)
        .ok_or_else(|| FilmError::Console(format!("{} has no parent directory", path.display())))
}

impl Args {
    fn from_partial(
        part_args: PartialArgs,
        reader: &mut impl BufRead,
        writer: &mut impl Write,
    ) -> FilmResult<Self> {
        let file_path = get_args(
            eval_file_path_input,
            part_args.file_path.as_deref(),
            "f",
            reader,
            writer,
        )?;
        let report_directory = get_args(
            eval_report_directory_input,
            part_args.report_directory.as_deref(),
            "r",
            reader,
            writer,
        )?;
        let report_directory = if report_directory.as_os_str().is_empty() {
            get_parent_dir(&file_path)?
        } else {
            report_directory
        };
        Ok(Self {
            file_path,
            report_directory,
        })
    }
}

impl TryFrom<PartialArgs> for Args {
    type Error = FilmError;

    fn try_from(part_args: PartialArgs) -> FilmResult<Self> {
        let mut reader = BufReader::new(stdin().lock());
        let mut writer = BufWriter::new(stdout().lock());
        //intro only shown when neither the help, nor the version flag is specified
        show_intro();
        let args = Self::from_partial(part_args, &mut reader, &mut writer)?;
        drop(reader);
        println!("Path to project file: {}", args.file_path.display());
        println!("Report directory: {}", args.report_directory.display());
        Ok(args)
    }
}

fn create_intro() -> String {
    format!(
        "{: ^79}\n{: ^79}\n",
        "OpenFilters", "design, analysis and synthesis of optical thin film filters"
    )
}

/// Show the program name and the CLI version information.
pub fn show_intro() {
    let intro = create_intro();
    let version_str = format!("{: ^79}\n", "version ".to_owned() + &get_version());
    println!("{intro}{version_str}");
}
