use clap::Parser;
use openfilters::{
    console::{Args, PartialArgs},
    error::{FilmError, FilmResult},
    report::write_result,
    utils::StopToken,
    FilmDocument,
};
use std::io::{self, Write};
use std::path::Path;

fn read_and_parse_document(path: &Path) -> FilmResult<FilmDocument> {
    print!("\nReading project...");
    let _ = io::stdout().flush();
    let document = FilmDocument::from_file(path)?;
    println!("Success");
    Ok(document)
}

fn main() -> FilmResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    //parse CLI arguments
    let args = Args::try_from(PartialArgs::parse())?;

    let mut document = read_and_parse_document(&args.file_path)?;
    let stem = args
        .file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FilmError::Console("invalid project file name".into()))?
        .to_owned();

    let results = document.run_tasks(&StopToken::new())?;
    for (i, (task, result)) in results.iter().enumerate() {
        for path in write_result(&args.report_directory, &stem, i, task, result)? {
            println!("Written {}", path.display());
        }
    }
    if document.tasks().iter().any(|task| task.is_optimization()) {
        let mut optimized = args.report_directory.clone();
        optimized.push(format!("{stem}_optimized.yaml"));
        document.save_to_file(&optimized)?;
        println!("Optimized filter written to {}", optimized.display());
    }
    Ok(())
}
