//! One translation-unit analysis job.
//!
//! A `TuExecution` bundles the compilation database with a single TU path.
//! Running it invokes the front-end, feeds the parsed TU through the matcher
//! engine and hands back the three stores; a front-end failure yields an
//! integer error code instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::*;

use crate::analysis::{analyse, TuAnalysis};
use crate::compiledb::CompilationDatabase;
use crate::parser::cpp::{CppFrontEnd, FileMap};

/// Error code reported when the front-end fails on a TU.
const FRONT_END_FAILURE: i32 = 1;

/// A single (compilation database, TU file) job. Runs exactly once.
pub struct TuExecution {
    database: Arc<CompilationDatabase>,
    filepath: PathBuf,
    executed: bool,
}

impl TuExecution {
    pub fn new(database: Arc<CompilationDatabase>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            database,
            filepath: filepath.into(),
            executed: false,
        }
    }

    /// Run the analysis. Calling this twice on the same job is a programming
    /// error.
    pub fn run(&mut self) -> Result<TuAnalysis, i32> {
        assert!(!self.executed, "execute called multiple times on the same job");
        self.executed = true;

        let path_str = self.filepath.to_string_lossy().to_string();
        println!("Running for '{}'...", path_str);

        let Some(command) = self.database.command_for(&self.filepath) else {
            eprintln!(
                "{} no compile command for '{}'",
                "Error:".red(),
                path_str
            );
            return Err(FRONT_END_FAILURE);
        };

        let front_end = CppFrontEnd::from_command(command);
        match front_end.parse(&path_str) {
            Ok(tu) => Ok(analyse(&tu)),
            Err(err) => {
                eprintln!("{} front-end failed on '{}': {}", "Error:".red(), path_str, err);
                Err(FRONT_END_FAILURE)
            }
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// The filename without directories or extension.
    pub fn filename(&self) -> String {
        self.filepath
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// The filename's extension, without the dot.
    pub fn extension(&self) -> String {
        self.filepath
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Run one analysis over in-memory sources: `files` maps paths to contents,
/// `source` names the main file within the map. The workhorse of the
/// integration tests.
pub fn execute_with_files(
    files: &FileMap,
    source: &str,
    arguments: &[String],
) -> Result<TuAnalysis, i32> {
    let front_end = CppFrontEnd::with_virtual_files(arguments, files.clone());
    match front_end.parse(source) {
        Ok(tu) => Ok(analyse(&tu)),
        Err(err) => {
            eprintln!("{} front-end failed on '{}': {}", "Error:".red(), source, err);
            Err(FRONT_END_FAILURE)
        }
    }
}
