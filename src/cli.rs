//! Command-line interface and driver loop.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use colored::*;

use crate::analysis::TuAnalysis;
use crate::compiledb::CompilationDatabase;
use crate::report;
use crate::runner::{make_thread_pool, SynchronisedFiles, TuExecution};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ENVIRONMENT: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Analyse the translation units of a compiled codebase and emit rename
/// directives, implements edges and per-file symbol tables for module
/// synthesis.
#[derive(Parser)]
#[command(name = "symscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Build folder containing the compilation database
    pub build_folder: std::path::PathBuf,

    /// Number of analysis worker threads
    #[arg(default_value_t = 1)]
    pub threads: usize,
}

/// Parse command-line arguments, or produce the exit code to terminate
/// with. `-h` prints the usage text but is grouped with the usage errors;
/// only `--version` leaves with success.
pub fn parse_args<I, T>(args: I) -> Result<Cli, i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_USAGE,
            };
            let _ = err.print();
            Err(code)
        }
    }
}

/// Run the analyser over every TU in the build folder's compilation
/// database.
pub fn run(cli: &Cli) -> i32 {
    if !cli.build_folder.is_dir() {
        eprintln!(
            "{} specified build folder '{}' is not a directory",
            "Error:".red(),
            cli.build_folder.display()
        );
        return EXIT_ENVIRONMENT;
    }

    let database = match CompilationDatabase::from_directory(&cli.build_folder) {
        Ok(db) => Arc::new(db),
        Err(err) => {
            eprintln!("{} couldn't read compilation database:", "Error:".red());
            eprintln!("\t{}", err);
            return EXIT_ENVIRONMENT;
        }
    };

    let shared_outputs = Arc::new(SynchronisedFiles::new());
    let threads = cli.threads.max(1);
    println!("Using {} threads...", threads);

    let mut pool = {
        let outputs = shared_outputs.clone();
        make_thread_pool(
            threads,
            move |mut execution: TuExecution| match execution.run() {
                Ok(analysis) => write_tu_outputs(&execution, &analysis, &outputs),
                Err(code) => {
                    eprintln!(
                        "{} non-zero return code {} from the front-end on '{}'",
                        "Error:".red(),
                        code,
                        execution.filepath().display()
                    );
                }
            },
            false,
        )
    };

    for file in database.all_files() {
        pool.enqueue(TuExecution::new(database.clone(), file));
    }
    pool.wait();

    EXIT_SUCCESS
}

/// Write the three report families for one finished TU. Each output that
/// fails to open is logged and skipped; the others still go out.
fn write_tu_outputs(execution: &TuExecution, analysis: &TuAnalysis, outputs: &SynchronisedFiles) {
    let tu_path = execution.filepath().to_string_lossy();

    let badsymbols_path = format!("{}-badsymbols.txt", tu_path);
    match File::create(&badsymbols_path) {
        Ok(file) => {
            let mut out = BufWriter::new(file);
            if let Err(err) = report::write_replacements(&mut out, &analysis.renames) {
                report_write_failure("BAD SYMBOLS", &tu_path, &badsymbols_path, &err);
            }
        }
        Err(err) => report_write_failure("BAD SYMBOLS", &tu_path, &badsymbols_path, &err),
    }

    let implements_path = format!("{}-implements.txt", tu_path);
    match File::create(&implements_path) {
        Ok(file) => {
            let mut out = BufWriter::new(file);
            if let Err(err) = report::write_implements(&mut out, &analysis.implements) {
                report_write_failure("IMPLEMENTS", &tu_path, &implements_path, &err);
            }
        }
        Err(err) => report_write_failure("IMPLEMENTS", &tu_path, &implements_path, &err),
    }

    // The symbol-table outputs are keyed by arbitrary files of the TU, so
    // they may collide between workers and must go through the registry.
    for file in analysis.symbols.known_files() {
        let definitions_path = format!("{}-definitions.txt", file);
        match outputs.open(Path::new(&definitions_path)) {
            Ok(handle) => {
                let result =
                    report::write_symbol_definitions(&mut handle.stream(), &file, &analysis.symbols);
                if let Err(err) = result {
                    report_write_failure("DEFINITION", &tu_path, &definitions_path, &err);
                }
            }
            Err(err) => report_write_failure("DEFINITION", &tu_path, &definitions_path, &err),
        }

        let forwards_path = format!("{}-forwarddeclarations.txt", file);
        match outputs.open(Path::new(&forwards_path)) {
            Ok(handle) => {
                let result = report::write_symbol_forward_declarations(
                    &mut handle.stream(),
                    &file,
                    &analysis.symbols,
                );
                if let Err(err) = result {
                    report_write_failure("FORWARD DECLARATION", &tu_path, &forwards_path, &err);
                }
            }
            Err(err) => report_write_failure("FORWARD DECLARATION", &tu_path, &forwards_path, &err),
        }
    }
}

fn report_write_failure(kind: &str, tu: &str, output: &str, err: &std::io::Error) {
    eprintln!(
        "{} can't write {} output for '{}' to '{}': {}",
        "Error:".red(),
        kind,
        tu,
        output,
        err
    );
}
