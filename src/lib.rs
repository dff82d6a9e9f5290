//! Symscan - translation-unit symbol analysis for module synthesis.
//!
//! Symscan analyses every translation unit of a compiled codebase and emits
//! three machine-readable reports per TU: rename directives for TU-local
//! names that would collide in a merged compilation unit, an implements
//! graph linking the TU to the headers whose symbols it defines, and a
//! per-file symbol table of external definitions and forward declarations.
//! These feed a downstream module-synthesis pipeline that merges legacy TUs
//! into modules.
//!
//! # Architecture
//!
//! - `analysis`: the three per-TU stores and the matcher engine that fills
//!   them
//! - `parser`: the front-end seam - a narrow query trait plus a tree-sitter
//!   backed C/C++ implementation and an in-memory stub
//! - `runner`: per-TU execution, the worker pool and the synchronised
//!   registry for shared output files
//! - `report`: the `##`-delimited line formats
//! - `compiledb`: compilation database loading
//! - `cli`: argument parsing and the driver loop

pub mod analysis;
pub mod cli;
pub mod compiledb;
pub mod parser;
pub mod report;
pub mod runner;

pub use analysis::{
    analyse, ImplementsEdges, RenameDirectives, SourceLocation, SpellingLocation, SymbolRecord,
    SymbolTable, TuAnalysis,
};
pub use compiledb::{CompilationDatabase, CompileCommand};
pub use parser::cpp::{CppFrontEnd, CppTranslationUnit, FileMap};
pub use parser::{DeclCategory, DeclId, Reference, TranslationUnit, TypeUsage};
pub use runner::{execute_with_files, SynchronisedFiles, TuExecution};
