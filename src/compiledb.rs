//! Compilation database loading.
//!
//! Reads `compile_commands.json` from a build folder. Both entry forms are
//! accepted: a single `command` string or an `arguments` array.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors from loading a compilation database.
#[derive(Error, Debug)]
pub enum CompileDbError {
    #[error("build folder '{0}' is not a directory")]
    NotADirectory(PathBuf),
    #[error("no compilation database found in '{0}'")]
    Missing(PathBuf),
    #[error("failed to read '{0}': {1}")]
    Unreadable(PathBuf, #[source] std::io::Error),
    #[error("malformed compilation database: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Raw JSON shape of one database entry.
#[derive(Debug, Deserialize)]
struct RawCommand {
    directory: String,
    file: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
}

/// One compilation: working directory, source file and compiler arguments.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub arguments: Vec<String>,
}

/// Include directories extracted from a compile command, by lookup class.
#[derive(Debug, Default, Clone)]
pub struct IncludePaths {
    /// `-iquote` directories, searched for quoted includes only.
    pub quote: Vec<PathBuf>,
    /// `-I` directories.
    pub user: Vec<PathBuf>,
    /// `-isystem` directories; headers found here count as system headers.
    pub system: Vec<PathBuf>,
}

impl CompileCommand {
    /// The absolute path of the compiled source file.
    pub fn source_path(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }

    /// Extract `-iquote`/`-I`/`-isystem` directories, resolved against the
    /// compilation's working directory.
    pub fn include_paths(&self) -> IncludePaths {
        let mut paths = IncludePaths::default();
        let mut args = self.arguments.iter().peekable();

        while let Some(arg) = args.next() {
            let (bucket, value) = if let Some(rest) = arg.strip_prefix("-isystem") {
                (&mut paths.system, rest)
            } else if let Some(rest) = arg.strip_prefix("-iquote") {
                (&mut paths.quote, rest)
            } else if let Some(rest) = arg.strip_prefix("-I") {
                (&mut paths.user, rest)
            } else {
                continue;
            };

            let dir = if value.is_empty() {
                match args.next() {
                    Some(next) => next.as_str(),
                    None => continue,
                }
            } else {
                value
            };

            let dir = Path::new(dir);
            if dir.is_absolute() {
                bucket.push(dir.to_path_buf());
            } else {
                bucket.push(self.directory.join(dir));
            }
        }
        paths
    }
}

/// The loaded compilation database of a build folder.
#[derive(Debug)]
pub struct CompilationDatabase {
    commands: Vec<CompileCommand>,
}

impl CompilationDatabase {
    /// Load `compile_commands.json` from `build_folder`.
    pub fn from_directory(build_folder: &Path) -> Result<Self, CompileDbError> {
        if !build_folder.is_dir() {
            return Err(CompileDbError::NotADirectory(build_folder.to_path_buf()));
        }

        let db_path = build_folder.join("compile_commands.json");
        if !db_path.is_file() {
            return Err(CompileDbError::Missing(build_folder.to_path_buf()));
        }

        let content = std::fs::read_to_string(&db_path)
            .map_err(|err| CompileDbError::Unreadable(db_path.clone(), err))?;
        let raw: Vec<RawCommand> = serde_json::from_str(&content)?;

        let commands = raw.into_iter().map(|entry| {
            let arguments = match (entry.arguments, entry.command) {
                (Some(arguments), _) => arguments,
                // Whitespace split of the command string; quoting subtleties
                // inside compile_commands.json are out of scope here.
                (None, Some(command)) => {
                    command.split_whitespace().map(str::to_string).collect()
                }
                (None, None) => Vec::new(),
            };
            CompileCommand {
                directory: PathBuf::from(entry.directory),
                file: PathBuf::from(entry.file),
                arguments,
            }
        });

        Ok(Self {
            commands: commands.collect(),
        })
    }

    /// Build a database directly from commands (used by tests).
    pub fn from_commands(commands: Vec<CompileCommand>) -> Self {
        Self { commands }
    }

    /// Absolute paths of every translation unit in the database.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.commands.iter().map(CompileCommand::source_path).collect()
    }

    /// The compile command for one translation unit.
    pub fn command_for(&self, file: &Path) -> Option<&CompileCommand> {
        self.commands
            .iter()
            .find(|cmd| cmd.source_path() == file || cmd.file == file)
    }
}
