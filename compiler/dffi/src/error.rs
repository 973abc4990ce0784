//! Session and compilation errors.

use std::io;
use std::path::PathBuf;

use dffi_dwarf::DwarfError;
use dffi_native::LibraryError;
use thiserror::Error;

/// Failure to set up a [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("C compiler `{}` is not available: {source}", program.display())]
    CompilerNotFound {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("C compiler `{}` does not answer `--version`:\n{stderr}", program.display())]
    CompilerProbe { program: PathBuf, stderr: String },

    #[error("unable to create the session work directory: {0}")]
    WorkDir(#[source] io::Error),
}

/// Failure to compile or ingest a unit.
///
/// `Display` is the formatted, possibly multi-line, diagnostic.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler rejected the input. Carries its diagnostics verbatim.
    #[error("{0}")]
    Diagnostics(String),

    #[error("unable to run `{}`: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to write `{}`: {source}", path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed AST dump: {0}")]
    Ast(#[from] serde_json::Error),

    #[error(transparent)]
    Dwarf(#[from] DwarfError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}
