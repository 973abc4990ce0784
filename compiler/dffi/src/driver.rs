//! The compile service.
//!
//! An external `clang` does the parsing, code generation and linking. Each
//! unit becomes a shared library with debug info, which the session loads
//! and reads back. Diagnostics are the compiler's stderr, verbatim.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::{CompileError, CompileOptions, SessionError};

/// Files produced for one compiled source.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub library: PathBuf,
    /// Where the unit's DWARF lives. Apple linkers leave it in the object.
    pub debug_info: PathBuf,
}

#[derive(Debug)]
pub struct Driver {
    program: PathBuf,
    version: String,
}

impl Driver {
    /// Check that `program` runs, and record its version banner.
    pub fn probe(program: &Path) -> Result<Self, SessionError> {
        let output = Command::new(program)
            .arg("--version")
            .output()
            .map_err(|source| SessionError::CompilerNotFound {
                program: program.to_path_buf(),
                source,
            })?;
        if !output.status.success() {
            return Err(SessionError::CompilerProbe {
                program: program.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().to_owned();
        tracing::debug!(program = %program.display(), %version, "found C compiler");
        Ok(Self {
            program: program.to_path_buf(),
            version,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// First line of `--version`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parse `source` and return the top-level declarations as JSON.
    #[tracing::instrument(level = "debug", skip_all, fields(source = %source.display()))]
    pub fn dump_ast(&self, options: &CompileOptions, source: &Path) -> Result<String, CompileError> {
        let mut cmd = self.command();
        cmd.args(options.frontend_args())
            .args(["-fsyntax-only", "-Xclang", "-ast-dump=json"])
            .arg(source);
        let output = self.run(&mut cmd)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Compile `source` into a shared library next to it. `debug` selects
    /// full debug info; wrappers are built without.
    #[tracing::instrument(level = "debug", skip_all, fields(source = %source.display(), debug))]
    pub fn build_shared(
        &self,
        options: &CompileOptions,
        source: &Path,
        debug: bool,
    ) -> Result<Artifact, CompileError> {
        let object = source.with_extension("o");
        let library = source.with_extension(std::env::consts::DLL_EXTENSION);

        let mut compile = self.command();
        compile
            .args(options.frontend_args())
            .arg(format!("-O{}", options.opt_level))
            .args(["-fPIC", "-c"]);
        if debug {
            compile.args(["-gdwarf", "-fno-eliminate-unused-debug-types"]);
        }
        compile.arg(source).arg("-o").arg(&object);
        self.run(&mut compile)?;

        let mut link = self.command();
        link.arg("-shared").args(link_args()).arg(&object).arg("-o").arg(&library);
        self.run(&mut link)?;

        let debug_info = if cfg!(target_vendor = "apple") {
            object
        } else {
            library.clone()
        };
        Ok(Artifact {
            library,
            debug_info,
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-fno-color-diagnostics");
        cmd
    }

    fn run(&self, cmd: &mut Command) -> Result<Output, CompileError> {
        tracing::trace!(?cmd, "running compiler");
        let output = cmd.output().map_err(|source| self.spawn_error(source))?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_owned();
        if stderr.is_empty() {
            return Err(CompileError::Diagnostics(format!(
                "`{}` exited with {}",
                self.program.display(),
                output.status
            )));
        }
        Err(CompileError::Diagnostics(stderr))
    }

    fn spawn_error(&self, source: io::Error) -> CompileError {
        CompileError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

/// Linker flags that keep references inside a unit bound to the unit, and
/// leave references to other units for load time.
fn link_args() -> Vec<OsString> {
    if cfg!(target_vendor = "apple") {
        vec!["-undefined".into(), "dynamic_lookup".into()]
    } else if cfg!(windows) {
        Vec::new()
    } else {
        vec!["-Wl,-Bsymbolic".into()]
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
