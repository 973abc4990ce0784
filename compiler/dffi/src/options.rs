//! Compilation options.

use std::ffi::OsString;
use std::path::PathBuf;

/// C++ dialect, or plain C.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum CxxMode {
    #[default]
    None,
    Cxx98,
    Cxx11,
    Cxx14,
    Cxx17,
    Cxx20,
}

impl CxxMode {
    fn year(self) -> Option<&'static str> {
        match self {
            CxxMode::None => None,
            CxxMode::Cxx98 => Some("98"),
            CxxMode::Cxx11 => Some("11"),
            CxxMode::Cxx14 => Some("14"),
            CxxMode::Cxx17 => Some("17"),
            CxxMode::Cxx20 => Some("20"),
        }
    }
}

/// Options shared by every unit compiled in one session.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Optimization level, 0 to 3.
    pub opt_level: u8,
    /// `-I` directories, searched in order.
    pub include_dirs: Vec<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub cxx: CxxMode,
    /// GNU dialects (`gnu99`, `gnu++17`) instead of strict ones.
    pub gnu_extensions: bool,
    /// Compile wrappers on first use of a signature instead of at unit
    /// compile time.
    pub lazy_wrappers: bool,
    /// The compile service.
    pub compiler: PathBuf,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 2,
            include_dirs: Vec::new(),
            sysroot: None,
            cxx: CxxMode::None,
            gnu_extensions: true,
            lazy_wrappers: true,
            compiler: PathBuf::from("clang"),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DFFI_CC`, `DFFI_OPT_LEVEL`, `DFFI_SYSROOT`
    /// and `DFFI_INCLUDE_DIRS`.
    pub fn from_env() -> Self {
        Self::default().layer_env(|key| std::env::var_os(key))
    }

    /// Apply overrides read through `var`. Unparsable values are ignored.
    #[must_use]
    pub fn layer_env(mut self, var: impl Fn(&str) -> Option<OsString>) -> Self {
        if let Some(cc) = var("DFFI_CC").filter(|cc| !cc.is_empty()) {
            self.compiler = PathBuf::from(cc);
        }
        if let Some(level) = var("DFFI_OPT_LEVEL") {
            match level.to_str().and_then(|level| level.trim().parse::<u8>().ok()) {
                Some(level) => self = self.with_opt_level(level),
                None => tracing::warn!(?level, "ignoring invalid DFFI_OPT_LEVEL"),
            }
        }
        if let Some(sysroot) = var("DFFI_SYSROOT").filter(|s| !s.is_empty()) {
            self.sysroot = Some(PathBuf::from(sysroot));
        }
        if let Some(dirs) = var("DFFI_INCLUDE_DIRS") {
            self.include_dirs
                .extend(std::env::split_paths(&dirs).filter(|dir| !dir.as_os_str().is_empty()));
        }
        self
    }

    /// Levels above 3 are clamped.
    #[must_use]
    pub fn with_opt_level(mut self, level: u8) -> Self {
        self.opt_level = level.min(3);
        self
    }

    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_sysroot(mut self, sysroot: impl Into<PathBuf>) -> Self {
        self.sysroot = Some(sysroot.into());
        self
    }

    #[must_use]
    pub fn with_cxx(mut self, cxx: CxxMode) -> Self {
        self.cxx = cxx;
        self
    }

    #[must_use]
    pub fn with_gnu_extensions(mut self, enabled: bool) -> Self {
        self.gnu_extensions = enabled;
        self
    }

    #[must_use]
    pub fn with_lazy_wrappers(mut self, lazy: bool) -> Self {
        self.lazy_wrappers = lazy;
        self
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    #[inline]
    pub fn is_cxx(&self) -> bool {
        self.cxx != CxxMode::None
    }

    /// Extension of staged source files.
    pub(crate) fn source_extension(&self) -> &'static str {
        if self.is_cxx() {
            "cpp"
        } else {
            "c"
        }
    }

    /// Options wrapper sources are built with. Wrappers are C in every
    /// mode, so their symbols are never mangled.
    pub(crate) fn wrapper_options(&self) -> Self {
        Self {
            cxx: CxxMode::None,
            ..self.clone()
        }
    }

    /// Language, dialect and search path arguments.
    pub(crate) fn frontend_args(&self) -> Vec<OsString> {
        let dialect = match (self.cxx.year(), self.gnu_extensions) {
            (None, true) => "gnu99".to_owned(),
            (None, false) => "c99".to_owned(),
            (Some(year), true) => format!("gnu++{year}"),
            (Some(year), false) => format!("c++{year}"),
        };
        let mut args: Vec<OsString> = vec![
            "-x".into(),
            if self.is_cxx() { "c++" } else { "c" }.into(),
            format!("-std={dialect}").into(),
        ];
        if let Some(sysroot) = &self.sysroot {
            let mut arg = OsString::from("--sysroot=");
            arg.push(sysroot);
            args.push(arg);
        }
        for dir in &self.include_dirs {
            args.push("-I".into());
            args.push(dir.into());
        }
        args
    }
}

/// Per-unit switches.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct UnitOptions {
    /// Run the declaration pass so that prototypes without bodies and
    /// typedefs are recovered too.
    pub declarations: bool,
    /// Preserve the OS last-error value around calls of the unit's
    /// functions.
    pub use_last_error: bool,
}

impl UnitOptions {
    #[must_use]
    pub fn with_declarations(mut self, enabled: bool) -> Self {
        self.declarations = enabled;
        self
    }

    #[must_use]
    pub fn with_last_error(mut self, enabled: bool) -> Self {
        self.use_last_error = enabled;
        self
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
