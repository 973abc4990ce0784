//! Dynamic library handles.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Trampoline;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("unable to load `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// A loaded shared library.
///
/// On Unix the library is opened with `RTLD_GLOBAL`, so its exports also
/// become visible to process-wide symbol search. It stays loaded until the
/// handle is dropped.
#[derive(Debug)]
pub struct DynamicLibrary {
    path: PathBuf,
    library: libloading::Library,
}

impl DynamicLibrary {
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let library = open_global(path).map_err(|source| LibraryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of the exported symbol `name`, if any.
    pub fn symbol(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is only read as an address, never dereferenced.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        let addr: *mut c_void = *symbol;
        (!addr.is_null()).then_some(addr.cast_const())
    }

    /// The exported trampoline `name`.
    ///
    /// # Safety
    ///
    /// `name` must be a function with the [`Trampoline`] signature.
    pub unsafe fn trampoline(&self, name: &str) -> Option<Trampoline> {
        let symbol = self.library.get::<Trampoline>(name.as_bytes()).ok()?;
        Some(*symbol)
    }

    /// Load address of the library image. Addresses recorded in its debug
    /// info are relative to it.
    pub fn base_address(&self) -> Option<usize> {
        base_address_of(&self.path)
    }
}

#[cfg(unix)]
fn open_global(path: &Path) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_LAZY};

    // SAFETY: running the library's initializers is inherent to loading it.
    let library = unsafe { Library::open(Some(path), RTLD_LAZY | RTLD_GLOBAL) }?;
    Ok(library.into())
}

#[cfg(windows)]
fn open_global(path: &Path) -> Result<libloading::Library, libloading::Error> {
    // SAFETY: running the library's initializers is inherent to loading it.
    unsafe { libloading::Library::new(path) }
}

#[cfg(target_os = "linux")]
fn base_address_of(path: &Path) -> Option<usize> {
    use std::ffi::CStr;
    use std::os::unix::ffi::OsStrExt;

    struct Search {
        wanted: PathBuf,
        found: Option<usize>,
    }

    unsafe extern "C" fn visit(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut c_void,
    ) -> libc::c_int {
        let search = &mut *data.cast::<Search>();
        let info = &*info;
        if info.dlpi_name.is_null() {
            return 0;
        }
        let name = CStr::from_ptr(info.dlpi_name);
        let name = Path::new(std::ffi::OsStr::from_bytes(name.to_bytes()));
        let matches = name == search.wanted
            || name
                .canonicalize()
                .is_ok_and(|name| name == search.wanted);
        if matches {
            search.found = usize::try_from(info.dlpi_addr).ok();
            return 1;
        }
        0
    }

    let mut search = Search {
        wanted: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
        found: None,
    };
    // SAFETY: `visit` only touches `search` for the duration of the walk.
    unsafe {
        libc::dl_iterate_phdr(Some(visit), (&raw mut search).cast());
    }
    search.found
}

#[cfg(not(target_os = "linux"))]
fn base_address_of(_path: &Path) -> Option<usize> {
    None
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
