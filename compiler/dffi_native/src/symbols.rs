//! Process-wide symbol resolution.
//!
//! Explicitly registered symbols are consulted first, then the global symbol
//! scope of the process (the executable plus every library loaded with
//! global visibility).

use std::ffi::c_void;
use std::sync::LazyLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

static REGISTERED: LazyLock<RwLock<FxHashMap<String, usize>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// Make `ptr` resolvable as `name`, replacing any earlier registration.
pub fn add_symbol(name: &str, ptr: *const c_void) {
    tracing::debug!(name, "registering symbol");
    REGISTERED.write().insert(name.to_owned(), ptr as usize);
}

pub fn registered_symbol(name: &str) -> Option<*const c_void> {
    REGISTERED
        .read()
        .get(name)
        .map(|&addr| addr as *const c_void)
}

/// Resolve `name` against registered symbols, then the process.
pub fn search_process(name: &str) -> Option<*const c_void> {
    registered_symbol(name).or_else(|| process_symbol(name))
}

#[cfg(unix)]
fn process_symbol(name: &str) -> Option<*const c_void> {
    let this: libloading::Library = libloading::os::unix::Library::this().into();
    lookup(&this, name)
}

#[cfg(windows)]
fn process_symbol(name: &str) -> Option<*const c_void> {
    let this: libloading::Library = libloading::os::windows::Library::this().ok()?.into();
    lookup(&this, name)
}

fn lookup(library: &libloading::Library, name: &str) -> Option<*const c_void> {
    // SAFETY: the symbol is only read as an address.
    let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
    let addr: *mut c_void = *symbol;
    (!addr.is_null()).then_some(addr.cast_const())
}
