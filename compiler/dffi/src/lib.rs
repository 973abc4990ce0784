//! Dynamic C foreign function interface.
//!
//! A [`Session`] compiles C (or C++) source with an external `clang`, reads
//! the types and function signatures of the result back from its debug
//! info, and hands out [`NativeFunc`] handles that call any of those
//! functions through a generated, per-signature wrapper. Prebuilt shared
//! libraries with DWARF can be ingested the same way.
//!
//! ```no_run
//! use std::ffi::c_void;
//!
//! use dffi::{CompileOptions, Session};
//!
//! let mut session = Session::new(CompileOptions::from_env())?;
//! let unit = session.compile("int add(int a, int b) { return a + b; }")?;
//! let add = session.get_function(unit, "add").ok_or("no add")?;
//!
//! let (mut a, mut b, mut ret) = (2i32, 3i32, 0i32);
//! let mut args = [(&raw mut a).cast::<c_void>(), (&raw mut b).cast::<c_void>()];
//! unsafe { add.call((&raw mut ret).cast(), args.as_mut_ptr()) };
//! assert_eq!(ret, 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Logging goes through `tracing`; see [`init_tracing`].

#![allow(
    unsafe_code,
    reason = "builds native call handles from JIT-compiled wrappers"
)]

mod driver;
mod error;
mod options;
mod pass1;
mod session;
mod unit;
mod wrapper;

use std::sync::Once;

pub use driver::{Artifact, Driver};
pub use error::{CompileError, SessionError};
pub use options::{CompileOptions, CxxMode, UnitOptions};
pub use session::Session;
pub use unit::{CompilationUnit, UnitId};

pub use dffi_native::{last_error, set_last_error, DynamicLibrary, LastError, LibraryError, NativeFunc};
pub use dffi_types as types;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `DFFI_LOG`, or `RUST_LOG`
/// when that is unset. Does nothing when neither is set, or when another
/// subscriber is already installed. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let Some(directives) = ["DFFI_LOG", "RUST_LOG"]
            .into_iter()
            .find_map(|var| std::env::var(var).ok())
        else {
            return;
        };
        let filter = EnvFilter::new(directives);
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init();
    });
}

/// Target triple of the host, as clang spells it.
pub fn native_triple() -> String {
    let vendor = if cfg!(target_vendor = "apple") {
        "apple"
    } else if cfg!(windows) {
        "pc"
    } else {
        "unknown"
    };
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        os => os,
    };
    let env = if cfg!(target_env = "gnu") {
        "-gnu"
    } else if cfg!(target_env = "musl") {
        "-musl"
    } else if cfg!(target_env = "msvc") {
        "-msvc"
    } else {
        ""
    };
    format!("{}-{vendor}-{os}{env}", std::env::consts::ARCH)
}
