//! Native invocation for dffi.
//!
//! A [`NativeFunc`] pairs a generated trampoline with the code pointer of the
//! function it calls. Every trampoline has the same shape,
//! `void (*)(void* fn, void* ret, void** args)`, so calls of any C signature go
//! through one entry point.
//!
//! # Safety
//!
//! Calls are unchecked: argument and return storage are caller-owned memory
//! laid out per the function's parameter types. Type checking belongs to
//! whatever marshals values into that memory.

#![allow(
    unsafe_code,
    reason = "calls through generated trampolines and the platform dynamic loader"
)]

mod func;
mod last_error;
mod library;
mod symbols;

pub use func::{NativeFunc, Trampoline};
pub use last_error::{last_error, set_last_error, LastError};
pub use library::{DynamicLibrary, LibraryError};
pub use symbols::{add_symbol, registered_symbol, search_process};
