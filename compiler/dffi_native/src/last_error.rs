//! Per-thread preservation of the OS last-error value.
//!
//! Functions compiled with last-error preservation swap the thread's OS slot
//! (`errno`, or `GetLastError` on Windows) with a saved per-thread value
//! right before and right after the native call. The callee sees whatever was
//! last stored with [`set_last_error`], and the value it leaves behind is
//! readable through [`last_error`] without clobbering the caller's own OS
//! state.

use std::cell::Cell;

#[cfg(unix)]
pub type LastError = libc::c_int;
#[cfg(windows)]
pub type LastError = winapi::shared::minwindef::DWORD;

thread_local! {
    static SAVED: Cell<LastError> = const { Cell::new(0) };
}

/// Last-error value saved by the most recent preserving call on this thread.
pub fn last_error() -> LastError {
    SAVED.with(Cell::get)
}

/// Value the next preserving call on this thread starts with.
pub fn set_last_error(value: LastError) {
    SAVED.with(|saved| saved.set(value));
}

/// Exchange the OS slot with the saved value.
pub(crate) fn swap() {
    SAVED.with(|saved| {
        let current = os::get();
        os::set(saved.get());
        saved.set(current);
    });
}

#[cfg(unix)]
mod os {
    use super::LastError;

    #[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))]
    fn location() -> *mut LastError {
        // SAFETY: always returns the calling thread's errno slot.
        unsafe { libc::__errno_location() }
    }

    #[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))]
    fn location() -> *mut LastError {
        // SAFETY: always returns the calling thread's errno slot.
        unsafe { libc::__errno() }
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly"
    ))]
    fn location() -> *mut LastError {
        // SAFETY: always returns the calling thread's errno slot.
        unsafe { libc::__error() }
    }

    pub(super) fn get() -> LastError {
        // SAFETY: thread-local, valid for the thread's lifetime.
        unsafe { *location() }
    }

    pub(super) fn set(value: LastError) {
        // SAFETY: as above.
        unsafe { *location() = value }
    }
}

#[cfg(windows)]
mod os {
    use winapi::um::errhandlingapi::{GetLastError, SetLastError};

    use super::LastError;

    pub(super) fn get() -> LastError {
        // SAFETY: no preconditions.
        unsafe { GetLastError() }
    }

    pub(super) fn set(value: LastError) {
        // SAFETY: no preconditions.
        unsafe { SetLastError(value) }
    }
}

#[cfg(test)]
mod tests;
