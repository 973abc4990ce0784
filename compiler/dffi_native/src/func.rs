//! Uniform native call handles.

use std::ffi::c_void;
use std::fmt;

use dffi_types::TypeId;

use crate::last_error;

/// Generated adapter: calls `fn` with the arguments pointed to by `args` and
/// stores the result through `ret`.
pub type Trampoline = unsafe extern "C" fn(func: *mut c_void, ret: *mut c_void, args: *mut *mut c_void);

/// A callable native function: trampoline, code pointer and signature.
///
/// The default value is invalid and must not be called.
#[derive(Copy, Clone)]
pub struct NativeFunc {
    trampoline: Option<Trampoline>,
    code: usize,
    ty: TypeId,
    ret_size: u64,
    use_last_error: bool,
}

impl Default for NativeFunc {
    fn default() -> Self {
        Self {
            trampoline: None,
            code: 0,
            ty: TypeId::VOID,
            ret_size: 0,
            use_last_error: false,
        }
    }
}

impl NativeFunc {
    /// # Safety
    ///
    /// `trampoline` must implement the call shape of the function type `ty`
    /// and `code` must point to a function of that type that outlives every
    /// copy of the handle. `ret_size` is the byte size of the return type.
    pub unsafe fn new(
        trampoline: Trampoline,
        code: *const c_void,
        ty: TypeId,
        ret_size: u64,
        use_last_error: bool,
    ) -> Self {
        Self {
            trampoline: Some(trampoline),
            code: code as usize,
            ty,
            ret_size,
            use_last_error,
        }
    }

    /// Whether a trampoline is attached.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.trampoline.is_some()
    }

    /// The function type.
    #[inline]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn code(&self) -> *const c_void {
        self.code as *const c_void
    }

    #[inline]
    pub fn trampoline(&self) -> Option<Trampoline> {
        self.trampoline
    }

    #[inline]
    pub fn uses_last_error(&self) -> bool {
        self.use_last_error
    }

    /// Call with explicit return storage.
    ///
    /// # Safety
    ///
    /// `ret` must point to writable storage sized and aligned for the return
    /// type (it is not touched for `void`). `args` must point to one pointer
    /// per parameter, each pointing to a value of that parameter's type; it
    /// may be null for functions without parameters.
    pub unsafe fn call(&self, ret: *mut c_void, args: *mut *mut c_void) {
        let Some(trampoline) = self.trampoline else {
            tracing::error!(ty = ?self.ty, "called an invalid native function");
            panic!("called an invalid native function");
        };
        if self.use_last_error {
            last_error::swap();
        }
        trampoline(self.code as *mut c_void, ret, args);
        if self.use_last_error {
            last_error::swap();
        }
    }

    /// Call and discard the return value.
    ///
    /// # Safety
    ///
    /// As for [`NativeFunc::call`], minus the return storage.
    pub unsafe fn call_args(&self, args: *mut *mut c_void) {
        if self.ret_size == 0 {
            self.call(std::ptr::null_mut(), args);
            return;
        }
        let words = usize::try_from(self.ret_size.div_ceil(16)).unwrap_or(usize::MAX);
        let mut scratch = vec![0u128; words];
        self.call(scratch.as_mut_ptr().cast(), args);
    }

    /// Call a function without parameters, discarding its return value.
    ///
    /// # Safety
    ///
    /// The function must take no parameters.
    pub unsafe fn call_noargs(&self) {
        self.call_args(std::ptr::null_mut());
    }
}

impl fmt::Debug for NativeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunc")
            .field("valid", &self.is_valid())
            .field("code", &self.code())
            .field("ty", &self.ty)
            .field("use_last_error", &self.use_last_error)
            .finish()
    }
}
