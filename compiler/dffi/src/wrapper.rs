//! Per-signature call wrappers.
//!
//! Every function type gets one generated C function of the uniform shape
//!
//! ```c
//! void __dffi_wrapper_N(R (*__FPtr)(A0, A1), R *__Ret, void **__Args) {
//!   *__Ret = (__FPtr)(*((A0 *)__Args[0]), *((A1 *)__Args[1]));
//! }
//! ```
//!
//! so the C compiler, not this crate, owns the calling convention of the
//! inner call. Variadic functions get one wrapper per list of trailing
//! argument types. Wrappers are numbered session-wide and cached by
//! signature.

use std::fmt::Write as _;

use dffi_native::Trampoline;
use dffi_types::{CompositeType, DeclMode, DeclPrinter, QualType, TypeId, TypePool};
use rustc_hash::FxHashMap;

const WRAPPER_PREFIX: &str = "__dffi_wrapper_";

pub(crate) fn wrapper_name(index: usize) -> String {
    format!("{WRAPPER_PREFIX}{index}")
}

/// Whether a wrapper for `fty` called with trailing `varargs` compiles:
/// every struct or union passed or returned by value must be defined.
pub(crate) fn is_wrappable(pool: &TypePool, fty: TypeId, varargs: &[QualType]) -> bool {
    let Some(func) = pool.as_function(fty) else {
        return false;
    };
    !std::iter::once(func.ret())
        .chain(func.params().iter().copied())
        .chain(varargs.iter().copied())
        .any(|qt| pool.as_composite(qt.ty()).is_some_and(CompositeType::is_opaque))
}

/// Wrapper numbering and the trampolines compiled so far.
#[derive(Default)]
pub(crate) struct WrapperCache {
    by_type: FxHashMap<TypeId, usize>,
    by_varargs: FxHashMap<(TypeId, Vec<QualType>), usize>,
    trampolines: FxHashMap<usize, Trampoline>,
    next: usize,
}

impl WrapperCache {
    /// Index of the wrapper for `fty`, and whether it was already assigned.
    pub fn index(&mut self, fty: TypeId) -> (usize, bool) {
        if let Some(&index) = self.by_type.get(&fty) {
            return (index, true);
        }
        let index = self.bump();
        self.by_type.insert(fty, index);
        (index, false)
    }

    /// Index of the wrapper for `fty` called with trailing `varargs`.
    pub fn varargs_index(&mut self, fty: TypeId, varargs: &[QualType]) -> (usize, bool) {
        let key = (fty, varargs.to_vec());
        if let Some(&index) = self.by_varargs.get(&key) {
            return (index, true);
        }
        let index = self.bump();
        self.by_varargs.insert(key, index);
        (index, false)
    }

    fn bump(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }

    pub fn trampoline(&self, index: usize) -> Option<Trampoline> {
        self.trampolines.get(&index).copied()
    }

    pub fn insert(&mut self, index: usize, trampoline: Trampoline) {
        self.trampolines.insert(index, trampoline);
    }

    /// Number of wrappers assigned so far.
    pub fn len(&self) -> usize {
        self.next
    }
}

/// Wrapper definitions compiled together as one source.
pub(crate) struct WrapperBatch {
    printer: DeclPrinter,
    body: String,
    pending: Vec<usize>,
}

impl WrapperBatch {
    pub fn new() -> Self {
        Self {
            printer: DeclPrinter::new().with_enums_as_int(),
            body: String::new(),
            pending: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Append wrapper `index` for the function type `fty`, passing
    /// `varargs` after the fixed parameters.
    pub fn push(&mut self, pool: &mut TypePool, index: usize, fty: TypeId, varargs: &[QualType]) {
        let Some(func) = pool.as_function(fty) else {
            tracing::error!(?fty, "wrapper requested for a non-function type");
            panic!("wrapper requested for a non-function type");
        };
        let ret = func.ret();
        let returns_void = func.returns_void();
        let params = func.params().to_vec();

        // Return storage is written, so it never carries `const`.
        let fptr = pool.pointer(fty);
        let ret_ptr = pool.pointer(QualType::new(ret.ty()));
        let arg_ptrs: Vec<TypeId> = params
            .iter()
            .chain(varargs)
            .map(|&arg| pool.pointer(arg))
            .collect();

        let out = &mut self.body;
        let _ = write!(out, "void {}(", wrapper_name(index));
        self.printer
            .print_def(pool, out, QualType::new(fptr), DeclMode::Full, Some("__FPtr"));
        out.push(',');
        self.printer
            .print_def(pool, out, QualType::new(ret_ptr), DeclMode::Full, Some("__Ret"));
        out.push_str(",void** __Args) {\n  ");
        if !returns_void {
            out.push_str("*__Ret = ");
        }
        out.push_str("(__FPtr)(");
        for (idx, &arg_ptr) in arg_ptrs.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            out.push_str("*((");
            self.printer
                .print_def(pool, out, QualType::new(arg_ptr), DeclMode::Full, None);
            let _ = write!(out, ")__Args[{idx}])");
        }
        out.push_str(");\n}\n");
        self.pending.push(index);
    }

    /// The complete source and the wrapper indices it defines.
    pub fn finish(self) -> (String, Vec<usize>) {
        (self.printer.into_source(&self.body), self.pending)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
