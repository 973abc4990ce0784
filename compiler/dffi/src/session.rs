//! The dffi session.
//!
//! A session owns the type pool, every compilation unit, and every library
//! it loaded: unit code, wrapper batches and explicitly opened libraries.
//! Nothing is released before the session drops, so type handles and
//! [`NativeFunc`]s stay valid for its whole lifetime.
//!
//! Compilation is synchronous and takes `&mut self`; one session compiles
//! one unit at a time.

use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};

use dffi_dwarf::{recover, DebugInfo};
use dffi_native::{search_process, DynamicLibrary, LibraryError, NativeFunc, Trampoline};
use dffi_types::{BasicKind, CallingConv, QualType, TypeId, TypePool};
use tempfile::TempDir;

use crate::driver::Driver;
use crate::pass1;
use crate::unit::{CompilationUnit, UnitFunction, UnitId};
use crate::wrapper::{is_wrappable, wrapper_name, WrapperBatch, WrapperCache};
use crate::{CompileError, CompileOptions, SessionError, UnitOptions};

pub struct Session {
    options: CompileOptions,
    driver: Driver,
    pool: TypePool,
    units: Vec<CompilationUnit>,
    libraries: Vec<DynamicLibrary>,
    wrappers: WrapperCache,
    artifacts: usize,
    // Dropped last: libraries above may still map files inside it.
    workdir: TempDir,
}

impl Session {
    /// Start a session, checking that the configured compiler runs.
    pub fn new(options: CompileOptions) -> Result<Self, SessionError> {
        let driver = Driver::probe(&options.compiler)?;
        let workdir = tempfile::Builder::new()
            .prefix("dffi-")
            .tempdir()
            .map_err(SessionError::WorkDir)?;
        tracing::debug!(workdir = %workdir.path().display(), "session started");
        Ok(Self {
            options,
            driver,
            pool: TypePool::new(),
            units: Vec::new(),
            libraries: Vec::new(),
            wrappers: WrapperCache::default(),
            artifacts: 0,
            workdir,
        })
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn pool(&self) -> &TypePool {
        &self.pool
    }

    pub fn unit(&self, id: UnitId) -> Option<&CompilationUnit> {
        self.units.get(id.index())
    }

    // === Compilation ===

    /// Compile C source with bodies; its definitions become callable.
    pub fn compile(&mut self, source: &str) -> Result<UnitId, CompileError> {
        self.compile_with(source, UnitOptions::default())
    }

    /// Compile declarations: prototypes and typedefs are recovered even when
    /// nothing in `source` uses them. Prototypes resolve by symbol name.
    pub fn cdef(&mut self, source: &str) -> Result<UnitId, CompileError> {
        self.compile_with(source, UnitOptions::default().with_declarations(true))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(declarations = unit.declarations))]
    pub fn compile_with(&mut self, source: &str, unit: UnitOptions) -> Result<UnitId, CompileError> {
        let name = format!("unit_{}", self.units.len());
        let path = self.stage(&self.options, &name, source)?;

        let (path, declarations) = if unit.declarations {
            let json = self.driver.dump_ast(&self.options, &path)?;
            let ast = pass1::parse_ast(&json)?;
            let declarations = pass1::declarations(&ast, self.options.is_cxx());
            let full = format!("{source}\n{}", declarations.forcing);
            (self.stage(&self.options, &format!("{name}_decls"), &full)?, declarations)
        } else {
            (path, pass1::Declarations::default())
        };

        let artifact = self.driver.build_shared(&self.options, &path, true)?;
        let library = DynamicLibrary::open(&artifact.library)?;
        let info = DebugInfo::open(&artifact.debug_info)?;
        let recovered = recover(&info, &mut self.pool)?;

        self.libraries.push(library);
        let id = UnitId::new(self.units.len());
        let compiled = CompilationUnit::build(
            id,
            name,
            Some(self.libraries.len() - 1),
            recovered,
            declarations.aliases,
            &mut self.pool,
            unit.use_last_error,
        );
        self.add_unit(compiled);
        Ok(id)
    }

    /// Recover the types and functions of an existing shared library from
    /// its DWARF, and load it.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn ingest_dwarf(&mut self, path: &Path) -> Result<UnitId, CompileError> {
        let info = DebugInfo::open(path)?;
        let recovered = recover(&info, &mut self.pool)?;
        let library = DynamicLibrary::open(path)?;
        self.libraries.push(library);

        let id = UnitId::new(self.units.len());
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let unit = CompilationUnit::build(
            id,
            name,
            Some(self.libraries.len() - 1),
            recovered,
            Vec::new(),
            &mut self.pool,
            false,
        );
        self.add_unit(unit);
        Ok(id)
    }

    fn add_unit(&mut self, unit: CompilationUnit) {
        if !self.options.lazy_wrappers {
            let mut types = unit.function_types();
            types.retain(|&fty| is_wrappable(&self.pool, fty, &[]));
            self.ensure_wrappers(&types);
        }
        self.units.push(unit);
    }

    fn source_path(&self, options: &CompileOptions, stem: &str) -> PathBuf {
        self.workdir
            .path()
            .join(format!("{stem}.{}", options.source_extension()))
    }

    fn stage(&self, options: &CompileOptions, stem: &str, source: &str) -> Result<PathBuf, CompileError> {
        let path = self.source_path(options, stem);
        fs::write(&path, source).map_err(|source| CompileError::Stage {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    // === Functions ===

    /// The callable function `name` of `unit`, compiling its wrapper if
    /// needed. `None` when the unit has no such function or its code cannot
    /// be found.
    pub fn get_function(&mut self, unit: UnitId, name: &str) -> Option<NativeFunc> {
        let (code, fty) = self.get_function_address_and_type(unit, name)?;
        let trampoline = self.trampoline(fty)?;
        Some(self.native(trampoline, code, fty, fty))
    }

    /// As [`Session::get_function`], for a variadic function called with the
    /// given trailing argument types. The handle's type lists them as
    /// ordinary parameters.
    pub fn get_function_varargs(
        &mut self,
        unit: UnitId,
        name: &str,
        varargs: &[QualType],
    ) -> Option<NativeFunc> {
        let (code, fty) = self.get_function_address_and_type(unit, name)?;
        self.varargs_function(fty, code, varargs)
    }

    /// Code address and function type of `name`, without compiling a
    /// wrapper.
    pub fn get_function_address_and_type(
        &self,
        unit: UnitId,
        name: &str,
    ) -> Option<(*const c_void, TypeId)> {
        let unit = self.unit(unit)?;
        let (symbol, func) = unit.function(name)?;
        let Some(code) = self.resolve(unit, symbol, func) else {
            tracing::debug!(symbol, "function has no code");
            return None;
        };
        Some((code, func.ty))
    }

    /// Build a handle for arbitrary code of function type `fty`. `None` if
    /// `fty` is not a function type or passes an undefined struct by value.
    ///
    /// # Safety
    ///
    /// `code` must be a function of type `fty` that outlives the handle.
    pub unsafe fn function_from_ptr(&mut self, fty: TypeId, code: *const c_void) -> Option<NativeFunc> {
        let trampoline = self.trampoline(fty)?;
        Some(self.native(trampoline, code, fty, fty))
    }

    /// As [`Session::function_from_ptr`] for a variadic `fty` called with
    /// the given trailing argument types.
    ///
    /// # Safety
    ///
    /// As for [`Session::function_from_ptr`].
    pub unsafe fn function_from_ptr_varargs(
        &mut self,
        fty: TypeId,
        code: *const c_void,
        varargs: &[QualType],
    ) -> Option<NativeFunc> {
        self.varargs_function(fty, code, varargs)
    }

    fn varargs_function(
        &mut self,
        fty: TypeId,
        code: *const c_void,
        varargs: &[QualType],
    ) -> Option<NativeFunc> {
        let func = self.pool.as_function(fty)?;
        if !func.has_varargs() {
            tracing::debug!(?fty, "trailing arguments given for a fixed-arity function");
            return None;
        }
        if !is_wrappable(&self.pool, fty, varargs) {
            tracing::debug!(?fty, "undefined composite passed by value");
            return None;
        }
        let (ret, cc, mut params) = (func.ret(), func.cc(), func.params().to_vec());
        let flags = func.flags() - dffi_types::FunctionFlags::VARARGS;
        params.extend_from_slice(varargs);
        let call_ty = self
            .pool
            .intern_function(dffi_types::FunctionType::new(ret, params, cc, flags));

        let (index, compiled) = self.wrappers.varargs_index(fty, varargs);
        if !compiled {
            let mut batch = WrapperBatch::new();
            batch.push(&mut self.pool, index, fty, varargs);
            self.compile_wrappers(batch);
        }
        let trampoline = self.loaded_trampoline(index);
        Some(self.native(trampoline, code, call_ty, fty))
    }

    fn native(&self, trampoline: Trampoline, code: *const c_void, ty: TypeId, fty: TypeId) -> NativeFunc {
        let (ret_size, use_last_error) = match self.pool.as_function(fty) {
            Some(func) => (self.pool.size(func.ret().ty()), func.uses_last_error()),
            None => (0, false),
        };
        // SAFETY: the trampoline was generated for `fty`, and `code` is
        // either unit code of that type or vouched for by the caller.
        unsafe { NativeFunc::new(trampoline, code, ty, ret_size, use_last_error) }
    }

    /// Resolution order: the unit's own library, then every library the
    /// session loaded, newest first, then registered and process symbols.
    fn resolve(&self, unit: &CompilationUnit, symbol: &str, func: UnitFunction) -> Option<*const c_void> {
        if let Some(library) = unit.library().and_then(|index| self.libraries.get(index)) {
            if let Some(code) = library.symbol(symbol) {
                return Some(code);
            }
            if let (Some(low_pc), Some(base)) = (func.low_pc, library.base_address()) {
                let offset = usize::try_from(low_pc).ok()?;
                return Some(base.wrapping_add(offset) as *const c_void);
            }
        }
        self.libraries
            .iter()
            .rev()
            .find_map(|library| library.symbol(symbol))
            .or_else(|| search_process(symbol))
    }

    // === Wrappers ===

    /// `None` when no wrapper can be built for `fty`.
    fn trampoline(&mut self, fty: TypeId) -> Option<Trampoline> {
        if !is_wrappable(&self.pool, fty, &[]) {
            tracing::debug!(?fty, "undefined composite passed by value");
            return None;
        }
        self.ensure_wrappers(&[fty]);
        let (index, _) = self.wrappers.index(fty);
        Some(self.loaded_trampoline(index))
    }

    fn loaded_trampoline(&self, index: usize) -> Trampoline {
        match self.wrappers.trampoline(index) {
            Some(trampoline) => trampoline,
            None => fatal(&format!("wrapper {index} was never loaded")),
        }
    }

    /// Compile, in one batch, the wrappers of `types` not compiled yet.
    fn ensure_wrappers(&mut self, types: &[TypeId]) {
        let mut batch = WrapperBatch::new();
        for &fty in types {
            let (index, compiled) = self.wrappers.index(fty);
            if !compiled {
                batch.push(&mut self.pool, index, fty, &[]);
            }
        }
        if !batch.is_empty() {
            self.compile_wrappers(batch);
        }
    }

    /// Wrapper sources are generated from recovered types; the compiler
    /// rejecting one is a bug, and fatal.
    #[tracing::instrument(level = "debug", skip_all)]
    fn compile_wrappers(&mut self, batch: WrapperBatch) {
        let (source, indices) = batch.finish();
        let stem = format!("wrappers_{}", self.artifacts);
        self.artifacts += 1;
        let options = self.options.wrapper_options();
        let library = self
            .stage(&options, &stem, &source)
            .and_then(|path| self.driver.build_shared(&options, &path, false))
            .and_then(|artifact| DynamicLibrary::open(&artifact.library).map_err(CompileError::from));
        let library = match library {
            Ok(library) => library,
            Err(err) => {
                tracing::error!(%source, "wrapper source rejected");
                fatal(&format!("unable to compile wrappers: {err}"));
            }
        };
        for index in indices {
            let name = wrapper_name(index);
            // SAFETY: every `__dffi_wrapper_N` has the trampoline signature.
            match unsafe { library.trampoline(&name) } {
                Some(trampoline) => self.wrappers.insert(index, trampoline),
                None => fatal(&format!("wrapper `{name}` missing from its library")),
            }
        }
        tracing::debug!(total = self.wrappers.len(), "wrappers loaded");
        self.libraries.push(library);
    }

    // === Libraries and symbols ===

    /// Load a shared library with global visibility. Its exports become
    /// resolvable by every unit of the session.
    pub fn dlopen(&mut self, path: &Path) -> Result<&DynamicLibrary, LibraryError> {
        let library = DynamicLibrary::open(path)?;
        self.libraries.push(library);
        Ok(&self.libraries[self.libraries.len() - 1])
    }

    /// Make `ptr` resolvable as `name`, ahead of the process-wide search.
    pub fn add_symbol(&self, name: &str, ptr: *const c_void) {
        dffi_native::add_symbol(name, ptr);
    }

    // === Type constructors ===

    pub fn basic_type(&self, kind: BasicKind) -> TypeId {
        self.pool.basic(kind)
    }

    pub fn pointer_type(&mut self, pointee: impl Into<QualType>) -> TypeId {
        self.pool.pointer(pointee)
    }

    pub fn array_type(&mut self, elem: impl Into<QualType>, count: u64) -> TypeId {
        self.pool.array(elem, count)
    }

    pub fn function_type(
        &mut self,
        ret: impl Into<QualType>,
        params: &[QualType],
        cc: CallingConv,
        varargs: bool,
    ) -> TypeId {
        self.pool.function(ret, params, cc, varargs)
    }

    /// `void *`
    pub fn void_ptr(&mut self) -> TypeId {
        self.pool.pointer(TypeId::VOID)
    }

    /// `char *`
    pub fn char_ptr(&mut self) -> TypeId {
        self.pool.pointer(TypeId::CHAR)
    }

    /// `const char *`
    pub fn const_char_ptr(&mut self) -> TypeId {
        self.pool.pointer(QualType::new(TypeId::CHAR).with_const())
    }
}

fn fatal(message: &str) -> ! {
    tracing::error!("{message}");
    panic!("{message}");
}
