//! Compilation units: the names one compile or ingest call declared.

use std::fmt;

use dffi_dwarf::{Recovered, RESERVED_PREFIX};
use dffi_types::{BasicKind, FunctionFlags, FunctionType, QualType, TypeId, TypePool};
use rustc_hash::FxHashMap;

use crate::pass1::{FORCE_DECL_PREFIX, FORCE_TYPEDEF_PREFIX};

/// Handle of a unit inside its session.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "sessions never hold 2^32 units"
    )]
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

/// A function known to a unit.
#[derive(Copy, Clone, Debug)]
pub(crate) struct UnitFunction {
    pub ty: TypeId,
    /// Offset of the code in the unit's library. `None` for prototypes
    /// resolved by name at lookup time.
    pub low_pc: Option<u64>,
}

#[derive(Debug)]
pub struct CompilationUnit {
    id: UnitId,
    name: String,
    /// Index of the library holding the unit's code, in the session.
    library: Option<usize>,
    composites: FxHashMap<String, TypeId>,
    aliases: FxHashMap<String, QualType>,
    functions: FxHashMap<String, UnitFunction>,
    function_aliases: FxHashMap<String, String>,
    use_last_error: bool,
}

impl CompilationUnit {
    /// Build the tables from recovered debug info.
    ///
    /// Forcing functions are folded back into the declarations they stand
    /// for; `label_aliases` maps source names to linker symbols.
    pub(crate) fn build(
        id: UnitId,
        name: String,
        library: Option<usize>,
        recovered: Recovered,
        label_aliases: Vec<(String, String)>,
        pool: &mut TypePool,
        use_last_error: bool,
    ) -> Self {
        let mut unit = Self {
            id,
            name,
            library,
            composites: FxHashMap::default(),
            aliases: FxHashMap::default(),
            functions: FxHashMap::default(),
            function_aliases: FxHashMap::default(),
            use_last_error,
        };

        for (name, ty) in recovered.composites {
            // Generated names stay internal.
            if !name.starts_with(RESERVED_PREFIX) {
                unit.composites.entry(name).or_insert(ty);
            }
        }
        for (name, qt) in recovered.aliases {
            unit.aliases.entry(name).or_insert(qt);
        }

        let mut declared = Vec::new();
        for func in recovered.functions {
            if func.name.starts_with(FORCE_TYPEDEF_PREFIX) {
                continue;
            }
            if let Some(symbol) = func.name.strip_prefix(FORCE_DECL_PREFIX) {
                match forced_type(pool, func.ty) {
                    Some(ty) => declared.push((symbol.to_owned(), ty)),
                    None => tracing::warn!(name = %func.name, "malformed forcing function"),
                }
                continue;
            }
            let ty = unit.flag(pool, func.ty);
            let symbol = match func.linkage_name {
                Some(linkage) => {
                    unit.function_aliases
                        .entry(func.name)
                        .or_insert_with(|| linkage.clone());
                    linkage
                }
                None => func.name,
            };
            unit.functions.insert(
                symbol,
                UnitFunction {
                    ty,
                    low_pc: func.address,
                },
            );
        }

        // Definitions win over prototypes of the same symbol.
        for (symbol, ty) in declared {
            let ty = unit.flag(pool, ty);
            unit.functions
                .entry(symbol)
                .or_insert(UnitFunction { ty, low_pc: None });
        }
        for (name, symbol) in label_aliases {
            if name != symbol {
                unit.function_aliases.entry(name).or_insert(symbol);
            }
        }
        unit.function_aliases
            .retain(|name, _| !unit.functions.contains_key(name));

        tracing::debug!(
            unit = %unit.name,
            types = unit.composites.len(),
            aliases = unit.aliases.len(),
            functions = unit.functions.len(),
            "unit built"
        );
        unit
    }

    fn flag(&self, pool: &mut TypePool, ty: TypeId) -> TypeId {
        if !self.use_last_error {
            return ty;
        }
        let Some(func) = pool.as_function(ty) else {
            return ty;
        };
        let flagged = FunctionType::new(
            func.ret(),
            func.params().iter().copied(),
            func.cc(),
            func.flags() | FunctionFlags::USE_LAST_ERROR,
        );
        pool.intern_function(flagged)
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn library(&self) -> Option<usize> {
        self.library
    }

    #[inline]
    pub fn uses_last_error(&self) -> bool {
        self.use_last_error
    }

    /// Declared struct, union and enum names, then typedef names.
    pub fn types(&self) -> Vec<&str> {
        let mut composites: Vec<&str> = self.composites.keys().map(String::as_str).collect();
        composites.sort_unstable();
        let mut aliases: Vec<&str> = self.aliases.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        composites.extend(aliases);
        composites
    }

    /// Function symbols, then source-name aliases.
    pub fn functions(&self) -> Vec<&str> {
        let mut functions: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        functions.sort_unstable();
        let mut aliases: Vec<&str> = self
            .function_aliases
            .keys()
            .map(String::as_str)
            .collect();
        aliases.sort_unstable();
        functions.extend(aliases);
        functions
    }

    /// Look up a type by typedef, tag or basic type name.
    pub fn get_type(&self, name: &str) -> Option<QualType> {
        if let Some(&qt) = self.aliases.get(name) {
            return Some(qt);
        }
        if let Some(&ty) = self.composites.get(name) {
            return Some(QualType::new(ty));
        }
        BasicKind::from_c_name(name).map(|kind| QualType::new(TypeId::basic(kind)))
    }

    pub fn get_struct(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        self.get_type(name)
            .map(QualType::ty)
            .filter(|&ty| pool.as_struct(ty).is_some())
    }

    pub fn get_union(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        self.get_type(name)
            .map(QualType::ty)
            .filter(|&ty| pool.as_union(ty).is_some())
    }

    pub fn get_enum(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        self.get_type(name)
            .map(QualType::ty)
            .filter(|&ty| pool.as_enum(ty).is_some())
    }

    pub fn get_function_type(&self, name: &str) -> Option<TypeId> {
        self.function(name).map(|(_, func)| func.ty)
    }

    /// The symbol `name` resolves to, and its entry.
    pub(crate) fn function(&self, name: &str) -> Option<(&str, UnitFunction)> {
        if let Some((symbol, func)) = self.functions.get_key_value(name) {
            return Some((symbol, *func));
        }
        let symbol = self.function_aliases.get(name)?;
        self.functions
            .get_key_value(symbol)
            .map(|(symbol, func)| (symbol.as_str(), *func))
    }

    /// Every distinct function type of the unit.
    pub(crate) fn function_types(&self) -> Vec<TypeId> {
        let mut types: Vec<TypeId> = self.functions.values().map(|func| func.ty).collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}

/// The function type a forcing function's only parameter points to.
fn forced_type(pool: &TypePool, forcing: TypeId) -> Option<TypeId> {
    let param = *pool.as_function(forcing)?.params().first()?;
    let pointee = pool.as_pointer(param.ty())?.ty();
    pool.as_function(pointee).map(|_| pointee)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
