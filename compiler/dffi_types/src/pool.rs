//! Session-wide type arena and interning context.
//!
//! Every type node lives in the pool for the whole session and is addressed
//! by [`TypeId`]. Basic types are pre-interned at fixed indices; pointer,
//! array and function types are hash-consed on their full structural key;
//! struct, union and enum types get a fresh identity per declaration and go
//! through the declare-then-define protocol ([`TypePool::set_body`]).

use std::mem::{align_of, size_of};

use rustc_hash::FxHashMap;

use crate::data::{CompositeBody, CompositeType, EnumType};
use crate::{
    ArrayType, BasicKind, CallingConv, Field, FunctionFlags, FunctionType, LayoutError, QualType,
    TypeData, TypeId, TypeKind,
};

pub struct TypePool {
    types: Vec<TypeData>,
    pointers: FxHashMap<QualType, TypeId>,
    arrays: FxHashMap<ArrayType, TypeId>,
    functions: FxHashMap<FunctionType, TypeId>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with every basic kind pre-interned.
    pub fn new() -> Self {
        let mut types = Vec::with_capacity(256);
        types.extend(BasicKind::ALL.iter().map(|&kind| TypeData::Basic(kind)));
        Self {
            types,
            pointers: FxHashMap::default(),
            arrays: FxHashMap::default(),
            functions: FxHashMap::default(),
        }
    }

    /// Number of type nodes, basic ones included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn push(&mut self, data: TypeData) -> TypeId {
        let Ok(raw) = u32::try_from(self.types.len()) else {
            tracing::error!("type pool exhausted");
            panic!("type pool exceeded u32::MAX entries");
        };
        self.types.push(data);
        TypeId::from_raw(raw)
    }

    // === Interned constructors ===

    /// The session singleton for a basic kind.
    #[inline]
    pub fn basic(&self, kind: BasicKind) -> TypeId {
        TypeId::basic(kind)
    }

    pub fn pointer(&mut self, pointee: impl Into<QualType>) -> TypeId {
        let pointee = pointee.into();
        if let Some(&id) = self.pointers.get(&pointee) {
            return id;
        }
        let id = self.push(TypeData::Pointer(pointee));
        self.pointers.insert(pointee, id);
        id
    }

    pub fn array(&mut self, elem: impl Into<QualType>, count: u64) -> TypeId {
        let key = ArrayType {
            elem: elem.into(),
            count,
        };
        if let Some(&id) = self.arrays.get(&key) {
            return id;
        }
        let id = self.push(TypeData::Array(key));
        self.arrays.insert(key, id);
        id
    }

    /// Intern a plain function signature.
    pub fn function(
        &mut self,
        ret: impl Into<QualType>,
        params: &[QualType],
        cc: CallingConv,
        varargs: bool,
    ) -> TypeId {
        let flags = if varargs {
            FunctionFlags::VARARGS
        } else {
            FunctionFlags::empty()
        };
        self.intern_function(FunctionType::new(
            ret.into(),
            params.iter().copied(),
            cc,
            flags,
        ))
    }

    pub fn intern_function(&mut self, key: FunctionType) -> TypeId {
        if let Some(&id) = self.functions.get(&key) {
            return id;
        }
        let id = self.push(TypeData::Function(key.clone()));
        self.functions.insert(key, id);
        id
    }

    // === Declared (non-interned) types ===

    /// Declare a fresh, opaque struct.
    pub fn declare_struct(&mut self, name: Option<&str>) -> TypeId {
        self.push(TypeData::Struct(CompositeType::opaque(name.map(str::to_owned))))
    }

    /// Declare a fresh, opaque union.
    pub fn declare_union(&mut self, name: Option<&str>) -> TypeId {
        self.push(TypeData::Union(CompositeType::opaque(name.map(str::to_owned))))
    }

    /// Declare a fresh, opaque enum.
    pub fn declare_enum(&mut self, name: Option<&str>) -> TypeId {
        self.push(TypeData::Enum(EnumType::opaque(name.map(str::to_owned))))
    }

    /// Define an opaque struct or union. Transitions to defined exactly once.
    pub fn set_body(
        &mut self,
        id: TypeId,
        fields: Vec<Field>,
        size: u64,
        align: u32,
    ) -> Result<(), LayoutError> {
        let kind = self.kind(id);
        let composite = match &mut self.types[id.index()] {
            TypeData::Struct(c) | TypeData::Union(c) => c,
            _ => return Err(LayoutError::wrong_kind(id, kind, "struct or union")),
        };
        if !composite.is_opaque() {
            return Err(LayoutError::AlreadyDefined { ty: id });
        }
        if kind == TypeKind::Union {
            if let Some(field) = fields.iter().find(|f| f.offset() != 0) {
                return Err(LayoutError::UnionFieldOffset {
                    field: field.name().to_owned(),
                    offset: field.offset(),
                });
            }
        }
        composite.body = Some(CompositeBody::new(fields, size, align.max(1)));
        Ok(())
    }

    /// Define an opaque enum.
    pub fn set_enum_body(
        &mut self,
        id: TypeId,
        values: impl IntoIterator<Item = (String, i64)>,
    ) -> Result<(), LayoutError> {
        let kind = self.kind(id);
        let TypeData::Enum(enum_ty) = &mut self.types[id.index()] else {
            return Err(LayoutError::wrong_kind(id, kind, "enum"));
        };
        if !enum_ty.is_opaque() {
            return Err(LayoutError::AlreadyDefined { ty: id });
        }
        enum_ty.values = Some(values.into_iter().collect());
        Ok(())
    }

    pub(crate) fn body_mut(&mut self, id: TypeId) -> Option<&mut CompositeBody> {
        match &mut self.types[id.index()] {
            TypeData::Struct(c) | TypeData::Union(c) => c.body.as_mut(),
            _ => None,
        }
    }

    // === Accessors ===

    #[inline]
    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.get(id).kind()
    }

    pub fn as_basic(&self, id: TypeId) -> Option<BasicKind> {
        match self.get(id) {
            TypeData::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_pointer(&self, id: TypeId) -> Option<QualType> {
        match self.get(id) {
            TypeData::Pointer(pointee) => Some(*pointee),
            _ => None,
        }
    }

    pub fn as_array(&self, id: TypeId) -> Option<&ArrayType> {
        match self.get(id) {
            TypeData::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_function(&self, id: TypeId) -> Option<&FunctionType> {
        match self.get(id) {
            TypeData::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_struct(&self, id: TypeId) -> Option<&CompositeType> {
        match self.get(id) {
            TypeData::Struct(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_union(&self, id: TypeId) -> Option<&CompositeType> {
        match self.get(id) {
            TypeData::Union(c) => Some(c),
            _ => None,
        }
    }

    /// Struct or union.
    pub fn as_composite(&self, id: TypeId) -> Option<&CompositeType> {
        match self.get(id) {
            TypeData::Struct(c) | TypeData::Union(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_enum(&self, id: TypeId) -> Option<&EnumType> {
        match self.get(id) {
            TypeData::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Whether a struct, union or enum is still undefined.
    pub fn is_opaque(&self, id: TypeId) -> bool {
        match self.get(id) {
            TypeData::Struct(c) | TypeData::Union(c) => c.is_opaque(),
            TypeData::Enum(e) => e.is_opaque(),
            _ => false,
        }
    }

    /// Declared name of a struct, union or enum.
    pub fn type_name(&self, id: TypeId) -> Option<&str> {
        match self.get(id) {
            TypeData::Struct(c) | TypeData::Union(c) => c.name(),
            TypeData::Enum(e) => e.name(),
            _ => None,
        }
    }

    // === Layout ===

    /// Size in bytes. Opaque composites and functions report 0.
    pub fn size(&self, id: TypeId) -> u64 {
        match self.get(id) {
            TypeData::Basic(kind) => kind.size(),
            TypeData::Pointer(_) => size_of::<*const ()>() as u64,
            TypeData::Array(array) => self.size(array.elem.ty()).saturating_mul(array.count),
            TypeData::Function(_) => 0,
            TypeData::Struct(c) | TypeData::Union(c) => c.size(),
            TypeData::Enum(e) => e.basic_kind().size(),
        }
    }

    /// Alignment in bytes.
    pub fn align(&self, id: TypeId) -> u32 {
        match self.get(id) {
            TypeData::Basic(kind) => kind.align(),
            #[expect(
                clippy::cast_possible_truncation,
                reason = "pointer alignment is tiny"
            )]
            TypeData::Pointer(_) => align_of::<*const ()>() as u32,
            TypeData::Array(array) => self.align(array.elem.ty()),
            TypeData::Function(_) => 1,
            TypeData::Struct(c) | TypeData::Union(c) => c.align(),
            TypeData::Enum(e) => e.basic_kind().align(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
