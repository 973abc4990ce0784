//! Type graph node payloads.
//!
//! `TypeData` is the closed set of C type kinds. Basic, pointer, array and
//! function payloads are plain values used as interning keys. Struct, union
//! and enum payloads are identities: they start opaque and are defined once.

use std::collections::BTreeMap;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{BasicKind, CallingConv, QualType};

/// Kind discriminant for tag-driven dispatch.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum TypeKind {
    Basic = 0,
    Pointer = 1,
    Array = 2,
    Function = 3,
    // Composite range: Struct..=Union.
    Struct = 4,
    Union = 5,
    Enum = 6,
}

impl TypeKind {
    /// Struct or union: named fields at byte offsets.
    #[inline]
    pub const fn is_composite(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Union)
    }

    /// Kinds that may exist in a declared-but-undefined state.
    #[inline]
    pub const fn can_be_opaque(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Union | TypeKind::Enum)
    }

    pub const fn name(self) -> &'static str {
        match self {
            TypeKind::Basic => "basic",
            TypeKind::Pointer => "pointer",
            TypeKind::Array => "array",
            TypeKind::Function => "function",
            TypeKind::Struct => "struct",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
        }
    }
}

#[derive(Clone, Debug)]
pub enum TypeData {
    Basic(BasicKind),
    Pointer(QualType),
    Array(ArrayType),
    Function(FunctionType),
    Struct(CompositeType),
    Union(CompositeType),
    Enum(EnumType),
}

impl TypeData {
    pub const fn kind(&self) -> TypeKind {
        match self {
            TypeData::Basic(_) => TypeKind::Basic,
            TypeData::Pointer(_) => TypeKind::Pointer,
            TypeData::Array(_) => TypeKind::Array,
            TypeData::Function(_) => TypeKind::Function,
            TypeData::Struct(_) => TypeKind::Struct,
            TypeData::Union(_) => TypeKind::Union,
            TypeData::Enum(_) => TypeKind::Enum,
        }
    }
}

/// Fixed-size array: `elem[count]`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArrayType {
    pub elem: QualType,
    pub count: u64,
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FunctionFlags: u8 {
        /// Trailing `...` after the fixed parameters.
        const VARARGS = 1 << 0;
        /// Calls swap the thread's OS last-error value around the callee.
        const USE_LAST_ERROR = 1 << 1;
    }
}

/// Function signature. Every field is part of the interning key, so two
/// signatures differing only in calling convention are distinct types.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FunctionType {
    ret: QualType,
    params: SmallVec<[QualType; 4]>,
    cc: CallingConv,
    flags: FunctionFlags,
}

impl FunctionType {
    pub fn new(
        ret: QualType,
        params: impl IntoIterator<Item = QualType>,
        cc: CallingConv,
        flags: FunctionFlags,
    ) -> Self {
        Self {
            ret,
            params: params.into_iter().collect(),
            cc,
            flags,
        }
    }

    #[inline]
    pub fn ret(&self) -> QualType {
        self.ret
    }

    #[inline]
    pub fn params(&self) -> &[QualType] {
        &self.params
    }

    #[inline]
    pub fn cc(&self) -> CallingConv {
        self.cc
    }

    #[inline]
    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    #[inline]
    pub fn has_varargs(&self) -> bool {
        self.flags.contains(FunctionFlags::VARARGS)
    }

    #[inline]
    pub fn uses_last_error(&self) -> bool {
        self.flags.contains(FunctionFlags::USE_LAST_ERROR)
    }

    #[inline]
    pub fn returns_void(&self) -> bool {
        self.ret.ty().is_void()
    }
}

/// Bit placement of a bitfield inside the storage unit that starts at the
/// field's byte offset.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BitField {
    /// Bit offset from the least significant bit of the storage unit.
    pub offset: u32,
    pub width: u32,
}

/// A struct or union member.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Field {
    name: String,
    ty: QualType,
    offset: u64,
    bits: Option<BitField>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: QualType, offset: u64) -> Self {
        Self {
            name: name.into(),
            ty,
            offset,
            bits: None,
        }
    }

    pub fn bitfield(name: impl Into<String>, ty: QualType, offset: u64, bits: BitField) -> Self {
        Self {
            name: name.into(),
            ty,
            offset,
            bits: Some(bits),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> QualType {
        self.ty
    }

    /// Byte offset from the start of the enclosing composite.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn bits(&self) -> Option<BitField> {
        self.bits
    }

    /// Unnamed member (C11 anonymous struct/union).
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    #[must_use]
    pub(crate) fn shifted(&self, by: u64) -> Field {
        Field {
            offset: self.offset + by,
            ..self.clone()
        }
    }
}

/// Layout and members of a defined struct or union.
#[derive(Clone, Debug)]
pub struct CompositeBody {
    pub(crate) fields: Vec<Field>,
    pub(crate) size: u64,
    pub(crate) align: u32,
    /// Flattened members, anonymous composites inlined.
    pub(crate) flat: Vec<Field>,
    pub(crate) lookup: FxHashMap<String, usize>,
}

impl CompositeBody {
    pub(crate) fn new(fields: Vec<Field>, size: u64, align: u32) -> Self {
        let flat: Vec<Field> = fields.iter().filter(|f| !f.is_anonymous()).cloned().collect();
        let lookup = index_fields(&flat);
        Self {
            fields,
            size,
            align,
            flat,
            lookup,
        }
    }

    pub(crate) fn set_flat(&mut self, flat: Vec<Field>) {
        self.lookup = index_fields(&flat);
        self.flat = flat;
    }
}

fn index_fields(flat: &[Field]) -> FxHashMap<String, usize> {
    let mut lookup = FxHashMap::default();
    for (idx, field) in flat.iter().enumerate() {
        lookup.entry(field.name.clone()).or_insert(idx);
    }
    lookup
}

/// A struct or union. Created opaque, defined at most once.
#[derive(Clone, Debug)]
pub struct CompositeType {
    name: Option<String>,
    pub(crate) body: Option<CompositeBody>,
}

impl CompositeType {
    pub(crate) fn opaque(name: Option<String>) -> Self {
        Self { name, body: None }
    }

    /// Declared name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.body.is_none()
    }

    /// Size in bytes; 0 while opaque.
    pub fn size(&self) -> u64 {
        self.body.as_ref().map_or(0, |b| b.size)
    }

    /// Alignment in bytes; 1 while opaque.
    pub fn align(&self) -> u32 {
        self.body.as_ref().map_or(1, |b| b.align)
    }

    /// Declared members in order, anonymous ones included.
    pub fn org_fields(&self) -> &[Field] {
        self.body.as_ref().map_or(&[], |b| &b.fields)
    }

    /// Addressable members, with anonymous members flattened in.
    pub fn fields(&self) -> &[Field] {
        self.body.as_ref().map_or(&[], |b| &b.flat)
    }

    /// Look up an addressable member. Fails on opaque types.
    pub fn field(&self, name: &str) -> Option<&Field> {
        let body = self.body.as_ref()?;
        body.lookup.get(name).map(|&idx| &body.flat[idx])
    }
}

/// A C enumeration. Its representation is always `int`.
#[derive(Clone, Debug)]
pub struct EnumType {
    name: Option<String>,
    pub(crate) values: Option<BTreeMap<String, i64>>,
}

impl EnumType {
    pub(crate) fn opaque(name: Option<String>) -> Self {
        Self { name, values: None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.values.is_none()
    }

    /// Underlying integer kind.
    #[inline]
    pub const fn basic_kind(&self) -> BasicKind {
        BasicKind::Int
    }

    /// Enumerators, sorted by name.
    pub fn values(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values
            .iter()
            .flat_map(|values| values.iter().map(|(name, value)| (name.as_str(), *value)))
    }

    pub fn value(&self, name: &str) -> Option<i64> {
        self.values.as_ref()?.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
