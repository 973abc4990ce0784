//! Type handle.
//!
//! `TypeId` is a 32-bit index into a [`TypePool`](crate::TypePool). Interned
//! types (basic, pointer, array, function) have exactly one `TypeId` per
//! structural key, so equality of handles is equality of types. Composite
//! types get a fresh `TypeId` per declaration.

use std::fmt;

use crate::BasicKind;

/// A 32-bit index into the type pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Pre-interned basic types ===
    // Indices match `BasicKind` discriminants.

    pub const VOID: Self = Self::basic(BasicKind::Void);
    pub const BOOL: Self = Self::basic(BasicKind::Bool);
    pub const CHAR: Self = Self::basic(BasicKind::Char);
    pub const INT: Self = Self::basic(BasicKind::Int);
    pub const UINT: Self = Self::basic(BasicKind::UInt);
    pub const LONG: Self = Self::basic(BasicKind::Long);
    pub const FLOAT: Self = Self::basic(BasicKind::Float);
    pub const DOUBLE: Self = Self::basic(BasicKind::Double);

    /// First index handed out for non-basic types.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "basic kind count is fixed and small"
    )]
    pub const FIRST_DYNAMIC: u32 = BasicKind::COUNT as u32;

    /// The pre-interned handle of a basic kind.
    #[inline]
    pub const fn basic(kind: BasicKind) -> Self {
        Self(kind as u32)
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this handle names a pre-interned basic type.
    #[inline]
    pub const fn is_basic(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    #[inline]
    pub const fn is_void(self) -> bool {
        self.0 == Self::VOID.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_basic() {
            let kind = BasicKind::ALL[self.index()];
            write!(f, "TypeId({}: {kind})", self.0)
        } else {
            write!(f, "TypeId({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests;
