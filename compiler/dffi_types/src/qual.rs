//! Qualified types.
//!
//! A [`QualType`] pairs a type handle with its qualifiers. Only `const` is
//! tracked: `volatile` and `restrict` carry no layout or marshaling meaning
//! and are stripped during type recovery.

use bitflags::bitflags;
use thiserror::Error;

use crate::TypeId;

bitflags! {
    /// Type qualifiers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 1 << 0;
    }
}

/// A type reference plus qualifiers. Equality and hashing use both.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct QualType {
    ty: TypeId,
    quals: Qualifiers,
}

impl QualType {
    /// An unqualified type.
    #[inline]
    pub const fn new(ty: TypeId) -> Self {
        Self {
            ty,
            quals: Qualifiers::empty(),
        }
    }

    #[inline]
    pub const fn with_quals(ty: TypeId, quals: Qualifiers) -> Self {
        Self { ty, quals }
    }

    #[inline]
    pub const fn ty(self) -> TypeId {
        self.ty
    }

    #[inline]
    pub const fn quals(self) -> Qualifiers {
        self.quals
    }

    #[inline]
    pub const fn is_const(self) -> bool {
        self.quals.contains(Qualifiers::CONST)
    }

    #[must_use]
    #[inline]
    pub const fn with_const(self) -> Self {
        Self {
            ty: self.ty,
            quals: self.quals.union(Qualifiers::CONST),
        }
    }

    #[must_use]
    #[inline]
    pub const fn unqualified(self) -> Self {
        Self::new(self.ty)
    }

    /// Fails when memory of this type must not be written.
    pub fn check_writable(self) -> Result<(), ConstViolation> {
        if self.is_const() {
            Err(ConstViolation::WriteToConst)
        } else {
            Ok(())
        }
    }

    /// Fails when a pointer to `self` would be converted to a pointer to
    /// `target` while dropping `const`.
    pub fn check_pointee_conversion(self, target: QualType) -> Result<(), ConstViolation> {
        if self.is_const() && !target.is_const() {
            Err(ConstViolation::DropsConst)
        } else {
            Ok(())
        }
    }
}

impl From<TypeId> for QualType {
    fn from(ty: TypeId) -> Self {
        Self::new(ty)
    }
}

/// Const-correctness violation, reported to the value-conversion layer.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum ConstViolation {
    #[error("cannot write through a const-qualified location")]
    WriteToConst,
    #[error("cannot convert a pointer to const into a pointer to non-const")]
    DropsConst,
}

#[cfg(test)]
mod tests;
