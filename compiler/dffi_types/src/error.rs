//! Errors raised while defining composite types.

use thiserror::Error;

use crate::{TypeId, TypeKind};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum LayoutError {
    #[error("{ty:?} is a {kind} type, not a {expected}")]
    WrongKind {
        ty: TypeId,
        kind: &'static str,
        expected: &'static str,
    },
    #[error("{ty:?} is already defined")]
    AlreadyDefined { ty: TypeId },
    #[error("union member `{field}` has non-zero offset {offset}")]
    UnionFieldOffset { field: String, offset: u64 },
}

impl LayoutError {
    pub(crate) fn wrong_kind(ty: TypeId, kind: TypeKind, expected: &'static str) -> Self {
        LayoutError::WrongKind {
            ty,
            kind: kind.name(),
            expected,
        }
    }
}
