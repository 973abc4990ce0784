//! C type graph for the dynamic FFI.
//!
//! Every C type a session knows about lives in one [`TypePool`] and is
//! addressed by a [`TypeId`]:
//! - Basic types are pre-interned singletons at fixed ids
//! - Pointer, array and function types are interned by structure
//! - Struct, union and enum types are identities, declared opaque and
//!   defined at most once
//!
//! Qualifiers ride on the edge ([`QualType`]) rather than the node, so
//! `const int` and `int` share one id.
//!
//! [`is_same`] and [`structural_hash`] compare graphs built in different
//! pools, which is how units compiled separately are reconciled.

mod basic;
mod bitfield;
mod cconv;
mod data;
mod error;
mod id;
mod inline;
mod pool;
mod printer;
mod qual;
mod stack;
mod structural;

pub use basic::{BasicKind, HOST_CHAR_SIGNED};
pub use bitfield::{read_bits, sign_extend, write_bits};
pub use cconv::CallingConv;
pub use data::{
    ArrayType, BitField, CompositeType, EnumType, Field, FunctionFlags, FunctionType, TypeData,
    TypeKind,
};
pub use error::LayoutError;
pub use id::TypeId;
pub use inline::inline_anonymous_members;
pub use pool::TypePool;
pub use printer::{DeclMode, DeclPrinter};
pub use qual::{ConstViolation, QualType, Qualifiers};
pub use stack::ensure_sufficient_stack;
pub use structural::{is_same, is_same_qual, structural_hash, structural_hash_qual};

// Both are copied into every interning key and member.
const _: () = assert!(std::mem::size_of::<TypeId>() == 4);
const _: () = assert!(std::mem::size_of::<QualType>() == 8);
