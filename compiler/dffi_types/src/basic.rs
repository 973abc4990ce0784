//! Basic (scalar) C types.
//!
//! Every basic kind is pre-interned in the pool at a fixed index, so the
//! `TypeId` of a basic type is known without a pool lookup. Sizes and
//! alignments are those of the host ABI; they are never parsed from
//! compiler output.

use std::ffi::{c_char, c_int, c_long, c_longlong, c_short};
use std::fmt;
use std::mem::{align_of, size_of};

/// Whether plain `char` is signed on the host.
pub const HOST_CHAR_SIGNED: bool = c_char::MIN != 0;

/// Scalar C type kind.
///
/// `Void` only appears as a function return type or a pointee.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
#[repr(u8)]
pub enum BasicKind {
    Void = 0,
    Bool,
    Char,
    SChar,
    Short,
    Int,
    Long,
    LongLong,
    Int128,
    UChar,
    UShort,
    UInt,
    ULong,
    ULongLong,
    UInt128,
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
}

// long double and its complex counterpart depend on the target ABI.
#[cfg(all(
    any(target_arch = "x86_64", target_arch = "aarch64"),
    not(any(windows, target_vendor = "apple"))
))]
const LONG_DOUBLE_LAYOUT: (u64, u32) = (16, 16);
#[cfg(all(target_arch = "x86", not(windows)))]
const LONG_DOUBLE_LAYOUT: (u64, u32) = (12, 4);
#[cfg(not(any(
    all(
        any(target_arch = "x86_64", target_arch = "aarch64"),
        not(any(windows, target_vendor = "apple"))
    ),
    all(target_arch = "x86", not(windows))
)))]
const LONG_DOUBLE_LAYOUT: (u64, u32) = (8, 8);

#[cfg(target_pointer_width = "64")]
const INT128_ALIGN: u32 = 16;
#[cfg(not(target_pointer_width = "64"))]
const INT128_ALIGN: u32 = 8;

impl BasicKind {
    /// Number of basic kinds (and of pre-interned pool slots).
    pub const COUNT: usize = 21;

    /// All kinds, in pool index order.
    pub const ALL: [BasicKind; Self::COUNT] = [
        BasicKind::Void,
        BasicKind::Bool,
        BasicKind::Char,
        BasicKind::SChar,
        BasicKind::Short,
        BasicKind::Int,
        BasicKind::Long,
        BasicKind::LongLong,
        BasicKind::Int128,
        BasicKind::UChar,
        BasicKind::UShort,
        BasicKind::UInt,
        BasicKind::ULong,
        BasicKind::ULongLong,
        BasicKind::UInt128,
        BasicKind::Float,
        BasicKind::Double,
        BasicKind::LongDouble,
        BasicKind::ComplexFloat,
        BasicKind::ComplexDouble,
        BasicKind::ComplexLongDouble,
    ];

    /// Size in bytes. `Void` has size 0.
    pub const fn size(self) -> u64 {
        match self {
            BasicKind::Void => 0,
            BasicKind::Bool | BasicKind::Char | BasicKind::SChar | BasicKind::UChar => 1,
            BasicKind::Short | BasicKind::UShort => size_of::<c_short>() as u64,
            BasicKind::Int | BasicKind::UInt => size_of::<c_int>() as u64,
            BasicKind::Long | BasicKind::ULong => size_of::<c_long>() as u64,
            BasicKind::LongLong | BasicKind::ULongLong => size_of::<c_longlong>() as u64,
            BasicKind::Int128 | BasicKind::UInt128 => 16,
            BasicKind::Float => 4,
            BasicKind::Double => 8,
            BasicKind::LongDouble => LONG_DOUBLE_LAYOUT.0,
            BasicKind::ComplexFloat => 8,
            BasicKind::ComplexDouble => 16,
            BasicKind::ComplexLongDouble => LONG_DOUBLE_LAYOUT.0 * 2,
        }
    }

    /// Alignment in bytes. `Void` reports 1.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "C scalar alignments are tiny"
    )]
    pub const fn align(self) -> u32 {
        match self {
            BasicKind::Void
            | BasicKind::Bool
            | BasicKind::Char
            | BasicKind::SChar
            | BasicKind::UChar => 1,
            BasicKind::Short | BasicKind::UShort => align_of::<c_short>() as u32,
            BasicKind::Int | BasicKind::UInt => align_of::<c_int>() as u32,
            BasicKind::Long | BasicKind::ULong => align_of::<c_long>() as u32,
            BasicKind::LongLong | BasicKind::ULongLong => align_of::<c_longlong>() as u32,
            BasicKind::Int128 | BasicKind::UInt128 => INT128_ALIGN,
            BasicKind::Float | BasicKind::ComplexFloat => align_of::<f32>() as u32,
            BasicKind::Double | BasicKind::ComplexDouble => align_of::<f64>() as u32,
            BasicKind::LongDouble | BasicKind::ComplexLongDouble => LONG_DOUBLE_LAYOUT.1,
        }
    }

    /// C spelling of the type.
    pub const fn c_name(self) -> &'static str {
        match self {
            BasicKind::Void => "void",
            BasicKind::Bool => "_Bool",
            BasicKind::Char => "char",
            BasicKind::SChar => "signed char",
            BasicKind::Short => "short",
            BasicKind::Int => "int",
            BasicKind::Long => "long",
            BasicKind::LongLong => "long long",
            BasicKind::Int128 => "__int128_t",
            BasicKind::UChar => "unsigned char",
            BasicKind::UShort => "unsigned short",
            BasicKind::UInt => "unsigned int",
            BasicKind::ULong => "unsigned long",
            BasicKind::ULongLong => "unsigned long long",
            BasicKind::UInt128 => "__uint128_t",
            BasicKind::Float => "float",
            BasicKind::Double => "double",
            BasicKind::LongDouble => "long double",
            BasicKind::ComplexFloat => "_Complex float",
            BasicKind::ComplexDouble => "_Complex double",
            BasicKind::ComplexLongDouble => "_Complex long double",
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Bool
                | BasicKind::Char
                | BasicKind::SChar
                | BasicKind::Short
                | BasicKind::Int
                | BasicKind::Long
                | BasicKind::LongLong
                | BasicKind::Int128
                | BasicKind::UChar
                | BasicKind::UShort
                | BasicKind::UInt
                | BasicKind::ULong
                | BasicKind::ULongLong
                | BasicKind::UInt128
        )
    }

    /// Whether values of this kind are sign-extended.
    #[inline]
    pub const fn is_signed(self) -> bool {
        match self {
            BasicKind::Char => HOST_CHAR_SIGNED,
            BasicKind::SChar
            | BasicKind::Short
            | BasicKind::Int
            | BasicKind::Long
            | BasicKind::LongLong
            | BasicKind::Int128
            | BasicKind::Float
            | BasicKind::Double
            | BasicKind::LongDouble
            | BasicKind::ComplexFloat
            | BasicKind::ComplexDouble
            | BasicKind::ComplexLongDouble => true,
            _ => false,
        }
    }

    /// Integer kind of the given byte size, preferring the shortest C
    /// spelling when two kinds share a size.
    pub fn from_int_size(size: u64, signed: bool) -> Option<BasicKind> {
        let candidates: &[BasicKind] = if signed {
            &[
                BasicKind::SChar,
                BasicKind::Short,
                BasicKind::Int,
                BasicKind::Long,
                BasicKind::LongLong,
                BasicKind::Int128,
            ]
        } else {
            &[
                BasicKind::UChar,
                BasicKind::UShort,
                BasicKind::UInt,
                BasicKind::ULong,
                BasicKind::ULongLong,
                BasicKind::UInt128,
            ]
        };
        candidates.iter().copied().find(|k| k.size() == size)
    }

    /// Floating-point kind of the given byte size.
    pub fn from_float_size(size: u64) -> Option<BasicKind> {
        [BasicKind::Float, BasicKind::Double, BasicKind::LongDouble]
            .into_iter()
            .find(|k| k.size() == size)
    }

    /// Kind spelled `name` in C. Only the spellings [`BasicKind::c_name`]
    /// produces are recognized, plus `signed` and `unsigned` alone.
    pub fn from_c_name(name: &str) -> Option<BasicKind> {
        match name {
            "signed" | "signed int" => return Some(BasicKind::Int),
            "unsigned" => return Some(BasicKind::UInt),
            "bool" => return Some(BasicKind::Bool),
            _ => {}
        }
        BasicKind::ALL.into_iter().find(|kind| kind.c_name() == name)
    }

    /// Complex kind of the given byte size.
    pub fn from_complex_size(size: u64) -> Option<BasicKind> {
        [
            BasicKind::ComplexFloat,
            BasicKind::ComplexDouble,
            BasicKind::ComplexLongDouble,
        ]
        .into_iter()
        .find(|k| k.size() == size)
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

#[cfg(test)]
mod tests;
