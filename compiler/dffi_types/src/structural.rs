//! Deep structural equality and hashing across type graphs.
//!
//! [`is_same`] compares two types that may live in unrelated graphs (two
//! compilation units, or two sessions). Composite comparisons are
//! coinductive: a pair already under comparison is assumed equal, which makes
//! mutually recursive structs terminate.
//!
//! [`structural_hash`] is consistent with [`is_same`]. A composite at the
//! root hashes its members; any composite reached below that contributes only
//! its shallow shape (kind, definedness, size, alignment, member count), so
//! hashing never follows a cycle.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashSet, FxHasher};

use crate::data::CompositeType;
use crate::stack::ensure_sufficient_stack;
use crate::{QualType, TypeData, TypeId, TypePool};

/// Structural equality of `a` in `lhs` and `b` in `rhs`.
pub fn is_same(lhs: &TypePool, a: TypeId, rhs: &TypePool, b: TypeId) -> bool {
    SameCx::new(lhs, rhs).same(a, b)
}

/// Structural equality of qualified types; qualifiers must match exactly.
pub fn is_same_qual(lhs: &TypePool, a: QualType, rhs: &TypePool, b: QualType) -> bool {
    SameCx::new(lhs, rhs).same_qual(a, b)
}

struct SameCx<'a> {
    lhs: &'a TypePool,
    rhs: &'a TypePool,
    in_progress: FxHashSet<(TypeId, TypeId)>,
}

impl<'a> SameCx<'a> {
    fn new(lhs: &'a TypePool, rhs: &'a TypePool) -> Self {
        Self {
            lhs,
            rhs,
            in_progress: FxHashSet::default(),
        }
    }

    fn same_qual(&mut self, a: QualType, b: QualType) -> bool {
        a.quals() == b.quals() && self.same(a.ty(), b.ty())
    }

    fn same(&mut self, a: TypeId, b: TypeId) -> bool {
        if std::ptr::eq(self.lhs, self.rhs) && a == b {
            return true;
        }
        let (lhs, rhs) = (self.lhs, self.rhs);
        ensure_sufficient_stack(|| match (lhs.get(a), rhs.get(b)) {
            (TypeData::Basic(x), TypeData::Basic(y)) => x == y,
            (TypeData::Pointer(x), TypeData::Pointer(y)) => self.same_qual(*x, *y),
            (TypeData::Array(x), TypeData::Array(y)) => {
                x.count == y.count && self.same_qual(x.elem, y.elem)
            }
            (TypeData::Function(x), TypeData::Function(y)) => {
                x.cc() == y.cc()
                    && x.flags() == y.flags()
                    && x.params().len() == y.params().len()
                    && self.same_qual(x.ret(), y.ret())
                    && x
                        .params()
                        .iter()
                        .zip(y.params())
                        .all(|(p, q)| self.same_qual(*p, *q))
            }
            (TypeData::Struct(x), TypeData::Struct(y)) | (TypeData::Union(x), TypeData::Union(y)) => {
                self.same_composite(a, x, b, y)
            }
            (TypeData::Enum(x), TypeData::Enum(y)) => x.values == y.values,
            _ => false,
        })
    }

    fn same_composite(
        &mut self,
        a: TypeId,
        x: &CompositeType,
        b: TypeId,
        y: &CompositeType,
    ) -> bool {
        match (x.is_opaque(), y.is_opaque()) {
            (true, true) => return true,
            (false, false) => {}
            _ => return false,
        }
        if !self.in_progress.insert((a, b)) {
            return true;
        }
        let (xs, ys) = (x.org_fields(), y.org_fields());
        x.size() == y.size()
            && x.align() == y.align()
            && xs.len() == ys.len()
            && xs.iter().zip(ys).all(|(f, g)| {
                f.name() == g.name()
                    && f.offset() == g.offset()
                    && f.bits() == g.bits()
                    && self.same_qual(f.ty(), g.ty())
            })
    }
}

/// Structural hash of a type; equal for any two types [`is_same`] accepts.
pub fn structural_hash(pool: &TypePool, id: TypeId) -> u64 {
    let mut hasher = FxHasher::default();
    hash_type(pool, id, true, &mut hasher);
    hasher.finish()
}

pub fn structural_hash_qual(pool: &TypePool, qt: QualType) -> u64 {
    let mut hasher = FxHasher::default();
    qt.quals().hash(&mut hasher);
    hash_type(pool, qt.ty(), true, &mut hasher);
    hasher.finish()
}

fn hash_qual(pool: &TypePool, qt: QualType, expand: bool, h: &mut FxHasher) {
    qt.quals().hash(h);
    hash_type(pool, qt.ty(), expand, h);
}

fn hash_type(pool: &TypePool, id: TypeId, expand: bool, h: &mut FxHasher) {
    let data = pool.get(id);
    data.kind().hash(h);
    ensure_sufficient_stack(|| match data {
        TypeData::Basic(kind) => kind.hash(h),
        TypeData::Pointer(pointee) => hash_qual(pool, *pointee, expand, h),
        TypeData::Array(array) => {
            array.count.hash(h);
            hash_qual(pool, array.elem, expand, h);
        }
        TypeData::Function(func) => {
            func.cc().hash(h);
            func.flags().hash(h);
            func.params().len().hash(h);
            hash_qual(pool, func.ret(), expand, h);
            for param in func.params() {
                hash_qual(pool, *param, expand, h);
            }
        }
        TypeData::Struct(c) | TypeData::Union(c) => {
            c.is_opaque().hash(h);
            c.size().hash(h);
            c.align().hash(h);
            c.org_fields().len().hash(h);
            if expand {
                for field in c.org_fields() {
                    field.name().hash(h);
                    field.offset().hash(h);
                    field.bits().hash(h);
                    hash_qual(pool, field.ty(), false, h);
                }
            }
        }
        TypeData::Enum(e) => {
            e.is_opaque().hash(h);
            for (name, value) in e.values() {
                name.hash(h);
                value.hash(h);
            }
        }
    });
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
