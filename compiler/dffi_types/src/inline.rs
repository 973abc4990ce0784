//! Anonymous member inlining.
//!
//! C11 lets the members of an unnamed struct or union member be addressed
//! directly on the enclosing type. After a batch of composites is defined,
//! each one's flattened member list replaces every anonymous composite member
//! with the nested type's own flattened members, shifted by the anonymous
//! member's offset. The declared member list is left untouched for the
//! declaration printer.

use rustc_hash::FxHashSet;

use crate::stack::ensure_sufficient_stack;
use crate::{TypeId, TypePool};

/// Flatten anonymous members of `roots` and of every composite they reach
/// through anonymous members. Each composite is processed at most once.
#[tracing::instrument(level = "debug", skip_all, fields(roots = roots.len()))]
pub fn inline_anonymous_members(pool: &mut TypePool, roots: &[TypeId]) {
    let mut visited = FxHashSet::default();
    for &root in roots {
        visit(pool, root, &mut visited);
    }
}

fn visit(pool: &mut TypePool, id: TypeId, visited: &mut FxHashSet<TypeId>) {
    if !visited.insert(id) {
        return;
    }
    let Some(composite) = pool.as_composite(id) else {
        return;
    };
    if composite.is_opaque() {
        return;
    }

    // Post-order: nested anonymous composites are flattened first.
    let nested: Vec<TypeId> = composite
        .org_fields()
        .iter()
        .filter(|f| f.is_anonymous())
        .map(|f| f.ty().ty())
        .filter(|&ty| pool.kind(ty).is_composite())
        .collect();
    if nested.is_empty() {
        return;
    }
    for child in nested {
        ensure_sufficient_stack(|| visit(pool, child, visited));
    }

    let Some(composite) = pool.as_composite(id) else {
        return;
    };
    let mut flat = Vec::with_capacity(composite.org_fields().len());
    for field in composite.org_fields() {
        if !field.is_anonymous() {
            flat.push(field.clone());
            continue;
        }
        match pool.as_composite(field.ty().ty()) {
            Some(inner) => {
                flat.extend(inner.fields().iter().map(|f| f.shifted(field.offset())));
            }
            None => tracing::debug!(ty = ?id, "unnamed non-composite member left out of lookup"),
        }
    }
    tracing::debug!(ty = ?id, members = flat.len(), "flattened anonymous members");
    if let Some(body) = pool.body_mut(id) {
        body.set_flat(flat);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
