//! C declaration printer.
//!
//! Renders type-graph nodes back to compilable C. Declarators are composed
//! right to left around a name placeholder: a pointer wraps the name as
//! `(*name)`, an array appends `[N]`, a function appends its parameter list
//! and injects its calling-convention attribute. The result is then handed to
//! the printer of the inner type.
//!
//! Struct, union and enum types are renamed `__dffi_ty_N` on first use. The
//! name is stable for the lifetime of one printer, which covers one batch of
//! generated source. Declarations needed by printed definitions accumulate in
//! [`DeclPrinter::decls`], forward declarations for types only reached through
//! pointers, full ones for types used by value.
//!
//! Composite declarations reproduce the recorded layout, not the natural one.
//! A gap before a member becomes an `aligned` attribute when that alone lands
//! the member on its offset, and a `char` padding array otherwise. Members off
//! their natural alignment make the whole composite `packed`.

use std::fmt::Write as _;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::data::CompositeType;
use crate::stack::ensure_sufficient_stack;
use crate::{BasicKind, QualType, TypeData, TypeId, TypePool};

/// How much of a struct/union/enum a printed reference requires.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DeclMode {
    /// Print the reference only.
    None,
    /// The type must at least be forward-declared.
    Forward,
    /// The type must be fully declared.
    Full,
}

#[derive(Default)]
pub struct DeclPrinter {
    decls: String,
    declared: FxHashSet<TypeId>,
    forward_declared: FxHashSet<TypeId>,
    names: FxHashMap<TypeId, String>,
    enums_as_int: bool,
}

impl DeclPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print enums as their underlying `int`. Used for wrapper sources,
    /// where enumerator names from unrelated units may clash.
    #[must_use]
    pub fn with_enums_as_int(mut self) -> Self {
        self.enums_as_int = true;
        self
    }

    /// Declarations accumulated so far.
    pub fn decls(&self) -> &str {
        &self.decls
    }

    /// Declarations followed by `body`.
    pub fn into_source(self, body: &str) -> String {
        let mut source = self.decls;
        source.push('\n');
        source.push_str(body);
        source
    }

    /// Render `qt` declaring `name`, fully declaring every type it uses.
    pub fn print(&mut self, pool: &TypePool, qt: QualType, name: Option<&str>) -> String {
        let mut out = String::new();
        self.print_def(pool, &mut out, qt, DeclMode::Full, name);
        out
    }

    /// Append the declarator of `qt` around `name` to `out`.
    pub fn print_def(
        &mut self,
        pool: &TypePool,
        out: &mut String,
        qt: QualType,
        mode: DeclMode,
        name: Option<&str>,
    ) {
        ensure_sufficient_stack(|| self.print_def_inner(pool, out, qt, mode, name));
    }

    fn print_def_inner(
        &mut self,
        pool: &TypePool,
        out: &mut String,
        qt: QualType,
        mode: DeclMode,
        name: Option<&str>,
    ) {
        let ty = qt.ty();
        let int_view = TypeData::Basic(BasicKind::Int);
        let data = match pool.get(ty) {
            TypeData::Enum(_) if self.enums_as_int => &int_view,
            data => data,
        };
        match data {
            TypeData::Basic(kind) => {
                if qt.is_const() {
                    out.push_str("const ");
                }
                out.push_str(kind.c_name());
                push_name(out, name);
            }
            TypeData::Pointer(pointee) => {
                let mut ptr_name = String::from("(*");
                if qt.is_const() {
                    ptr_name.push_str("const");
                    if name.is_some() {
                        ptr_name.push(' ');
                    }
                }
                ptr_name.push_str(name.unwrap_or_default());
                ptr_name.push(')');
                self.print_def(pool, out, *pointee, DeclMode::Forward, Some(&ptr_name));
            }
            TypeData::Function(func) => {
                let mut decl = String::from("(");
                let attr = func.cc().clang_attribute();
                if !attr.is_empty() {
                    decl.push_str(attr.trim_start());
                    decl.push(' ');
                }
                decl.push_str(name.unwrap_or_default());
                decl.push_str(")(");
                let params = func.params();
                if params.is_empty() && !func.has_varargs() {
                    decl.push_str("void");
                }
                for (idx, param) in params.iter().enumerate() {
                    if idx > 0 {
                        decl.push(',');
                    }
                    self.print_def(pool, &mut decl, *param, DeclMode::Full, None);
                }
                if func.has_varargs() {
                    decl.push_str(if params.is_empty() { "..." } else { ",..." });
                }
                decl.push(')');
                self.print_def(pool, out, func.ret(), DeclMode::Full, Some(&decl));
            }
            TypeData::Array(array) => {
                let mut arr_name = name.unwrap_or_default().to_owned();
                let _ = write!(arr_name, "[{}]", array.count);
                self.print_def(pool, out, array.elem, DeclMode::Full, Some(&arr_name));
            }
            TypeData::Struct(_) | TypeData::Union(_) | TypeData::Enum(_) => {
                match mode {
                    DeclMode::Full => self.add_decl(pool, ty),
                    DeclMode::Forward => self.add_forward_decl(pool, ty),
                    DeclMode::None => {}
                }
                if qt.is_const() {
                    out.push_str("const ");
                }
                out.push_str(tag_keyword(data));
                out.push(' ');
                out.push_str(self.name_of(ty));
                push_name(out, name);
            }
        }
    }

    fn name_of(&mut self, ty: TypeId) -> &str {
        let next = self.names.len();
        self.names
            .entry(ty)
            .or_insert_with(|| format!("__dffi_ty_{next}"))
    }

    fn add_decl(&mut self, pool: &TypePool, ty: TypeId) {
        if pool.is_opaque(ty) {
            self.add_forward_decl(pool, ty);
            return;
        }
        if !self.declared.insert(ty) {
            return;
        }
        let mut decl = String::new();
        match pool.get(ty) {
            TypeData::Struct(c) | TypeData::Union(c) => {
                self.print_composite_decl(pool, &mut decl, ty, c);
            }
            TypeData::Enum(_) => self.print_enum_decl(pool, &mut decl, ty),
            _ => return,
        }
        self.decls.push_str(&decl);
        self.decls.push('\n');
    }

    fn add_forward_decl(&mut self, pool: &TypePool, ty: TypeId) {
        if self.declared.contains(&ty) || !self.forward_declared.insert(ty) {
            return;
        }
        let mut decl = String::new();
        self.print_def(pool, &mut decl, QualType::new(ty), DeclMode::None, None);
        self.decls.push_str(&decl);
        self.decls.push_str(";\n");
    }

    fn print_composite_decl(
        &mut self,
        pool: &TypePool,
        out: &mut String,
        ty: TypeId,
        composite: &CompositeType,
    ) {
        self.print_def(pool, out, QualType::new(ty), DeclMode::None, None);
        out.push_str(" {\n");
        let is_union = matches!(pool.get(ty), TypeData::Union(_));
        let packed = needs_packing(pool, composite);
        let mut layout = Layout::new();
        for (idx, field) in composite.org_fields().iter().enumerate() {
            let field_ty = field.ty().ty();
            let natural = if packed {
                1
            } else {
                u64::from(pool.align(field_ty).max(1))
            };
            let start = if is_union { 0 } else { layout.cursor };
            let name = format!("__Field_{idx}");
            out.push_str("  ");
            if let Some(bits) = field.bits() {
                self.print_def(pool, out, field.ty(), DeclMode::Full, Some(&name));
                let _ = write!(out, " : {}", bits.width);
                let used = (u64::from(bits.offset) + u64::from(bits.width)).div_ceil(8);
                layout.place(field.offset() + used, natural);
                out.push_str(";\n");
                continue;
            }

            let offset = field.offset();
            let mut align = natural;
            let mut over_aligned = false;
            if offset > start.next_multiple_of(natural) {
                let step = 1u64 << offset.trailing_zeros();
                if !packed && step > natural && start.next_multiple_of(step) == offset {
                    align = step;
                    over_aligned = true;
                } else {
                    layout.pad(out, offset - start);
                    out.push_str("  ");
                }
            }
            self.print_def(pool, out, field.ty(), DeclMode::Full, Some(&name));
            if over_aligned {
                let _ = write!(out, " __attribute__((aligned({align})))");
            }
            out.push_str(";\n");
            layout.place(offset + pool.size(field_ty), align);
        }

        let size = composite.size();
        let recorded = u64::from(composite.align()).max(1);
        let widen = if packed {
            recorded > 1 && size % recorded == 0
        } else {
            recorded > layout.align
        };
        if widen {
            layout.align = recorded;
        }
        if layout.cursor < size && layout.cursor.next_multiple_of(layout.align) != size {
            let tail = if is_union { size } else { size - layout.cursor };
            out.push_str("  ");
            layout.pad(out, tail);
        }
        out.push('}');
        match (packed, widen) {
            (true, true) => {
                let _ = write!(out, " __attribute__((packed, aligned({recorded})))");
            }
            (true, false) => out.push_str(" __attribute__((packed))"),
            (false, true) => {
                let _ = write!(out, " __attribute__((aligned({recorded})))");
            }
            (false, false) => {}
        }
        out.push_str(";\n");
    }

    fn print_enum_decl(&mut self, pool: &TypePool, out: &mut String, ty: TypeId) {
        self.print_def(pool, out, QualType::new(ty), DeclMode::None, None);
        out.push_str(" {\n");
        if let Some(enum_ty) = pool.as_enum(ty) {
            for (name, value) in enum_ty.values() {
                let _ = writeln!(out, "  {name} = {value},");
            }
        }
        out.push_str("};\n");
    }
}

/// Running end and alignment of the members printed so far.
struct Layout {
    cursor: u64,
    align: u64,
    pads: usize,
}

impl Layout {
    fn new() -> Self {
        Self {
            cursor: 0,
            align: 1,
            pads: 0,
        }
    }

    fn place(&mut self, end: u64, align: u64) {
        self.cursor = self.cursor.max(end);
        self.align = self.align.max(align);
    }

    /// Emit a `char` array member of `len` bytes.
    fn pad(&mut self, out: &mut String, len: u64) {
        let _ = writeln!(out, "char __Pad_{}[{len}];", self.pads);
        self.pads += 1;
        self.cursor += len;
    }
}

fn push_name(out: &mut String, name: Option<&str>) {
    if let Some(name) = name {
        out.push(' ');
        out.push_str(name);
    }
}

fn tag_keyword(data: &TypeData) -> &'static str {
    match data {
        TypeData::Union(_) => "union",
        TypeData::Enum(_) => "enum",
        _ => "struct",
    }
}

/// Whether the members must be laid out without natural alignment: a member
/// sits off its alignment, or the size is not a multiple of it.
fn needs_packing(pool: &TypePool, composite: &CompositeType) -> bool {
    let mut natural_align = 1;
    for field in composite.org_fields() {
        let align = u64::from(pool.align(field.ty().ty()).max(1));
        natural_align = natural_align.max(align);
        if field.bits().is_none() && field.offset() % align != 0 {
            return true;
        }
    }
    composite.size() % natural_align != 0 || u64::from(composite.align()) < natural_align
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
