//! C type and function recovery from DWARF.
//!
//! Recovery runs in two phases over every compile unit:
//! 1. every struct, union and enum is declared opaque (named ones by name,
//!    anonymous ones by DIE)
//! 2. composites are defined, typedefs become aliases and subprograms become
//!    functions
//!
//! Declaring first means a member type never needs its own definition to be
//! resolved, so self-referential and mutually recursive types terminate.
//! Everything else is resolved on demand through a per-unit memo keyed by DIE
//! offset.
//!
//! A DIE that cannot be understood is logged and skipped; the rest of its unit
//! is still recovered.

use gimli::{AttributeValue, DwTag, Reader as _, Unit, UnitOffset};
use rustc_hash::{FxHashMap, FxHashSet};

use dffi_types::{
    ensure_sufficient_stack, inline_anonymous_members, BasicKind, BitField, CallingConv, Field,
    QualType, TypeId, TypePool,
};

use crate::{DebugInfo, DieError, DwarfError, Reader};

/// Prefix reserved for generated names.
pub const RESERVED_PREFIX: &str = "__dffi";

const DW_LANG_C17: gimli::DwLang = gimli::DwLang(0x2c);

type Entry<'abbrev, 'unit> = gimli::DebuggingInformationEntry<'abbrev, 'unit, Reader>;

/// A function defined in the object, with its code offset.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecoveredFunction {
    /// Source-level name.
    pub name: String,
    /// Linker symbol, when it differs from the source name.
    pub linkage_name: Option<String>,
    pub ty: TypeId,
    /// `DW_AT_low_pc`, relative to the object's load address.
    pub address: Option<u64>,
}

/// Named entities recovered from one object, in discovery order.
#[derive(Default, Debug)]
pub struct Recovered {
    /// Struct, union and enum types. Anonymous ones get generated names.
    pub composites: Vec<(String, TypeId)>,
    /// Typedefs.
    pub aliases: Vec<(String, QualType)>,
    pub functions: Vec<RecoveredFunction>,
}

/// Recover every type and function described by `info` into `pool`.
#[tracing::instrument(level = "debug", skip_all)]
pub fn recover(info: &DebugInfo, pool: &mut TypePool) -> Result<Recovered, DwarfError> {
    let dwarf = info.dwarf();
    let mut units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        units.push(dwarf.unit(header)?);
    }

    let mut recovery = Recovery {
        dwarf,
        pool,
        by_name: FxHashMap::default(),
        anonymous: FxHashMap::default(),
        defined: Vec::new(),
        alias_names: FxHashSet::default(),
        function_names: FxHashSet::default(),
        out: Recovered::default(),
    };

    let mut plans = Vec::with_capacity(units.len());
    for (index, unit) in units.iter().enumerate() {
        plans.push(recovery.declare_unit(index, unit)?);
    }
    for ((index, unit), plan) in units.iter().enumerate().zip(plans) {
        recovery.define_unit(index, unit, plan);
    }

    let Recovery {
        pool, defined, out, ..
    } = recovery;
    inline_anonymous_members(pool, &defined);
    tracing::debug!(
        units = units.len(),
        composites = out.composites.len(),
        aliases = out.aliases.len(),
        functions = out.functions.len(),
        "recovered debug info"
    );
    Ok(out)
}

/// DIEs of one unit to visit in phase 2.
#[derive(Default)]
struct UnitPlan {
    composites: Vec<UnitOffset>,
    typedefs: Vec<UnitOffset>,
    subprograms: Vec<UnitOffset>,
    is_c: bool,
}

struct UnitCx<'u> {
    unit: &'u Unit<Reader>,
    index: usize,
    is_c: bool,
    memo: FxHashMap<UnitOffset, QualType>,
}

struct Recovery<'a> {
    dwarf: &'a gimli::Dwarf<Reader>,
    pool: &'a mut TypePool,
    by_name: FxHashMap<String, TypeId>,
    anonymous: FxHashMap<(usize, UnitOffset), TypeId>,
    defined: Vec<TypeId>,
    alias_names: FxHashSet<String>,
    function_names: FxHashSet<String>,
    out: Recovered,
}

impl Recovery<'_> {
    fn declare_unit(&mut self, index: usize, unit: &Unit<Reader>) -> Result<UnitPlan, DwarfError> {
        let mut plan = UnitPlan {
            is_c: true,
            ..UnitPlan::default()
        };
        let mut entries = unit.entries();
        let mut depth = 0isize;
        while let Some((delta, entry)) = entries.next_dfs()? {
            depth += delta;
            match entry.tag() {
                gimli::DW_TAG_compile_unit | gimli::DW_TAG_partial_unit if depth == 0 => {
                    plan.is_c = is_c_language(entry)?;
                }
                gimli::DW_TAG_structure_type
                | gimli::DW_TAG_class_type
                | gimli::DW_TAG_union_type
                | gimli::DW_TAG_enumeration_type => match self.declare(index, unit, entry) {
                    Ok(()) => plan.composites.push(entry.offset()),
                    Err(DieError::ReservedName(name)) => return Err(DwarfError::ReservedName(name)),
                    Err(err) => skipped(entry, &err),
                },
                gimli::DW_TAG_typedef => plan.typedefs.push(entry.offset()),
                gimli::DW_TAG_subprogram if depth == 1 => plan.subprograms.push(entry.offset()),
                _ => {}
            }
        }
        Ok(plan)
    }

    fn declare(&mut self, index: usize, unit: &Unit<Reader>, entry: &Entry<'_, '_>) -> Result<(), DieError> {
        match self.name_of(unit, entry, gimli::DW_AT_name)? {
            Some(name) => {
                if name.starts_with(RESERVED_PREFIX) {
                    return Err(DieError::ReservedName(name));
                }
                if self.by_name.contains_key(&name) {
                    return Ok(());
                }
                let id = self.declare_tag(entry.tag(), Some(&name));
                self.by_name.insert(name.clone(), id);
                self.out.composites.push((name, id));
            }
            None => {
                let key = (index, entry.offset());
                if self.anonymous.contains_key(&key) {
                    return Ok(());
                }
                let id = self.declare_tag(entry.tag(), None);
                self.anonymous.insert(key, id);
                let name = format!("{RESERVED_PREFIX}_anon_struct_{}", self.anonymous.len());
                self.out.composites.push((name, id));
            }
        }
        Ok(())
    }

    fn declare_tag(&mut self, tag: DwTag, name: Option<&str>) -> TypeId {
        match tag {
            gimli::DW_TAG_union_type => self.pool.declare_union(name),
            gimli::DW_TAG_enumeration_type => self.pool.declare_enum(name),
            _ => self.pool.declare_struct(name),
        }
    }

    fn define_unit(&mut self, index: usize, unit: &Unit<Reader>, plan: UnitPlan) {
        let mut cx = UnitCx {
            unit,
            index,
            is_c: plan.is_c,
            memo: FxHashMap::default(),
        };
        for offset in plan.composites {
            if let Err(err) = self.define(&mut cx, offset) {
                skipped_at(offset, &err);
            }
        }
        for offset in plan.typedefs {
            if let Err(err) = self.typedef(&mut cx, offset) {
                skipped_at(offset, &err);
            }
        }
        for offset in plan.subprograms {
            match self.subprogram(&mut cx, offset) {
                Ok(Some(func)) => {
                    if self.function_names.insert(func.name.clone()) {
                        self.out.functions.push(func);
                    }
                }
                Ok(None) => {}
                Err(err) => skipped_at(offset, &err),
            }
        }
    }

    // === Phase 2: definitions ===

    fn define(&mut self, cx: &mut UnitCx<'_>, offset: UnitOffset) -> Result<(), DieError> {
        let unit = cx.unit;
        let entry = unit.entry(offset)?;
        if flag(&entry, gimli::DW_AT_declaration)? {
            return Ok(());
        }
        let id = self.composite_id(cx, &entry)?;
        if !self.pool.is_opaque(id) {
            return Ok(());
        }

        if entry.tag() == gimli::DW_TAG_enumeration_type {
            let mut values = Vec::new();
            for (tag, child) in children(unit, offset)? {
                if tag != gimli::DW_TAG_enumerator {
                    continue;
                }
                let child = unit.entry(child)?;
                let name = self
                    .name_of(unit, &child, gimli::DW_AT_name)?
                    .ok_or_else(|| missing(&child, gimli::DW_AT_name))?;
                let value = child
                    .attr_value(gimli::DW_AT_const_value)?
                    .and_then(|v| signed_value(&v))
                    .ok_or_else(|| missing(&child, gimli::DW_AT_const_value))?;
                values.push((name, value));
            }
            self.pool.set_enum_body(id, values)?;
            return Ok(());
        }

        let size = udata(&entry, gimli::DW_AT_byte_size)?
            .ok_or_else(|| missing(&entry, gimli::DW_AT_byte_size))?;
        let mut fields = Vec::new();
        let mut align = 1;
        let mut misaligned = false;
        for (tag, child) in children(unit, offset)? {
            if tag != gimli::DW_TAG_member {
                continue;
            }
            let field = self.member(cx, child)?;
            let natural = self.pool.align(field.ty().ty()).max(1);
            misaligned |= field.bits().is_none() && field.offset() % u64::from(natural) != 0;
            let explicit = udata(&unit.entry(child)?, gimli::DW_AT_alignment)?
                .and_then(|value| u32::try_from(value).ok());
            align = align.max(explicit.unwrap_or(natural));
            fields.push(field);
        }
        // A member off its natural alignment, or a size no member alignment
        // divides, means the composite is packed.
        if misaligned || size % u64::from(align) != 0 {
            align = 1;
        }
        let align = match udata(&entry, gimli::DW_AT_alignment)? {
            Some(explicit) => u32::try_from(explicit).unwrap_or(align),
            None => align,
        };
        self.pool.set_body(id, fields, size, align)?;
        self.defined.push(id);
        Ok(())
    }

    fn member(&mut self, cx: &mut UnitCx<'_>, offset: UnitOffset) -> Result<Field, DieError> {
        let unit = cx.unit;
        let entry = unit.entry(offset)?;
        let name = self
            .name_of(unit, &entry, gimli::DW_AT_name)?
            .unwrap_or_default();
        let ty = self.type_attr(cx, &entry)?;
        let location = match entry.attr_value(gimli::DW_AT_data_member_location)? {
            None => 0,
            Some(AttributeValue::Exprloc(expr)) => member_location(expr, unit.header.encoding())?,
            Some(value) => value.udata_value().ok_or(DieError::UnsupportedLocation)?,
        };
        let Some(width) = udata(&entry, gimli::DW_AT_bit_size)? else {
            return Ok(Field::new(name, ty, location));
        };

        let storage = self.pool.size(ty.ty()).max(1);
        let (byte, bit) = if let Some(data_bit) = udata(&entry, gimli::DW_AT_data_bit_offset)? {
            // Bit position from the start of the composite: place it in the
            // storage unit of the member's type that contains it.
            let byte = data_bit / (storage * 8) * storage;
            (byte, data_bit - byte * 8)
        } else if let Some(bit_offset) = udata(&entry, gimli::DW_AT_bit_offset)? {
            // DWARF 2/3 counts from the most significant bit of the unit.
            let storage = udata(&entry, gimli::DW_AT_byte_size)?.unwrap_or(storage);
            let bit = (storage * 8)
                .checked_sub(bit_offset + width)
                .ok_or(DieError::UnsupportedLocation)?;
            (location, bit)
        } else {
            (location, 0)
        };
        let bits = BitField {
            offset: u32::try_from(bit).map_err(|_| DieError::UnsupportedLocation)?,
            width: u32::try_from(width).map_err(|_| DieError::UnsupportedLocation)?,
        };
        Ok(Field::bitfield(name, ty, byte, bits))
    }

    fn typedef(&mut self, cx: &mut UnitCx<'_>, offset: UnitOffset) -> Result<(), DieError> {
        let unit = cx.unit;
        let entry = unit.entry(offset)?;
        let name = self
            .name_of(unit, &entry, gimli::DW_AT_name)?
            .ok_or_else(|| missing(&entry, gimli::DW_AT_name))?;
        if self.alias_names.contains(&name) {
            return Ok(());
        }
        let ty = self.type_attr(cx, &entry)?;
        self.alias_names.insert(name.clone());
        self.out.aliases.push((name, ty));
        Ok(())
    }

    fn subprogram(
        &mut self,
        cx: &mut UnitCx<'_>,
        offset: UnitOffset,
    ) -> Result<Option<RecoveredFunction>, DieError> {
        let unit = cx.unit;
        let entry = unit.entry(offset)?;
        if flag(&entry, gimli::DW_AT_declaration)? || flag(&entry, gimli::DW_AT_noreturn)? {
            return Ok(None);
        }
        let Some(name) = self.name_of(unit, &entry, gimli::DW_AT_name)? else {
            return Ok(None);
        };
        let address = match entry.attr_value(gimli::DW_AT_low_pc)? {
            Some(value) => self.dwarf.attr_address(unit, value)?,
            None => None,
        };
        if address.is_none() {
            // Inline-only or abstract instance: nothing to call.
            return Ok(None);
        }
        let linkage_name = match self.name_of(unit, &entry, gimli::DW_AT_linkage_name)? {
            Some(linkage) => Some(linkage),
            None => self.name_of(unit, &entry, gimli::DW_AT_MIPS_linkage_name)?,
        }
        .filter(|linkage| *linkage != name);
        let ty = self.function_type(cx, &entry)?;
        Ok(Some(RecoveredFunction {
            name,
            linkage_name,
            ty,
            address,
        }))
    }

    // === Type resolution ===

    fn type_attr(&mut self, cx: &mut UnitCx<'_>, entry: &Entry<'_, '_>) -> Result<QualType, DieError> {
        match entry.attr_value(gimli::DW_AT_type)? {
            None => Ok(QualType::new(TypeId::VOID)),
            Some(AttributeValue::UnitRef(offset)) => self.resolve(cx, offset),
            Some(AttributeValue::DebugInfoRef(offset)) => {
                let offset = offset
                    .to_unit_offset(&cx.unit.header)
                    .ok_or(DieError::CrossUnitReference)?;
                self.resolve(cx, offset)
            }
            Some(_) => Err(DieError::CrossUnitReference),
        }
    }

    fn resolve(&mut self, cx: &mut UnitCx<'_>, offset: UnitOffset) -> Result<QualType, DieError> {
        if let Some(&qt) = cx.memo.get(&offset) {
            return Ok(qt);
        }
        let qt = ensure_sufficient_stack(|| self.resolve_uncached(cx, offset))?;
        cx.memo.insert(offset, qt);
        Ok(qt)
    }

    fn resolve_uncached(&mut self, cx: &mut UnitCx<'_>, offset: UnitOffset) -> Result<QualType, DieError> {
        let unit = cx.unit;
        let entry = unit.entry(offset)?;
        let tag = entry.tag();
        let qt = match tag {
            gimli::DW_TAG_base_type => QualType::new(self.pool.basic(self.base_kind(unit, &entry)?)),
            gimli::DW_TAG_pointer_type
            | gimli::DW_TAG_reference_type
            | gimli::DW_TAG_rvalue_reference_type => {
                let pointee = self.type_attr(cx, &entry)?;
                QualType::new(self.pool.pointer(pointee))
            }
            gimli::DW_TAG_const_type => self.type_attr(cx, &entry)?.with_const(),
            gimli::DW_TAG_volatile_type
            | gimli::DW_TAG_restrict_type
            | gimli::DW_TAG_atomic_type
            | gimli::DW_TAG_typedef => self.type_attr(cx, &entry)?,
            gimli::DW_TAG_array_type => self.array(cx, &entry)?,
            gimli::DW_TAG_structure_type
            | gimli::DW_TAG_class_type
            | gimli::DW_TAG_union_type
            | gimli::DW_TAG_enumeration_type => QualType::new(self.composite_id(cx, &entry)?),
            gimli::DW_TAG_subroutine_type => QualType::new(self.function_type(cx, &entry)?),
            gimli::DW_TAG_unspecified_type => QualType::new(TypeId::VOID),
            _ => return Err(DieError::UnsupportedTag(tag)),
        };
        Ok(qt)
    }

    fn base_kind(&self, unit: &Unit<Reader>, entry: &Entry<'_, '_>) -> Result<BasicKind, DieError> {
        let size = udata(entry, gimli::DW_AT_byte_size)?
            .ok_or_else(|| missing(entry, gimli::DW_AT_byte_size))?;
        let Some(AttributeValue::Encoding(encoding)) = entry.attr_value(gimli::DW_AT_encoding)? else {
            return Err(missing(entry, gimli::DW_AT_encoding));
        };
        let is_plain_char =
            size == 1 && self.name_of(unit, entry, gimli::DW_AT_name)?.as_deref() == Some("char");
        let kind = match encoding {
            gimli::DW_ATE_boolean => Some(BasicKind::Bool),
            gimli::DW_ATE_signed_char | gimli::DW_ATE_unsigned_char if is_plain_char => {
                Some(BasicKind::Char)
            }
            gimli::DW_ATE_signed | gimli::DW_ATE_signed_char => BasicKind::from_int_size(size, true),
            gimli::DW_ATE_unsigned | gimli::DW_ATE_unsigned_char | gimli::DW_ATE_UTF => {
                BasicKind::from_int_size(size, false)
            }
            gimli::DW_ATE_float => BasicKind::from_float_size(size),
            gimli::DW_ATE_complex_float => BasicKind::from_complex_size(size),
            _ => None,
        };
        kind.ok_or(DieError::UnsupportedEncoding { encoding, size })
    }

    fn array(&mut self, cx: &mut UnitCx<'_>, entry: &Entry<'_, '_>) -> Result<QualType, DieError> {
        let unit = cx.unit;
        let elem = self.type_attr(cx, entry)?;
        let mut counts = Vec::new();
        for (tag, child) in children(unit, entry.offset())? {
            if tag == gimli::DW_TAG_subrange_type {
                counts.push(subrange_count(&unit.entry(child)?)?);
            }
        }
        if counts.is_empty() {
            counts.push(Some(0));
        }
        // `int a[2][3]` lists its subranges outermost first.
        let mut ty = elem;
        for count in counts.into_iter().rev() {
            let id = match count {
                Some(count) => self.pool.array(ty, count),
                // Runtime-sized: decays to a pointer.
                None => self.pool.pointer(ty),
            };
            ty = QualType::new(id);
        }
        Ok(ty)
    }

    fn function_type(&mut self, cx: &mut UnitCx<'_>, entry: &Entry<'_, '_>) -> Result<TypeId, DieError> {
        let unit = cx.unit;
        let ret = self.type_attr(cx, entry)?;
        let prototyped = flag(entry, gimli::DW_AT_prototyped)?;
        let cc = match entry.attr_value(gimli::DW_AT_calling_convention)? {
            Some(AttributeValue::CallingConvention(cc)) => CallingConv::from_dwarf(u64::from(cc.0)),
            _ => CallingConv::C,
        };
        let mut params = Vec::new();
        let mut varargs = false;
        for (tag, child) in children(unit, entry.offset())? {
            match tag {
                gimli::DW_TAG_formal_parameter => {
                    let child = unit.entry(child)?;
                    params.push(self.type_attr(cx, &child)?);
                }
                gimli::DW_TAG_unspecified_parameters => varargs = true,
                _ => {}
            }
        }
        if cx.is_c && !prototyped {
            // `int f()` takes no arguments; anything else is K&R.
            if !params.is_empty() {
                return Err(DieError::Unprototyped);
            }
            varargs = false;
        }
        Ok(self.pool.function(ret, &params, cc, varargs))
    }

    fn composite_id(&self, cx: &UnitCx<'_>, entry: &Entry<'_, '_>) -> Result<TypeId, DieError> {
        let id = match self.name_of(cx.unit, entry, gimli::DW_AT_name)? {
            Some(name) => self.by_name.get(&name).copied(),
            None => self.anonymous.get(&(cx.index, entry.offset())).copied(),
        };
        id.ok_or(DieError::UndeclaredComposite)
    }

    fn name_of(
        &self,
        unit: &Unit<Reader>,
        entry: &Entry<'_, '_>,
        attr: gimli::DwAt,
    ) -> Result<Option<String>, gimli::Error> {
        let Some(value) = entry.attr_value(attr)? else {
            return Ok(None);
        };
        let raw = self.dwarf.attr_string(unit, value)?;
        Ok(Some(raw.to_string_lossy()?.into_owned()))
    }
}

fn is_c_language(entry: &Entry<'_, '_>) -> Result<bool, gimli::Error> {
    Ok(match entry.attr_value(gimli::DW_AT_language)? {
        Some(AttributeValue::Language(lang)) => {
            matches!(
                lang,
                gimli::DW_LANG_C89 | gimli::DW_LANG_C | gimli::DW_LANG_C99 | gimli::DW_LANG_C11
            ) || lang == DW_LANG_C17
        }
        _ => true,
    })
}

fn children(unit: &Unit<Reader>, offset: UnitOffset) -> Result<Vec<(DwTag, UnitOffset)>, gimli::Error> {
    let mut tree = unit.entries_tree(Some(offset))?;
    let root = tree.root()?;
    let mut iter = root.children();
    let mut out = Vec::new();
    while let Some(child) = iter.next()? {
        let entry = child.entry();
        out.push((entry.tag(), entry.offset()));
    }
    Ok(out)
}

/// Element count of a subrange; `None` when it is only known at runtime.
fn subrange_count(entry: &Entry<'_, '_>) -> Result<Option<u64>, DieError> {
    if let Some(count) = entry.attr_value(gimli::DW_AT_count)? {
        return Ok(count.udata_value());
    }
    let lower = match entry.attr_value(gimli::DW_AT_lower_bound)? {
        Some(value) => signed_value(&value).ok_or(DieError::UnsupportedLocation)?,
        None => 0,
    };
    match entry.attr_value(gimli::DW_AT_upper_bound)? {
        // Flexible array member.
        None => Ok(Some(0)),
        Some(value) => Ok(signed_value(&value).map(|upper| {
            let count = upper.wrapping_sub(lower).wrapping_add(1);
            u64::try_from(count).unwrap_or(0)
        })),
    }
}

fn member_location(expr: gimli::Expression<Reader>, encoding: gimli::Encoding) -> Result<u64, DieError> {
    let mut ops = expr.operations(encoding);
    match (ops.next()?, ops.next()?) {
        (
            Some(
                gimli::Operation::PlusConstant { value }
                | gimli::Operation::UnsignedConstant { value },
            ),
            None,
        ) => Ok(value),
        _ => Err(DieError::UnsupportedLocation),
    }
}

#[expect(
    clippy::cast_possible_wrap,
    reason = "bounds encoded as unsigned data forms are two's complement"
)]
fn signed_value(value: &AttributeValue<Reader>) -> Option<i64> {
    match value {
        AttributeValue::Sdata(value) => Some(*value),
        other => other.udata_value().map(|value| value as i64),
    }
}

fn flag(entry: &Entry<'_, '_>, attr: gimli::DwAt) -> Result<bool, gimli::Error> {
    Ok(matches!(entry.attr_value(attr)?, Some(AttributeValue::Flag(true))))
}

fn udata(entry: &Entry<'_, '_>, attr: gimli::DwAt) -> Result<Option<u64>, gimli::Error> {
    Ok(entry.attr_value(attr)?.and_then(|value| value.udata_value()))
}

fn missing(entry: &Entry<'_, '_>, attr: gimli::DwAt) -> DieError {
    DieError::MissingAttribute {
        tag: entry.tag(),
        attr,
    }
}

fn skipped(entry: &Entry<'_, '_>, err: &DieError) {
    skipped_at(entry.offset(), err);
}

fn skipped_at(offset: UnitOffset, err: &DieError) {
    tracing::warn!(die = offset.0, %err, "skipping debug info entry");
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
