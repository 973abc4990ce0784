use dffi_dwarf::RecoveredFunction;
use dffi_types::{CallingConv, Field};
use pretty_assertions::assert_eq;

use super::*;

struct Fixture {
    pool: TypePool,
    s: TypeId,
    add: TypeId,
    puts: TypeId,
}

fn function(name: &str, ty: TypeId, address: Option<u64>) -> RecoveredFunction {
    RecoveredFunction {
        name: name.to_owned(),
        linkage_name: None,
        ty,
        address,
    }
}

fn forcing(pool: &mut TypePool, target: TypeId) -> TypeId {
    let ptr = pool.pointer(target);
    pool.function(TypeId::VOID, &[QualType::new(ptr)], CallingConv::C, false)
}

fn fixture() -> (Fixture, Recovered) {
    let mut pool = TypePool::new();
    let int = QualType::new(TypeId::INT);
    let s = pool.declare_struct(Some("S"));
    pool.set_body(s, vec![Field::new("x", int, 0)], 4, 4).unwrap();
    let anon = pool.declare_struct(None);
    let add = pool.function(TypeId::INT, &[int, int], CallingConv::C, false);
    let str_ptr = pool.pointer(QualType::new(TypeId::CHAR).with_const());
    let puts = pool.function(TypeId::INT, &[QualType::new(str_ptr)], CallingConv::C, false);
    let force_puts = forcing(&mut pool, puts);
    let force_add = forcing(&mut pool, add);
    let s_ptr = pool.pointer(s);
    let force_typedef = pool.function(TypeId::VOID, &[QualType::new(s_ptr)], CallingConv::C, false);

    let recovered = Recovered {
        composites: vec![("S".to_owned(), s), ("__dffi_anon_struct_1".to_owned(), anon)],
        aliases: vec![
            ("T".to_owned(), QualType::new(s)),
            ("myint".to_owned(), int),
        ],
        functions: vec![
            function("__dffi_force_decl_add", force_add, Some(0x40)),
            function("add", add, Some(0x10)),
            function("__dffi_force_decl_puts", force_puts, Some(0x20)),
            function("__dffi_force_typedef_0", force_typedef, Some(0x30)),
            RecoveredFunction {
                linkage_name: Some("g".to_owned()),
                ..function("f", add, Some(0x50))
            },
        ],
    };
    (
        Fixture {
            pool,
            s,
            add,
            puts,
        },
        recovered,
    )
}

fn build(use_last_error: bool) -> (Fixture, CompilationUnit) {
    let (mut fx, recovered) = fixture();
    let unit = CompilationUnit::build(
        UnitId::new(0),
        "unit_0".to_owned(),
        Some(3),
        recovered,
        vec![("p".to_owned(), "puts".to_owned())],
        &mut fx.pool,
        use_last_error,
    );
    (fx, unit)
}

#[test]
fn names_are_listed_in_order() {
    let (_, unit) = build(false);
    assert_eq!(unit.types(), vec!["S", "T", "myint"]);
    assert_eq!(unit.functions(), vec!["add", "g", "puts", "f", "p"]);
    assert_eq!(unit.library(), Some(3));
    assert_eq!(unit.name(), "unit_0");
}

#[test]
fn type_lookup_prefers_aliases() {
    let (fx, unit) = build(false);
    assert_eq!(unit.get_type("T"), Some(QualType::new(fx.s)));
    assert_eq!(unit.get_type("myint"), Some(QualType::new(TypeId::INT)));
    assert_eq!(unit.get_type("unsigned int"), Some(QualType::new(TypeId::UINT)));
    assert_eq!(unit.get_type("missing"), None);
    assert_eq!(unit.get_struct(&fx.pool, "T"), Some(fx.s));
    assert_eq!(unit.get_struct(&fx.pool, "S"), Some(fx.s));
    assert_eq!(unit.get_union(&fx.pool, "S"), None);
    assert_eq!(unit.get_enum(&fx.pool, "S"), None);
}

#[test]
fn forcing_functions_map_back_to_prototypes() {
    let (fx, unit) = build(false);
    let (symbol, puts) = unit.function("puts").unwrap();
    assert_eq!(symbol, "puts");
    assert_eq!(puts.ty, fx.puts);
    assert_eq!(puts.low_pc, None);
    assert_eq!(unit.get_function_type("p"), Some(fx.puts));
    assert!(unit.function("__dffi_force_typedef_0").is_none());
}

#[test]
fn definitions_win_over_prototypes() {
    let (fx, unit) = build(false);
    let (_, add) = unit.function("add").unwrap();
    assert_eq!(add.ty, fx.add);
    assert_eq!(add.low_pc, Some(0x10));
}

#[test]
fn linkage_names_are_the_symbols() {
    let (_, unit) = build(false);
    let (symbol, f) = unit.function("f").unwrap();
    assert_eq!(symbol, "g");
    assert_eq!(f.low_pc, Some(0x50));
    assert_eq!(unit.function_types().len(), 2);
}

#[test]
fn last_error_flag_is_part_of_the_type() {
    let (fx, unit) = build(true);
    assert!(unit.uses_last_error());
    let ty = unit.get_function_type("add").unwrap();
    assert_ne!(ty, fx.add);
    let func = fx.pool.as_function(ty).unwrap();
    assert!(func.uses_last_error());
    assert_eq!(func.params().len(), 2);
    assert_eq!(unit.get_function_type("g"), Some(ty));
}
