//! Compile-and-call tests. They need a working `clang` (or `DFFI_CC`) and
//! return early without one.

#![allow(unsafe_code, reason = "calls compiled C through native handles")]
#![allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]

use std::ffi::c_void;
use std::fs;

use dffi::types::{is_same, read_bits, write_bits, CallingConv, QualType, TypeId};
use dffi::{CompileError, CompileOptions, CxxMode, NativeFunc, Session, UnitOptions};
use pretty_assertions::assert_eq;

fn session_with(options: CompileOptions) -> Option<Session> {
    dffi::init_tracing();
    match Session::new(options) {
        Ok(session) => Some(session),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

fn session() -> Option<Session> {
    session_with(CompileOptions::from_env())
}

fn arg<T>(value: &mut T) -> *mut c_void {
    (value as *mut T).cast()
}

fn call2<R: Default, A, B>(func: &NativeFunc, mut a: A, mut b: B) -> R {
    let mut ret = R::default();
    let mut args = [arg(&mut a), arg(&mut b)];
    unsafe { func.call(arg(&mut ret), args.as_mut_ptr()) };
    ret
}

fn call1<R: Default, A>(func: &NativeFunc, mut a: A) -> R {
    let mut ret = R::default();
    let mut args = [arg(&mut a)];
    unsafe { func.call(arg(&mut ret), args.as_mut_ptr()) };
    ret
}

#[test]
fn add_two_ints() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile("int add(int a, int b) { return a + b; }")
        .unwrap();
    let add = session.get_function(unit, "add").unwrap();
    assert!(add.is_valid());
    assert_eq!(call2::<i32, _, _>(&add, 2i32, 3i32), 5);
    assert_eq!(session.unit(unit).unwrap().functions(), vec!["add"]);
}

#[test]
fn wrappers_are_shared_per_signature() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "int add(int a, int b) { return a + b; }\n\
             int sub(int a, int b) { return a - b; }\n\
             double mul(double a, double b) { return a * b; }\n",
        )
        .unwrap();
    let add = session.get_function(unit, "add").unwrap();
    let sub = session.get_function(unit, "sub").unwrap();
    let mul = session.get_function(unit, "mul").unwrap();
    let addr = |f: &NativeFunc| f.trampoline().map(|t| t as usize);
    assert_eq!(addr(&add), addr(&sub));
    assert_ne!(addr(&add), addr(&mul));
    assert_eq!(call2::<i32, _, _>(&sub, 10i32, 4i32), 6);
    assert_eq!(call2::<f64, _, _>(&mul, 1.5f64, 4.0f64), 6.0);
}

#[test]
fn compile_errors_carry_diagnostics() {
    let Some(mut session) = session() else { return };
    match session.compile("int broken( {") {
        Err(CompileError::Diagnostics(text)) => assert!(text.contains("error"), "{text}"),
        other => panic!("unexpected {other:?}"),
    }
    // The session stays usable.
    assert!(session.compile("int ok(void) { return 1; }").is_ok());
}

#[test]
fn reserved_names_are_rejected() {
    let Some(mut session) = session() else { return };
    let err = session
        .compile("struct __dffi_mine { int a; };\nint f(struct __dffi_mine *p) { return p->a; }")
        .unwrap_err();
    assert!(err.to_string().contains("__dffi_mine"), "{err}");
}

#[repr(C)]
#[derive(Default)]
struct Pair {
    x: i32,
    y: i16,
}

#[test]
fn prototype_resolves_against_separate_definition() {
    let Some(mut session) = session() else { return };
    let decls = session
        .cdef("struct P { int x; short y; };\nstruct P make_p(int x);\n")
        .unwrap();
    session
        .compile(
            "struct P { int x; short y; };\n\
             struct P make_p(int x) { struct P p = { x, (short)(x * 2) }; return p; }\n",
        )
        .unwrap();

    let unit = session.unit(decls).unwrap();
    let p = unit.get_struct(session.pool(), "P").unwrap();
    let layout = session.pool().as_struct(p).unwrap();
    assert_eq!(layout.size(), std::mem::size_of::<Pair>() as u64);
    assert_eq!(layout.field("y").unwrap().offset(), 4);

    let make = session.get_function(decls, "make_p").unwrap();
    let pair: Pair = call1(&make, 21i32);
    assert_eq!((pair.x, pair.y), (21, 42));
}

#[test]
fn packed_return_stays_within_its_size() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "struct __attribute__((packed)) P { char c; int i; };\n\
             struct P mk(void) { struct P p = { 1, 0x01020304 }; return p; }\n",
        )
        .unwrap();
    let p = session.unit(unit).unwrap().get_struct(session.pool(), "P").unwrap();
    let layout = session.pool().as_struct(p).unwrap();
    assert_eq!((layout.size(), layout.align()), (5, 1));
    assert_eq!(layout.field("i").unwrap().offset(), 1);

    let mk = session.get_function(unit, "mk").unwrap();
    let mut buf = [0xAAu8; 16];
    unsafe { mk.call(buf.as_mut_ptr().cast(), std::ptr::null_mut()) };
    assert_eq!(buf[0], 1);
    assert_eq!(i32::from_ne_bytes(buf[1..5].try_into().unwrap()), 0x0102_0304);
    assert!(buf[5..].iter().all(|&b| b == 0xAA), "{buf:02x?}");
}

#[repr(C, align(16))]
struct Aligned32([u8; 32]);

#[test]
fn over_aligned_member_is_passed_at_its_offset() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "struct A { char c; int x __attribute__((aligned(16))); };\n\
             int getx(struct A a) { return a.x; }\n",
        )
        .unwrap();
    let a = session.unit(unit).unwrap().get_struct(session.pool(), "A").unwrap();
    let layout = session.pool().as_struct(a).unwrap();
    assert_eq!(layout.size(), 32);
    let offset = usize::try_from(layout.field("x").unwrap().offset()).unwrap();
    assert_eq!(offset, 16);

    let mut value = Aligned32([0; 32]);
    value.0[offset..offset + 4].copy_from_slice(&42i32.to_ne_bytes());
    let getx = session.get_function(unit, "getx").unwrap();
    assert_eq!(call1::<i32, _>(&getx, value), 42);
}

#[repr(C)]
struct Node {
    v: i32,
    next: *mut Node,
}

#[test]
fn self_referential_struct() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "struct Node { int v; struct Node *next; };\n\
             int sum(struct Node *n) { int s = 0; for (; n; n = n->next) s += n->v; return s; }\n",
        )
        .unwrap();
    let pool = session.pool();
    let node = session.unit(unit).unwrap().get_struct(pool, "Node").unwrap();
    let next = pool.as_struct(node).unwrap().field("next").unwrap().ty();
    assert_eq!(pool.as_pointer(next.ty()), Some(QualType::new(node)));

    let sum = session.get_function(unit, "sum").unwrap();
    let mut tail = Node {
        v: 2,
        next: std::ptr::null_mut(),
    };
    let head = Node {
        v: 40,
        next: &raw mut tail,
    };
    let total: i32 = call1(&sum, &raw const head);
    assert_eq!(total, 42);
}

#[test]
fn anonymous_members_are_inlined() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "struct A { char buf[7]; struct { int a, b; struct { union { int c; float d; }; int e; }; }; int f; };\n\
             int get_f(struct A *a) { return a->f; }\n",
        )
        .unwrap();
    let pool = session.pool();
    let a = session.unit(unit).unwrap().get_struct(pool, "A").unwrap();
    let composite = pool.as_struct(a).unwrap();
    let offsets: Vec<u64> = ["a", "b", "c", "d", "e", "f"]
        .into_iter()
        .map(|name| composite.field(name).unwrap().offset())
        .collect();
    assert_eq!(offsets, vec![8, 12, 16, 16, 20, 24]);
    assert_eq!(composite.org_fields().len(), 3);
}

#[test]
fn unions_overlap() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile("union U { unsigned int i; float f; unsigned char b[4]; };\nfloat as_float(union U *u) { return u->f; }\n")
        .unwrap();
    let pool = session.pool();
    let u = session.unit(unit).unwrap().get_union(pool, "U").unwrap();
    let composite = pool.as_union(u).unwrap();
    assert!(composite.fields().iter().all(|field| field.offset() == 0));

    let as_float = session.get_function(unit, "as_float").unwrap();
    let mut storage = 1.5f32.to_bits();
    let value: f32 = call1(&as_float, &raw mut storage);
    assert_eq!(value, 1.5);
}

#[cfg(target_endian = "little")]
#[test]
fn bitfields_match_native_layout() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "struct B { unsigned a : 1; unsigned b : 5; unsigned c : 4; unsigned d : 6; unsigned e : 16; };\n\
             void fill(struct B *s) { s->a = 1; s->b = 17; s->c = 9; s->d = 45; s->e = 40000; }\n\
             unsigned get_d(struct B *s) { return s->d; }\n",
        )
        .unwrap();
    let pool = session.pool();
    let b = session.unit(unit).unwrap().get_struct(pool, "B").unwrap();
    let composite = pool.as_struct(b).unwrap();
    let layout: Vec<_> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|name| {
            let field = composite.field(name).unwrap();
            (usize::try_from(field.offset()).unwrap(), field.bits().unwrap())
        })
        .collect();

    let fill = session.get_function(unit, "fill").unwrap();
    let get_d = session.get_function(unit, "get_d").unwrap();
    let mut storage = [0u8; 4];
    let mut ptr = storage.as_mut_ptr();
    let mut args = [arg(&mut ptr)];
    unsafe { fill.call_args(args.as_mut_ptr()) };

    let read: Vec<u64> = layout
        .iter()
        .map(|&(offset, bits)| read_bits(&storage[offset..], bits).unwrap())
        .collect();
    assert_eq!(read, vec![1, 17, 9, 45, 40000]);

    let (offset, bits) = layout[3];
    assert!(write_bits(&mut storage[offset..], bits, 33));
    let d: u32 = call1(&get_d, storage.as_mut_ptr());
    assert_eq!(d, 33);
    assert_eq!(read_bits(&storage[layout[4].0..], layout[4].1), Some(40000));
}

#[test]
fn varargs_get_one_wrapper_per_tuple() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile(
            "#include <stdarg.h>\n\
             long long pick(int kind, ...) {\n\
               va_list ap; va_start(ap, kind);\n\
               long long r = kind == 0 ? (long long)va_arg(ap, int) : (long long)va_arg(ap, double);\n\
               va_end(ap); return r;\n\
             }\n",
        )
        .unwrap();
    let with_int = session
        .get_function_varargs(unit, "pick", &[QualType::new(TypeId::INT)])
        .unwrap();
    let with_double = session
        .get_function_varargs(unit, "pick", &[QualType::new(TypeId::DOUBLE)])
        .unwrap();
    let again = session
        .get_function_varargs(unit, "pick", &[QualType::new(TypeId::INT)])
        .unwrap();

    let addr = |f: &NativeFunc| f.trampoline().map(|t| t as usize);
    assert_ne!(addr(&with_int), addr(&with_double));
    assert_eq!(addr(&with_int), addr(&again));
    assert_eq!(call2::<i64, _, _>(&with_int, 0i32, 7i32), 7);
    assert_eq!(call2::<i64, _, _>(&with_double, 1i32, 2.0f64), 2);

    let call_ty = session.pool().as_function(with_double.ty()).unwrap();
    assert!(!call_ty.has_varargs());
    assert_eq!(call_ty.params().len(), 2);
}

#[test]
fn typedefs_and_missing_symbols() {
    let Some(mut session) = session() else { return };
    let unit = session
        .cdef("typedef int myint;\nmyint dffi_test_nowhere(myint x);\n")
        .unwrap();
    let compiled = session.unit(unit).unwrap();
    assert!(compiled.types().contains(&"myint"));
    assert_eq!(compiled.get_type("myint"), Some(QualType::new(TypeId::INT)));
    assert!(compiled.functions().contains(&"dffi_test_nowhere"));
    assert!(compiled.get_function_type("dffi_test_nowhere").is_some());
    assert!(session.get_function(unit, "dffi_test_nowhere").is_none());
    assert!(session.get_function(unit, "not_declared").is_none());
}

extern "C" fn twice(x: i32) -> i32 {
    x * 2
}

#[test]
fn registered_symbols_are_callable() {
    let Some(mut session) = session() else { return };
    let unit = session.cdef("int dffi_test_twice(int x);\n").unwrap();
    session.add_symbol("dffi_test_twice", twice as *const c_void);
    let func = session.get_function(unit, "dffi_test_twice").unwrap();
    assert_eq!(call1::<i32, _>(&func, 21i32), 42);
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn assembly_labels_are_aliases() {
    let Some(mut session) = session() else { return };
    let unit = session
        .cdef("int my_abs(int x) __asm__(\"abs\");\n")
        .unwrap();
    let functions = session.unit(unit).unwrap().functions();
    assert!(functions.contains(&"abs"), "{functions:?}");
    assert!(functions.contains(&"my_abs"), "{functions:?}");
    let my_abs = session.get_function(unit, "my_abs").unwrap();
    assert_eq!(call1::<i32, _>(&my_abs, -4i32), 4);
}

#[test]
fn function_from_raw_pointer() {
    let Some(mut session) = session() else { return };
    let fty = session.function_type(
        TypeId::INT,
        &[QualType::new(TypeId::INT)],
        CallingConv::C,
        false,
    );
    let func = unsafe { session.function_from_ptr(fty, twice as *const c_void) }.unwrap();
    assert_eq!(func.ty(), fty);
    assert_eq!(call1::<i32, _>(&func, 5i32), 10);
    assert!(unsafe { session.function_from_ptr(TypeId::INT, twice as *const c_void) }.is_none());
}

#[test]
fn eager_wrappers() {
    let Some(mut session) = session_with(CompileOptions::from_env().with_lazy_wrappers(false)) else {
        return;
    };
    let unit = session
        .compile("int inc(int a) { return a + 1; }\nvoid nop(void) {}\n")
        .unwrap();
    let inc = session.get_function(unit, "inc").unwrap();
    assert_eq!(call1::<i32, _>(&inc, 41i32), 42);
    let nop = session.get_function(unit, "nop").unwrap();
    unsafe { nop.call_noargs() };
}

#[cfg(target_os = "linux")]
#[test]
fn last_error_is_preserved() {
    let Some(mut session) = session() else { return };
    let unit = session
        .compile_with(
            "#include <errno.h>\nint swap_errno(int v) { int old = errno; errno = v; return old; }\n",
            UnitOptions::default().with_last_error(true),
        )
        .unwrap();
    let func = session.get_function(unit, "swap_errno").unwrap();
    assert!(func.uses_last_error());

    let handle = std::thread::spawn(move || {
        dffi::set_last_error(5);
        let seen: i32 = call1(&func, 9i32);
        assert_eq!(seen, 5);
        assert_eq!(dffi::last_error(), 9);
    });
    assert!(handle.join().is_ok());
}

// Apple linkers leave DWARF in the object files.
#[cfg(not(target_vendor = "apple"))]
#[test]
fn dwarf_ingestion_matches_source() {
    let Some(mut session) = session() else { return };
    let source = "struct P { int x; short y; };\nint px(struct P *p) { return p->x + p->y; }\n";
    let compiled = session.compile(source).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prebuilt.c");
    fs::write(&path, source).unwrap();
    let artifact = session
        .driver()
        .build_shared(session.options(), &path, true)
        .unwrap();
    let ingested = session.ingest_dwarf(&artifact.library).unwrap();

    let pool = session.pool();
    let a = session.unit(compiled).unwrap().get_struct(pool, "P").unwrap();
    let b = session.unit(ingested).unwrap().get_struct(pool, "P").unwrap();
    assert_ne!(a, b);
    assert!(is_same(pool, a, pool, b));
    let fa = session.unit(compiled).unwrap().get_function_type("px").unwrap();
    let fb = session.unit(ingested).unwrap().get_function_type("px").unwrap();
    assert!(is_same(pool, fa, pool, fb));

    let px = session.get_function(ingested, "px").unwrap();
    let mut p = Pair { x: 40, y: 2 };
    let total: i32 = call1(&px, &raw mut p);
    assert_eq!(total, 42);
}

#[test]
fn cxx_units_are_callable() {
    for lazy in [true, false] {
        let options = CompileOptions::from_env()
            .with_cxx(CxxMode::Cxx17)
            .with_lazy_wrappers(lazy);
        let Some(mut session) = session_with(options) else { return };
        let unit = session
            .compile("extern \"C\" int add(int a, int b) { return a + b; }\n")
            .unwrap();
        let add = session.get_function(unit, "add").unwrap();
        assert_eq!(call2::<i32, _, _>(&add, 2i32, 3i32), 5);
    }
}

extern "C" fn never_called() {}

#[test]
fn undefined_struct_by_value_has_no_handle() {
    let Some(mut session) = session_with(CompileOptions::from_env().with_lazy_wrappers(false)) else {
        return;
    };
    let unit = session
        .cdef("struct X;\nvoid dffi_test_take_x(struct X x);\n")
        .unwrap();
    session.add_symbol("dffi_test_take_x", never_called as *const c_void);
    assert!(session.get_function_address_and_type(unit, "dffi_test_take_x").is_some());
    assert!(session.get_function(unit, "dffi_test_take_x").is_none());
}
