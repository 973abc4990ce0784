use super::*;

#[test]
fn basic_handles_are_fixed() {
    assert_eq!(TypeId::VOID.raw(), 0);
    assert_eq!(TypeId::INT, TypeId::basic(BasicKind::Int));
    assert!(TypeId::INT.is_basic());
    assert!(!TypeId::from_raw(TypeId::FIRST_DYNAMIC).is_basic());
}

#[test]
fn void_check() {
    assert!(TypeId::VOID.is_void());
    assert!(!TypeId::CHAR.is_void());
}

#[test]
fn debug_names_basic_kinds() {
    assert_eq!(format!("{:?}", TypeId::DOUBLE), "TypeId(16: double)");
    assert_eq!(format!("{:?}", TypeId::from_raw(100)), "TypeId(100)");
}
