use super::*;

#[test]
fn const_participates_in_equality() {
    let plain = QualType::new(TypeId::INT);
    let konst = plain.with_const();
    assert_ne!(plain, konst);
    assert_eq!(konst.unqualified(), plain);
    assert_eq!(konst.ty(), TypeId::INT);
    assert!(konst.is_const());
    assert!(!plain.is_const());
}

#[test]
fn with_const_is_idempotent() {
    let konst = QualType::new(TypeId::CHAR).with_const();
    assert_eq!(konst.with_const(), konst);
}

#[test]
fn write_checks() {
    assert_eq!(QualType::new(TypeId::INT).check_writable(), Ok(()));
    assert_eq!(
        QualType::new(TypeId::INT).with_const().check_writable(),
        Err(ConstViolation::WriteToConst)
    );
}

#[test]
fn pointer_conversion_checks() {
    let plain = QualType::new(TypeId::CHAR);
    let konst = plain.with_const();
    assert_eq!(plain.check_pointee_conversion(konst), Ok(()));
    assert_eq!(konst.check_pointee_conversion(konst), Ok(()));
    assert_eq!(
        konst.check_pointee_conversion(plain),
        Err(ConstViolation::DropsConst)
    );
}
