use super::*;

#[test]
fn all_is_in_discriminant_order() {
    for (idx, kind) in BasicKind::ALL.iter().enumerate() {
        assert_eq!(*kind as usize, idx, "{kind} out of order");
    }
}

#[test]
fn sizes_match_host() {
    assert_eq!(BasicKind::Void.size(), 0);
    assert_eq!(BasicKind::Char.size(), 1);
    assert_eq!(BasicKind::Int.size(), size_of::<c_int>() as u64);
    assert_eq!(BasicKind::Long.size(), size_of::<c_long>() as u64);
    assert_eq!(BasicKind::Double.size(), 8);
    assert_eq!(BasicKind::ComplexDouble.size(), 16);
    assert_eq!(
        BasicKind::ComplexLongDouble.size(),
        BasicKind::LongDouble.size() * 2
    );
}

#[test]
fn int_size_lookup_prefers_short_spelling() {
    assert_eq!(BasicKind::from_int_size(4, true), Some(BasicKind::Int));
    assert_eq!(BasicKind::from_int_size(4, false), Some(BasicKind::UInt));
    assert_eq!(BasicKind::from_int_size(1, true), Some(BasicKind::SChar));
    assert_eq!(BasicKind::from_int_size(2, false), Some(BasicKind::UShort));
    assert_eq!(BasicKind::from_int_size(16, true), Some(BasicKind::Int128));
    assert_eq!(BasicKind::from_int_size(3, true), None);
}

#[test]
fn eight_byte_int_is_long_or_long_long() {
    let kind = BasicKind::from_int_size(8, true);
    if size_of::<c_long>() == 8 {
        assert_eq!(kind, Some(BasicKind::Long));
    } else {
        assert_eq!(kind, Some(BasicKind::LongLong));
    }
}

#[test]
fn float_size_lookup() {
    assert_eq!(BasicKind::from_float_size(4), Some(BasicKind::Float));
    assert_eq!(BasicKind::from_float_size(8), Some(BasicKind::Double));
    assert_eq!(BasicKind::from_complex_size(8), Some(BasicKind::ComplexFloat));
    assert_eq!(BasicKind::from_float_size(2), None);
}

#[test]
fn signedness() {
    assert!(BasicKind::Int.is_signed());
    assert!(!BasicKind::UInt.is_signed());
    assert!(!BasicKind::Bool.is_signed());
    assert_eq!(BasicKind::Char.is_signed(), HOST_CHAR_SIGNED);
    assert!(BasicKind::Bool.is_integer());
    assert!(!BasicKind::Float.is_integer());
}

#[test]
fn display_uses_c_spelling() {
    assert_eq!(BasicKind::ULongLong.to_string(), "unsigned long long");
    assert_eq!(BasicKind::Bool.to_string(), "_Bool");
}

#[test]
fn c_names_parse_back() {
    for kind in BasicKind::ALL {
        assert_eq!(BasicKind::from_c_name(kind.c_name()), Some(kind));
    }
    assert_eq!(BasicKind::from_c_name("unsigned"), Some(BasicKind::UInt));
    assert_eq!(BasicKind::from_c_name("struct S"), None);
}
