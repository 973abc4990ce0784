use super::*;

#[test]
fn missing_library_reports_path() {
    let err = DynamicLibrary::open(Path::new("/nonexistent/libdffi_missing.so")).unwrap_err();
    let LibraryError::Open { path, .. } = &err;
    assert_eq!(path, Path::new("/nonexistent/libdffi_missing.so"));
    assert!(err.to_string().contains("libdffi_missing.so"));
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn libc_exports_are_found() {
    let lib = DynamicLibrary::open(Path::new("libc.so.6")).unwrap();
    assert!(lib.symbol("strlen").is_some());
    assert!(lib.symbol("__dffi_no_such_symbol").is_none());
    assert_eq!(lib.path(), Path::new("libc.so.6"));
}

#[cfg(target_os = "linux")]
#[test]
fn unknown_image_has_no_base() {
    assert_eq!(base_address_of(Path::new("/nonexistent/image.so")), None);
}
