use std::collections::HashMap;

use pretty_assertions::assert_eq;

use super::*;

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
    let vars: HashMap<String, OsString> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), OsString::from(v)))
        .collect();
    move |key| vars.get(key).cloned()
}

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn defaults() {
    let options = CompileOptions::default();
    assert_eq!(options.opt_level, 2);
    assert!(options.gnu_extensions);
    assert!(options.lazy_wrappers);
    assert!(!options.is_cxx());
    assert_eq!(options.compiler, PathBuf::from("clang"));
    assert_eq!(
        strings(&options.frontend_args()),
        vec!["-x", "c", "-std=gnu99"]
    );
}

#[test]
fn opt_level_is_clamped() {
    assert_eq!(CompileOptions::new().with_opt_level(9).opt_level, 3);
    assert_eq!(CompileOptions::new().with_opt_level(0).opt_level, 0);
}

#[test]
fn cxx_dialects() {
    let options = CompileOptions::new().with_cxx(CxxMode::Cxx17);
    assert_eq!(options.source_extension(), "cpp");
    assert_eq!(
        strings(&options.frontend_args()),
        vec!["-x", "c++", "-std=gnu++17"]
    );
    let strict = options.with_gnu_extensions(false);
    assert_eq!(strings(&strict.frontend_args())[2], "-std=c++17");
    let c = CompileOptions::new().with_gnu_extensions(false);
    assert_eq!(strings(&c.frontend_args())[2], "-std=c99");
}

#[test]
fn search_path_order_is_kept() {
    let options = CompileOptions::new()
        .with_sysroot("/sysroot")
        .with_include_dir("/a")
        .with_include_dir("/b");
    assert_eq!(
        strings(&options.frontend_args()),
        vec!["-x", "c", "-std=gnu99", "--sysroot=/sysroot", "-I", "/a", "-I", "/b"]
    );
}

#[test]
fn environment_overrides() {
    let dirs = std::env::join_paths(["/x", "/y"]).unwrap();
    let dirs = dirs.to_str().unwrap().to_owned();
    let options = CompileOptions::new().layer_env(env(&[
        ("DFFI_CC", "/opt/clang"),
        ("DFFI_OPT_LEVEL", "1"),
        ("DFFI_SYSROOT", "/sr"),
        ("DFFI_INCLUDE_DIRS", &dirs),
    ]));
    assert_eq!(options.compiler, PathBuf::from("/opt/clang"));
    assert_eq!(options.opt_level, 1);
    assert_eq!(options.sysroot, Some(PathBuf::from("/sr")));
    assert_eq!(
        options.include_dirs,
        vec![PathBuf::from("/x"), PathBuf::from("/y")]
    );
}

#[test]
fn invalid_environment_values_are_ignored() {
    let options = CompileOptions::new().layer_env(env(&[
        ("DFFI_OPT_LEVEL", "fast"),
        ("DFFI_CC", ""),
    ]));
    assert_eq!(options.opt_level, 2);
    assert_eq!(options.compiler, PathBuf::from("clang"));
}

#[test]
fn unit_options_builder() {
    let unit = UnitOptions::default()
        .with_declarations(true)
        .with_last_error(true);
    assert!(unit.declarations);
    assert!(unit.use_last_error);
}

#[test]
fn wrappers_build_as_c_in_cxx_mode() {
    let options = CompileOptions::new()
        .with_cxx(CxxMode::Cxx17)
        .with_opt_level(1)
        .with_include_dir("/inc");
    let wrappers = options.wrapper_options();
    assert_eq!(wrappers.source_extension(), "c");
    assert_eq!(
        strings(&wrappers.frontend_args()),
        vec!["-x", "c", "-std=gnu99", "-I", "/inc"]
    );
    assert_eq!(wrappers.opt_level, 1);
}
