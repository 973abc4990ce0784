//! Declaration pass.
//!
//! Debug info only describes what code generation emits: a prototype without
//! a body, or a typedef nothing uses, leaves no trace. Before the real
//! compile, the source is parsed once and every such declaration gets an
//! empty forcing function whose parameter mentions it:
//!
//! ```c
//! void __dffi_force_decl_puts(__typeof__(puts) *__Arg) {}
//! void __dffi_force_typedef_0(size_t *__Arg) {}
//! ```
//!
//! `__typeof__` names the function's type without referencing its symbol,
//! so the forcing code links even when the function lives elsewhere. Type
//! recovery maps the forcing functions back to the names they stand for.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::CompileError;

pub const FORCE_DECL_PREFIX: &str = "__dffi_force_decl_";
pub const FORCE_TYPEDEF_PREFIX: &str = "__dffi_force_typedef_";

/// Stack reserved for deserializing deeply nested AST dumps.
const AST_STACK_SIZE: usize = 256 * 1024 * 1024;

/// The slice of clang's JSON AST the pass looks at.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mangled_name: Option<String>,
    #[serde(default)]
    pub is_implicit: bool,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub previous_decl: Option<String>,
    #[serde(default, rename = "type")]
    pub ty: Option<AstType>,
    #[serde(default)]
    pub inner: Vec<AstNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstType {
    #[serde(default)]
    pub qual_type: String,
}

/// Output of the declaration pass.
#[derive(Debug, Default)]
pub struct Declarations {
    /// Source appended to the unit for the second compile.
    pub forcing: String,
    /// Source name to linker symbol, for functions renamed by an assembly
    /// label (or mangled, in C++).
    pub aliases: Vec<(String, String)>,
}

pub fn parse_ast(json: &str) -> Result<AstNode, CompileError> {
    stacker::grow(AST_STACK_SIZE, || {
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let node = AstNode::deserialize(&mut de)?;
        de.end()?;
        Ok(node)
    })
}

/// Generate forcing code for the top-level declarations of `root`.
#[tracing::instrument(level = "debug", skip_all, fields(cxx))]
pub fn declarations(root: &AstNode, cxx: bool) -> Declarations {
    let mut pass = Pass {
        cxx,
        out: Declarations::default(),
        forced: FxHashSet::default(),
        typedefs: 0,
    };
    pass.visit_all(&root.inner);
    tracing::debug!(
        forced = pass.forced.len(),
        typedefs = pass.typedefs,
        aliases = pass.out.aliases.len(),
        "declaration pass done"
    );
    pass.out
}

struct Pass {
    cxx: bool,
    out: Declarations,
    forced: FxHashSet<String>,
    typedefs: usize,
}

impl Pass {
    fn visit_all(&mut self, decls: &[AstNode]) {
        for decl in decls {
            match decl.kind.as_str() {
                "FunctionDecl" => self.function(decl),
                "TypedefDecl" => self.typedef(decl),
                "LinkageSpecDecl" => self.visit_all(&decl.inner),
                _ => {}
            }
        }
    }

    fn function(&mut self, decl: &AstNode) {
        let Some(name) = decl.name.as_deref() else {
            return;
        };
        if decl.is_implicit || decl.previous_decl.is_some() {
            return;
        }
        if has_body(decl) && !decl.inline {
            return;
        }
        if is_noreturn(decl) {
            return;
        }
        let symbol = match decl.mangled_name.as_deref() {
            Some(mangled) => mangled.trim_start_matches('\u{1}'),
            None => name,
        };
        if symbol != name {
            self.out.aliases.push((name.to_owned(), symbol.to_owned()));
            // Mangled C++ names may be overloaded, which `__typeof__` cannot
            // disambiguate.
            if self.cxx {
                return;
            }
        }
        if !self.forced.insert(symbol.to_owned()) {
            return;
        }
        let _ = writeln!(
            self.out.forcing,
            "{}void {FORCE_DECL_PREFIX}{symbol}(__typeof__({name}) *__Arg) {{}}",
            self.linkage()
        );
    }

    fn typedef(&mut self, decl: &AstNode) {
        if decl.is_implicit {
            return;
        }
        let Some(name) = decl.name.as_deref() else {
            return;
        };
        let _ = writeln!(
            self.out.forcing,
            "{}void {FORCE_TYPEDEF_PREFIX}{}({name} *__Arg) {{}}",
            self.linkage(),
            self.typedefs
        );
        self.typedefs += 1;
    }

    fn linkage(&self) -> &'static str {
        if self.cxx {
            "extern \"C\" "
        } else {
            ""
        }
    }
}

fn has_body(decl: &AstNode) -> bool {
    decl.inner.iter().any(|node| node.kind == "CompoundStmt")
}

fn is_noreturn(decl: &AstNode) -> bool {
    let attr = decl.inner.iter().any(|node| {
        matches!(
            node.kind.as_str(),
            "NoReturnAttr" | "C11NoReturnAttr" | "CXX11NoReturnAttr"
        )
    });
    attr || decl
        .ty
        .as_ref()
        .is_some_and(|ty| ty.qual_type.contains("noreturn"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
