//! Scope-chain symbol resolution.
//!
//! A free symbol in a spliced element is looked up in an ordered chain of
//! scopes: actual values of the calling element, the prototype's formal
//! defaults, the prototype's own `.param` definitions, then the user and
//! system library globals. The first scope that defines the symbol wins.

use indexmap::IndexMap;
use symcir_core::Expr;

use crate::context::CompilationContext;

/// Where a symbol was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Value supplied by the calling element.
    Actual,
    /// Declared default of the prototype.
    FormalDefault,
    /// `.param` inside the prototype.
    Local,
    UserLibrary,
    SystemLibrary,
}

impl ScopeKind {
    pub fn is_global(self) -> bool {
        matches!(self, ScopeKind::UserLibrary | ScopeKind::SystemLibrary)
    }
}

/// One table in a scope chain.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub kind: ScopeKind,
    pub table: &'a IndexMap<String, Expr>,
}

impl<'a> Scope<'a> {
    pub fn new(kind: ScopeKind, table: &'a IndexMap<String, Expr>) -> Self {
        Self { kind, table }
    }
}

/// Resolve `symbol` against an ordered chain of scopes.
pub fn resolve_symbol<'a>(symbol: &str, chain: &[Scope<'a>]) -> Option<(ScopeKind, &'a Expr)> {
    chain
        .iter()
        .find_map(|scope| scope.table.get(symbol).map(|value| (scope.kind, value)))
}

/// The library scopes, user library first.
pub fn global_scopes(ctx: &CompilationContext) -> [Scope<'_>; 2] {
    [
        Scope::new(ScopeKind::UserLibrary, &ctx.user.params),
        Scope::new(ScopeKind::SystemLibrary, &ctx.system.params),
    ]
}

/// Copy library definitions of `symbols` into `param_defs`, transitively
/// following the symbols those definitions reference.
///
/// Symbols already defined in `param_defs` are left alone. Returns the
/// symbols found in neither `param_defs` nor a library.
pub fn pull_globals<I>(symbols: I, ctx: &CompilationContext, param_defs: &mut IndexMap<String, Expr>) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let globals = global_scopes(ctx);
    let mut pending: Vec<String> = symbols.into_iter().collect();
    let mut unresolved = Vec::new();

    while let Some(symbol) = pending.pop() {
        if param_defs.contains_key(&symbol) || unresolved.contains(&symbol) {
            continue;
        }
        match resolve_symbol(&symbol, &globals) {
            Some((kind, value)) => {
                log::debug!("pulled {:?} parameter '{}' = {}", kind, symbol, value);
                pending.extend(value.free_symbols());
                param_defs.insert(symbol, value.clone());
            }
            None => unresolved.push(symbol),
        }
    }
    unresolved
}
