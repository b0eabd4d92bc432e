//! Hierarchy expansion: splices prototype circuits into their callers.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use symcir_core::{Circuit, Diagnostic, DiagnosticKind, Element, Expr, GROUND, ResolvedModel};

use crate::context::CompilationContext;
use crate::scope::{Scope, ScopeKind, pull_globals, resolve_symbol};

/// Upper bound on nesting depth.
pub const MAX_EXPANSION_PASSES: usize = 64;

/// Flatten `circuit` until no element refers to a prototype circuit.
///
/// Each pass splices one level of hierarchy.
pub fn expand(circuit: &mut Circuit, ctx: &CompilationContext) {
    let mut passes = 0;
    while circuit.needs_expansion() {
        if passes == MAX_EXPANSION_PASSES {
            circuit.error(
                DiagnosticKind::Hierarchy,
                0,
                format!("hierarchy deeper than {} levels", MAX_EXPANSION_PASSES),
            );
            return;
        }
        passes += 1;
        expand_once(circuit, ctx);
    }
    log::info!(
        "expanded '{}' in {} pass(es): {} element(s)",
        circuit.title,
        passes,
        circuit.elements.len()
    );
}

fn expand_once(circuit: &mut Circuit, ctx: &CompilationContext) {
    let elements = std::mem::take(&mut circuit.elements);
    for (ref_des, element) in elements {
        match &element.model {
            Some(ResolvedModel::Expansion(proto)) => {
                let proto = Arc::clone(proto);
                splice(circuit, &element, &proto, ctx);
            }
            _ => {
                circuit.elements.insert(ref_des, element);
            }
        }
    }
}

/// Replace `call` by a renamed copy of the elements of `proto`.
fn splice(parent: &mut Circuit, call: &Element, proto: &Circuit, ctx: &CompilationContext) {
    let suffix = call.ref_des.as_str();
    let mut mapper = SymbolMapper {
        chain: vec![
            Scope::new(ScopeKind::Actual, &call.params),
            Scope::new(ScopeKind::FormalDefault, &proto.formals),
            Scope::new(ScopeKind::Local, &proto.param_defs),
            Scope::new(ScopeKind::UserLibrary, &ctx.user.params),
            Scope::new(ScopeKind::SystemLibrary, &ctx.system.params),
        ],
        suffix,
        keep: ctx.laplace_var(),
        line: call.line,
        cache: HashMap::new(),
        visiting: Vec::new(),
        locals: IndexMap::new(),
        globals: Vec::new(),
        diagnostics: Vec::new(),
    };

    // Prototype definitions land in the parent before its elements.
    for name in proto.param_defs.keys() {
        mapper.bind(name);
    }

    let mut spliced = Vec::with_capacity(proto.elements.len());
    for sub in proto.elements.values() {
        let mut element = sub.clone();
        element.ref_des = format!("{}_{}", sub.ref_des, suffix);
        element.nodes = sub.nodes.iter().map(|n| map_node(n, proto, call)).collect();
        element.refs = sub.refs.iter().map(|r| format!("{}_{}", r, suffix)).collect();
        element.params = sub
            .params
            .iter()
            .map(|(name, value)| (name.clone(), mapper.translate(value)))
            .collect();
        element.line = call.line;
        spliced.push(element);
    }

    let SymbolMapper {
        locals,
        globals,
        diagnostics,
        ..
    } = mapper;
    for (name, value) in locals {
        parent.param_defs.insert(name, value);
    }
    pull_globals(globals, ctx, &mut parent.param_defs);
    parent.diagnostics.extend(diagnostics);
    for element in spliced {
        parent.add_element(element);
    }
    log::debug!("spliced '{}' into {}", proto.name, call.ref_des);
}

/// Ports map to the caller's nodes, ground stays global, anything else is
/// internal to this instance.
fn map_node(node: &str, proto: &Circuit, call: &Element) -> String {
    if node == GROUND {
        return node.to_string();
    }
    proto
        .ports
        .iter()
        .position(|port| port == node)
        .and_then(|i| call.nodes.get(i).cloned())
        .unwrap_or_else(|| format!("{}_{}", node, call.ref_des))
}

/// Translates expressions from a prototype's namespace into its caller's.
struct SymbolMapper<'a> {
    chain: Vec<Scope<'a>>,
    suffix: &'a str,
    /// Never renamed.
    keep: &'a str,
    line: usize,
    cache: HashMap<String, Option<Expr>>,
    visiting: Vec<String>,
    /// Renamed prototype `.param` definitions.
    locals: IndexMap<String, Expr>,
    /// Library symbols referenced, to be pulled into the parent.
    globals: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl SymbolMapper<'_> {
    fn renamed(&self, symbol: &str) -> String {
        format!("{}_{}", symbol, self.suffix)
    }

    fn translate(&mut self, expr: &Expr) -> Expr {
        let mut bindings = HashMap::new();
        for symbol in expr.free_symbols() {
            if let Some(binding) = self.bind(&symbol) {
                bindings.insert(symbol, binding);
            }
        }
        expr.substitute(&bindings)
    }

    /// Replacement for `symbol`, `None` when it keeps its name.
    fn bind(&mut self, symbol: &str) -> Option<Expr> {
        if symbol == self.keep {
            return None;
        }
        if let Some(binding) = self.cache.get(symbol) {
            return binding.clone();
        }
        if self.visiting.iter().any(|s| s == symbol) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::Reference,
                self.line,
                format!("{}: circular definition of parameter '{}'", self.suffix, symbol),
            ));
            return Some(Expr::symbol(self.renamed(symbol)));
        }

        let binding = match resolve_symbol(symbol, &self.chain) {
            Some((ScopeKind::Actual, value)) => Some(value.clone()),
            Some((ScopeKind::FormalDefault, value)) => {
                self.visiting.push(symbol.to_string());
                let translated = self.translate(value);
                self.visiting.pop();
                Some(translated)
            }
            Some((ScopeKind::Local, value)) => {
                let renamed = self.renamed(symbol);
                self.visiting.push(symbol.to_string());
                let translated = self.translate(value);
                self.visiting.pop();
                self.locals.insert(renamed.clone(), translated);
                Some(Expr::Symbol(renamed))
            }
            Some((ScopeKind::UserLibrary | ScopeKind::SystemLibrary, _)) => {
                self.globals.push(symbol.to_string());
                None
            }
            None => Some(Expr::Symbol(self.renamed(symbol))),
        };
        self.cache.insert(symbol.to_string(), binding.clone());
        binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_netlist;
    use crate::resolver::resolve;
    use symcir_core::StampKind;

    fn expanded(input: &str, ctx: &mut CompilationContext) -> Circuit {
        let mut ckt = parse_netlist(input, ctx, None);
        resolve(&mut ckt, ctx);
        expand(&mut ckt, ctx);
        ckt
    }

    #[test]
    fn test_node_and_ref_des_renaming() {
        let mut ctx = CompilationContext::default();
        let ckt = expanded(
            "x
.subckt LP in out R=1k C=1n
R1 in mid {R}
R2 mid out {R}
C1 out 0 {C}
.ends
X1 a b LP C=2n
",
            &mut ctx,
        );
        assert_eq!(ckt.errors(), 0);
        let names: Vec<&str> = ckt.elements.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["R1_X1", "R2_X1", "C1_X1"]);

        let r1 = ckt.element("R1_X1").unwrap();
        assert_eq!(r1.nodes, vec!["a", "mid_X1"]);
        assert_eq!(r1.value(), Expr::Constant(1000.0));
        let c1 = ckt.element("C1_X1").unwrap();
        assert_eq!(c1.nodes, vec!["b", "0"]);
        assert_eq!(c1.value(), Expr::Constant(2e-9));
    }

    #[test]
    fn test_unbound_symbols_are_renamed() {
        let mut ctx = CompilationContext::default();
        let ckt = expanded(
            "x
.subckt AMP i o
.param G={A0*k}
E1 o 0 i 0 {G/(1+s*tau)}
.ends
X1 a b AMP
",
            &mut ctx,
        );
        assert_eq!(ckt.errors(), 0);
        let e1 = ckt.element("E1_X1").unwrap();
        let symbols: Vec<String> = e1.value().free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["G_X1", "s", "tau_X1"]);
        let g = &ckt.param_defs["G_X1"];
        assert!(g.contains_symbol("A0_X1"));
        assert!(g.contains_symbol("k_X1"));
    }

    #[test]
    fn test_library_globals_are_pulled() {
        let mut ctx = CompilationContext::default();
        ctx.user.params.insert("Vt".into(), Expr::symbol("kT") / Expr::symbol("q"));
        ctx.user.params.insert("kT".into(), Expr::Constant(4.14e-21));
        let ckt = expanded(
            "x
.subckt GMC i o I=1m
G1 o 0 i 0 {I/Vt}
.ends
X1 a b GMC
",
            &mut ctx,
        );
        let g1 = ckt.element("G1_X1").unwrap();
        assert!(g1.value().contains_symbol("Vt"));
        assert!(ckt.param_defs.contains_key("Vt"));
        assert!(ckt.param_defs.contains_key("kT"));
        assert!(!ckt.param_defs.contains_key("q"));
    }

    #[test]
    fn test_nested_expansion() {
        let mut ctx = CompilationContext::default();
        let ckt = expanded(
            "x
.subckt STAGE i o gm=1m
Q1 o i 0 QV gm={gm}
Rl o 0 10k
.ends
.subckt TWO i o
X1 i m STAGE gm=2m
X2 m o STAGE
.ends
XA in out TWO
",
            &mut ctx,
        );
        assert_eq!(ckt.errors(), 0);
        assert!(!ckt.needs_expansion());
        let gm = ckt.element("Gm_Q1_X1_XA").unwrap();
        assert_eq!(gm.stamp_kind(), Some(StampKind::Vccs));
        assert_eq!(gm.nodes, vec!["m_XA", "0", "in", "0"]);
        assert_eq!(gm.value(), Expr::Constant(2e-3));
        let gm2 = ckt.element("Gm_Q1_X2_XA").unwrap();
        assert_eq!(gm2.value(), Expr::Constant(1e-3));
        assert_eq!(gm2.nodes[0], "out");
    }

    #[test]
    fn test_mutual_inductance_refs_follow_renaming() {
        let mut ctx = CompilationContext::default();
        let ckt = expanded(
            "x
.subckt XFMR p s
L1 p 0 1m
L2 s 0 1m
K1 L1 L2 0.9
.ends
X1 a b XFMR
",
            &mut ctx,
        );
        let k = ckt.element("K1_X1").unwrap();
        assert_eq!(k.refs, vec!["L1_X1", "L2_X1"]);
    }
}
