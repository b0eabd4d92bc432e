//! Model resolution: binds element model names to direct stamps or to
//! prototype circuits pending expansion.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use symcir_core::catalog::{self, ModelSpec};
use symcir_core::{Circuit, Diagnostic, DiagnosticKind, Element, Expr, ModelDef, ResolvedModel};

use crate::context::CompilationContext;

/// Definitions visible from one level of the circuit tree.
#[derive(Debug, Default)]
struct LocalScope {
    models: IndexMap<String, ModelDef>,
    /// Resolved prototypes only.
    subcircuits: IndexMap<String, Arc<Circuit>>,
}

/// Model lookup across the enclosing circuits (innermost first) and the
/// library tables.
struct Lookup<'a> {
    chain: Vec<&'a LocalScope>,
    ctx: &'a CompilationContext,
}

impl<'a> Lookup<'a> {
    fn model_def(&self, name: &str) -> Option<&'a ModelDef> {
        self.chain
            .iter()
            .rev()
            .copied()
            .find_map(|scope| scope.models.get(name))
            .or_else(|| self.ctx.library_model(name))
    }

    fn subcircuit(&self, name: &str) -> Option<&'a Arc<Circuit>> {
        self.chain
            .iter()
            .rev()
            .copied()
            .find_map(|scope| scope.subcircuits.get(name))
            .or_else(|| self.ctx.library_subcircuit(name))
    }
}

/// Resolve every element of `circuit` and of its nested subcircuits.
///
/// Subcircuits are resolved before the elements that use them; subcircuits
/// that use each other in a cycle are reported as a hierarchical loop and
/// left out of scope.
pub fn resolve(circuit: &mut Circuit, ctx: &CompilationContext) {
    resolve_in(circuit, ctx, &[]);
    log::info!(
        "resolved models of '{}' ({} error(s))",
        circuit.title,
        circuit.errors()
    );
}

fn resolve_in(circuit: &mut Circuit, ctx: &CompilationContext, outer: &[&LocalScope]) {
    let mut local = LocalScope {
        models: circuit.model_defs.clone(),
        subcircuits: IndexMap::new(),
    };

    let order: Vec<String> = circuit.subcircuits.keys().cloned().collect();
    let mut pending = std::mem::take(&mut circuit.subcircuits);
    let deps: IndexMap<String, HashSet<String>> = pending
        .iter()
        .map(|(name, sub)| {
            let mut refs = HashSet::new();
            referenced_models(sub, &mut refs);
            (name.clone(), refs)
        })
        .collect();

    let mut done = IndexMap::new();
    loop {
        let ready = pending.keys().find(|name| {
            deps[name.as_str()]
                .iter()
                .all(|d| d != *name && !pending.contains_key(d))
        });
        let Some(name) = ready.cloned() else {
            break;
        };
        let Some(mut sub) = pending.shift_remove(&name) else {
            break;
        };
        {
            let mut chain = outer.to_vec();
            chain.push(&local);
            resolve_in(&mut sub, ctx, &chain);
        }
        circuit.diagnostics.append(&mut sub.diagnostics);
        local.subcircuits.insert(name.clone(), Arc::new(sub.clone()));
        done.insert(name, sub);
    }

    if !pending.is_empty() {
        let names: Vec<&str> = pending.keys().map(String::as_str).collect();
        circuit.error(
            DiagnosticKind::Hierarchy,
            0,
            format!("hierarchical loop among subcircuits: {}", names.join(", ")),
        );
        done.extend(pending);
    }
    for name in order {
        if let Some(sub) = done.shift_remove(&name) {
            circuit.subcircuits.insert(name, sub);
        }
    }

    let mut chain = outer.to_vec();
    chain.push(&local);
    let lookup = Lookup { chain, ctx };
    for element in circuit.elements.values_mut() {
        if element.model.is_some() {
            continue;
        }
        if element.type_letter == 'X' {
            resolve_call(element, &lookup, &mut circuit.diagnostics);
        } else {
            resolve_element(element, &lookup, &mut circuit.diagnostics);
        }
    }
}

/// Model and subcircuit names used anywhere inside `circuit`.
fn referenced_models(circuit: &Circuit, out: &mut HashSet<String>) {
    for element in circuit.elements.values() {
        if let Some(name) = &element.model_name {
            out.insert(name.clone());
        }
    }
    for def in circuit.model_defs.values() {
        out.insert(def.base.clone());
    }
    for sub in circuit.subcircuits.values() {
        referenced_models(sub, out);
    }
}

fn reference_error(diagnostics: &mut Vec<Diagnostic>, line: usize, message: String) {
    diagnostics.push(Diagnostic::error(DiagnosticKind::Reference, line, message));
}

fn resolve_element(element: &mut Element, lookup: &Lookup<'_>, diagnostics: &mut Vec<Diagnostic>) {
    let line = element.line;
    let Some(device) = catalog::device(element.type_letter) else {
        reference_error(diagnostics, line, format!("{}: unknown device type", element.ref_des));
        return;
    };
    let Some(name) = element
        .model_name
        .clone()
        .or_else(|| device.default_model().map(str::to_string))
    else {
        reference_error(diagnostics, line, format!("{}: no model given", element.ref_des));
        return;
    };

    let empty = IndexMap::new();
    let (spec, defaults): (&ModelSpec, &IndexMap<String, Expr>) = if let Some(spec) = catalog::model(&name) {
        (spec, &empty)
    } else if let Some(def) = lookup.model_def(&name) {
        let Some(base) = catalog::model(&def.base) else {
            reference_error(
                diagnostics,
                line,
                format!("{}: model '{}' has unknown base model '{}'", element.ref_des, name, def.base),
            );
            return;
        };
        (base, &def.params)
    } else {
        reference_error(diagnostics, line, format!("{}: undefined model '{}'", element.ref_des, name));
        return;
    };

    if !device.accepts_model(spec.name) {
        reference_error(
            diagnostics,
            line,
            format!("{}: model '{}' cannot be used for a {}", element.ref_des, name, device.description),
        );
        return;
    }

    let laplace = lookup.ctx.laplace_var();
    let mut ok = true;
    for (param, value) in element.params.iter().chain(defaults.iter()) {
        match spec.param(param) {
            None => {
                reference_error(
                    diagnostics,
                    line,
                    format!("{}: unknown parameter '{}' for model '{}'", element.ref_des, param, name),
                );
                ok = false;
            }
            Some(p) if !p.laplace && value.contains_symbol(laplace) => {
                reference_error(
                    diagnostics,
                    line,
                    format!(
                        "{}: parameter '{}' may not depend on the Laplace variable '{}'",
                        element.ref_des, param, laplace
                    ),
                );
                ok = false;
            }
            Some(_) => {}
        }
    }
    if device.value_required && !element.params.contains_key("value") && !defaults.contains_key("value") {
        reference_error(diagnostics, line, format!("{}: missing value", element.ref_des));
        ok = false;
    }
    if !ok {
        return;
    }

    let model = match spec.stamp {
        Some(kind) => ResolvedModel::DirectStamp(kind),
        None => {
            let Some(proto) = lookup.subcircuit(spec.name) else {
                reference_error(
                    diagnostics,
                    line,
                    format!("{}: no prototype circuit for model '{}'", element.ref_des, spec.name),
                );
                return;
            };
            if proto.ports.len() != element.nodes.len() {
                reference_error(
                    diagnostics,
                    line,
                    format!(
                        "{}: prototype '{}' has {} port(s), element has {} node(s)",
                        element.ref_des,
                        spec.name,
                        proto.ports.len(),
                        element.nodes.len()
                    ),
                );
                return;
            }
            ResolvedModel::Expansion(Arc::clone(proto))
        }
    };

    for p in spec.params {
        if element.params.contains_key(p.name) {
            continue;
        }
        let value = match (defaults.get(p.name), &model) {
            (Some(value), _) => value.clone(),
            (None, ResolvedModel::Expansion(proto)) => proto.formals.get(p.name).cloned().unwrap_or_default(),
            (None, ResolvedModel::DirectStamp(_)) => Expr::zero(),
        };
        element.params.insert(p.name.to_string(), value);
    }
    element.model_name = Some(name);
    element.model = Some(model);
}

fn resolve_call(element: &mut Element, lookup: &Lookup<'_>, diagnostics: &mut Vec<Diagnostic>) {
    let line = element.line;
    let Some(name) = element.model_name.clone() else {
        reference_error(diagnostics, line, format!("{}: no subcircuit given", element.ref_des));
        return;
    };
    let Some(proto) = lookup.subcircuit(&name) else {
        reference_error(diagnostics, line, format!("{}: undefined subcircuit '{}'", element.ref_des, name));
        return;
    };

    let mut ok = true;
    if proto.ports.len() != element.nodes.len() {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::Syntax,
            line,
            format!(
                "{}: subcircuit '{}' has {} port(s), call has {} node(s)",
                element.ref_des,
                name,
                proto.ports.len(),
                element.nodes.len()
            ),
        ));
        ok = false;
    }
    let laplace = lookup.ctx.laplace_var();
    for (param, value) in &element.params {
        if !proto.formals.contains_key(param) {
            reference_error(
                diagnostics,
                line,
                format!("{}: subcircuit '{}' has no parameter '{}'", element.ref_des, name, param),
            );
            ok = false;
        } else if value.contains_symbol(laplace) {
            reference_error(
                diagnostics,
                line,
                format!(
                    "{}: parameter '{}' may not depend on the Laplace variable '{}'",
                    element.ref_des, param, laplace
                ),
            );
            ok = false;
        }
    }
    if ok {
        element.model = Some(ResolvedModel::Expansion(Arc::clone(proto)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_netlist;
    use symcir_core::StampKind;

    fn resolved(input: &str) -> Circuit {
        let mut ctx = CompilationContext::default();
        let mut ckt = parse_netlist(input, &mut ctx, None);
        resolve(&mut ckt, &ctx);
        ckt
    }

    #[test]
    fn test_default_and_builtin_models() {
        let ckt = resolved("m\nR1 a 0 1k\nR2 a 0 r value=1k\nG1 a 0 b 0 g {gm}\n");
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.element("R1").unwrap().stamp_kind(), Some(StampKind::Resistor));
        assert_eq!(ckt.element("R2").unwrap().stamp_kind(), Some(StampKind::ResistorBranch));
        assert_eq!(ckt.element("G1").unwrap().stamp_kind(), Some(StampKind::VccsBranch));
        // unspecified parameters are filled with zero
        assert!(ckt.element("R1").unwrap().params["dcvar"].is_zero());
    }

    #[test]
    fn test_model_def_defaults() {
        let ckt = resolved("m\n.model RN R dcvar=0.01\nR1 a 0 RN value=10k\n");
        assert_eq!(ckt.errors(), 0);
        let r1 = ckt.element("R1").unwrap();
        assert_eq!(r1.model_name.as_deref(), Some("RN"));
        assert_eq!(r1.params["dcvar"], Expr::Constant(0.01));
        assert_eq!(r1.value(), Expr::Constant(1e4));
    }

    #[test]
    fn test_unknown_model_keeps_element() {
        let ckt = resolved("m\nQ1 c b e BC_UNKNOWN\n");
        assert!(ckt.errors() >= 1);
        let q1 = ckt.element("Q1").unwrap();
        assert!(q1.model.is_none());
    }

    #[test]
    fn test_laplace_not_allowed() {
        let ckt = resolved("m\nC1 a 0 {s*1n}\nE1 a 0 b 0 {1/(1+s)}\n");
        assert_eq!(ckt.errors(), 1);
        assert!(ckt.element("E1").unwrap().model.is_some());
    }

    #[test]
    fn test_unknown_parameter() {
        let ckt = resolved("m\nR1 a 0 1k tc1=0.1\n");
        assert_eq!(ckt.errors(), 1);
    }

    #[test]
    fn test_expansion_model_binds_prototype() {
        let ckt = resolved("m\n.model BC QV gm=40m\nQ1 c b e BC gpi=1m\n");
        assert_eq!(ckt.errors(), 0);
        let q1 = ckt.element("Q1").unwrap();
        let Some(ResolvedModel::Expansion(proto)) = &q1.model else {
            panic!("expected expansion");
        };
        assert_eq!(proto.name, "QV");
        assert_eq!(q1.params["gm"], Expr::Constant(0.04));
        assert_eq!(q1.params["gpi"], Expr::Constant(0.001));
        assert!(q1.params["cpi"].is_zero());
    }

    #[test]
    fn test_subcircuit_call() {
        let ckt = resolved(
            "x
X1 in out AMP A=5
X2 in out AMP B=5
.subckt AMP i o A=1
E1 o 0 i 0 {A}
.ends
",
        );
        assert_eq!(ckt.errors(), 1);
        assert!(ckt.element("X1").unwrap().model.is_some());
        assert!(ckt.element("X2").unwrap().model.is_none());
    }

    #[test]
    fn test_mutual_recursion_is_a_loop() {
        let ckt = resolved(
            "loop
.subckt A p
X1 p B
.ends
.subckt B p
X1 p A
.ends
X1 n A
",
        );
        assert!(
            ckt.diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::Hierarchy)
        );
        assert!(ckt.element("X1").unwrap().model.is_none());
    }

    #[test]
    fn test_nested_subcircuit_sees_sibling() {
        let ckt = resolved(
            "nest
.subckt INNER a b
R1 a b 1k
.ends
.subckt OUTER a b
X1 a m INNER
X2 m b INNER
.ends
X1 in 0 OUTER
",
        );
        assert_eq!(ckt.errors(), 0);
        let outer = &ckt.subcircuits["OUTER"];
        assert!(outer.elements.values().all(|e| e.model.is_some()));
    }
}
