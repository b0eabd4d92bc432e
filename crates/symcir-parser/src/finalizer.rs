//! Circuit finalization: node set, source classification, dependent
//! variables and remaining free parameters.

use std::collections::BTreeMap;

use symcir_core::{Circuit, DiagnosticKind, GROUND, StampKind, node_var};

use crate::context::CompilationContext;
use crate::scope::pull_globals;

/// Finalize a flattened circuit.
pub fn finalize(circuit: &mut Circuit, ctx: &CompilationContext) {
    let connections = update_variables(circuit);

    if !circuit.has_ground() {
        circuit.error(DiagnosticKind::Connectivity, 0, "ground node '0' not found");
    }
    for (node, count) in &connections {
        if node != GROUND && *count < 2 {
            circuit.warn(
                DiagnosticKind::Connectivity,
                0,
                format!("node '{}' has only {} connection", node, count),
            );
            log::warn!("{}: node '{}' is dangling", circuit.title, node);
        }
    }

    check_couplings(circuit);
    resolve_free_parameters(circuit, ctx);

    log::info!(
        "finalized '{}': {} node(s), {} dependent variable(s), {} error(s)",
        circuit.title,
        circuit.nodes.len(),
        circuit.dep_vars.len(),
        circuit.errors()
    );
}

/// Rebuild the node list, source lists, dependent variables and index map.
///
/// Branch variables come first in element order, followed by one `V_<node>`
/// per node in sorted order. Returns the connection count per node.
pub fn update_variables(circuit: &mut Circuit) -> BTreeMap<String, usize> {
    let mut connections: BTreeMap<String, usize> = BTreeMap::new();
    for element in circuit.elements.values() {
        for node in &element.nodes {
            *connections.entry(node.clone()).or_default() += 1;
        }
    }
    circuit.nodes = connections.keys().cloned().collect();

    circuit.indep_vars.clear();
    circuit.controlled.clear();
    circuit.dep_vars.clear();
    for element in circuit.elements.values() {
        if let Some(kind) = element.stamp_kind() {
            if kind.is_independent_source() {
                circuit.indep_vars.push(element.ref_des.clone());
            } else if kind.is_controlled_source() {
                circuit.controlled.push(element.ref_des.clone());
            }
        }
        circuit.dep_vars.extend(element.branch_vars());
    }
    circuit
        .dep_vars
        .extend(circuit.nodes.iter().map(|n| node_var(n)));

    circuit.var_index = circuit
        .dep_vars
        .iter()
        .enumerate()
        .map(|(i, v)| (v.clone(), i))
        .collect();
    connections
}

/// Mutual inductances must reference two inductors.
fn check_couplings(circuit: &mut Circuit) {
    let mut problems = Vec::new();
    for element in circuit.elements.values() {
        if element.stamp_kind() != Some(StampKind::MutualInductance) {
            continue;
        }
        for r in &element.refs {
            let ok = circuit
                .element(r)
                .is_some_and(|l| l.stamp_kind() == Some(StampKind::Inductor));
            if !ok {
                problems.push((
                    element.line,
                    format!("{}: '{}' is not an inductor", element.ref_des, r),
                ));
            }
        }
    }
    for (line, message) in problems {
        circuit.error(DiagnosticKind::Reference, line, message);
    }
}

fn resolve_free_parameters(circuit: &mut Circuit, ctx: &CompilationContext) {
    let laplace = ctx.laplace_var();
    let mut symbols = Vec::new();
    for element in circuit.elements.values() {
        for value in element.params.values() {
            symbols.extend(value.free_symbols());
        }
    }
    for value in circuit.param_defs.values() {
        symbols.extend(value.free_symbols());
    }
    symbols.retain(|s| s != laplace);

    let unresolved = pull_globals(symbols, ctx, &mut circuit.param_defs);
    circuit.undefined_params = unresolved.into_iter().filter(|s| s != laplace).collect();
    if !circuit.undefined_params.is_empty() {
        log::debug!("undefined parameters: {:?}", circuit.undefined_params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn test_dependent_variables() {
        let ckt = compile(
            "vars
V1 in 0 1
R1 in out 1k
E1 x 0 out 0 {A}
R2 x 0 r value=1k
",
        );
        assert_eq!(ckt.errors(), 0);
        assert_eq!(
            ckt.dep_vars,
            vec!["I_V1", "Io_E1", "I_R2", "V_0", "V_in", "V_out", "V_x"]
        );
        for (i, var) in ckt.dep_vars.iter().enumerate() {
            assert_eq!(ckt.var_index(var), Some(i));
        }
        assert_eq!(ckt.indep_vars, vec!["V1"]);
        assert_eq!(ckt.controlled, vec!["E1"]);
        assert!(ckt.undefined_params.contains("A"));
    }

    #[test]
    fn test_missing_ground_is_an_error() {
        let ckt = compile("floating\nR1 a b 1\nR2 a b 1\n");
        assert_eq!(ckt.errors(), 1);
    }

    #[test]
    fn test_dangling_node_is_a_warning() {
        let ckt = compile("dangling\nR1 a 0 1\nR2 a b 1\n");
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.warnings().count(), 1);
    }

    #[test]
    fn test_coupling_must_reference_inductors() {
        let ckt = compile("k\nL1 a 0 1m\nR2 a 0 1k\nK1 L1 R2 0.5\n");
        assert_eq!(ckt.errors(), 1);
    }

    #[test]
    fn test_parameter_definitions_are_kept() {
        let ckt = compile("p\n.param tau={R*C} C=1n\nR1 a 0 {R}\nC1 a 0 {C}\n");
        assert_eq!(ckt.errors(), 0);
        assert!(ckt.param_defs.contains_key("tau"));
        assert_eq!(ckt.undefined_params.iter().collect::<Vec<_>>(), vec!["R"]);
    }
}
