//! End-to-end compilation tests: netlist text to a finalized circuit.

use std::fs;

use symcir_core::{DiagnosticKind, Expr, StampKind};
use symcir_parser::{CompilationContext, CompilerConfig, compile, compile_file, compile_with};

#[test]
fn test_compile_rc_lowpass() {
    let ckt = compile(
        r#"
* RC low-pass
V1 in 0 1
R1 in out {R}
C1 out 0 {C}
.end
"#,
    );
    assert_eq!(ckt.title, "RC low-pass");
    assert_eq!(ckt.errors(), 0);
    assert_eq!(ckt.nodes, vec!["0", "in", "out"]);
    assert_eq!(ckt.indep_vars, vec!["V1"]);
    let undefined: Vec<&str> = ckt.undefined_params.iter().map(String::as_str).collect();
    assert_eq!(undefined, vec!["C", "R"]);
}

#[test]
fn test_var_index_is_a_bijection() {
    let ckt = compile(
        r#"opamp
.subckt AMP inp inn out A0=1e5
E1 out 0 inp inn {A0}
.ends
V1 in 0 1
X1 in fb out AMP
R1 out fb 9k
R2 fb 0 1k
L1 out x 1u
C1 x 0 1n
"#,
    );
    assert_eq!(ckt.errors(), 0);
    assert_eq!(ckt.var_index.len(), ckt.dep_vars.len());
    for (i, var) in ckt.dep_vars.iter().enumerate() {
        assert_eq!(ckt.var_index[var.as_str()], i);
    }
    assert!(ckt.var_index.contains_key("Io_E1_X1"));
    assert!(ckt.var_index.contains_key("I_L1"));
}

#[test]
fn test_unknown_model_keeps_compiling() {
    let ckt = compile("m\nV1 a 0 1\nQ1 a b 0 NOPE\nR2 b 0 1k\n");
    let errors: Vec<_> = ckt.diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Reference);
    assert_eq!(errors[0].line, 3);
    assert_eq!(ckt.elements.len(), 3);
}

#[test]
fn test_subcircuit_matches_flat_netlist() {
    let hierarchical = compile(
        r#"h
.subckt DIV a b c Rt=1 Rb=1
R1 a b {Rt}
R2 b c {Rb}
.ends
V1 in 0 1
X1 in out 0 DIV Rt=3k Rb=1k
"#,
    );
    let flat = compile("f\nV1 in 0 1\nR1_X1 in out 3k\nR2_X1 out 0 1k\n");
    assert_eq!(hierarchical.errors(), 0, "{:?}", hierarchical.diagnostics);
    assert_eq!(hierarchical.elements.len(), flat.elements.len());
    assert_eq!(hierarchical.dep_vars, flat.dep_vars);
    for (name, element) in &flat.elements {
        let spliced = &hierarchical.elements[name.as_str()];
        assert_eq!(spliced.nodes, element.nodes);
        assert_eq!(spliced.value(), element.value());
    }
}

#[test]
fn test_expansion_models_are_flattened() {
    let ckt = compile(
        r#"ce stage
V1 b 0 0
Q1 c b 0 QV gm=40m gpi=200u
Rc c 0 5k
"#,
    );
    assert_eq!(ckt.errors(), 0);
    assert!(!ckt.needs_expansion());
    let gm = &ckt.elements["Gm_Q1"];
    assert_eq!(gm.stamp_kind(), Some(StampKind::Vccs));
    assert_eq!(gm.value(), Expr::Constant(40e-3));
    assert!(ckt.elements.contains_key("Gpi_Q1"));
}

#[test]
fn test_library_file_resolution() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("models.lib"),
        r#"models
.param Vt=25.9m
.model NPN QV gm={1m/Vt}
.subckt BUF i o
E1 o 0 i 0 1
.ends
"#,
    )
    .unwrap();
    let netlist = dir.path().join("top.cir");
    fs::write(
        &netlist,
        r#"top
.lib models.lib
V1 a 0 1
X1 a b BUF
Q1 b a 0 NPN
R1 b 0 1k
"#,
    )
    .unwrap();

    let mut ctx = CompilationContext::default();
    let ckt = compile_file(&netlist, &mut ctx).unwrap();
    assert_eq!(ckt.errors(), 0, "{:?}", ckt.diagnostics);
    assert!(ckt.elements.contains_key("E1_X1"));
    assert!(ckt.param_defs.contains_key("Vt"));
    assert!(ctx.is_compiled(&dir.path().join("models.lib")));
    assert!(ctx.user.subcircuits.contains_key("BUF"));
}

#[test]
fn test_library_is_compiled_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("once.lib"), "once\n.param K=2\n.param K=3\n").unwrap();
    let input = "once\n.lib once.lib\n.lib once.lib\nR1 a 0 {K}\nR2 a 0 1\n";

    let mut ctx = CompilationContext::default();
    let ckt = compile_with(input, &mut ctx, Some(dir.path()));
    // The redefinition warning is reported by the first load only.
    let warnings = ckt
        .warnings()
        .filter(|d| d.message.contains("redefined"))
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(ckt.param_defs["K"], Expr::Constant(3.0));
}

#[test]
fn test_config_from_json() {
    let config: CompilerConfig = serde_json::from_str(r#"{"laplace_var": "p"}"#).unwrap();
    assert_eq!(config.laplace_var, "p");
    assert_eq!(config.library_dir, CompilerConfig::default().library_dir);

    let mut ctx = CompilationContext::new(config);
    let ckt = compile_with("p\nC1 a 0 {1/p}\nR1 a 0 1\n", &mut ctx, None);
    assert_eq!(ckt.errors(), 1);
}
