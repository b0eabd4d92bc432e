//! Benchmarks for expression parsing, substitution and symbolic stamping.

use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use symcir_core::expr::{Expr, parse_expression};
use symcir_core::mna::SymbolicMna;

fn bench_parse_expression(c: &mut Criterion) {
    c.bench_function("parse_expression", |b| {
        b.iter(|| parse_expression(black_box("A0/(1+s*tau)*sqrt(L1*L2)/(2*pi*R*C)")));
    });
}

fn bench_substitute(c: &mut Criterion) {
    let expr = parse_expression("A0/(1+s*tau) + gm*R/(1+s*R*C)").unwrap();
    let mut bindings = HashMap::new();
    for (name, value) in [("A0", 1e5), ("tau", 1e-3), ("gm", 0.04), ("R", 1e3), ("C", 1e-9)] {
        bindings.insert(name.to_string(), Expr::Constant(value));
    }
    c.bench_function("substitute_5_params", |b| {
        b.iter(|| black_box(&expr).substitute(&bindings));
    });
}

fn bench_stamp_ladder(c: &mut Criterion) {
    let vars: Vec<String> = (0..20).map(|i| format!("V_{}", i)).collect();
    c.bench_function("stamp_admittance_ladder_20", |b| {
        b.iter(|| {
            let mut mna = SymbolicMna::new(vars.clone());
            for i in 0..19 {
                let g = Expr::symbol(format!("G{}", i));
                mna.stamp_admittance(Some(i), Some(i + 1), g);
            }
            mna.eliminate("V_0");
            mna
        });
    });
}

criterion_group!(benches, bench_parse_expression, bench_substitute, bench_stamp_ladder);
criterion_main!(benches);
