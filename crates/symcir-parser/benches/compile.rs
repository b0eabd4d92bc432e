//! Benchmarks for netlist compilation.

use std::fmt::Write;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use symcir_parser::{CompilationContext, compile_with};

/// An n-section RC ladder.
fn ladder(n: usize) -> String {
    let mut netlist = String::from("ladder\nV1 n0 0 1\n");
    for i in 0..n {
        let _ = writeln!(netlist, "R{} n{} n{} {{R}}", i + 1, i, i + 1);
        let _ = writeln!(netlist, "C{} n{} 0 {{C}}", i + 1, i + 1);
    }
    netlist
}

/// n cascaded amplifier stages built from a subcircuit.
fn cascade(n: usize) -> String {
    let mut netlist = String::from(
        "cascade\n.subckt STAGE i o gm=1m\nQ1 o i 0 QV gm={gm} gpi={gm/100}\nRl o 0 10k\n.ends\nV1 n0 0 1\n",
    );
    for i in 0..n {
        let _ = writeln!(netlist, "X{} n{} n{} STAGE", i + 1, i, i + 1);
    }
    netlist
}

fn bench_compile(c: &mut Criterion) {
    let mut ctx = CompilationContext::default();
    let flat = ladder(50);
    c.bench_function("compile_ladder_50", |b| {
        b.iter(|| compile_with(black_box(&flat), &mut ctx, None))
    });

    let hierarchical = cascade(20);
    c.bench_function("compile_cascade_20", |b| {
        b.iter(|| compile_with(black_box(&hierarchical), &mut ctx, None))
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
