//! Excitation vectors.

use nalgebra::DVector;
use symcir_core::{Circuit, Element, Expr, StampKind, branch_var, node_var};

use crate::stamp::ValueResolver;

/// What drives the independent sources of a circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum Excitation<'a> {
    /// Every source at its (possibly Laplace-domain) `value`.
    Values,
    /// Every source at its `dc` value.
    Dc,
    /// A unit excitation on one source, every other source off.
    Unit(&'a str),
    /// Each source replaced by its own placeholder symbol.
    Placeholders,
    /// `+1` on the row `pos` and `-1` on the row `neg`, sources off.
    Rows {
        pos: Option<&'a str>,
        neg: Option<&'a str>,
    },
}

/// Placeholder symbol standing in for the excitation of source `ref_des`.
pub fn placeholder(ref_des: &str) -> String {
    format!("${}", ref_des)
}

/// Builds the full-size excitation vector `Iv` of a circuit.
pub struct SourceVectorBuilder<'a> {
    circuit: &'a Circuit,
    values: &'a ValueResolver,
}

impl<'a> SourceVectorBuilder<'a> {
    pub fn new(circuit: &'a Circuit, values: &'a ValueResolver) -> Self {
        Self { circuit, values }
    }

    pub fn build(&self, excitation: &Excitation<'_>) -> DVector<Expr> {
        let mut rhs = DVector::from_element(self.circuit.dep_vars.len(), Expr::zero());

        if let Excitation::Rows { pos, neg } = excitation {
            let row = |var: &Option<&str>| var.and_then(|v| self.circuit.var_index(v));
            if let Some(r) = row(pos) {
                rhs[r] = std::mem::take(&mut rhs[r]) + Expr::one();
            }
            if let Some(r) = row(neg) {
                rhs[r] = std::mem::take(&mut rhs[r]) - Expr::one();
            }
            return rhs;
        }

        for ref_des in &self.circuit.indep_vars {
            let Some(element) = self.circuit.element(ref_des) else {
                continue;
            };
            let value = match excitation {
                Excitation::Values => self.values.param(element, "value"),
                Excitation::Dc => self.values.param(element, "dc"),
                Excitation::Unit(source) if *source == ref_des.as_str() => Expr::one(),
                Excitation::Unit(_) => continue,
                Excitation::Placeholders => Expr::symbol(placeholder(ref_des)),
                Excitation::Rows { .. } => continue,
            };
            self.inject(&mut rhs, element, value);
        }
        rhs
    }

    fn inject(&self, rhs: &mut DVector<Expr>, element: &Element, value: Expr) {
        let index = |var: String| self.circuit.var_index(&var);
        let mut add = |row: Option<usize>, v: Expr| {
            if let Some(r) = row {
                rhs[r] = std::mem::take(&mut rhs[r]) + v;
            }
        };
        match element.stamp_kind() {
            Some(StampKind::VoltageSource) => {
                add(index(branch_var("I", &element.ref_des)), value);
            }
            Some(StampKind::CurrentSource) => {
                let p = element.nodes.first().and_then(|n| index(node_var(n)));
                let n = element.nodes.get(1).and_then(|n| index(node_var(n)));
                add(p, -value.clone());
                add(n, value);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcir_parser::compile;

    fn circuit() -> Circuit {
        let ckt = compile(
            "sources
V1 in 0 {1/s} dc=2
I1 0 out 1m dc=3m
R1 in out 1k
R2 out 0 1k
",
        );
        assert_eq!(ckt.errors(), 0, "{:?}", ckt.diagnostics);
        ckt
    }

    fn at(ckt: &Circuit, rhs: &DVector<Expr>, var: &str) -> Expr {
        rhs[ckt.var_index(var).unwrap()].clone()
    }

    #[test]
    fn test_values_and_dc() {
        let ckt = circuit();
        let values = ValueResolver::symbolic();
        let builder = SourceVectorBuilder::new(&ckt, &values);

        let rhs = builder.build(&Excitation::Values);
        assert_eq!(at(&ckt, &rhs, "I_V1").to_string(), "1/s");
        assert_eq!(at(&ckt, &rhs, "V_out"), Expr::Constant(1e-3));
        assert_eq!(at(&ckt, &rhs, "V_0"), Expr::Constant(-1e-3));

        let rhs = builder.build(&Excitation::Dc);
        assert_eq!(at(&ckt, &rhs, "I_V1"), Expr::Constant(2.0));
        assert_eq!(at(&ckt, &rhs, "V_out"), Expr::Constant(3e-3));
    }

    #[test]
    fn test_unit_and_placeholders() {
        let ckt = circuit();
        let values = ValueResolver::symbolic();
        let builder = SourceVectorBuilder::new(&ckt, &values);

        let rhs = builder.build(&Excitation::Unit("I1"));
        assert!(at(&ckt, &rhs, "I_V1").is_zero());
        assert_eq!(at(&ckt, &rhs, "V_out"), Expr::one());

        let rhs = builder.build(&Excitation::Placeholders);
        assert_eq!(at(&ckt, &rhs, "I_V1"), Expr::symbol("$V1"));
        assert_eq!(at(&ckt, &rhs, "V_out"), Expr::symbol("$I1"));
    }

    #[test]
    fn test_row_injection() {
        let ckt = circuit();
        let values = ValueResolver::symbolic();
        let rhs = SourceVectorBuilder::new(&ckt, &values).build(&Excitation::Rows {
            pos: Some("V_in"),
            neg: Some("V_out"),
        });
        assert_eq!(at(&ckt, &rhs, "V_in"), Expr::one());
        assert_eq!(at(&ckt, &rhs, "V_out"), Expr::Constant(-1.0));
        assert!(at(&ckt, &rhs, "I_V1").is_zero());
    }
}
