//! Symbolic MNA stamping.
//!
//! [`MatrixStamper`] walks the elements of a finalized circuit and lets the
//! [`Stamp`] implementation of each element's [`StampKind`] add its
//! coefficients. The system is stamped at full size; callers set the
//! excitation vector and then eliminate the ground variable.

use std::collections::HashMap;

use indexmap::IndexMap;
use symcir_core::{Circuit, Element, Expr, StampKind, SymbolicMna, branch_var, node_var};

use crate::algebra::SymbolicAlgebra;
use crate::error::{Error, Result};

/// Upper bound on substitution rounds when resolving parameter definitions.
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maps element parameter expressions to the values that get stamped.
///
/// In symbolic mode expressions are stamped as written. In numeric mode
/// every parameter definition is substituted until no defined symbol is
/// left. Symbols listed as kept stay symbolic in both modes.
#[derive(Debug, Clone, Default)]
pub struct ValueResolver {
    defs: Option<HashMap<String, Expr>>,
}

impl ValueResolver {
    pub fn symbolic() -> Self {
        Self { defs: None }
    }

    /// Numeric resolver over `param_defs`.
    ///
    /// `overrides` replace (or add) definitions, `keep` removes them so the
    /// symbols survive into the stamped matrix.
    pub fn numeric(
        param_defs: &IndexMap<String, Expr>,
        overrides: &HashMap<String, Expr>,
        keep: &[String],
    ) -> Self {
        let mut defs: HashMap<String, Expr> = param_defs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in overrides {
            defs.insert(k.clone(), v.clone());
        }
        for k in keep {
            defs.remove(k);
        }

        let mut rounds = 0;
        loop {
            let next: HashMap<String, Expr> = defs
                .iter()
                .map(|(k, v)| (k.clone(), v.substitute(&defs)))
                .collect();
            if next == defs {
                break;
            }
            defs = next;
            rounds += 1;
            if rounds == MAX_RESOLVE_DEPTH {
                log::warn!("parameter definitions did not settle after {} rounds", rounds);
                break;
            }
        }
        Self { defs: Some(defs) }
    }

    pub fn is_numeric(&self) -> bool {
        self.defs.is_some()
    }

    pub fn resolve(&self, expr: &Expr) -> Expr {
        match &self.defs {
            Some(defs) => expr.substitute(defs),
            None => expr.clone(),
        }
    }

    /// Resolved value of a named parameter of `element`.
    pub fn param(&self, element: &Element, name: &str) -> Expr {
        self.resolve(&element.param(name))
    }
}

/// Builds the coefficient matrix of a circuit.
pub struct MatrixStamper<'a> {
    circuit: &'a Circuit,
    values: &'a ValueResolver,
    algebra: &'a dyn SymbolicAlgebra,
    laplace: Expr,
}

impl<'a> MatrixStamper<'a> {
    pub fn new(
        circuit: &'a Circuit,
        values: &'a ValueResolver,
        algebra: &'a dyn SymbolicAlgebra,
        laplace_var: &str,
    ) -> Self {
        Self {
            circuit,
            values,
            algebra,
            laplace: Expr::symbol(laplace_var),
        }
    }

    /// Stamp every element into a full-size system, ground included.
    pub fn stamp(&self) -> Result<SymbolicMna> {
        let mut mna = SymbolicMna::new(self.circuit.dep_vars.clone());
        for element in self.circuit.elements.values() {
            let Some(kind) = element.stamp_kind() else {
                log::warn!("{}: no direct stamp, skipped", element.ref_des);
                continue;
            };
            kind.stamp(&mut mna, element, self)?;
        }
        log::debug!(
            "stamped '{}': {}x{} system",
            self.circuit.title,
            mna.size(),
            mna.size()
        );
        Ok(mna)
    }

    fn index(&self, var: &str) -> Option<usize> {
        self.circuit.var_index(var)
    }

    /// Row of the `i`-th terminal of `element`.
    fn node(&self, element: &Element, i: usize) -> Option<usize> {
        element.nodes.get(i).and_then(|n| self.index(&node_var(n)))
    }

    fn branch(&self, prefix: &str, element: &Element) -> Option<usize> {
        self.index(&branch_var(prefix, &element.ref_des))
    }

    fn value(&self, element: &Element) -> Expr {
        self.values.param(element, "value")
    }

    /// Numerator and denominator of a Laplace-rational gain.
    ///
    /// The split only happens in numeric mode; symbolic gains are stamped
    /// over a unit denominator.
    fn split(&self, gain: &Expr) -> Result<(Expr, Expr)> {
        if self.values.is_numeric() {
            Ok(self.algebra.as_numer_denom(gain)?)
        } else {
            Ok((gain.clone(), Expr::one()))
        }
    }
}

/// Matrix contribution of one element.
pub trait Stamp {
    fn stamp(&self, mna: &mut SymbolicMna, element: &Element, ctx: &MatrixStamper<'_>) -> Result<()>;
}

impl Stamp for StampKind {
    fn stamp(&self, mna: &mut SymbolicMna, element: &Element, ctx: &MatrixStamper<'_>) -> Result<()> {
        let p = ctx.node(element, 0);
        let n = ctx.node(element, 1);
        let cp = ctx.node(element, 2);
        let cn = ctx.node(element, 3);
        let one = Expr::one;

        match self {
            StampKind::Resistor => {
                mna.stamp_admittance(p, n, one() / ctx.value(element));
            }
            StampKind::ResistorBranch => {
                let i = ctx.branch("I", element);
                mna.stamp_branch(p, n, i);
                mna.add(i, i, -ctx.value(element));
            }
            StampKind::Capacitor => {
                mna.stamp_admittance(p, n, ctx.laplace.clone() * ctx.value(element));
            }
            StampKind::Inductor => {
                let i = ctx.branch("I", element);
                mna.stamp_branch(p, n, i);
                mna.add(i, i, -(ctx.laplace.clone() * ctx.value(element)));
            }
            StampKind::MutualInductance => {
                let [l1, l2] = element.refs.as_slice() else {
                    return Err(Error::Configuration(format!(
                        "{}: expected two coupled inductors",
                        element.ref_des
                    )));
                };
                let inductance = |name: &str| {
                    ctx.circuit.element(name).map(|l| ctx.value(l)).ok_or_else(|| {
                        Error::Configuration(format!("{}: unknown inductor '{}'", element.ref_des, name))
                    })
                };
                let m = ctx.value(element) * (inductance(l1)? * inductance(l2)?).sqrt();
                let i1 = ctx.index(&branch_var("I", l1));
                let i2 = ctx.index(&branch_var("I", l2));
                let z = ctx.laplace.clone() * m;
                mna.add(i1, i2, -z.clone());
                mna.add(i2, i1, -z);
            }
            StampKind::VoltageSource => {
                mna.stamp_branch(p, n, ctx.branch("I", element));
            }
            StampKind::CurrentSource => {}
            StampKind::Vcvs => {
                let io = ctx.branch("Io", element);
                let a = ctx.value(element);
                mna.stamp_branch(p, n, io);
                mna.add(io, cp, -a.clone());
                mna.add(io, cn, a);
            }
            StampKind::VcvsZ => {
                let io = ctx.branch("Io", element);
                let (num, den) = ctx.split(&ctx.value(element))?;
                let zo = ctx.values.param(element, "zo");
                mna.add(p, io, one());
                mna.add(n, io, -one());
                mna.add(io, p, den.clone());
                mna.add(io, n, -den.clone());
                mna.add(io, cp, -num.clone());
                mna.add(io, cn, num);
                mna.add(io, io, -(zo * den));
            }
            StampKind::Cccs => {
                let ii = ctx.branch("Ii", element);
                let a = ctx.value(element);
                mna.add(p, ii, a.clone());
                mna.add(n, ii, -a);
                mna.stamp_branch(cp, cn, ii);
            }
            StampKind::Vccs => {
                let a = ctx.value(element);
                mna.add(p, cp, a.clone());
                mna.add(p, cn, -a.clone());
                mna.add(n, cp, -a.clone());
                mna.add(n, cn, a);
            }
            StampKind::VccsBranch => {
                let io = ctx.branch("Io", element);
                let a = ctx.value(element);
                mna.add(p, io, one());
                mna.add(n, io, -one());
                mna.add(io, io, one());
                mna.add(io, cp, -a.clone());
                mna.add(io, cn, a);
            }
            StampKind::Ccvs => {
                let io = ctx.branch("Io", element);
                let ii = ctx.branch("Ii", element);
                mna.stamp_branch(p, n, io);
                mna.stamp_branch(cp, cn, ii);
                mna.add(io, ii, -ctx.value(element));
            }
            StampKind::CcvsZ => {
                let io = ctx.branch("Io", element);
                let ii = ctx.branch("Ii", element);
                let (num, den) = ctx.split(&ctx.value(element))?;
                let zo = ctx.values.param(element, "zo");
                mna.add(p, io, one());
                mna.add(n, io, -one());
                mna.add(io, p, den.clone());
                mna.add(io, n, -den.clone());
                mna.add(io, ii, -num);
                mna.add(io, io, -(zo * den));
                mna.stamp_branch(cp, cn, ii);
            }
            StampKind::Nullor => {
                let io = ctx.branch("Io", element);
                mna.add(p, io, one());
                mna.add(n, io, -one());
                mna.add(io, cp, one());
                mna.add(io, cn, -one());
            }
            StampKind::Transformer => {
                let io = ctx.branch("Io", element);
                let ratio = ctx.value(element);
                for (row, col, v) in [
                    (p, io, ratio.clone()),
                    (n, io, -ratio.clone()),
                    (cp, io, -one()),
                    (cn, io, one()),
                    (io, p, ratio.clone()),
                    (io, n, -ratio),
                    (io, cp, -one()),
                    (io, cn, one()),
                ] {
                    mna.add(row, col, v);
                }
            }
            StampKind::Gyrator => {
                let g = ctx.value(element);
                for (row, col, v) in [
                    (p, cp, g.clone()),
                    (p, cn, -g.clone()),
                    (n, cp, -g.clone()),
                    (n, cn, g.clone()),
                    (cp, p, -g.clone()),
                    (cp, n, g.clone()),
                    (cn, p, g.clone()),
                    (cn, n, -g),
                ] {
                    mna.add(row, col, v);
                }
            }
        }
        Ok(())
    }
}
