//! Expression evaluation, substitution and symbol queries.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::eval_function;

/// Context for numeric expression evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Symbol values by name.
    pub values: HashMap<String, f64>,
}

impl EvalContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a symbol value.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }
}

impl Expr {
    /// Evaluate the expression numerically.
    ///
    /// Returns `None` if a symbol has no value in the context.
    pub fn eval(&self, ctx: &EvalContext) -> Option<f64> {
        match self {
            Expr::Constant(v) => Some(*v),
            Expr::Symbol(name) => ctx.values.get(name).copied(),
            Expr::BinaryOp { op, left, right } => {
                let l = left.eval(ctx)?;
                let r = right.eval(ctx)?;
                Some(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Pow => l.powf(r),
                })
            }
            Expr::UnaryOp { op, operand } => {
                let v = operand.eval(ctx)?;
                match op {
                    UnaryOp::Neg => Some(-v),
                }
            }
            Expr::Function { name, args } => {
                let arg_values = args
                    .iter()
                    .map(|a| a.eval(ctx))
                    .collect::<Option<Vec<f64>>>()?;
                eval_function(name, &arg_values)
            }
        }
    }

    /// All free symbols, sorted.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_symbols(out),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_symbols(out);
                }
            }
        }
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        match self {
            Expr::Constant(_) => false,
            Expr::Symbol(name) => name == symbol,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_symbol(symbol) || right.contains_symbol(symbol)
            }
            Expr::UnaryOp { operand, .. } => operand.contains_symbol(symbol),
            Expr::Function { args, .. } => args.iter().any(|a| a.contains_symbol(symbol)),
        }
    }

    /// Replace symbols by expressions in a single pass (no re-substitution).
    pub fn substitute(&self, bindings: &HashMap<String, Expr>) -> Expr {
        self.map_symbols(&|name| bindings.get(name).cloned())
    }

    /// Replace a single symbol.
    pub fn substitute_one(&self, symbol: &str, value: &Expr) -> Expr {
        self.map_symbols(&|name| (name == symbol).then(|| value.clone()))
    }

    /// Rename symbols; `rename` returns `None` to keep a symbol unchanged.
    pub fn rename_symbols(&self, rename: &dyn Fn(&str) -> Option<String>) -> Expr {
        self.map_symbols(&|name| rename(name).map(Expr::Symbol))
    }

    /// Rebuild the expression, replacing each symbol for which `f` returns a value.
    ///
    /// Arithmetic nodes are rebuilt through the folding operators, so
    /// substituting constants collapses constant subtrees.
    pub fn map_symbols(&self, f: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        match self {
            Expr::Constant(v) => Expr::Constant(*v),
            Expr::Symbol(name) => f(name).unwrap_or_else(|| self.clone()),
            Expr::BinaryOp { op, left, right } => {
                let l = left.map_symbols(f);
                let r = right.map_symbols(f);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Pow => l.pow(r),
                }
            }
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Neg => -operand.map_symbols(f),
            },
            Expr::Function { name, args } => {
                let args: Vec<Expr> = args.iter().map(|a| a.map_symbols(f)).collect();
                let folded = args
                    .iter()
                    .map(Expr::as_constant)
                    .collect::<Option<Vec<f64>>>()
                    .and_then(|values| eval_function(name, &values));
                match folded {
                    Some(v) if v.is_finite() => Expr::Constant(v),
                    _ => Expr::Function {
                        name: name.clone(),
                        args,
                    },
                }
            }
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp { op, .. } => match op {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        },
        // Negations are always parenthesized when nested.
        Expr::UnaryOp { .. } => 0,
        Expr::Constant(v) if *v < 0.0 => 0,
        _ => 5,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{}", v),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::BinaryOp { op, left, right } => {
                let (symbol, prec) = match op {
                    BinaryOp::Add => ("+", 1),
                    BinaryOp::Sub => ("-", 1),
                    BinaryOp::Mul => ("*", 2),
                    BinaryOp::Div => ("/", 2),
                    BinaryOp::Pow => ("^", 4),
                };
                // Left-associative operators need stricter grouping on the right.
                let (left_min, right_min) = match op {
                    BinaryOp::Pow => (prec + 1, prec),
                    _ => (prec, prec + 1),
                };
                write_operand(f, left, left_min)?;
                write!(f, "{}", symbol)?;
                write_operand(f, right, right_min)
            }
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Neg => {
                    write!(f, "-")?;
                    write_operand(f, operand, 3)
                }
            },
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
