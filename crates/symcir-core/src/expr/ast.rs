//! Expression AST types and arithmetic.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Symbolic expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric constant.
    Constant(f64),
    /// Free symbol: a parameter name or the Laplace/frequency variable.
    Symbol(String),
    /// Binary operation.
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation.
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    /// Function call.
    Function { name: String, args: Vec<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

impl Default for Expr {
    fn default() -> Self {
        Expr::Constant(0.0)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Constant(v)
    }
}

impl Expr {
    pub fn zero() -> Self {
        Expr::Constant(0.0)
    }

    pub fn one() -> Self {
        Expr::Constant(1.0)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// The constant value, if this node is a constant.
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Constant(v) if *v == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Constant(v) if *v == 1.0)
    }

    /// Raise to a power, folding trivial exponents.
    pub fn pow(self, exponent: Expr) -> Expr {
        match (&self, &exponent) {
            (_, Expr::Constant(e)) if *e == 0.0 => Expr::one(),
            (_, Expr::Constant(e)) if *e == 1.0 => self,
            (Expr::Constant(b), Expr::Constant(e)) => Expr::Constant(b.powf(*e)),
            _ => binary(BinaryOp::Pow, self, exponent),
        }
    }

    pub fn powi(self, exponent: i32) -> Expr {
        self.pow(Expr::Constant(exponent as f64))
    }

    pub fn sqrt(self) -> Expr {
        match self {
            Expr::Constant(v) if v >= 0.0 => Expr::Constant(v.sqrt()),
            other => Expr::function("sqrt", vec![other]),
        }
    }

    /// Sum of an iterator of expressions.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        terms.into_iter().fold(Expr::zero(), |acc, t| acc + t)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Constant(a), Expr::Constant(b)) => Expr::Constant(a + b),
            (a, b) if a.is_zero() => b,
            (a, b) if b.is_zero() => a,
            (a, Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand,
            }) => binary(BinaryOp::Sub, a, *operand),
            (a, b) => binary(BinaryOp::Add, a, b),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Constant(a), Expr::Constant(b)) => Expr::Constant(a - b),
            (a, b) if b.is_zero() => a,
            (a, b) if a.is_zero() => -b,
            (a, b) => binary(BinaryOp::Sub, a, b),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Constant(a), Expr::Constant(b)) => Expr::Constant(a * b),
            (a, _) if a.is_zero() => Expr::zero(),
            (_, b) if b.is_zero() => Expr::zero(),
            (a, b) if a.is_one() => b,
            (a, b) if b.is_one() => a,
            (Expr::Constant(a), b) if a == -1.0 => -b,
            (a, Expr::Constant(b)) if b == -1.0 => -a,
            (a, b) => binary(BinaryOp::Mul, a, b),
        }
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Constant(a), Expr::Constant(b)) if b != 0.0 => Expr::Constant(a / b),
            (a, _) if a.is_zero() => Expr::zero(),
            (a, b) if b.is_one() => a,
            (a, b) => binary(BinaryOp::Div, a, b),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Constant(v) => Expr::Constant(-v),
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand,
            } => *operand,
            other => Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(other),
            },
        }
    }
}

impl Add<f64> for Expr {
    type Output = Expr;

    fn add(self, rhs: f64) -> Expr {
        self + Expr::Constant(rhs)
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        self * Expr::Constant(rhs)
    }
}
