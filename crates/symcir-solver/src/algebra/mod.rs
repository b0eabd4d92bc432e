//! Symbolic algebra service.
//!
//! The instruction engine never manipulates expressions beyond substitution
//! itself; determinants, normal forms, roots and transforms go through the
//! [`SymbolicAlgebra`] trait. Every method returns a [`ComputationError`]
//! on failure so callers can tell a failed computation from a result.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use symcir_core::Expr;

use crate::error::{AlgebraResult, ComputationError};

pub mod poly;
mod rational;

pub use poly::{Monomial, Poly, Rational};
pub use rational::RationalAlgebra;

/// Normal form requested from [`SymbolicAlgebra::simplify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplifyMethod {
    /// Single quotient of expanded polynomials with common factors removed.
    Normal,
    /// Fold every constant subexpression to a number.
    Numeric,
}

/// Side from which [`SymbolicAlgebra::limit`] approaches the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDirection {
    Both,
    Plus,
    Minus,
}

/// Operations the engine needs from a computer-algebra backend.
pub trait SymbolicAlgebra {
    fn determinant(&self, matrix: &DMatrix<Expr>) -> AlgebraResult<Expr>;

    fn simplify(&self, expr: &Expr, method: SimplifyMethod) -> AlgebraResult<Expr>;

    /// Solve `matrix * x = rhs`.
    fn solve_linear_system(&self, matrix: &DMatrix<Expr>, rhs: &DVector<Expr>) -> AlgebraResult<Vec<Expr>>;

    /// Cramer's rule for a weighted sum of unknowns.
    ///
    /// Returns `(numer, denom)` with `denom` the system determinant and
    /// `numer` the matching sum of weighted cofactor determinants, so that
    /// `sum(w_i * x_i) = numer / denom`. Denominators of `rhs` entries end
    /// up in `numer`, never in `denom`.
    fn cramer(
        &self,
        matrix: &DMatrix<Expr>,
        rhs: &DVector<Expr>,
        weights: &[(usize, f64)],
    ) -> AlgebraResult<(Expr, Expr)> {
        let denom = self.determinant(matrix)?;
        let mut numer = Expr::zero();
        for &(col, w) in weights {
            let mut replaced = matrix.clone();
            replaced.set_column(col, rhs);
            numer = numer + self.determinant(&replaced)? * w;
        }
        Ok((numer, denom))
    }

    /// Coefficients of `expr` in ascending powers of `var`.
    fn polynomial_coefficients(&self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Expr>>;

    /// Numeric roots of the numerator of `expr` in `var`.
    fn polynomial_roots(&self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Complex64>>;

    fn limit(&self, expr: &Expr, var: &str, point: f64, direction: LimitDirection) -> AlgebraResult<Expr>;

    /// Antiderivative, or the definite integral when `bounds` is given.
    fn integrate(&self, expr: &Expr, var: &str, bounds: Option<(&Expr, &Expr)>) -> AlgebraResult<Expr>;

    /// Inverse Laplace transform of `numer/denom` as a function of `time_var`.
    fn inverse_laplace(&self, numer: &Expr, denom: &Expr, laplace_var: &str, time_var: &str) -> AlgebraResult<Expr>;

    fn substitute(&self, expr: &Expr, bindings: &HashMap<String, Expr>) -> AlgebraResult<Expr> {
        Ok(expr.substitute(bindings))
    }

    /// Split into numerator and denominator.
    fn as_numer_denom(&self, expr: &Expr) -> AlgebraResult<(Expr, Expr)>;
}

/// Squared modulus of a real-coefficient polynomial in `s` at `s = j*2*pi*f`.
///
/// Even powers form the real part and odd powers the imaginary part.
pub fn squared_modulus(
    algebra: &dyn SymbolicAlgebra,
    expr: &Expr,
    laplace_var: &str,
    frequency_var: &str,
) -> AlgebraResult<Expr> {
    let coeffs = algebra.polynomial_coefficients(expr, laplace_var)?;
    let omega = Expr::Constant(2.0 * std::f64::consts::PI) * Expr::symbol(frequency_var);
    let mut re = Expr::zero();
    let mut im = Expr::zero();
    for (k, c) in coeffs.into_iter().enumerate() {
        let sign = if (k / 2) % 2 == 0 { 1.0 } else { -1.0 };
        let term = c * omega.clone().powi(k as i32) * sign;
        if k % 2 == 0 {
            re = re + term;
        } else {
            im = im + term;
        }
    }
    algebra.simplify(&(re.clone() * re + im.clone() * im), SimplifyMethod::Normal)
}

/// Reject expressions that still hold free symbols other than `allowed`.
pub fn require_numeric(expr: &Expr, allowed: &[&str]) -> AlgebraResult<()> {
    let extra: Vec<String> = expr
        .free_symbols()
        .into_iter()
        .filter(|s| !allowed.contains(&s.as_str()))
        .collect();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(ComputationError::Failed(format!(
            "expression is not numeric, free symbols: {}",
            extra.join(", ")
        )))
    }
}
