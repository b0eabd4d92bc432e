//! Reference algebra backend over rational functions.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use symcir_core::Expr;
use symcir_core::expr::{BinaryOp, UnaryOp};

use super::poly::{Poly, Rational};
use super::{LimitDirection, SimplifyMethod, SymbolicAlgebra};
use crate::config::EngineConfig;
use crate::error::{AlgebraResult, ComputationError};

/// Largest matrix the minor expansion accepts.
const MAX_DIMENSION: usize = 63;

/// Relative distance under which two poles count as one.
const REPEATED_ROOT_TOLERANCE: f64 = 1e-6;

/// Rational-function backend for [`SymbolicAlgebra`].
///
/// Expressions are converted to quotients of multivariate polynomials with
/// `f64` coefficients; subexpressions that are not rational in their symbols
/// (`sqrt(L1*L2)`, `exp(x)`) are carried along as opaque atoms. Every call
/// is bounded by a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct RationalAlgebra {
    timeout: Duration,
}

impl Default for RationalAlgebra {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl RationalAlgebra {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.timeout)
    }

    fn session(&self) -> Session {
        Session {
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
            atoms: BTreeMap::new(),
        }
    }
}

/// Conversion state of one service call.
struct Session {
    deadline: Instant,
    timeout: Duration,
    /// Opaque subexpressions by their variable name.
    atoms: BTreeMap<String, Expr>,
}

impl Session {
    fn check(&self) -> AlgebraResult<()> {
        if Instant::now() >= self.deadline {
            Err(ComputationError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }

    fn atom(&mut self, expr: &Expr) -> Rational {
        let key = format!("{{{}}}", expr);
        self.atoms.entry(key.clone()).or_insert_with(|| expr.clone());
        Poly::var(key).into()
    }

    fn rational(&mut self, expr: &Expr) -> AlgebraResult<Rational> {
        self.check()?;
        match expr {
            Expr::Constant(v) => Ok(Rational::constant(*v)),
            Expr::Symbol(name) => Ok(Poly::var(name.clone()).into()),
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand,
            } => Ok(self.rational(operand)?.neg()),
            Expr::BinaryOp {
                op: BinaryOp::Pow,
                left,
                right,
            } => self.power(expr, left, right),
            Expr::BinaryOp { op, left, right } => {
                let l = self.rational(left)?;
                let r = self.rational(right)?;
                match op {
                    BinaryOp::Add => Ok(l.add(&r)),
                    BinaryOp::Sub => Ok(l.sub(&r)),
                    BinaryOp::Mul => Ok(l.mul(&r)),
                    BinaryOp::Div | BinaryOp::Pow => l
                        .div(&r)
                        .ok_or_else(|| ComputationError::Failed(format!("division by zero in {}", expr))),
                }
            }
            Expr::Function { .. } => match expr.eval(&Default::default()) {
                Some(v) if v.is_finite() => Ok(Rational::constant(v)),
                _ => Ok(self.atom(expr)),
            },
        }
    }

    fn power(&mut self, expr: &Expr, base: &Expr, exponent: &Expr) -> AlgebraResult<Rational> {
        let Some(e) = exponent.as_constant().or_else(|| exponent.eval(&Default::default())) else {
            return Ok(self.atom(expr));
        };
        if e.fract() == 0.0 && e.abs() <= i32::MAX as f64 {
            let b = self.rational(base)?;
            return b
                .powi(e as i32)
                .ok_or_else(|| ComputationError::Failed(format!("zero raised to a negative power in {}", expr)));
        }
        match base.eval(&Default::default()) {
            Some(b) => Ok(Rational::constant(b.powf(e))),
            None => Ok(self.atom(expr)),
        }
    }

    fn poly_expr(&self, p: &Poly) -> Expr {
        let mut out = Expr::zero();
        for (monomial, c) in p.terms() {
            let mut term = Expr::one();
            for (var, e) in monomial {
                let factor = match self.atoms.get(var) {
                    Some(atom) => atom.clone(),
                    None => Expr::symbol(var.clone()),
                };
                term = term * factor.powi(*e as i32);
            }
            out = if c < 0.0 {
                out - term * (-c)
            } else {
                out + Expr::Constant(c) * term
            };
        }
        out
    }

    fn expr(&self, r: &Rational) -> Expr {
        self.poly_expr(&r.num) / self.poly_expr(&r.den)
    }

    /// Polynomial coefficients of a rational function whose denominator is
    /// free of `var`.
    fn coefficients(&mut self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Rational>> {
        let r = self.rational(expr)?;
        if r.den.contains_var(var) {
            return Err(ComputationError::Failed(format!("{} is not a polynomial in {}", expr, var)));
        }
        Ok(r
            .num
            .coefficients(var)
            .into_iter()
            .map(|c| Rational { num: c, den: r.den.clone() }.normalized())
            .collect())
    }

    /// Fraction-free rows: each row multiplied by the product of the
    /// distinct denominators in it. Returns the rows and each row's factor.
    fn scaled_rows(&mut self, rows: impl Iterator<Item = Vec<Expr>>) -> AlgebraResult<(Vec<Vec<Poly>>, Vec<Poly>)> {
        let mut out = Vec::new();
        let mut factors = Vec::new();
        for row in rows {
            let entries = row
                .iter()
                .map(|e| self.rational(e))
                .collect::<AlgebraResult<Vec<_>>>()?;
            let (polys, factor) = clear_denominators(&entries);
            out.push(polys);
            factors.push(factor);
        }
        Ok((out, factors))
    }

    /// Excitation column matching rows scaled by `factors`.
    ///
    /// The distinct denominators of the excitation are cleared as well;
    /// their product is returned and divides every Cramer numerator built
    /// from the column.
    fn scaled_column(&mut self, rhs: &DVector<Expr>, factors: &[Poly]) -> AlgebraResult<(Vec<Poly>, Poly)> {
        let entries = rhs
            .iter()
            .map(|e| self.rational(e))
            .collect::<AlgebraResult<Vec<_>>>()?;
        let (polys, excitation) = clear_denominators(&entries);
        let column = polys.iter().zip(factors).map(|(p, f)| p.mul(f)).collect();
        Ok((column, excitation))
    }

    /// Determinant of the columns `cols` of `rows` by minor expansion along
    /// rows, memoized on the set of columns already used.
    fn det(&self, rows: &[Vec<Poly>], cols: &[usize]) -> AlgebraResult<Poly> {
        let n = cols.len();
        if n != rows.len() {
            return Err(ComputationError::Failed(format!(
                "determinant of a {}x{} matrix",
                rows.len(),
                n
            )));
        }
        if n > MAX_DIMENSION {
            return Err(ComputationError::Unsupported(format!(
                "determinant of dimension {} exceeds {}",
                n, MAX_DIMENSION
            )));
        }
        if n == 0 {
            return Ok(Poly::one());
        }
        let mut memo = HashMap::new();
        self.minor(rows, cols, 0, &mut memo)
    }

    fn minor(
        &self,
        rows: &[Vec<Poly>],
        cols: &[usize],
        used: u64,
        memo: &mut HashMap<u64, Poly>,
    ) -> AlgebraResult<Poly> {
        let row = used.count_ones() as usize;
        if row == cols.len() {
            return Ok(Poly::one());
        }
        if let Some(p) = memo.get(&used) {
            return Ok(p.clone());
        }
        self.check()?;

        let mut total = Poly::zero();
        let mut position = 0;
        for (k, &col) in cols.iter().enumerate() {
            if used & (1 << k) != 0 {
                continue;
            }
            let entry = &rows[row][col];
            if !entry.is_zero() {
                let sub = self.minor(rows, cols, used | (1 << k), memo)?;
                if !sub.is_zero() {
                    let term = entry.mul(&sub);
                    total = if position % 2 == 0 { total.add(&term) } else { total.sub(&term) };
                }
            }
            position += 1;
        }
        memo.insert(used, total.clone());
        Ok(total)
    }

    fn roots(&mut self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Complex64>> {
        let r = self.rational(expr)?;
        numeric_roots(&numeric_coefficients(&r.num, var)?)
    }
}

/// Multiply `entries` by the product of their distinct non-constant
/// denominators; constant denominators are divided out directly.
fn clear_denominators(entries: &[Rational]) -> (Vec<Poly>, Poly) {
    let mut dens: Vec<&Poly> = Vec::new();
    for r in entries {
        if r.den.as_constant().is_none() && !dens.contains(&&r.den) {
            dens.push(&r.den);
        }
    }
    let polys = entries
        .iter()
        .map(|r| {
            let mut p = match r.den.as_constant() {
                Some(c) => r.num.scale(1.0 / c),
                None => r.num.clone(),
            };
            for d in dens.iter().filter(|d| ***d != r.den) {
                p = p.mul(d);
            }
            p
        })
        .collect();
    let product = dens.iter().fold(Poly::one(), |acc, d| acc.mul(d));
    (polys, product)
}

/// Coefficients of a univariate polynomial in ascending powers.
fn numeric_coefficients(p: &Poly, var: &str) -> AlgebraResult<Vec<f64>> {
    p.coefficients(var)
        .iter()
        .map(|c| {
            c.as_constant().ok_or_else(|| {
                ComputationError::Failed(format!("coefficient of {} is not numeric: {:?}", var, c.variables()))
            })
        })
        .collect()
}

/// Roots of `sum(c_k x^k)`, sorted by real then imaginary part.
fn numeric_roots(coeffs: &[f64]) -> AlgebraResult<Vec<Complex64>> {
    let Some(high) = coeffs.iter().rposition(|c| *c != 0.0) else {
        return Err(ComputationError::Failed("roots of the zero polynomial".to_string()));
    };
    let low = coeffs.iter().position(|c| *c != 0.0).unwrap_or(0);
    let mut roots = vec![Complex64::new(0.0, 0.0); low];

    let reduced = &coeffs[low..=high];
    let degree = reduced.len() - 1;
    match degree {
        0 => {}
        1 => roots.push(Complex64::new(-reduced[0] / reduced[1], 0.0)),
        _ => {
            let lead = reduced[degree];
            let companion = DMatrix::from_fn(degree, degree, |i, j| {
                if j == degree - 1 {
                    -reduced[i] / lead
                } else if i == j + 1 {
                    1.0
                } else {
                    0.0
                }
            });
            let eigen = companion.complex_eigenvalues();
            if eigen.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
                return Err(ComputationError::Failed("root finding did not converge".to_string()));
            }
            roots.extend(eigen.iter().copied());
        }
    }
    roots.sort_by(|a, b| a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im)));
    Ok(roots)
}

fn eval_complex(coeffs: &[f64], z: Complex64) -> Complex64 {
    coeffs
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, c| acc * z + c)
}

impl SymbolicAlgebra for RationalAlgebra {
    fn determinant(&self, matrix: &DMatrix<Expr>) -> AlgebraResult<Expr> {
        let mut session = self.session();
        let rows = matrix.row_iter().map(|r| r.iter().cloned().collect());
        let (rows, factors) = session.scaled_rows(rows)?;
        let scale = factors.iter().fold(Poly::one(), |acc, f| acc.mul(f));
        let cols: Vec<usize> = (0..matrix.ncols()).collect();
        let det = session.det(&rows, &cols)?;
        let r = Rational::new(det, scale)
            .ok_or_else(|| ComputationError::Failed("zero row scale".to_string()))?;
        Ok(session.expr(&r))
    }

    fn simplify(&self, expr: &Expr, method: SimplifyMethod) -> AlgebraResult<Expr> {
        match method {
            SimplifyMethod::Normal => {
                let mut session = self.session();
                let r = session.rational(expr)?;
                Ok(session.expr(&r))
            }
            SimplifyMethod::Numeric => Ok(fold_constants(expr)),
        }
    }

    fn solve_linear_system(&self, matrix: &DMatrix<Expr>, rhs: &DVector<Expr>) -> AlgebraResult<Vec<Expr>> {
        let n = matrix.ncols();
        let mut session = self.session();
        let (rows, _) = session.scaled_rows(
            matrix
                .row_iter()
                .zip(rhs.iter())
                .map(|(r, b)| r.iter().cloned().chain(std::iter::once(b.clone())).collect()),
        )?;
        let cols: Vec<usize> = (0..n).collect();
        let det = session.det(&rows, &cols)?;
        if det.is_zero() {
            return Err(ComputationError::Failed("singular matrix".to_string()));
        }
        let mut solution = Vec::with_capacity(n);
        for j in 0..n {
            let mut replaced = cols.clone();
            replaced[j] = n;
            let numer = session.det(&rows, &replaced)?;
            let r = Rational::new(numer, det.clone())
                .ok_or_else(|| ComputationError::Failed("singular matrix".to_string()))?;
            solution.push(session.expr(&r));
        }
        Ok(solution)
    }

    fn cramer(
        &self,
        matrix: &DMatrix<Expr>,
        rhs: &DVector<Expr>,
        weights: &[(usize, f64)],
    ) -> AlgebraResult<(Expr, Expr)> {
        let n = matrix.ncols();
        let mut session = self.session();
        let (mut rows, factors) = session.scaled_rows(matrix.row_iter().map(|r| r.iter().cloned().collect()))?;
        let (column, excitation) = session.scaled_column(rhs, &factors)?;
        for (row, entry) in rows.iter_mut().zip(column) {
            row.push(entry);
        }
        let cols: Vec<usize> = (0..n).collect();
        let denom = session.det(&rows, &cols)?;
        let mut numer = Poly::zero();
        for &(col, w) in weights {
            let mut replaced = cols.clone();
            replaced[col] = n;
            numer = numer.add(&session.det(&rows, &replaced)?.scale(w));
        }
        // Both share the row scaling, so only their common factor may go.
        let common = numer.common_monomial(&denom);
        let numer = numer.divide_monomial(&common);
        let denom = denom.divide_monomial(&common);

        // Excitation denominators stay with the numerator.
        let numer = Rational::new(numer, excitation)
            .ok_or_else(|| ComputationError::Failed("zero excitation denominator".to_string()))?;
        let numer = if numer.is_polynomial() {
            session.poly_expr(&numer.num)
        } else {
            session.expr(&numer)
        };
        Ok((numer, session.poly_expr(&denom)))
    }

    fn polynomial_coefficients(&self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Expr>> {
        let mut session = self.session();
        let coeffs = session.coefficients(expr, var)?;
        Ok(coeffs.iter().map(|c| session.expr(c)).collect())
    }

    fn polynomial_roots(&self, expr: &Expr, var: &str) -> AlgebraResult<Vec<Complex64>> {
        self.session().roots(expr, var)
    }

    fn limit(&self, expr: &Expr, var: &str, point: f64, direction: LimitDirection) -> AlgebraResult<Expr> {
        let mut session = self.session();
        let r = session.rational(expr)?;
        if r.is_zero() {
            return Ok(Expr::zero());
        }

        if point.is_infinite() {
            let (dn, dd) = (r.num.degree(var), r.den.degree(var));
            return if dn < dd {
                Ok(Expr::zero())
            } else if dn == dd {
                let lead = |p: &Poly, d: u32| p.coefficients(var).swap_remove(d as usize);
                let q = Rational::new(lead(&r.num, dn), lead(&r.den, dd))
                    .ok_or_else(|| ComputationError::Failed("zero leading coefficient".to_string()))?;
                Ok(session.expr(&q))
            } else {
                Err(ComputationError::Failed(format!("{} diverges as {} grows", expr, var)))
            };
        }

        let shift = Poly::var(var).add(&Poly::constant(point));
        let num = r.num.compose(var, &shift);
        let den = r.den.compose(var, &shift);
        let (kn, kd) = (num.lowest_degree(var), den.lowest_degree(var));
        if kn > kd {
            return Ok(Expr::zero());
        }
        let cn = num.coefficients(var).swap_remove(kn as usize);
        let cd = den.coefficients(var).swap_remove(kd as usize);
        if kn == kd {
            let q = Rational::new(cn, cd)
                .ok_or_else(|| ComputationError::Failed("zero lowest-order coefficient".to_string()))?;
            return Ok(session.expr(&q));
        }

        // Pole of order kd - kn at the point.
        let sign = match (cn.as_constant(), cd.as_constant()) {
            (Some(a), Some(b)) => (a / b).signum(),
            _ => {
                return Err(ComputationError::Failed(format!(
                    "sign of the divergence of {} at {} = {} is not numeric",
                    expr, var, point
                )));
            }
        };
        let odd = (kd - kn) % 2 == 1;
        match direction {
            LimitDirection::Plus => Ok(Expr::Constant(sign * f64::INFINITY)),
            LimitDirection::Minus if odd => Ok(Expr::Constant(-sign * f64::INFINITY)),
            LimitDirection::Minus => Ok(Expr::Constant(sign * f64::INFINITY)),
            LimitDirection::Both if odd => Err(ComputationError::Failed(format!(
                "two-sided limit of {} at {} = {} does not exist",
                expr, var, point
            ))),
            LimitDirection::Both => Ok(Expr::Constant(sign * f64::INFINITY)),
        }
    }

    fn integrate(&self, expr: &Expr, var: &str, bounds: Option<(&Expr, &Expr)>) -> AlgebraResult<Expr> {
        let mut session = self.session();
        let r = session.rational(expr)?;
        if r.den.contains_var(var) {
            return Err(ComputationError::Unsupported(format!(
                "integration of a rational function in {}",
                var
            )));
        }
        let antiderivative = Rational {
            num: r.num.integrate(var),
            den: r.den,
        }
        .normalized();
        let primitive = session.expr(&antiderivative);
        let Some((lo, hi)) = bounds else {
            return Ok(primitive);
        };
        let definite = primitive.substitute_one(var, hi) - primitive.substitute_one(var, lo);
        let r = session.rational(&definite)?;
        Ok(session.expr(&r))
    }

    fn inverse_laplace(&self, numer: &Expr, denom: &Expr, laplace_var: &str, time_var: &str) -> AlgebraResult<Expr> {
        let mut session = self.session();
        let n = session.rational(numer)?;
        let d = session.rational(denom)?;
        let f = n
            .div(&d)
            .ok_or_else(|| ComputationError::Failed("zero denominator".to_string()))?;
        let num = numeric_coefficients(&f.num, laplace_var)?;
        let den = numeric_coefficients(&f.den, laplace_var)?;
        let degree = |c: &[f64]| c.iter().rposition(|x| *x != 0.0).unwrap_or(0);
        if f.num.is_zero() {
            return Ok(Expr::zero());
        }
        if degree(&num) >= degree(&den) {
            return Err(ComputationError::Unsupported(
                "improper transfer: the response holds impulsive terms".to_string(),
            ));
        }

        let poles = numeric_roots(&den)?;
        for (i, a) in poles.iter().enumerate() {
            for b in &poles[i + 1..] {
                if (a - b).norm() <= REPEATED_ROOT_TOLERANCE * a.norm().max(1.0) {
                    return Err(ComputationError::Unsupported(
                        "inverse transform with repeated poles".to_string(),
                    ));
                }
            }
        }

        let slope: Vec<f64> = den
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| c * k as f64)
            .collect();
        let t = Expr::symbol(time_var);
        let mut response = Expr::zero();
        for p in &poles {
            let residue = eval_complex(&num, *p) / eval_complex(&slope, *p);
            let decay = |rate: f64| {
                if rate == 0.0 {
                    Expr::one()
                } else {
                    Expr::function("exp", vec![Expr::Constant(rate) * t.clone()])
                }
            };
            if p.im.abs() <= REPEATED_ROOT_TOLERANCE * p.norm().max(1.0) {
                response = response + Expr::Constant(residue.re) * decay(p.re);
            } else if p.im > 0.0 {
                // Conjugate pair: 2 e^(at) (Re r cos(bt) - Im r sin(bt)).
                let wt = Expr::Constant(p.im) * t.clone();
                let cos = Expr::function("cos", vec![wt.clone()]) * (2.0 * residue.re);
                let sin = Expr::function("sin", vec![wt]) * (2.0 * residue.im);
                response = response + decay(p.re) * (cos - sin);
            }
        }
        Ok(response)
    }

    fn as_numer_denom(&self, expr: &Expr) -> AlgebraResult<(Expr, Expr)> {
        let mut session = self.session();
        let r = session.rational(expr)?;
        Ok((session.poly_expr(&r.num), session.poly_expr(&r.den)))
    }
}

/// Replace every symbol-free subexpression by its value.
fn fold_constants(expr: &Expr) -> Expr {
    if let Some(v) = expr.eval(&Default::default()) {
        return Expr::Constant(v);
    }
    match expr {
        Expr::BinaryOp { op, left, right } => {
            let (l, r) = (fold_constants(left), fold_constants(right));
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Pow => l.pow(r),
            }
        }
        Expr::UnaryOp { operand, .. } => -fold_constants(operand),
        Expr::Function { name, args } => Expr::function(name.clone(), args.iter().map(fold_constants).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcir_core::{EvalContext, parse_expression};

    fn e(s: &str) -> Expr {
        parse_expression(s).unwrap()
    }

    fn eval(expr: &Expr, bindings: &[(&str, f64)]) -> f64 {
        let mut ctx = EvalContext::new();
        for (k, v) in bindings {
            ctx.set(*k, *v);
        }
        expr.eval(&ctx).unwrap()
    }

    #[test]
    fn test_determinant_symbolic() {
        let algebra = RationalAlgebra::default();
        let m = DMatrix::from_row_slice(2, 2, &[e("1/R1 + 1/R2"), e("-1/R2"), e("-1/R2"), e("1/R2")]);
        let det = algebra.determinant(&m).unwrap();
        let at = [("R1", 2.0), ("R2", 5.0)];
        let expected = (1.0 / 2.0 + 1.0 / 5.0) / 5.0 - 1.0 / 25.0;
        assert!((eval(&det, &at) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cramer_divider() {
        let algebra = RationalAlgebra::default();
        // Rows: I_V1, V_in, V_out.
        let m = DMatrix::from_row_slice(
            3,
            3,
            &[
                e("0"), e("1"), e("0"),
                e("1"), e("1/R1"), e("-1/R1"),
                e("0"), e("-1/R1"), e("1/R1 + 1/R2"),
            ],
        );
        let rhs = DVector::from_vec(vec![e("1"), e("0"), e("0")]);
        let (numer, denom) = algebra.cramer(&m, &rhs, &[(2, 1.0)]).unwrap();
        let gain = algebra.simplify(&(numer / denom), SimplifyMethod::Normal).unwrap();
        assert!(!gain.contains_symbol("s"));
        let at = [("R1", 3.0), ("R2", 1.0)];
        assert!((eval(&gain, &at) - 0.25).abs() < 1e-12);
        assert_eq!(gain.to_string(), "R2/(R1+R2)");
    }

    #[test]
    fn test_cramer_keeps_excitation_out_of_denominator() {
        let algebra = RationalAlgebra::default();
        let m = DMatrix::from_row_slice(2, 2, &[e("s + 2"), e("1/R"), e("0"), e("1")]);
        let rhs = DVector::from_vec(vec![e("1/(s + 1)"), e("0")]);
        let (numer, denom) = algebra.cramer(&m, &rhs, &[(0, 1.0)]).unwrap();
        let at = [("s", 1.0), ("R", 4.0)];
        // The excitation pole at s = -1 must not enter the determinant.
        let denom_at = |r: f64| eval(&denom, &[("s", 1.0), ("R", r)]) / eval(&denom, &[("s", 0.0), ("R", r)]);
        assert!((denom_at(4.0) - 1.5).abs() < 1e-12);
        assert!((eval(&numer, &at) / eval(&denom, &at) - 1.0 / 6.0).abs() < 1e-12);

        let numeric = DMatrix::from_row_slice(1, 1, &[e("s + 2")]);
        let (numer, denom) = algebra
            .cramer(&numeric, &DVector::from_vec(vec![e("1/(s + 1)")]), &[(0, 1.0)])
            .unwrap();
        let poles = algebra.polynomial_roots(&denom, "s").unwrap();
        assert_eq!(poles.len(), 1);
        assert!((poles[0].re + 2.0).abs() < 1e-12);
        assert!(algebra.polynomial_roots(&numer, "s").unwrap().is_empty());
    }

    #[test]
    fn test_solve_linear_system() {
        let algebra = RationalAlgebra::default();
        let m = DMatrix::from_row_slice(2, 2, &[e("2"), e("1"), e("1"), e("3")]);
        let rhs = DVector::from_vec(vec![e("3"), e("5")]);
        let x = algebra.solve_linear_system(&m, &rhs).unwrap();
        assert!((x[0].as_constant().unwrap() - 0.8).abs() < 1e-12);
        assert!((x[1].as_constant().unwrap() - 1.4).abs() < 1e-12);

        let singular = DMatrix::from_row_slice(2, 2, &[e("1"), e("2"), e("2"), e("4")]);
        assert!(algebra.solve_linear_system(&singular, &rhs).is_err());
    }

    #[test]
    fn test_roots() {
        let algebra = RationalAlgebra::default();
        let roots = algebra.polynomial_roots(&e("s^2 + 3*s + 2"), "s").unwrap();
        assert_eq!(roots.len(), 2);
        assert!((roots[0].re + 2.0).abs() < 1e-9);
        assert!((roots[1].re + 1.0).abs() < 1e-9);

        let roots = algebra.polynomial_roots(&e("s*(s^2 + 1)"), "s").unwrap();
        assert_eq!(roots.len(), 3);
        assert!(roots.iter().any(|z| z.norm() < 1e-12));
        assert!(roots.iter().any(|z| (z.im - 1.0).abs() < 1e-9));

        assert!(algebra.polynomial_roots(&e("s + a"), "s").is_err());
    }

    #[test]
    fn test_coefficients() {
        let algebra = RationalAlgebra::default();
        let c = algebra
            .polynomial_coefficients(&e("(a*s^2 + 2*s)/b + 1"), "s")
            .unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c[0].as_constant(), Some(1.0));
        assert!((eval(&c[2], &[("a", 3.0), ("b", 2.0)]) - 1.5).abs() < 1e-12);
        assert!(algebra.polynomial_coefficients(&e("1/(s+1)"), "s").is_err());
    }

    #[test]
    fn test_limits() {
        let algebra = RationalAlgebra::default();
        let dc = algebra
            .limit(&e("(s + 2)/(3*s + 4)"), "s", 0.0, LimitDirection::Both)
            .unwrap();
        assert_eq!(dc.as_constant(), Some(0.5));
        let removable = algebra
            .limit(&e("(s^2 - 1)/(s - 1)"), "s", 1.0, LimitDirection::Both)
            .unwrap();
        assert!((removable.as_constant().unwrap() - 2.0).abs() < 1e-12);
        let hf = algebra
            .limit(&e("(2*s + 1)/(s + 5)"), "s", f64::INFINITY, LimitDirection::Both)
            .unwrap();
        assert!((hf.as_constant().unwrap() - 2.0).abs() < 1e-12);
        assert!(algebra.limit(&e("1/s"), "s", 0.0, LimitDirection::Both).is_err());
        let right = algebra.limit(&e("1/s"), "s", 0.0, LimitDirection::Plus).unwrap();
        assert_eq!(right.as_constant(), Some(f64::INFINITY));
    }

    #[test]
    fn test_integrate() {
        let algebra = RationalAlgebra::default();
        let area = algebra
            .integrate(&e("3*x^2 + a"), "x", Some((&e("0"), &e("2"))))
            .unwrap();
        assert!((eval(&area, &[("a", 1.0)]) - 10.0).abs() < 1e-12);
        assert!(algebra.integrate(&e("1/x"), "x", None).is_err());
    }

    #[test]
    fn test_inverse_laplace_first_order() {
        let algebra = RationalAlgebra::default();
        // 1/(s+2) -> exp(-2t)
        let h = algebra.inverse_laplace(&e("1"), &e("s + 2"), "s", "t").unwrap();
        assert!((eval(&h, &[("t", 0.5)]) - (-1.0f64).exp()).abs() < 1e-9);
        // Step response of 1/(s+1): 1 - exp(-t)
        let step = algebra.inverse_laplace(&e("1"), &e("s*(s + 1)"), "s", "t").unwrap();
        assert!((eval(&step, &[("t", 1.0)]) - (1.0 - (-1.0f64).exp())).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_laplace_oscillation() {
        let algebra = RationalAlgebra::default();
        // 1/(s^2 + 1) -> sin(t)
        let h = algebra.inverse_laplace(&e("1"), &e("s^2 + 1"), "s", "t").unwrap();
        assert!((eval(&h, &[("t", 0.7)]) - 0.7f64.sin()).abs() < 1e-9);
        assert!(algebra.inverse_laplace(&e("1"), &e("(s+1)^2"), "s", "t").is_err());
        assert!(algebra.inverse_laplace(&e("s"), &e("s+1"), "s", "t").is_err());
    }

    #[test]
    fn test_opaque_atoms_survive() {
        let algebra = RationalAlgebra::default();
        let (n, d) = algebra.as_numer_denom(&e("k*sqrt(L1*L2)/s")).unwrap();
        assert!(n.contains_symbol("L1"));
        assert_eq!(d, Expr::symbol("s"));
        let folded = algebra.simplify(&e("x*sqrt(4) + 2*3"), SimplifyMethod::Numeric).unwrap();
        assert_eq!(folded.to_string(), "x*2+6");
    }

    #[test]
    fn test_timeout() {
        let algebra = RationalAlgebra::new(Duration::ZERO);
        let m = DMatrix::from_element(3, 3, e("x"));
        assert!(matches!(
            algebra.determinant(&m),
            Err(ComputationError::Timeout(_))
        ));
    }
}
