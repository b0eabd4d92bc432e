//! Multivariate polynomials and rational functions with `f64` coefficients.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Exponent per variable. Variables with exponent 0 are never stored.
pub type Monomial = BTreeMap<String, u32>;

/// Sparse multivariate polynomial.
///
/// Terms are kept in monomial order; the constant term, when present, is
/// always first. Zero coefficients are never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, f64>,
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::new(), c);
        p
    }

    pub fn one() -> Self {
        Self::constant(1.0)
    }

    pub fn var(name: impl Into<String>) -> Self {
        let mut m = Monomial::new();
        m.insert(name.into(), 1);
        let mut p = Self::zero();
        p.add_term(m, 1.0);
        p
    }

    fn add_term(&mut self, monomial: Monomial, coeff: f64) {
        if coeff == 0.0 {
            return;
        }
        match self.terms.entry(monomial) {
            Entry::Occupied(mut e) => {
                *e.get_mut() += coeff;
                if *e.get() == 0.0 {
                    e.remove();
                }
            }
            Entry::Vacant(e) => {
                e.insert(coeff);
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of a polynomial without variables.
    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_empty())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    /// Coefficient of the first term in monomial order.
    pub fn first_coefficient(&self) -> Option<f64> {
        self.terms.values().next().copied()
    }

    pub fn variables(&self) -> BTreeSet<String> {
        self.terms
            .keys()
            .flat_map(|m| m.keys().cloned())
            .collect()
    }

    pub fn contains_var(&self, var: &str) -> bool {
        self.terms.keys().any(|m| m.contains_key(var))
    }

    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), *c);
        }
        out
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), -c);
        }
        out
    }

    pub fn neg(&self) -> Poly {
        self.scale(-1.0)
    }

    pub fn scale(&self, k: f64) -> Poly {
        if k == 0.0 {
            return Poly::zero();
        }
        Poly {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), c * k)).collect(),
        }
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.add_term(multiply_monomials(ma, mb), ca * cb);
            }
        }
        out
    }

    pub fn pow(&self, mut exponent: u32) -> Poly {
        let mut result = Poly::one();
        let mut base = self.clone();
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.mul(&base);
            }
            exponent >>= 1;
            if exponent > 0 {
                base = base.mul(&base);
            }
        }
        result
    }

    /// Highest exponent of `var`.
    pub fn degree(&self, var: &str) -> u32 {
        self.terms
            .keys()
            .map(|m| m.get(var).copied().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Lowest exponent of `var` among the terms.
    pub fn lowest_degree(&self, var: &str) -> u32 {
        self.terms
            .keys()
            .map(|m| m.get(var).copied().unwrap_or(0))
            .min()
            .unwrap_or(0)
    }

    /// Coefficients in ascending powers of `var`.
    pub fn coefficients(&self, var: &str) -> Vec<Poly> {
        if self.is_zero() {
            return Vec::new();
        }
        let mut coeffs = vec![Poly::zero(); self.degree(var) as usize + 1];
        for (m, c) in &self.terms {
            let mut rest = m.clone();
            let k = rest.remove(var).unwrap_or(0) as usize;
            coeffs[k].add_term(rest, *c);
        }
        coeffs
    }

    /// Replace `var` by the polynomial `value`.
    pub fn compose(&self, var: &str, value: &Poly) -> Poly {
        if !self.contains_var(var) {
            return self.clone();
        }
        // Horner in `var`.
        self.coefficients(var)
            .iter()
            .rev()
            .fold(Poly::zero(), |acc, c| acc.mul(value).add(c))
    }

    /// Replace `var` by a number.
    pub fn eval_var(&self, var: &str, value: f64) -> Poly {
        self.compose(var, &Poly::constant(value))
    }

    /// Antiderivative with respect to `var`.
    pub fn integrate(&self, var: &str) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            let mut m = m.clone();
            let e = m.entry(var.to_string()).or_insert(0);
            *e += 1;
            let k = *e as f64;
            out.add_term(m, c / k);
        }
        out
    }

    /// Derivative with respect to `var`.
    pub fn derivative(&self, var: &str) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            let Some(&e) = m.get(var) else {
                continue;
            };
            let mut m = m.clone();
            if e == 1 {
                m.remove(var);
            } else {
                m.insert(var.to_string(), e - 1);
            }
            out.add_term(m, c * e as f64);
        }
        out
    }

    /// Largest monomial dividing every term of `self` and `other`.
    pub fn common_monomial(&self, other: &Poly) -> Monomial {
        let mut monomials = self.terms.keys().chain(other.terms.keys());
        let Some(first) = monomials.next() else {
            return Monomial::new();
        };
        let mut gcd = first.clone();
        for m in monomials {
            gcd.retain(|var, e| match m.get(var) {
                Some(&other) => {
                    *e = (*e).min(other);
                    true
                }
                None => false,
            });
            if gcd.is_empty() {
                break;
            }
        }
        gcd
    }

    /// Exact division by a monomial that divides every term.
    pub fn divide_monomial(&self, divisor: &Monomial) -> Poly {
        if divisor.is_empty() {
            return self.clone();
        }
        let terms = self
            .terms
            .iter()
            .map(|(m, c)| {
                let mut m = m.clone();
                for (var, e) in divisor {
                    if let Some(own) = m.get_mut(var) {
                        *own -= (*e).min(*own);
                        if *own == 0 {
                            m.remove(var);
                        }
                    }
                }
                (m, *c)
            })
            .collect();
        Poly { terms }
    }
}

fn multiply_monomials(a: &Monomial, b: &Monomial) -> Monomial {
    let mut out = a.clone();
    for (var, e) in b {
        *out.entry(var.clone()).or_insert(0) += e;
    }
    out
}

/// Quotient of two polynomials, kept in a normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct Rational {
    pub num: Poly,
    pub den: Poly,
}

impl From<Poly> for Rational {
    fn from(num: Poly) -> Self {
        Self {
            num,
            den: Poly::one(),
        }
    }
}

impl Rational {
    pub fn zero() -> Self {
        Poly::zero().into()
    }

    pub fn constant(c: f64) -> Self {
        Poly::constant(c).into()
    }

    /// Build `num/den` and normalize. Returns `None` for a zero denominator.
    pub fn new(num: Poly, den: Poly) -> Option<Self> {
        if den.is_zero() {
            return None;
        }
        Some(Self { num, den }.normalized())
    }

    /// Cancel the common monomial factor and scale the denominator so that
    /// its first term has coefficient 1.
    pub fn normalized(self) -> Self {
        if self.num.is_zero() {
            return Self::zero();
        }
        if self.num == self.den {
            return Self::constant(1.0);
        }
        let common = self.num.common_monomial(&self.den);
        let num = self.num.divide_monomial(&common);
        let den = self.den.divide_monomial(&common);
        match den.first_coefficient() {
            Some(c) if c != 1.0 => Self {
                num: num.scale(1.0 / c),
                den: den.scale(1.0 / c),
            },
            _ => Self { num, den },
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn as_constant(&self) -> Option<f64> {
        Some(self.num.as_constant()? / self.den.as_constant()?)
    }

    pub fn is_polynomial(&self) -> bool {
        self.den.as_constant().is_some()
    }

    pub fn add(&self, other: &Rational) -> Rational {
        if self.den == other.den {
            return Self {
                num: self.num.add(&other.num),
                den: self.den.clone(),
            }
            .normalized();
        }
        Self {
            num: self.num.mul(&other.den).add(&other.num.mul(&self.den)),
            den: self.den.mul(&other.den),
        }
        .normalized()
    }

    pub fn neg(&self) -> Rational {
        Self {
            num: self.num.neg(),
            den: self.den.clone(),
        }
    }

    pub fn sub(&self, other: &Rational) -> Rational {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Rational) -> Rational {
        // Cross-cancel identical factors before multiplying out.
        if self.den == other.num {
            return Self {
                num: self.num.clone(),
                den: other.den.clone(),
            }
            .normalized();
        }
        if self.num == other.den {
            return Self {
                num: other.num.clone(),
                den: self.den.clone(),
            }
            .normalized();
        }
        Self {
            num: self.num.mul(&other.num),
            den: self.den.mul(&other.den),
        }
        .normalized()
    }

    /// `None` when dividing by zero.
    pub fn div(&self, other: &Rational) -> Option<Rational> {
        if other.is_zero() {
            return None;
        }
        let inverse = Self {
            num: other.den.clone(),
            den: other.num.clone(),
        };
        Some(self.mul(&inverse))
    }

    /// Integer power; `None` for a negative power of zero.
    pub fn powi(&self, exponent: i32) -> Option<Rational> {
        let e = exponent.unsigned_abs();
        let raised = Self {
            num: self.num.pow(e),
            den: self.den.pow(e),
        };
        if exponent >= 0 {
            Some(raised.normalized())
        } else {
            Rational::constant(1.0).div(&raised)
        }
    }

    pub fn contains_var(&self, var: &str) -> bool {
        self.num.contains_var(var) || self.den.contains_var(var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Poly {
        Poly::var("x")
    }

    fn y() -> Poly {
        Poly::var("y")
    }

    #[test]
    fn test_arithmetic_and_cancellation() {
        let p = x().add(&Poly::one());
        let q = x().sub(&Poly::one());
        let prod = p.mul(&q);
        // x^2 - 1
        assert_eq!(prod.len(), 2);
        assert_eq!(prod.degree("x"), 2);
        assert!(p.sub(&p).is_zero());
        assert_eq!(Poly::constant(3.0).as_constant(), Some(3.0));
        assert_eq!(Poly::zero().as_constant(), Some(0.0));
        assert_eq!(x().as_constant(), None);
    }

    #[test]
    fn test_coefficients_and_compose() {
        // 2 + 3xy + y x^2
        let p = Poly::constant(2.0)
            .add(&x().mul(&y()).scale(3.0))
            .add(&x().pow(2).mul(&y()));
        let c = p.coefficients("x");
        assert_eq!(c.len(), 3);
        assert_eq!(c[0], Poly::constant(2.0));
        assert_eq!(c[1], y().scale(3.0));
        assert_eq!(c[2], y());

        let at_two = p.eval_var("x", 2.0).eval_var("y", 1.0);
        assert_eq!(at_two.as_constant(), Some(2.0 + 6.0 + 4.0));
        // Shift x -> x + 1 keeps the value at the shifted point.
        let shifted = p.compose("x", &x().add(&Poly::one()));
        assert_eq!(
            shifted.eval_var("x", 1.0).eval_var("y", 1.0).as_constant(),
            Some(12.0)
        );
    }

    #[test]
    fn test_calculus() {
        let p = x().pow(3).scale(4.0).add(&Poly::constant(1.0));
        assert_eq!(p.derivative("x"), x().pow(2).scale(12.0));
        assert_eq!(p.integrate("x").eval_var("x", 1.0).as_constant(), Some(2.0));
    }

    #[test]
    fn test_rational_normal_form() {
        // (x*y) / (x^2 + x*y) -> y / (x + y)
        let r = Rational::new(x().mul(&y()), x().pow(2).add(&x().mul(&y()))).unwrap();
        assert_eq!(r.num, y());
        assert_eq!(r.den, x().add(&y()));

        // 2 / (4 + 2x) -> 0.5 / (1 + 0.5x)
        let r = Rational::new(Poly::constant(2.0), Poly::constant(4.0).add(&x().scale(2.0))).unwrap();
        assert_eq!(r.den.first_coefficient(), Some(1.0));
        assert_eq!(r.num, Poly::constant(0.5));

        assert!(Rational::new(x(), Poly::zero()).is_none());
    }

    #[test]
    fn test_rational_ops() {
        let a = Rational::new(Poly::one(), x()).unwrap();
        let b = Rational::new(Poly::one(), y()).unwrap();
        let sum = a.add(&b);
        assert_eq!(sum.num, x().add(&y()));
        assert_eq!(sum.den, x().mul(&y()));
        assert_eq!(sum.div(&sum), Some(Rational::constant(1.0)));
        assert_eq!(a.powi(-2).unwrap().num, x().pow(2));
        assert!(a.div(&Rational::zero()).is_none());
    }
}
