//! Symbolic Modified Nodal Analysis structures.

use nalgebra::{DMatrix, DVector};

use crate::expr::Expr;

/// Symbolic MNA system `Iv = M * Dv`.
///
/// Rows and columns are keyed by dependent-variable names. The system is
/// stamped at full size (ground included) and the ground variable is then
/// removed with [`SymbolicMna::eliminate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicMna {
    /// The coefficient matrix.
    pub matrix: DMatrix<Expr>,
    /// The excitation vector `Iv`.
    pub rhs: DVector<Expr>,
    /// Dependent-variable names, one per row.
    pub dep_vars: Vec<String>,
}

impl SymbolicMna {
    /// Create a zero system over the given dependent variables.
    pub fn new(dep_vars: Vec<String>) -> Self {
        let size = dep_vars.len();
        Self {
            matrix: DMatrix::from_element(size, size, Expr::zero()),
            rhs: DVector::from_element(size, Expr::zero()),
            dep_vars,
        }
    }

    pub fn size(&self) -> usize {
        self.dep_vars.len()
    }

    pub fn index_of(&self, var: &str) -> Option<usize> {
        self.dep_vars.iter().position(|v| v == var)
    }

    /// The dependent-variable vector `Dv` as symbols.
    pub fn dv(&self) -> Vec<Expr> {
        self.dep_vars.iter().map(Expr::symbol).collect()
    }

    /// Add `value` to cell `(row, col)`. Missing indices are ignored.
    pub fn add(&mut self, row: Option<usize>, col: Option<usize>, value: Expr) {
        if let (Some(r), Some(c)) = (row, col) {
            if value.is_zero() {
                return;
            }
            let cell = &mut self.matrix[(r, c)];
            *cell = std::mem::take(cell) + value;
        }
    }

    /// Add `value` to the excitation of `row`.
    pub fn add_rhs(&mut self, row: Option<usize>, value: Expr) {
        if let Some(r) = row {
            let cell = &mut self.rhs[r];
            *cell = std::mem::take(cell) + value;
        }
    }

    /// Stamp an admittance `y` between two rows.
    ///
    /// - M[i,i] += y
    /// - M[j,j] += y
    /// - M[i,j] -= y
    /// - M[j,i] -= y
    pub fn stamp_admittance(&mut self, i: Option<usize>, j: Option<usize>, y: Expr) {
        self.add(i, i, y.clone());
        self.add(j, j, y.clone());
        self.add(i, j, -y.clone());
        self.add(j, i, -y);
    }

    /// Stamp the incidence of a branch current `b` flowing from `p` to `n`
    /// together with its voltage constraint row:
    /// (p,b)+1, (n,b)-1, (b,p)+1, (b,n)-1.
    pub fn stamp_branch(&mut self, p: Option<usize>, n: Option<usize>, b: Option<usize>) {
        self.add(p, b, Expr::one());
        self.add(n, b, -Expr::one());
        self.add(b, p, Expr::one());
        self.add(b, n, -Expr::one());
    }

    /// Multiply every entry of `row` by `factor`.
    pub fn scale_row(&mut self, row: Option<usize>, factor: &Expr) {
        if let Some(r) = row {
            for c in 0..self.matrix.ncols() {
                let cell = &mut self.matrix[(r, c)];
                *cell = std::mem::take(cell) * factor.clone();
            }
        }
    }

    /// Remove the row and column of `var`. Returns `false` if `var` is unknown.
    pub fn eliminate(&mut self, var: &str) -> bool {
        let Some(skip) = self.index_of(var) else {
            return false;
        };
        let n = self.size() - 1;
        let map = |k: usize| if k < skip { k } else { k + 1 };
        let matrix = DMatrix::from_fn(n, n, |r, c| self.matrix[(map(r), map(c))].clone());
        let rhs = DVector::from_fn(n, |r, _| self.rhs[map(r)].clone());
        self.matrix = matrix;
        self.rhs = rhs;
        self.dep_vars.remove(skip);
        true
    }

    /// Copy of the system with a different excitation vector.
    pub fn with_rhs(&self, rhs: DVector<Expr>) -> Self {
        Self {
            matrix: self.matrix.clone(),
            rhs,
            dep_vars: self.dep_vars.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_admittance_stamp() {
        let mut mna = SymbolicMna::new(vars(&["V_0", "V_a"]));
        mna.stamp_admittance(Some(1), Some(0), Expr::symbol("G"));
        assert_eq!(mna.matrix[(1, 1)], Expr::symbol("G"));
        assert_eq!(mna.matrix[(1, 0)], -Expr::symbol("G"));
        assert_eq!(mna.matrix[(0, 0)], Expr::symbol("G"));
    }

    #[test]
    fn test_eliminate_ground() {
        let mut mna = SymbolicMna::new(vars(&["I_V1", "V_0", "V_in"]));
        mna.stamp_branch(mna.index_of("V_in"), mna.index_of("V_0"), mna.index_of("I_V1"));
        mna.add_rhs(mna.index_of("I_V1"), Expr::symbol("V"));

        assert!(mna.eliminate("V_0"));
        assert_eq!(mna.size(), 2);
        assert_eq!(mna.dep_vars, vars(&["I_V1", "V_in"]));
        assert_eq!(mna.matrix[(0, 1)], Expr::one());
        assert_eq!(mna.matrix[(1, 0)], Expr::one());
        assert!(mna.matrix[(0, 0)].is_zero());
        assert_eq!(mna.rhs[0], Expr::symbol("V"));
        assert!(!mna.eliminate("V_0"));
    }

    #[test]
    fn test_scale_row() {
        let mut mna = SymbolicMna::new(vars(&["a", "b"]));
        mna.add(Some(0), Some(0), Expr::Constant(2.0));
        mna.add(Some(0), Some(1), Expr::symbol("x"));
        mna.scale_row(Some(0), &Expr::Constant(3.0));
        assert_eq!(mna.matrix[(0, 0)], Expr::Constant(6.0));
        assert!(mna.matrix[(1, 1)].is_zero());
    }
}
