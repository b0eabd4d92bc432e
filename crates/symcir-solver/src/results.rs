//! Results of an instruction execution.

use indexmap::IndexMap;
use nalgebra::DMatrix;
use num_complex::Complex64;
use symcir_core::Expr;

use crate::instruction::{DataType, GainType};

/// Everything an execution produced.
///
/// Only the fields of the requested data type are populated. Each holds
/// one entry per run: a single entry without stepping, one per step value
/// otherwise. Time-domain conversions that fail leave their run out and
/// record a warning instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllResults {
    pub gain_type: Option<GainType>,
    pub data_type: Option<DataType>,

    pub step_vars: Vec<String>,
    /// Values of the first step variable, one per run.
    pub step_list: Vec<f64>,
    /// Values of every step variable, one list per variable.
    pub step_array: Vec<Vec<f64>>,

    /// Excitation vector `Iv`.
    pub iv: Vec<Vec<Expr>>,
    /// Coefficient matrix `M`.
    pub m: Vec<DMatrix<Expr>>,
    /// Dependent-variable vector `Dv`.
    pub dv: Vec<Vec<Expr>>,

    pub laplace: Vec<Expr>,
    /// Detector numerator. Denominators of rational source values stay
    /// here, so it is a polynomial only for polynomial excitations.
    pub numer: Vec<Expr>,
    /// Fraction-free system determinant: `det(M)` times the factor each
    /// row was scaled by to clear its denominators, less any monomial it
    /// shares with the numerator. Its roots are the poles of `M`.
    pub denom: Vec<Expr>,
    pub solve: Vec<Vec<Expr>>,
    pub dcsolve: Vec<Vec<Expr>>,

    pub poles: Vec<Vec<Complex64>>,
    pub zeros: Vec<Vec<Complex64>>,
    /// Transfer at `s = 0` (`dc`), or the DC gain reported with `pz`.
    pub dc_value: Vec<Expr>,

    pub impulse: Vec<Expr>,
    pub step_response: Vec<Expr>,
    pub time: Vec<Expr>,

    /// Detector-referred noise spectrum.
    pub onoise: Vec<Expr>,
    /// Source-referred noise spectrum.
    pub inoise: Vec<Expr>,
    pub onoise_terms: IndexMap<String, Vec<Expr>>,
    pub inoise_terms: IndexMap<String, Vec<Expr>>,

    /// Detector-referred DC variance.
    pub ovar: Vec<Expr>,
    /// Source-referred DC variance.
    pub ivar: Vec<Expr>,
    pub ovar_terms: IndexMap<String, Vec<Expr>>,
    pub ivar_terms: IndexMap<String, Vec<Expr>>,

    /// Downgraded computation failures.
    pub warnings: Vec<String>,
}

impl AllResults {
    pub fn new(gain_type: GainType, data_type: DataType) -> Self {
        Self {
            gain_type: Some(gain_type),
            data_type: Some(data_type),
            ..Default::default()
        }
    }

    /// Whether no result field has been populated.
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                gain_type: self.gain_type,
                data_type: self.data_type,
                ..Default::default()
            }
    }

    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let mut results = AllResults::new(GainType::Gain, DataType::Laplace);
        assert!(results.is_empty());
        results.laplace.push(Expr::one());
        assert!(!results.is_empty());
        assert!(AllResults::default().is_empty());
    }
}
