//! # symcir
//!
//! Symbolic and numeric analysis of linear circuits described by
//! SPICE-like netlists.
//!
//! symcir provides:
//! - A netlist compiler with models, subcircuits and parameters
//! - Symbolic modified nodal analysis
//! - Transfer functions, poles and zeros, DC values and time responses
//! - Asymptotic-gain feedback analysis
//! - Noise spectra and DC variance with per-source contributions
//! - Parameter stepping
//!
//! ## Quick Start
//!
//! ```rust
//! use symcir::prelude::*;
//!
//! let circuit = compile("RC lowpass\nV1 in 0 1\nR1 in out 1k\nC1 out 0 1n\n");
//! assert_eq!(circuit.errors(), 0);
//!
//! let results = Instruction::new(circuit)
//!     .with_data_type(DataType::Poles)
//!     .with_source("V1")
//!     .with_detector("V_out")
//!     .execute()
//!     .unwrap();
//! assert!((results.poles[0][0].re + 1e6).abs() < 1e-3);
//! ```

// Re-export member crates
pub use symcir_core as core;
pub use symcir_parser as parser;
pub use symcir_solver as solver;

// ============================================================================
// Convenient re-exports from symcir_core
// ============================================================================

pub use symcir_core::{
    Circuit, Diagnostic, DiagnosticKind, Element, Error as CoreError, EvalContext, Expr, Severity,
    StampKind, SymbolicMna,
};

// ============================================================================
// Convenient re-exports from symcir_parser
// ============================================================================

pub use symcir_parser::{
    CompilationContext, CompilerConfig, Error as ParseError, compile, compile_file, compile_with,
};

// ============================================================================
// Convenient re-exports from symcir_solver
// ============================================================================

pub use symcir_solver::{
    AllResults, DataType, Detector, EngineConfig, Error as SolverError, GainType, Instruction,
    RationalAlgebra, SimType, SimplifyMethod, StepConfig, StepMethod, SymbolicAlgebra,
};

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Re-export of num_complex's 64-bit complex type.
pub use num_complex::Complex64;

/// Prelude module containing commonly used types.
///
/// ```rust
/// use symcir::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::{Circuit, EvalContext, Expr};

    // Compiler
    pub use crate::{CompilationContext, compile, compile_file};

    // Instructions
    pub use crate::{
        AllResults, DataType, EngineConfig, GainType, Instruction, SimType, StepConfig,
        StepMethod,
    };

    // Common external types
    pub use crate::{Complex64, DMatrix};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_circuit() {
        let circuit = compile("Test\nV1 1 0 5\nR1 1 0 1k\n.end\n");
        assert_eq!(circuit.errors(), 0);
        assert_eq!(circuit.elements.len(), 2);
    }

    #[test]
    fn test_keywords_round_trip() {
        for data_type in DataType::ALL {
            assert_eq!(data_type.to_string().parse::<DataType>().unwrap(), *data_type);
        }
    }
}
