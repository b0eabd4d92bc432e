//! Symbolic analysis engine for symcir.
//!
//! This crate provides:
//! - The symbolic algebra service trait and a rational-function backend
//! - Symbolic MNA stamping and excitation vectors
//! - Instructions: gain types, data types and parameter stepping
//! - Noise and DC-variance accumulation
//!
//! # Example
//!
//! ```
//! use symcir_solver::{DataType, Instruction, SimType};
//!
//! let circuit = symcir_parser::compile(
//!     "divider\nV1 in 0 1\nR1 in out {R1}\nR2 out 0 {R2}\n",
//! );
//! let results = Instruction::new(circuit)
//!     .with_sim_type(SimType::Symbolic)
//!     .with_data_type(DataType::Laplace)
//!     .with_source("V1")
//!     .with_detector("V_out")
//!     .execute()
//!     .unwrap();
//! assert_eq!(results.laplace[0].to_string(), "R2/(R1+R2)");
//! ```

pub mod algebra;
pub mod config;
pub mod error;
pub mod instruction;
pub mod noise;
pub mod results;
pub mod sources;
pub mod stamp;

pub use algebra::{LimitDirection, RationalAlgebra, SimplifyMethod, SymbolicAlgebra};
pub use config::EngineConfig;
pub use error::{AlgebraResult, ComputationError, Error, Result};
pub use instruction::{
    DataType, Detector, GainType, Instruction, LoopGainRule, SimType, StepConfig, StepMethod,
};
pub use results::AllResults;
pub use sources::{Excitation, SourceVectorBuilder};
pub use stamp::{MatrixStamper, Stamp, ValueResolver};
