//! Error types for symcir-solver.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a symbolic algebra backend.
///
/// The engine treats these differently from ordinary results: time-domain
/// conversions downgrade them to warnings, everything else aborts the
/// current execution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ComputationError {
    #[error("computation failed: {0}")]
    Failed(String),

    #[error("computation timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Core(#[from] symcir_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result type at the algebra-service boundary.
pub type AlgebraResult<T> = std::result::Result<T, ComputationError>;
