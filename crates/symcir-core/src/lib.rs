//! Core circuit representation for symcir.
//!
//! This crate provides the symbolic expression type, the built-in
//! device/model catalog, the circuit data model shared by the compiler
//! passes, and the symbolic Modified Nodal Analysis (MNA) container.

pub mod catalog;
pub mod circuit;
pub mod error;
pub mod expr;
pub mod mna;

pub use catalog::{DeviceSpec, ModelSpec, NodeCount, ParamSpec, StampKind};
pub use circuit::{Circuit, Element, GROUND, ModelDef, ResolvedModel, branch_var, node_var};
pub use error::{Diagnostic, DiagnosticKind, Error, Result, Severity};
pub use expr::{EvalContext, Expr, parse_expression, parse_value};
pub use mna::SymbolicMna;
