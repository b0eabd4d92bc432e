//! Netlist compiler for symcir.
//!
//! Turns netlist text into a flat, finalized [`Circuit`] in four passes:
//! parsing, model resolution, hierarchy expansion and finalization. Syntax
//! and reference problems do not abort compilation; they accumulate on the
//! circuit as diagnostics.
//!
//! # Example
//!
//! ```
//! use symcir_parser::compile;
//!
//! let circuit = compile(r#"
//! Voltage divider
//! V1 in 0 1
//! R1 in out {R1}
//! R2 out 0 {R2}
//! .end
//! "#);
//!
//! assert_eq!(circuit.errors(), 0);
//! assert_eq!(circuit.elements.len(), 3);
//! assert_eq!(circuit.dep_vars, vec!["I_V1", "V_0", "V_in", "V_out"]);
//! ```

use std::fs;
use std::path::Path;

pub mod context;
pub mod error;
pub mod expander;
pub mod finalizer;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod scope;
pub mod syslib;

pub use context::{CompilationContext, CompilerConfig, LibraryTables};
pub use error::{Error, Result};
pub use finalizer::update_variables;
pub use parser::parse_netlist;
pub use symcir_core::Circuit;

/// Compile netlist text with a fresh context.
pub fn compile(input: &str) -> Circuit {
    let mut ctx = CompilationContext::default();
    compile_with(input, &mut ctx, None)
}

/// Compile netlist text with a shared context.
///
/// `source_dir` is the directory relative `.lib` paths are resolved against.
pub fn compile_with(input: &str, ctx: &mut CompilationContext, source_dir: Option<&Path>) -> Circuit {
    let mut circuit = parse_netlist(input, ctx, source_dir);
    log::info!(
        "parsed '{}': {} element(s), {} subcircuit(s)",
        circuit.title,
        circuit.elements.len(),
        circuit.subcircuits.len()
    );
    resolver::resolve(&mut circuit, ctx);
    expander::expand(&mut circuit, ctx);
    finalizer::finalize(&mut circuit, ctx);
    for d in &circuit.diagnostics {
        if d.is_error() {
            log::debug!("{}", d);
        }
    }
    circuit
}

/// Read and compile a netlist file.
pub fn compile_file(path: &Path, ctx: &mut CompilationContext) -> Result<Circuit> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(compile_with(&text, ctx, path.parent()))
}
