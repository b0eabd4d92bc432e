//! Error types for symcir-core.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("reference error: {0}")]
    Reference(String),

    #[error("hierarchy error: {0}")]
    Hierarchy(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("invalid expression '{input}': {message}")]
    InvalidExpression { input: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Category of a [`Diagnostic`], mirroring the [`Error`] taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Reference,
    Hierarchy,
    Connectivity,
    /// Instruction fields inconsistent with the requested analysis.
    Configuration,
}

/// A problem recorded on a circuit by one of the compilation passes.
///
/// Passes accumulate diagnostics instead of returning early so that a single
/// run surfaces every problem at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Netlist line, 0 when the problem is not tied to a line.
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            line,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            line,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.line > 0 {
            write!(f, "{} (line {}): {}", level, self.line, self.message)
        } else {
            write!(f, "{}: {}", level, self.message)
        }
    }
}

impl From<Diagnostic> for Error {
    fn from(d: Diagnostic) -> Self {
        match d.kind {
            DiagnosticKind::Syntax => Error::Syntax {
                line: d.line,
                message: d.message,
            },
            DiagnosticKind::Reference | DiagnosticKind::Connectivity => {
                Error::Reference(d.message)
            }
            DiagnosticKind::Hierarchy => Error::Hierarchy(d.message),
            DiagnosticKind::Configuration => Error::Configuration(d.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error(DiagnosticKind::Syntax, 3, "expected node name");
        assert_eq!(d.to_string(), "error (line 3): expected node name");

        let w = Diagnostic::warning(DiagnosticKind::Connectivity, 0, "node 'x' is dangling");
        assert!(!w.is_error());
        assert_eq!(w.to_string(), "warning: node 'x' is dangling");
    }

    #[test]
    fn test_diagnostic_into_error() {
        let d = Diagnostic::error(DiagnosticKind::Hierarchy, 7, "hierarchical loop: AMP");
        assert_eq!(
            Error::from(d),
            Error::Hierarchy("hierarchical loop: AMP".to_string())
        );
    }
}
