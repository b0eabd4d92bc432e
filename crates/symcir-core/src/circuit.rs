//! Circuit and element data model.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::{self, ModelSpec, StampKind};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::expr::Expr;

/// Name of the ground node.
pub const GROUND: &str = "0";

/// Name of the node-voltage dependent variable for `node`.
pub fn node_var(node: &str) -> String {
    format!("V_{}", node)
}

/// Name of a branch-current dependent variable, e.g. `Io_E1`.
pub fn branch_var(prefix: &str, ref_des: &str) -> String {
    format!("{}_{}", prefix, ref_des)
}

/// What an element's model name resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedModel {
    /// Built-in model with a fixed stamp.
    DirectStamp(StampKind),
    /// Prototype circuit still to be spliced in by the hierarchy expander.
    Expansion(Arc<Circuit>),
}

impl ResolvedModel {
    pub fn stamp_kind(&self) -> Option<StampKind> {
        match self {
            ResolvedModel::DirectStamp(kind) => Some(*kind),
            ResolvedModel::Expansion(_) => None,
        }
    }

    pub fn is_expansion(&self) -> bool {
        matches!(self, ResolvedModel::Expansion(_))
    }
}

/// A circuit element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub ref_des: String,
    /// Upper-case device letter taken from the reference designator.
    pub type_letter: char,
    pub nodes: Vec<String>,
    /// Referenced elements (mutual inductance only).
    pub refs: Vec<String>,
    /// Model name as written, or the device default once resolved.
    pub model_name: Option<String>,
    pub model: Option<ResolvedModel>,
    pub params: IndexMap<String, Expr>,
    /// Netlist line, 0 for synthesized elements.
    pub line: usize,
}

impl Element {
    pub fn new(ref_des: impl Into<String>, nodes: Vec<String>) -> Self {
        let ref_des = ref_des.into();
        let type_letter = ref_des
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?');
        Self {
            ref_des,
            type_letter,
            nodes,
            refs: Vec::new(),
            model_name: None,
            model: None,
            params: IndexMap::new(),
            line: 0,
        }
    }

    /// Bind a built-in direct-stamp model.
    pub fn with_stamp(mut self, kind: StampKind) -> Self {
        self.model_name = catalog::model_for_stamp(kind).map(|m| m.name.to_string());
        self.model = Some(ResolvedModel::DirectStamp(kind));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_refs(mut self, refs: Vec<String>) -> Self {
        self.refs = refs;
        self
    }

    pub fn stamp_kind(&self) -> Option<StampKind> {
        self.model.as_ref().and_then(ResolvedModel::stamp_kind)
    }

    /// Catalog entry of the bound direct-stamp model.
    pub fn model_spec(&self) -> Option<&'static ModelSpec> {
        self.stamp_kind().and_then(catalog::model_for_stamp)
    }

    /// Parameter value, zero when absent.
    pub fn param(&self, name: &str) -> Expr {
        self.params.get(name).cloned().unwrap_or_default()
    }

    pub fn value(&self) -> Expr {
        self.param("value")
    }

    /// Extra dependent variables introduced by the bound model, in order.
    pub fn branch_vars(&self) -> Vec<String> {
        self.model_spec()
            .map(|spec| {
                spec.dep_vars
                    .iter()
                    .map(|prefix| branch_var(prefix, &self.ref_des))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A `.model` definition: a named parameterization of a base model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    pub name: String,
    pub base: String,
    pub params: IndexMap<String, Expr>,
    pub line: usize,
}

/// A circuit: the top-level netlist or a `.subckt` prototype.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circuit {
    pub title: String,
    /// Subcircuit name; empty for the top level.
    pub name: String,
    /// Directory of the source file, used to resolve relative library paths.
    pub source_dir: Option<PathBuf>,
    /// Declared port nodes of a prototype.
    pub ports: Vec<String>,
    /// Declared formal parameters of a prototype with their defaults.
    pub formals: IndexMap<String, Expr>,
    pub elements: IndexMap<String, Element>,
    pub nodes: Vec<String>,
    pub undefined_params: BTreeSet<String>,
    pub param_defs: IndexMap<String, Expr>,
    pub model_defs: IndexMap<String, ModelDef>,
    pub subcircuits: IndexMap<String, Circuit>,
    /// Independent sources (refDes), in element order.
    pub indep_vars: Vec<String>,
    /// Controlled sources (refDes), in element order.
    pub controlled: Vec<String>,
    /// Dependent variables before ground elimination.
    pub dep_vars: Vec<String>,
    pub var_index: IndexMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Circuit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// A named prototype with declared ports.
    pub fn prototype(name: impl Into<String>, ports: Vec<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            ports,
            ..Default::default()
        }
    }

    /// Add an element, recording an error if the refDes is already taken.
    ///
    /// Returns `false` when the element was rejected.
    pub fn add_element(&mut self, element: Element) -> bool {
        if self.elements.contains_key(&element.ref_des) {
            let line = element.line;
            self.error(
                DiagnosticKind::Syntax,
                line,
                format!("duplicate reference designator '{}'", element.ref_des),
            );
            return false;
        }
        self.elements.insert(element.ref_des.clone(), element);
        true
    }

    pub fn element(&self, ref_des: &str) -> Option<&Element> {
        self.elements.get(ref_des)
    }

    pub fn element_mut(&mut self, ref_des: &str) -> Option<&mut Element> {
        self.elements.get_mut(ref_des)
    }

    pub fn error(&mut self, kind: DiagnosticKind, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(kind, line, message));
    }

    pub fn warn(&mut self, kind: DiagnosticKind, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(kind, line, message));
    }

    /// Number of error-severity diagnostics.
    pub fn errors(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_ground(&self) -> bool {
        self.nodes.iter().any(|n| n == GROUND)
    }

    /// Index of a dependent variable before ground elimination.
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.var_index.get(name).copied()
    }

    /// Whether any element still waits for hierarchical expansion.
    pub fn needs_expansion(&self) -> bool {
        self.elements
            .values()
            .any(|e| e.model.as_ref().is_some_and(ResolvedModel::is_expansion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ref_des_is_an_error() {
        let mut ckt = Circuit::new("dup");
        assert!(ckt.add_element(Element::new("R1", vec!["a".into(), "0".into()])));
        assert!(!ckt.add_element(Element::new("R1", vec!["b".into(), "0".into()])));
        assert_eq!(ckt.errors(), 1);
        assert_eq!(ckt.elements.len(), 1);
    }

    #[test]
    fn test_branch_vars_follow_model() {
        let h = Element::new("H1", vec![]).with_stamp(StampKind::Ccvs);
        assert_eq!(h.branch_vars(), vec!["Io_H1", "Ii_H1"]);
        assert_eq!(h.model_name.as_deref(), Some("H"));

        let r = Element::new("R1", vec![]).with_stamp(StampKind::Resistor);
        assert!(r.branch_vars().is_empty());

        let r = Element::new("R2", vec![]).with_stamp(StampKind::ResistorBranch);
        assert_eq!(r.branch_vars(), vec!["I_R2"]);
    }

    #[test]
    fn test_missing_param_defaults_to_zero() {
        let e = Element::new("E1", vec![]).with_param("value", Expr::symbol("A"));
        assert_eq!(e.value(), Expr::symbol("A"));
        assert!(e.param("zo").is_zero());
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut ckt = Circuit::new("w");
        ckt.warn(DiagnosticKind::Connectivity, 0, "node 'x' has one connection");
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.warnings().count(), 1);
    }
}
