//! Loop-gain reference handling.
//!
//! The return ratio of a controlled source is evaluated with the source's
//! own gain switched off, an excitation injected at its output and the
//! response observed at its controlling input. Which rows serve as
//! excitation and observation depends on the kind of controlled source.

use symcir_core::{Circuit, Element, Expr, GROUND, StampKind, branch_var, node_var};
use symcir_parser::update_variables;

use crate::error::{Error, Result};
use crate::stamp::ValueResolver;

/// A pair of rows, `None` standing for ground.
pub type RowPair = (Option<String>, Option<String>);

/// Excitation, observation and intrinsic gain of a loop-gain reference.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopGainRule {
    /// Rows receiving `+1` and `-1`.
    pub source: RowPair,
    /// Rows whose difference is observed.
    pub detector: RowPair,
    pub gain: Expr,
}

impl LoopGainRule {
    pub fn for_element(element: &Element, values: &ValueResolver) -> Result<Self> {
        let kind = element
            .stamp_kind()
            .filter(|k| k.is_controlled_source())
            .ok_or_else(|| {
                Error::Configuration(format!("'{}' cannot serve as loop-gain reference", element.ref_des))
            })?;
        let node = |i: usize| {
            element
                .nodes
                .get(i)
                .filter(|n| n.as_str() != GROUND)
                .map(|n| node_var(n))
        };
        let branch = |prefix: &str| Some(branch_var(prefix, &element.ref_des));
        let gain = values.param(element, "value");
        let zo = values.param(element, "zo");
        let output = (node(0), node(1));
        let input = (node(2), node(3));
        let reversed = (node(1), node(0));

        let rule = match kind {
            StampKind::Vcvs | StampKind::VccsBranch => Self {
                source: (branch("Io"), None),
                detector: input,
                gain,
            },
            StampKind::VcvsZ if zo.is_zero() => Self {
                source: (branch("Io"), None),
                detector: input,
                gain,
            },
            StampKind::VcvsZ => Self {
                source: output,
                detector: input,
                gain: gain / zo,
            },
            StampKind::Cccs => Self {
                source: reversed,
                detector: (branch("Ii"), None),
                gain,
            },
            StampKind::Vccs => Self {
                source: reversed,
                detector: input,
                gain,
            },
            StampKind::Ccvs => Self {
                source: (branch("Io"), None),
                detector: (branch("Ii"), None),
                gain,
            },
            StampKind::CcvsZ if zo.is_zero() => Self {
                source: (branch("Io"), None),
                detector: (branch("Ii"), None),
                gain,
            },
            StampKind::CcvsZ => Self {
                source: output,
                detector: (branch("Ii"), None),
                gain: gain / zo,
            },
            other => {
                return Err(Error::Configuration(format!(
                    "{}: no loop-gain rule for {:?}",
                    element.ref_des, other
                )));
            }
        };
        Ok(rule)
    }
}

fn reference<'a>(circuit: &'a mut Circuit, lg_ref: &str) -> Result<&'a mut Element> {
    circuit
        .element_mut(lg_ref)
        .ok_or_else(|| Error::Configuration(format!("unknown loop-gain reference '{}'", lg_ref)))
}

/// Copy of `circuit` with the reference replaced by a nullor on its nodes.
pub fn with_nullor(circuit: &Circuit, lg_ref: &str) -> Result<Circuit> {
    let mut ckt = circuit.clone();
    let element = reference(&mut ckt, lg_ref)?;
    let mut nullor = Element::new(element.ref_des.clone(), element.nodes.clone()).with_stamp(StampKind::Nullor);
    nullor.line = element.line;
    *element = nullor;
    update_variables(&mut ckt);
    Ok(ckt)
}

/// Copy of `circuit` with the controlled value of the reference set to zero.
///
/// Output impedances stay in place.
pub fn with_reference_off(circuit: &Circuit, lg_ref: &str) -> Result<Circuit> {
    let mut ckt = circuit.clone();
    reference(&mut ckt, lg_ref)?
        .params
        .insert("value".to_string(), Expr::zero());
    Ok(ckt)
}
