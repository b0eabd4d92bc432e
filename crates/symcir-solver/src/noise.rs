//! Noise and DC-variance accumulation.
//!
//! Every independent source is replaced by a placeholder symbol before the
//! detector numerator is computed, so a single Cramer solve yields the
//! transfer of every source as the coefficient of its placeholder. Sources
//! are uncorrelated: totals are plain sums of the per-source terms.

use std::collections::HashMap;

use indexmap::IndexMap;
use symcir_core::{Circuit, Element, Expr, StampKind};
use symcir_parser::update_variables;

use crate::algebra::{SimplifyMethod, SymbolicAlgebra, squared_modulus};
use crate::config::EngineConfig;
use crate::error::AlgebraResult;
use crate::instruction::DataType;
use crate::results::AllResults;
use crate::sources::placeholder;
use crate::stamp::ValueResolver;

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380649e-23;

const THERMAL_PREFIX: &str = "I_noise_";
const VARIANCE_PREFIX: &str = "I_dcvar_";

fn is_resistor(element: &Element) -> bool {
    matches!(
        element.stamp_kind(),
        Some(StampKind::Resistor | StampKind::ResistorBranch)
    )
}

fn remove_prefixed(circuit: &mut Circuit, prefix: &str) {
    circuit.elements.retain(|name, _| !name.starts_with(prefix));
}

fn current_source(name: String, resistor: &Element, param: &str, value: Expr) -> Element {
    let mut source = Element::new(name, resistor.nodes.clone())
        .with_stamp(StampKind::CurrentSource)
        .with_param("value", Expr::zero())
        .with_param(param, value);
    source.line = resistor.line;
    source
}

/// Add a thermal current-noise source across every resistor with a
/// nonzero `noisetemp`, replacing sources added by an earlier call.
pub fn add_thermal_sources(circuit: &mut Circuit) {
    remove_prefixed(circuit, THERMAL_PREFIX);
    let sources: Vec<Element> = circuit
        .elements
        .values()
        .filter(|e| is_resistor(e) && !e.param("noisetemp").is_zero())
        .map(|r| {
            let density = Expr::Constant(4.0 * BOLTZMANN) * r.param("noisetemp") / r.value();
            current_source(format!("{}{}", THERMAL_PREFIX, r.ref_des), r, "noise", density)
        })
        .collect();
    log::debug!("{} thermal noise source(s)", sources.len());
    for source in sources {
        circuit.add_element(source);
    }
    update_variables(circuit);
}

/// Add a current-error source across every resistor listed in `currents`
/// with variance `dcvar * I^2`, replacing sources added by an earlier call.
pub fn add_variance_sources(circuit: &mut Circuit, currents: &IndexMap<String, Expr>) {
    remove_prefixed(circuit, VARIANCE_PREFIX);
    let sources: Vec<Element> = currents
        .iter()
        .filter_map(|(name, current)| {
            let r = circuit.element(name)?;
            let variance = r.param("dcvar") * current.clone().powi(2);
            Some(current_source(format!("{}{}", VARIANCE_PREFIX, name), r, "dcvar", variance))
        })
        .collect();
    for source in sources {
        circuit.add_element(source);
    }
    update_variables(circuit);
}

/// Resistors whose `dcvar` resolves to a nonzero value.
pub fn variance_resistors<'a>(circuit: &'a Circuit, values: &ValueResolver) -> Vec<&'a Element> {
    circuit
        .elements
        .values()
        .filter(|e| is_resistor(e) && !e.ref_des.starts_with(VARIANCE_PREFIX))
        .filter(|e| !values.param(e, "dcvar").is_zero())
        .collect()
}

/// Per-source transfer numerators over a shared denominator.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseStage {
    /// Source refDes to (density or variance, transfer numerator).
    pub terms: IndexMap<String, (Expr, Expr)>,
    /// Transfer numerator of the signal source.
    pub signal: Option<Expr>,
    pub denom: Expr,
}

impl NoiseStage {
    /// Split the placeholder numerator `numer` into per-source terms.
    ///
    /// Only sources whose `param` is nonzero contribute.
    pub fn extract(
        algebra: &dyn SymbolicAlgebra,
        circuit: &Circuit,
        values: &ValueResolver,
        numer: &Expr,
        denom: Expr,
        param: &str,
        signal: Option<&str>,
    ) -> AlgebraResult<Self> {
        let coefficient = |ref_des: &str| -> AlgebraResult<Expr> {
            let coeffs = algebra.polynomial_coefficients(numer, &placeholder(ref_des))?;
            Ok(coeffs.get(1).cloned().unwrap_or_default())
        };

        let mut terms = IndexMap::new();
        for ref_des in &circuit.indep_vars {
            let Some(element) = circuit.element(ref_des) else {
                continue;
            };
            let density = values.param(element, param);
            if density.is_zero() {
                continue;
            }
            terms.insert(ref_des.clone(), (density, coefficient(ref_des)?));
        }
        let signal = signal.map(|r| coefficient(r)).transpose()?;
        log::debug!("{} {} contribution(s)", terms.len(), param);
        Ok(Self { terms, signal, denom })
    }

    pub fn substitute(&self, bindings: &HashMap<String, Expr>) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|(k, (d, n))| (k.clone(), (d.substitute(bindings), n.substitute(bindings))))
                .collect(),
            signal: self.signal.as_ref().map(|s| s.substitute(bindings)),
            denom: self.denom.substitute(bindings),
        }
    }
}

/// Append the spectra (`noise`) or variances (`dcvar`) of one run.
pub fn accumulate(
    algebra: &dyn SymbolicAlgebra,
    stage: &NoiseStage,
    data_type: DataType,
    config: &EngineConfig,
    results: &mut AllResults,
) -> AlgebraResult<()> {
    let s = config.laplace_var.as_str();
    let f = config.frequency_var.as_str();
    let noise = data_type == DataType::Noise;
    let magnitude = |e: &Expr| -> AlgebraResult<Expr> {
        if noise {
            squared_modulus(algebra, e, s, f)
        } else {
            Ok(e.clone().powi(2))
        }
    };
    let normal = |e: Expr| algebra.simplify(&e, SimplifyMethod::Normal);

    let denom = magnitude(&stage.denom)?;
    let signal = stage.signal.as_ref().map(|e| magnitude(e)).transpose()?;

    let mut detector_terms = IndexMap::new();
    let mut source_terms = IndexMap::new();
    for (name, (density, numer)) in &stage.terms {
        let numer = magnitude(numer)?;
        detector_terms.insert(name.clone(), normal(density.clone() * numer.clone() / denom.clone())?);
        if let Some(signal) = &signal {
            source_terms.insert(name.clone(), normal(density.clone() * numer / signal.clone())?);
        }
    }
    let detector_total = normal(Expr::sum(detector_terms.values().cloned()))?;
    let source_total = match signal {
        Some(_) => Some(normal(Expr::sum(source_terms.values().cloned()))?),
        None => None,
    };

    let (total, terms, input_total, input_terms) = if noise {
        (
            &mut results.onoise,
            &mut results.onoise_terms,
            &mut results.inoise,
            &mut results.inoise_terms,
        )
    } else {
        (
            &mut results.ovar,
            &mut results.ovar_terms,
            &mut results.ivar,
            &mut results.ivar_terms,
        )
    };
    total.push(detector_total);
    for (name, term) in detector_terms {
        terms.entry(name).or_default().push(term);
    }
    if let Some(source_total) = source_total {
        input_total.push(source_total);
        for (name, term) in source_terms {
            input_terms.entry(name).or_default().push(term);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcir_parser::compile;

    #[test]
    fn test_thermal_sources() {
        let mut ckt = compile("t\nV1 in 0 1\nR1 in out 1k noisetemp=300\nR2 out 0 1k\n");
        assert_eq!(ckt.errors(), 0, "{:?}", ckt.diagnostics);
        add_thermal_sources(&mut ckt);
        add_thermal_sources(&mut ckt);

        let source = ckt.element("I_noise_R1").unwrap();
        assert_eq!(source.nodes, vec!["in", "out"]);
        let density = source.param("noise").as_constant().unwrap();
        assert!((density - 4.0 * BOLTZMANN * 300.0 / 1e3).abs() < 1e-30);
        assert!(ckt.element("I_noise_R2").is_none());
        assert_eq!(ckt.indep_vars, vec!["V1", "I_noise_R1"]);
    }

    #[test]
    fn test_variance_sources_are_idempotent() {
        let mut ckt = compile("v\nV1 in 0 1\nR1 in out 1k dcvar=1e-4\nR2 out 0 1k\n");
        let values = ValueResolver::numeric(&ckt.param_defs, &HashMap::new(), &[]);
        let names: Vec<String> = variance_resistors(&ckt, &values)
            .iter()
            .map(|e| e.ref_des.clone())
            .collect();
        assert_eq!(names, vec!["R1"]);

        let mut currents = IndexMap::new();
        currents.insert("R1".to_string(), Expr::Constant(0.5e-3));
        add_variance_sources(&mut ckt, &currents);
        let once = ckt.elements.clone();
        add_variance_sources(&mut ckt, &currents);
        assert_eq!(ckt.elements, once);

        let variance = ckt.element("I_dcvar_R1").unwrap().param("dcvar").as_constant().unwrap();
        assert!((variance - 1e-4 * 0.25e-6).abs() < 1e-18);
    }
}
