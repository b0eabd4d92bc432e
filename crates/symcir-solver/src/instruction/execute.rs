//! Instruction execution.
//!
//! A run is split in two: [`Engine::stage`] builds the matrices and the
//! expensive closed-form expressions, [`Engine::finish`] derives the
//! requested data type from them. Function stepping builds one stage with
//! the step variables left symbolic and finishes it once per step value;
//! matrix stepping builds a fresh stage per step value.

use std::collections::HashMap;

use indexmap::IndexMap;
use num_complex::Complex64;
use symcir_core::{Circuit, Expr, GROUND, StampKind, SymbolicMna, branch_var, node_var};

use super::loopgain::{self, LoopGainRule};
use super::{DataType, GainType, Instruction, SimType, StepMethod, StepRun};
use crate::algebra::{LimitDirection, SimplifyMethod, SymbolicAlgebra};
use crate::error::{Error, Result};
use crate::noise::{self, NoiseStage};
use crate::results::AllResults;
use crate::sources::{Excitation, SourceVectorBuilder};
use crate::stamp::{MatrixStamper, ValueResolver};

/// Expressions shared by every step value of a run.
#[derive(Debug, Clone, Default)]
struct Stage {
    system: Option<SymbolicMna>,
    solution: Vec<Expr>,
    /// `(numer, denom)` of the detector response.
    transfer: Option<(Expr, Expr)>,
    noise: Option<NoiseStage>,
}

impl Stage {
    fn substitute(&self, bindings: &HashMap<String, Expr>) -> Stage {
        let sub = |e: &Expr| e.substitute(bindings);
        Stage {
            system: self.system.as_ref().map(|s| SymbolicMna {
                matrix: s.matrix.map(|e| sub(&e)),
                rhs: s.rhs.map(|e| sub(&e)),
                dep_vars: s.dep_vars.clone(),
            }),
            solution: self.solution.iter().map(sub).collect(),
            transfer: self.transfer.as_ref().map(|(n, d)| (sub(n), sub(d))),
            noise: self.noise.as_ref().map(|n| n.substitute(bindings)),
        }
    }
}

fn bindings(run: &StepRun) -> HashMap<String, Expr> {
    run.iter()
        .map(|(var, value)| (var.clone(), Expr::Constant(*value)))
        .collect()
}

fn missing(what: &str) -> Error {
    Error::Configuration(format!("no {} computed for this data type", what))
}

/// Remove coinciding pole/zero pairs.
fn cancel_pairs(mut poles: Vec<Complex64>, zeros: Vec<Complex64>, tolerance: f64) -> (Vec<Complex64>, Vec<Complex64>) {
    let mut kept = Vec::new();
    for z in zeros {
        let hit = poles
            .iter()
            .position(|p| (p - z).norm() <= tolerance * p.norm().max(z.norm()));
        match hit {
            Some(i) => {
                poles.remove(i);
            }
            None => kept.push(z),
        }
    }
    (poles, kept)
}

pub(crate) struct Engine<'a> {
    instruction: &'a Instruction,
    algebra: &'a dyn SymbolicAlgebra,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(instruction: &'a Instruction, algebra: &'a dyn SymbolicAlgebra) -> Self {
        Self { instruction, algebra }
    }

    fn laplace(&self) -> &str {
        &self.instruction.config.laplace_var
    }

    fn values(&self, overrides: &HashMap<String, Expr>, keep: &[String]) -> ValueResolver {
        match self.instruction.sim_type {
            SimType::Symbolic => ValueResolver::symbolic(),
            SimType::Numeric => ValueResolver::numeric(&self.instruction.circuit.param_defs, overrides, keep),
        }
    }

    pub(crate) fn run(&self) -> Result<AllResults> {
        let instr = self.instruction;
        let mut results = AllResults::new(instr.gain_type, instr.data_type);

        let Some(step) = &instr.step else {
            let stage = self.stage(&self.values(&HashMap::new(), &[]))?;
            self.finish(stage, &mut results)?;
            return Ok(results);
        };

        let runs = step.runs();
        results.step_vars = step.vars.clone();
        results.step_list = step.values();
        results.step_array = match step.method {
            StepMethod::Array => step.array.clone(),
            _ => vec![step.values()],
        };

        if instr.config.step_function && step.method != StepMethod::Array {
            log::debug!("function stepping {} over {} value(s)", step.vars.join(", "), runs.len());
            let stage = self.stage(&self.values(&HashMap::new(), &step.vars))?;
            for run in &runs {
                self.finish(stage.substitute(&bindings(run)), &mut results)?;
            }
        } else {
            log::debug!("matrix stepping {} over {} value(s)", step.vars.join(", "), runs.len());
            for run in &runs {
                let stage = self.stage(&self.values(&bindings(run), &[]))?;
                self.finish(stage, &mut results)?;
            }
        }
        Ok(results)
    }

    fn lg_ref(&self) -> Result<&str> {
        self.instruction
            .lg_ref
            .as_deref()
            .ok_or_else(|| Error::Configuration("missing loop-gain reference".to_string()))
    }

    fn stage(&self, values: &ValueResolver) -> Result<Stage> {
        let circuit = &self.instruction.circuit;
        if self.instruction.data_type.is_statistical() {
            return self.noise_stage(values);
        }
        match self.instruction.gain_type {
            GainType::Vi | GainType::Gain => self.transfer_stage(circuit, values),
            GainType::Asymptotic => self.transfer_stage(&loopgain::with_nullor(circuit, self.lg_ref()?)?, values),
            GainType::Direct => {
                self.transfer_stage(&loopgain::with_reference_off(circuit, self.lg_ref()?)?, values)
            }
            GainType::LoopGain | GainType::Servo => self.loop_gain_stage(values),
        }
    }

    /// Stamped, excited and ground-eliminated system.
    fn system(&self, circuit: &Circuit, values: &ValueResolver, excitation: &Excitation<'_>) -> Result<SymbolicMna> {
        let mut system = MatrixStamper::new(circuit, values, self.algebra, self.laplace()).stamp()?;
        system.rhs = SourceVectorBuilder::new(circuit, values).build(excitation);
        system.eliminate(&node_var(GROUND));
        log::debug!("{} unknown(s) after ground elimination", system.size());
        Ok(system)
    }

    fn at_dc(&self, system: SymbolicMna) -> SymbolicMna {
        let s = self.laplace();
        let zero = Expr::zero();
        SymbolicMna {
            matrix: system.matrix.map(|e| e.substitute_one(s, &zero)),
            rhs: system.rhs.map(|e| e.substitute_one(s, &zero)),
            dep_vars: system.dep_vars,
        }
    }

    fn weights(&self, system: &SymbolicMna, pos: Option<&str>, neg: Option<&str>) -> Vec<(usize, f64)> {
        let mut weights = Vec::new();
        if let Some(i) = pos.and_then(|v| system.index_of(v)) {
            weights.push((i, 1.0));
        }
        if let Some(i) = neg.and_then(|v| system.index_of(v)) {
            weights.push((i, -1.0));
        }
        weights
    }

    fn detector_weights(&self, system: &SymbolicMna) -> Vec<(usize, f64)> {
        match &self.instruction.detector {
            Some(d) => self.weights(system, d.pos.as_deref(), d.neg.as_deref()),
            None => Vec::new(),
        }
    }

    fn excitation(&self) -> Excitation<'a> {
        let instr = self.instruction;
        let dc = matches!(instr.data_type, DataType::Dc | DataType::DcSolve);
        match (instr.gain_type, instr.source.as_deref()) {
            (GainType::Vi, _) | (_, None) if dc => Excitation::Dc,
            (GainType::Vi, _) | (_, None) => Excitation::Values,
            (_, Some(source)) => Excitation::Unit(source),
        }
    }

    fn transfer_stage(&self, circuit: &Circuit, values: &ValueResolver) -> Result<Stage> {
        let data = self.instruction.data_type;
        let mut system = self.system(circuit, values, &self.excitation())?;
        if data == DataType::DcSolve {
            system = self.at_dc(system);
        }
        match data {
            DataType::Matrix => Ok(Stage {
                system: Some(system),
                ..Default::default()
            }),
            DataType::Solve | DataType::DcSolve => Ok(Stage {
                solution: self.algebra.solve_linear_system(&system.matrix, &system.rhs)?,
                ..Default::default()
            }),
            _ => {
                let weights = self.detector_weights(&system);
                let transfer = self.algebra.cramer(&system.matrix, &system.rhs, &weights)?;
                Ok(Stage {
                    transfer: Some(transfer),
                    ..Default::default()
                })
            }
        }
    }

    /// Return ratio of the loop-gain reference, or the servo function
    /// `-L/(1-L)` derived from it.
    fn loop_gain_stage(&self, values: &ValueResolver) -> Result<Stage> {
        let instr = self.instruction;
        let lg_ref = self.lg_ref()?;
        let element = instr
            .circuit
            .element(lg_ref)
            .ok_or_else(|| Error::Configuration(format!("unknown loop-gain reference '{}'", lg_ref)))?;
        let rule = LoopGainRule::for_element(element, values)?;
        log::debug!(
            "loop gain of {}: source {:?}, detector {:?}",
            lg_ref,
            rule.source,
            rule.detector
        );

        let circuit = loopgain::with_reference_off(&instr.circuit, lg_ref)?;
        let excitation = Excitation::Rows {
            pos: rule.source.0.as_deref(),
            neg: rule.source.1.as_deref(),
        };
        let system = self.system(&circuit, values, &excitation)?;
        if instr.data_type == DataType::Matrix {
            return Ok(Stage {
                system: Some(system),
                ..Default::default()
            });
        }

        let weights = self.weights(&system, rule.detector.0.as_deref(), rule.detector.1.as_deref());
        let (numer, denom) = self.algebra.cramer(&system.matrix, &system.rhs, &weights)?;
        let (gain_numer, gain_denom) = self.algebra.as_numer_denom(&rule.gain)?;
        let ln = gain_numer * numer;
        let ld = gain_denom * denom;
        let transfer = match instr.gain_type {
            GainType::Servo => (-ln.clone(), ld - ln),
            _ => (ln, ld),
        };
        Ok(Stage {
            transfer: Some(transfer),
            ..Default::default()
        })
    }

    /// DC currents through the resistors that carry a `dcvar`.
    fn resistor_currents(&self, circuit: &Circuit, values: &ValueResolver) -> Result<IndexMap<String, Expr>> {
        let resistors = noise::variance_resistors(circuit, values);
        if resistors.is_empty() {
            return Ok(IndexMap::new());
        }
        let system = self.at_dc(self.system(circuit, values, &Excitation::Dc)?);
        let solution = self.algebra.solve_linear_system(&system.matrix, &system.rhs)?;
        let unknown = |var: &str| {
            system
                .index_of(var)
                .map(|i| solution[i].clone())
                .unwrap_or_default()
        };
        let node = |name: Option<&String>| name.map(|n| unknown(&node_var(n))).unwrap_or_default();

        let mut currents = IndexMap::new();
        for r in resistors {
            let current = match r.stamp_kind() {
                Some(StampKind::ResistorBranch) => unknown(&branch_var("I", &r.ref_des)),
                _ => (node(r.nodes.first()) - node(r.nodes.get(1))) / values.param(r, "value"),
            };
            currents.insert(r.ref_des.clone(), current);
        }
        Ok(currents)
    }

    fn noise_stage(&self, values: &ValueResolver) -> Result<Stage> {
        let instr = self.instruction;
        let mut circuit = instr.circuit.clone();
        let param = match instr.data_type {
            DataType::DcVar => {
                let currents = self.resistor_currents(&circuit, values)?;
                noise::add_variance_sources(&mut circuit, &currents);
                "dcvar"
            }
            _ => {
                noise::add_thermal_sources(&mut circuit);
                "noise"
            }
        };

        let mut system = self.system(&circuit, values, &Excitation::Placeholders)?;
        if instr.data_type == DataType::DcVar {
            system = self.at_dc(system);
        }
        let weights = self.detector_weights(&system);
        let (numer, denom) = self.algebra.cramer(&system.matrix, &system.rhs, &weights)?;
        let stage = NoiseStage::extract(
            self.algebra,
            &circuit,
            values,
            &numer,
            denom,
            param,
            instr.source.as_deref(),
        )?;
        Ok(Stage {
            noise: Some(stage),
            ..Default::default()
        })
    }

    fn finish(&self, stage: Stage, results: &mut AllResults) -> Result<()> {
        let instr = self.instruction;
        match instr.data_type {
            DataType::Matrix => {
                let system = stage.system.ok_or_else(|| missing("matrix"))?;
                results.iv.push(system.rhs.iter().cloned().collect());
                results.dv.push(system.dv());
                results.m.push(system.matrix);
            }
            DataType::Solve => results.solve.push(stage.solution),
            DataType::DcSolve => results.dcsolve.push(stage.solution),
            DataType::Noise | DataType::DcVar => {
                let noise = stage.noise.ok_or_else(|| missing("noise stage"))?;
                noise::accumulate(self.algebra, &noise, instr.data_type, &instr.config, results)?;
            }
            data => {
                let (numer, denom) = stage.transfer.ok_or_else(|| missing("transfer"))?;
                self.finish_transfer(data, numer, denom, results)?;
            }
        }
        Ok(())
    }

    fn finish_transfer(&self, data: DataType, numer: Expr, denom: Expr, results: &mut AllResults) -> Result<()> {
        let algebra = self.algebra;
        let s = self.laplace();
        let t = self.instruction.config.time_var.as_str();
        match data {
            DataType::Laplace => {
                results
                    .laplace
                    .push(algebra.simplify(&(numer / denom), SimplifyMethod::Normal)?);
            }
            DataType::Numer => results.numer.push(numer),
            DataType::Denom => results.denom.push(denom),
            DataType::Poles => results.poles.push(algebra.polynomial_roots(&denom, s)?),
            DataType::Zeros => results.zeros.push(algebra.polynomial_roots(&numer, s)?),
            DataType::Pz => {
                let poles = algebra.polynomial_roots(&denom, s)?;
                let zeros = algebra.polynomial_roots(&numer, s)?;
                let (poles, zeros) = cancel_pairs(poles, zeros, self.instruction.config.pz_tolerance);
                results.poles.push(poles);
                results.zeros.push(zeros);
                match algebra.limit(&(numer / denom), s, 0.0, LimitDirection::Both) {
                    Ok(gain) => results.dc_value.push(gain),
                    Err(e) => results.warn(format!("DC gain not available: {}", e)),
                }
            }
            DataType::Dc => {
                results
                    .dc_value
                    .push(algebra.limit(&(numer / denom), s, 0.0, LimitDirection::Both)?);
            }
            DataType::Impulse | DataType::Time => match algebra.inverse_laplace(&numer, &denom, s, t) {
                Ok(response) if data == DataType::Impulse => results.impulse.push(response),
                Ok(response) => results.time.push(response),
                Err(e) => results.warn(format!("{} response not available: {}", data, e)),
            },
            DataType::Step => {
                let denom = denom * Expr::symbol(s);
                match algebra.inverse_laplace(&numer, &denom, s, t) {
                    Ok(response) => results.step_response.push(response),
                    Err(e) => results.warn(format!("step response not available: {}", e)),
                }
            }
            other => return Err(missing(other.name())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_cancel_pairs() {
        let poles = vec![c(-1.0, 0.0), c(-2.0, 0.0), c(-1e3, 0.0)];
        let zeros = vec![c(-2.0 * (1.0 + 1e-9), 0.0), c(5.0, 0.0)];
        let (poles, zeros) = cancel_pairs(poles, zeros, 1e-6);
        assert_eq!(poles, vec![c(-1.0, 0.0), c(-1e3, 0.0)]);
        assert_eq!(zeros, vec![c(5.0, 0.0)]);
    }

    #[test]
    fn test_cancel_pairs_at_origin() {
        let (poles, zeros) = cancel_pairs(vec![c(0.0, 0.0)], vec![c(0.0, 0.0)], 1e-6);
        assert!(poles.is_empty());
        assert!(zeros.is_empty());
    }
}
