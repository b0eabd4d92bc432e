//! Analysis instructions.
//!
//! An [`Instruction`] pairs a compiled circuit with the analysis to run on
//! it: simulation mode, gain type, data type, source, detector, loop-gain
//! reference and optional parameter stepping. [`Instruction::check`]
//! validates the combination before anything is computed;
//! [`Instruction::execute`] runs it and returns an [`AllResults`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use symcir_core::{Circuit, Diagnostic, DiagnosticKind, GROUND, node_var};

use crate::algebra::{RationalAlgebra, SymbolicAlgebra};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::results::AllResults;

mod execute;
pub mod loopgain;
pub mod stepping;

pub use loopgain::LoopGainRule;
pub use stepping::{StepConfig, StepRun};

/// Parse a case-insensitive keyword against a fixed table.
fn keyword<T: Copy>(input: &str, table: &[(&str, T)], what: &str) -> Result<T> {
    let key = input.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
        .ok_or_else(|| Error::Configuration(format!("unknown {} '{}'", what, input)))
}

macro_rules! keywords {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                keyword(s, &[$(($name, $ty::$variant)),+], $what)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimType {
    Symbolic,
    #[default]
    Numeric,
}

keywords!(SimType, "simulation type", {
    Symbolic => "symbolic",
    Numeric => "numeric",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainType {
    /// Plain solve of the circuit with its own sources.
    Vi,
    /// Source-to-detector transfer.
    #[default]
    Gain,
    /// Transfer with the loop-gain reference replaced by a nullor.
    Asymptotic,
    /// Transfer with the loop-gain reference switched off.
    Direct,
    LoopGain,
    Servo,
}

keywords!(GainType, "gain type", {
    Vi => "vi",
    Gain => "gain",
    Asymptotic => "asymptotic",
    Direct => "direct",
    LoopGain => "loopgain",
    Servo => "servo",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Matrix,
    #[default]
    Laplace,
    Numer,
    Denom,
    Solve,
    DcSolve,
    Poles,
    Zeros,
    Pz,
    Dc,
    Impulse,
    Step,
    Time,
    Noise,
    DcVar,
}

keywords!(DataType, "data type", {
    Matrix => "matrix",
    Laplace => "laplace",
    Numer => "numer",
    Denom => "denom",
    Solve => "solve",
    DcSolve => "dcsolve",
    Poles => "poles",
    Zeros => "zeros",
    Pz => "pz",
    Dc => "dc",
    Impulse => "impulse",
    Step => "step",
    Time => "time",
    Noise => "noise",
    DcVar => "dcvar",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMethod {
    #[default]
    Lin,
    Log,
    List,
    Array,
}

keywords!(StepMethod, "step method", {
    Lin => "lin",
    Log => "log",
    List => "list",
    Array => "array",
});

impl DataType {
    /// Data types computed from a transfer `numer/denom`.
    fn is_transfer(self) -> bool {
        matches!(
            self,
            DataType::Laplace
                | DataType::Numer
                | DataType::Zeros
                | DataType::Pz
                | DataType::Dc
                | DataType::Impulse
                | DataType::Step
                | DataType::Time
        )
    }

    fn is_statistical(self) -> bool {
        matches!(self, DataType::Noise | DataType::DcVar)
    }
}

impl GainType {
    fn uses_reference(self) -> bool {
        matches!(
            self,
            GainType::Asymptotic | GainType::Direct | GainType::LoopGain | GainType::Servo
        )
    }

    pub fn supports(self, data: DataType) -> bool {
        match data {
            DataType::Noise | DataType::DcVar | DataType::Solve | DataType::DcSolve => {
                matches!(self, GainType::Vi | GainType::Gain)
            }
            _ => true,
        }
    }

    fn needs_source(self, data: DataType) -> bool {
        matches!(self, GainType::Gain | GainType::Asymptotic | GainType::Direct) && data.is_transfer()
    }

    fn needs_detector(self, data: DataType) -> bool {
        self.needs_source(data) || data.is_statistical() || (self == GainType::Vi && data.is_transfer())
    }
}

/// Observed quantity: the difference of two dependent variables.
///
/// Ground voltages are stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Detector {
    pub pos: Option<String>,
    pub neg: Option<String>,
}

impl Detector {
    pub fn new(pos: impl Into<String>) -> Self {
        Self {
            pos: not_ground(pos.into()),
            neg: None,
        }
    }

    pub fn differential(pos: impl Into<String>, neg: impl Into<String>) -> Self {
        Self {
            pos: not_ground(pos.into()),
            neg: not_ground(neg.into()),
        }
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.pos.iter().chain(self.neg.iter()).map(String::as_str)
    }
}

impl From<&str> for Detector {
    fn from(pos: &str) -> Self {
        Detector::new(pos)
    }
}

impl From<(&str, &str)> for Detector {
    fn from((pos, neg): (&str, &str)) -> Self {
        Detector::differential(pos, neg)
    }
}

fn not_ground(var: String) -> Option<String> {
    (var != node_var(GROUND)).then_some(var)
}

/// One analysis request on a circuit.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub circuit: Circuit,
    pub sim_type: SimType,
    pub gain_type: GainType,
    pub data_type: DataType,
    /// Independent source used as signal input.
    pub source: Option<String>,
    pub detector: Option<Detector>,
    /// Controlled source used as loop-gain reference.
    pub lg_ref: Option<String>,
    pub step: Option<StepConfig>,
    pub config: EngineConfig,
}

impl Instruction {
    pub fn new(circuit: Circuit) -> Self {
        Self {
            circuit,
            sim_type: SimType::default(),
            gain_type: GainType::default(),
            data_type: DataType::default(),
            source: None,
            detector: None,
            lg_ref: None,
            step: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_sim_type(mut self, sim_type: SimType) -> Self {
        self.sim_type = sim_type;
        self
    }

    pub fn with_gain_type(mut self, gain_type: GainType) -> Self {
        self.gain_type = gain_type;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_detector(mut self, detector: impl Into<Detector>) -> Self {
        self.detector = Some(detector.into());
        self
    }

    pub fn with_lg_ref(mut self, lg_ref: impl Into<String>) -> Self {
        self.lg_ref = Some(lg_ref.into());
        self
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the instruction against its circuit.
    ///
    /// Every problem is reported; an empty list means the instruction can
    /// be executed.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut messages = Vec::new();
        let gain = self.gain_type;
        let data = self.data_type;

        if !gain.supports(data) {
            messages.push(format!("data type '{}' is not available for gain type '{}'", data, gain));
        }

        match &self.source {
            Some(source) if !self.circuit.indep_vars.contains(source) => {
                messages.push(format!("source '{}' is not an independent source", source));
            }
            None if gain.needs_source(data) => {
                messages.push(format!("gain type '{}' with data type '{}' needs a source", gain, data));
            }
            _ => {}
        }

        match &self.detector {
            Some(detector) => {
                if detector.pos.is_none() && detector.neg.is_none() {
                    messages.push("detector is grounded on both sides".to_string());
                }
                for var in detector.vars() {
                    if self.circuit.var_index(var).is_none() {
                        messages.push(format!("unknown detector variable '{}'", var));
                    }
                }
            }
            None if gain.needs_detector(data) => {
                messages.push(format!("gain type '{}' with data type '{}' needs a detector", gain, data));
            }
            None => {}
        }

        if gain.uses_reference() {
            match &self.lg_ref {
                None => messages.push(format!("gain type '{}' needs a loop-gain reference", gain)),
                Some(lg_ref) => {
                    let ok = self
                        .circuit
                        .element(lg_ref)
                        .and_then(|e| e.stamp_kind())
                        .is_some_and(|kind| kind.is_controlled_source());
                    if !ok {
                        messages.push(format!("loop-gain reference '{}' is not a controlled source", lg_ref));
                    }
                }
            }
        }

        if let Some(step) = &self.step {
            if self.sim_type != SimType::Numeric {
                messages.push("parameter stepping requires numeric simulation".to_string());
            }
            messages.extend(step.problems());
        }

        messages
            .into_iter()
            .map(|m| Diagnostic::error(DiagnosticKind::Configuration, 0, m))
            .collect()
    }

    /// Circuit errors plus instruction errors.
    pub fn errors(&self) -> usize {
        self.circuit.errors() + self.check().len()
    }

    /// Execute with the reference algebra backend.
    pub fn execute(&self) -> Result<AllResults> {
        let algebra = RationalAlgebra::from_config(&self.config);
        self.execute_with(&algebra)
    }

    /// Execute with a caller-supplied algebra backend.
    ///
    /// An instruction with errors is not executed and yields empty results.
    pub fn execute_with(&self, algebra: &dyn SymbolicAlgebra) -> Result<AllResults> {
        let problems = self.check();
        let errors = self.circuit.errors() + problems.len();
        if errors > 0 {
            for problem in &problems {
                log::error!("{}", problem);
            }
            log::error!(
                "'{}': {} error(s), instruction not executed",
                self.circuit.title,
                errors
            );
            return Ok(AllResults::default());
        }
        log::info!(
            "executing '{}': {} {} ({})",
            self.circuit.title,
            self.gain_type,
            self.data_type,
            self.sim_type
        );
        execute::Engine::new(self, algebra).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcir_parser::compile;

    fn amplifier() -> Circuit {
        compile(
            "amp
V1 in 0 1
R1 in x 1k
E1 out 0 0 x {A}
R2 x out 10k
",
        )
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!("LoopGain".parse::<GainType>().unwrap(), GainType::LoopGain);
        assert_eq!(" dcvar ".parse::<DataType>().unwrap(), DataType::DcVar);
        assert_eq!("LIN".parse::<StepMethod>().unwrap(), StepMethod::Lin);
        assert!("bode".parse::<DataType>().is_err());
        for data in DataType::ALL {
            assert_eq!(data.name().parse::<DataType>().unwrap(), *data);
        }
    }

    #[test]
    fn test_detector_drops_ground() {
        let d = Detector::differential("V_out", "V_0");
        assert_eq!(d.pos.as_deref(), Some("V_out"));
        assert_eq!(d.neg, None);
    }

    #[test]
    fn test_gain_needs_source_and_detector() {
        let instr = Instruction::new(amplifier()).with_data_type(DataType::Laplace);
        assert_eq!(instr.check().len(), 2);
        let instr = instr.with_source("V1").with_detector("V_out");
        assert!(instr.check().is_empty());
    }

    #[test]
    fn test_reference_must_be_controlled_source() {
        let instr = Instruction::new(amplifier())
            .with_gain_type(GainType::LoopGain)
            .with_data_type(DataType::Laplace);
        assert_eq!(instr.check().len(), 1);
        assert_eq!(instr.clone().with_lg_ref("R1").check().len(), 1);
        assert!(instr.with_lg_ref("E1").check().is_empty());
    }

    #[test]
    fn test_noise_not_available_for_loopgain() {
        let instr = Instruction::new(amplifier())
            .with_gain_type(GainType::LoopGain)
            .with_data_type(DataType::Noise)
            .with_detector("V_out")
            .with_lg_ref("E1");
        let problems = instr.check();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, DiagnosticKind::Configuration);
    }

    #[test]
    fn test_symbolic_stepping_is_rejected() {
        let instr = Instruction::new(amplifier())
            .with_sim_type(SimType::Symbolic)
            .with_data_type(DataType::Denom)
            .with_step(StepConfig::lin("A", 1.0, 10.0, 5));
        assert_eq!(instr.check().len(), 1);
    }

    #[test]
    fn test_unknown_detector_and_source() {
        let instr = Instruction::new(amplifier())
            .with_source("R1")
            .with_detector("V_nowhere");
        assert_eq!(instr.check().len(), 2);
    }

    #[test]
    fn test_invalid_instruction_yields_empty_results() {
        let results = Instruction::new(amplifier()).execute().unwrap();
        assert!(results.is_empty());
        assert_eq!(results.gain_type, None);
    }
}
