//! Parameter stepping.

use serde::{Deserialize, Serialize};

use super::StepMethod;

/// Values substituted for the step variables in one run.
pub type StepRun = Vec<(String, f64)>;

/// Which parameters to step and over which values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub method: StepMethod,
    /// Step variables; `lin`, `log` and `list` use only the first.
    pub vars: Vec<String>,
    pub start: f64,
    pub stop: f64,
    pub num: usize,
    /// Values of a `list` step.
    pub list: Vec<f64>,
    /// One value list per variable of an `array` step.
    pub array: Vec<Vec<f64>>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            method: StepMethod::Lin,
            vars: Vec::new(),
            start: 0.0,
            stop: 0.0,
            num: 0,
            list: Vec::new(),
            array: Vec::new(),
        }
    }
}

impl StepConfig {
    pub fn lin(var: impl Into<String>, start: f64, stop: f64, num: usize) -> Self {
        Self {
            method: StepMethod::Lin,
            vars: vec![var.into()],
            start,
            stop,
            num,
            ..Default::default()
        }
    }

    pub fn log(var: impl Into<String>, start: f64, stop: f64, num: usize) -> Self {
        Self {
            method: StepMethod::Log,
            ..Self::lin(var, start, stop, num)
        }
    }

    pub fn list(var: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            method: StepMethod::List,
            vars: vec![var.into()],
            list: values,
            ..Default::default()
        }
    }

    /// Step several variables together, one value list per variable.
    pub fn array(vars: Vec<String>, values: Vec<Vec<f64>>) -> Self {
        Self {
            method: StepMethod::Array,
            vars,
            array: values,
            ..Default::default()
        }
    }

    /// Problems that prevent generating the runs.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.vars.is_empty() {
            problems.push("no step variable".to_string());
        }
        match self.method {
            StepMethod::Lin | StepMethod::Log => {
                if self.num < 2 {
                    problems.push(format!("{} stepping needs at least 2 steps, got {}", self.method, self.num));
                }
                if self.method == StepMethod::Log
                    && (self.start == 0.0 || self.stop == 0.0 || self.start.signum() != self.stop.signum())
                {
                    problems.push(format!(
                        "log stepping needs nonzero bounds of equal sign, got {} and {}",
                        self.start, self.stop
                    ));
                }
            }
            StepMethod::List => {
                if self.list.is_empty() {
                    problems.push("empty step list".to_string());
                }
            }
            StepMethod::Array => {
                if self.array.len() != self.vars.len() {
                    problems.push(format!(
                        "{} step variable(s) but {} value list(s)",
                        self.vars.len(),
                        self.array.len()
                    ));
                }
                let mut lengths = self.array.iter().map(Vec::len);
                if let Some(first) = lengths.next()
                    && lengths.any(|len| len != first)
                {
                    problems.push("array step lists differ in length".to_string());
                }
            }
        }
        problems
    }

    /// Values of the first step variable, one per run.
    pub fn values(&self) -> Vec<f64> {
        match self.method {
            StepMethod::Lin => {
                let delta = (self.stop - self.start) / (self.num.max(2) - 1) as f64;
                (0..self.num).map(|i| self.start + i as f64 * delta).collect()
            }
            StepMethod::Log => {
                let ratio = (self.stop / self.start).powf(1.0 / (self.num.max(2) - 1) as f64);
                (0..self.num).map(|i| self.start * ratio.powi(i as i32)).collect()
            }
            StepMethod::List => self.list.clone(),
            StepMethod::Array => self.array.first().cloned().unwrap_or_default(),
        }
    }

    /// Every run as `(variable, value)` pairs.
    pub fn runs(&self) -> Vec<StepRun> {
        match self.method {
            StepMethod::Array => {
                let len = self.array.iter().map(Vec::len).min().unwrap_or(0);
                (0..len)
                    .map(|i| {
                        self.vars
                            .iter()
                            .zip(&self.array)
                            .map(|(var, values)| (var.clone(), values[i]))
                            .collect()
                    })
                    .collect()
            }
            _ => {
                let Some(var) = self.vars.first() else {
                    return Vec::new();
                };
                self.values().into_iter().map(|v| vec![(var.clone(), v)]).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lin_steps() {
        let values = StepConfig::lin("R", 100.0, 1000.0, 10).values();
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], 100.0);
        assert!((values[9] - 1000.0).abs() < 1e-9);
        assert!((values[1] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_log_steps() {
        let values = StepConfig::log("C", 1e-9, 1e-6, 4).values();
        assert_eq!(values.len(), 4);
        for (v, expected) in values.iter().zip([1e-9, 1e-8, 1e-7, 1e-6]) {
            assert!((v / expected - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_array_runs() {
        let step = StepConfig::array(
            vec!["R".into(), "C".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        );
        assert!(step.problems().is_empty());
        let runs = step.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1], vec![("R".to_string(), 2.0), ("C".to_string(), 4.0)]);
    }

    #[test]
    fn test_problems() {
        assert_eq!(StepConfig::lin("R", 1.0, 2.0, 1).problems().len(), 1);
        assert_eq!(StepConfig::log("R", -1.0, 2.0, 5).problems().len(), 1);
        assert_eq!(StepConfig::log("R", 0.0, 2.0, 5).problems().len(), 1);
        assert_eq!(StepConfig::list("R", vec![]).problems().len(), 1);
        let ragged = StepConfig::array(vec!["a".into(), "b".into()], vec![vec![1.0], vec![1.0, 2.0]]);
        assert_eq!(ragged.problems().len(), 1);
    }
}
