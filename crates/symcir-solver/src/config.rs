//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every instruction execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock limit for a single algebra-service call.
    pub timeout: Duration,
    /// Name of the Laplace variable.
    pub laplace_var: String,
    /// Name of the frequency variable of noise spectra.
    pub frequency_var: String,
    /// Name of the time variable of time-domain results.
    pub time_var: String,
    /// Prefer function stepping over matrix stepping.
    pub step_function: bool,
    /// Relative tolerance for pole-zero cancellation.
    pub pz_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            laplace_var: "s".to_string(),
            frequency_var: "f".to_string(),
            time_var: "t".to_string(),
            step_function: true,
            pz_tolerance: 1e-6,
        }
    }
}

impl EngineConfig {
    /// Set the algebra timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Select matrix stepping (`false`) or function stepping (`true`).
    pub fn with_step_function(mut self, enabled: bool) -> Self {
        self.step_function = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.laplace_var, "s");
        assert_eq!(config.frequency_var, "f");
        assert!(config.step_function);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"step_function": false, "pz_tolerance": 1e-9}"#).unwrap();
        assert!(!config.step_function);
        assert_eq!(config.pz_tolerance, 1e-9);
        assert_eq!(config.laplace_var, "s");
    }
}
