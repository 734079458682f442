use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings for the `placelog simulate` harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of simulated sessions
    pub sessions: u32,

    /// How long to run, in seconds
    pub duration_secs: u64,

    /// Milliseconds between simulated gameplay ticks
    pub tick_ms: u64,

    /// Probability that a blob or index write fails (0.0 - 1.0)
    pub fail_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sessions: 4,
            duration_secs: 30,
            tick_ms: 500,
            fail_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(ConfigError::Invalid(format!(
                "fail_rate must be between 0 and 1, got {}",
                self.fail_rate
            )));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".to_string()));
        }
        Ok(())
    }
}
