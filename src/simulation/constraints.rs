//! Simulation constraints (resource limits).

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ValidationError};

/// Constraints that bound a projection's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulateConstraints {
    /// Maximum number of steps in one scenario.
    pub max_steps: usize,
    /// Maximum unique records a scenario may touch directly.
    pub max_affected_records: usize,
}

impl Default for SimulateConstraints {
    fn default() -> Self {
        Self {
            max_steps: 32,
            max_affected_records: 1000,
        }
    }
}

impl SimulateConstraints {
    /// Validate constraints.
    ///
    /// This must be called before constructing a `Simulator`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_steps == 0 {
            return Err(ValidationError::InvalidSimulationConstraints {
                reason: "max_steps must be > 0".to_string(),
            });
        }
        if self.max_affected_records == 0 {
            return Err(ValidationError::InvalidSimulationConstraints {
                reason: "max_affected_records must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_steps(&self, steps: usize) -> Result<(), ExecutionError> {
        if steps > self.max_steps {
            return Err(limit("max_steps", self.max_steps, steps));
        }
        Ok(())
    }

    pub(crate) fn check_affected(&self, affected: usize) -> Result<(), ExecutionError> {
        if affected > self.max_affected_records {
            return Err(limit("max_affected_records", self.max_affected_records, affected));
        }
        Ok(())
    }
}

fn limit(limit_type: &str, max: usize, actual: usize) -> ExecutionError {
    ExecutionError::SimulationLimitExceeded {
        limit_type: limit_type.to_string(),
        max_value: max as u64,
        actual_value: actual as u64,
    }
}
