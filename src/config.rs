//! Panel configuration.
//!
//! Every field has a default, so `{}` is a valid configuration and callers
//! only spell out what they change.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::export::ExportOptions;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::simulation::SimulateConstraints;

/// Default queue depth of each panel subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

const fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

const fn default_subscriber_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

/// Configuration for one [`Panel`](crate::panel::Panel).
///
/// # Examples
///
/// ```
/// use clubcore::PanelConfig;
///
/// let config = PanelConfig::from_json_str(r#"{"export": {"delimiter": ";"}}"#).unwrap();
/// assert_eq!(config.history_capacity, 10);
/// assert_eq!(config.export.delimiter, ";");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Depth of each undo/redo stack.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Events buffered per subscriber before new ones are dropped.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    #[serde(default)]
    pub export: ExportOptions,

    #[serde(default)]
    pub simulate: SimulateConstraints,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            subscriber_capacity: default_subscriber_capacity(),
            export: ExportOptions::default(),
            simulate: SimulateConstraints::default(),
        }
    }
}

impl PanelConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.history_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "history_capacity must be > 0".to_string(),
            });
        }
        if self.subscriber_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "subscriber_capacity must be > 0".to_string(),
            });
        }
        self.export.validate()?;
        self.simulate.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(PanelConfig::from_json_str("{}").unwrap(), PanelConfig::default());
    }

    #[test]
    fn nested_defaults_fill_gaps() {
        let c = PanelConfig::from_json_str(
            r#"{"history_capacity": 3, "simulate": {"max_steps": 2}}"#,
        )
        .unwrap();
        assert_eq!(c.history_capacity, 3);
        assert_eq!(c.simulate.max_steps, 2);
        assert_eq!(c.simulate.max_affected_records, 1000);
        assert_eq!(c.export, ExportOptions::default());
    }

    #[test]
    fn invalid_values_rejected() {
        for json in [
            r#"{"history_capacity": 0}"#,
            r#"{"subscriber_capacity": 0}"#,
            r#"{"export": {"delimiter": ""}}"#,
            r#"{"simulate": {"max_affected_records": 0}}"#,
            r#"{"history_capacity": "ten"}"#,
        ] {
            let err = PanelConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{json}");
        }
    }
}
