//! Status tiers for indicator values.
//!
//! A tier is a pure function of the current value and two fixed
//! thresholds. History never influences the tier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Label family a scheme reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLabels {
    /// Red / amber / green, oriented by `higher_is_better`.
    Rag,
    /// Low / medium / high by magnitude.
    LowMediumHigh,
}

/// Classification of one indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Red,
    Amber,
    Green,
    Low,
    Medium,
    High,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Amber => write!(f, "amber"),
            Self::Green => write!(f, "green"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Two thresholds splitting a range into three bands.
///
/// Values below `lower` fall in the first band, values in `[lower, upper)`
/// in the middle band and values at or above `upper` in the last band.
///
/// # Examples
///
/// ```
/// use clubcore::scoring::{Tier, TierScheme};
///
/// let health = TierScheme::rag(4.0, 7.0);
/// assert_eq!(health.classify(8.2), Tier::Green);
/// assert_eq!(health.classify(5.0), Tier::Amber);
///
/// let risk = TierScheme::rag_inverted(35.0, 65.0);
/// assert_eq!(risk.classify(80.0), Tier::Red);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierScheme {
    pub lower: f64,
    pub upper: f64,
    pub labels: TierLabels,
    #[serde(default = "default_higher_is_better")]
    pub higher_is_better: bool,
}

const fn default_higher_is_better() -> bool {
    true
}

impl TierScheme {
    /// Red/amber/green where higher values are healthier.
    #[must_use]
    pub const fn rag(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            labels: TierLabels::Rag,
            higher_is_better: true,
        }
    }

    /// Red/amber/green where higher values are worse (risk-style).
    #[must_use]
    pub const fn rag_inverted(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            labels: TierLabels::Rag,
            higher_is_better: false,
        }
    }

    /// Low/medium/high by magnitude.
    #[must_use]
    pub const fn low_medium_high(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            labels: TierLabels::LowMediumHigh,
            higher_is_better: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(ValidationError::InvalidFormula {
                name: "tiers".to_string(),
                reason: format!(
                    "tier thresholds must be finite and ordered: lower={} upper={}",
                    self.lower, self.upper
                ),
            });
        }
        Ok(())
    }

    /// Tier of `value`. NaN lands in the first band.
    #[must_use]
    pub fn classify(&self, value: f64) -> Tier {
        let band = if value >= self.upper {
            2
        } else if value >= self.lower {
            1
        } else {
            0
        };

        match (self.labels, self.higher_is_better, band) {
            (TierLabels::LowMediumHigh, _, 0) => Tier::Low,
            (TierLabels::LowMediumHigh, _, 1) => Tier::Medium,
            (TierLabels::LowMediumHigh, _, _) => Tier::High,
            (TierLabels::Rag, true, 0) | (TierLabels::Rag, false, 2) => Tier::Red,
            (TierLabels::Rag, _, 1) => Tier::Amber,
            (TierLabels::Rag, _, _) => Tier::Green,
        }
    }
}
