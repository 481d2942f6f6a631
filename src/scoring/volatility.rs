//! Sequence indicators: volatility and trend over a list attribute.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::Record;

use super::formula::IndicatorRange;
use super::tiers::TierScheme;

/// Mean consecutive difference below which a series counts as flat.
pub const TREND_EPSILON: f64 = 0.05;

/// Direction of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

fn consecutive_diffs(series: &[f64]) -> impl Iterator<Item = f64> + '_ {
    series.windows(2).map(|w| w[1] - w[0])
}

/// Mean absolute consecutive difference, or `None` for fewer than two
/// values.
///
/// ```
/// use clubcore::scoring::volatility;
///
/// assert_eq!(volatility(&[5.0]), None);
/// assert_eq!(volatility(&[1.0, 3.0, 2.0]), Some(1.5));
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn volatility(series: &[f64]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let total: f64 = consecutive_diffs(series).map(f64::abs).sum();
    Some(total / (series.len() - 1) as f64)
}

/// Direction of the series by its mean signed consecutive difference.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend(series: &[f64], epsilon: f64) -> Option<Trend> {
    if series.len() < 2 {
        return None;
    }
    let mean = consecutive_diffs(series).sum::<f64>() / (series.len() - 1) as f64;
    Some(if mean > epsilon {
        Trend::Rising
    } else if mean < -epsilon {
        Trend::Falling
    } else {
        Trend::Flat
    })
}

/// Volatility indicator over the trailing `window` values of a numeric
/// list attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySpec {
    pub name: String,
    pub field: String,
    pub window: usize,
    /// Multiplier applied before clamping into `range`.
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub range: IndicatorRange,
    pub tiers: TierScheme,
}

const fn default_scale() -> f64 {
    1.0
}

impl VolatilitySpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        window: usize,
        range: IndicatorRange,
        tiers: TierScheme,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            window,
            scale: 1.0,
            range,
            tiers,
        }
    }

    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window < 2 {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: format!("window must be at least 2, got {}", self.window),
            });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: "scale must be finite and positive".to_string(),
            });
        }
        self.range.validate(&self.name)?;
        self.tiers.validate()
    }

    /// Trailing window of finite values from the record's series.
    #[must_use]
    pub fn series(&self, record: &Record) -> Vec<f64> {
        let values: Vec<f64> = record
            .get(&self.field)
            .and_then(crate::value::Value::as_numbers)
            .unwrap_or_default()
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        let start = values.len().saturating_sub(self.window);
        values[start..].to_vec()
    }

    /// Scaled and clamped volatility, or `None` when the window holds fewer
    /// than two values.
    #[must_use]
    pub fn evaluate(&self, record: &Record) -> Option<f64> {
        volatility(&self.series(record)).map(|v| self.range.clamp(v * self.scale))
    }

    #[must_use]
    pub fn trend_of(&self, record: &Record) -> Option<Trend> {
        trend(&self.series(record), TREND_EPSILON)
    }
}
