//! Cohort-relative percentile indicators.

use serde::{Deserialize, Serialize};

use crate::cohort::Cohort;
use crate::error::ValidationError;
use crate::record::Record;

use super::formula::IndicatorRange;
use super::tiers::TierScheme;

/// Percentile of `target` within `cohort_values`.
///
/// The cohort is sorted ascending and the index of the first value that
/// is `>= target` is taken (ties resolve to the first qualifying index):
/// `100 * (1 - index / (n - 1))`. A cohort of zero or one value yields 100.
/// The result is clamped to `[0, 100]`.
///
/// # Examples
///
/// ```
/// use clubcore::scoring::percentile;
///
/// assert_eq!(percentile(5.0, &[5.0]), 100.0);
/// assert_eq!(percentile(3.0, &[3.0, 3.0, 3.0]), 100.0);
/// assert_eq!(percentile(9.0, &[1.0, 5.0, 9.0]), 0.0);
/// ```
#[must_use]
pub fn percentile(target: f64, cohort_values: &[f64]) -> f64 {
    percentile_in_sorted(target, &sorted_finite(cohort_values))
}

/// Finite values sorted ascending, for repeated [`percentile_in_sorted`] lookups.
#[must_use]
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// [`percentile`] over values already passed through [`sorted_finite`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentile_in_sorted(target: f64, sorted: &[f64]) -> f64 {
    if sorted.len() <= 1 || !target.is_finite() {
        return 100.0;
    }
    let index = sorted.partition_point(|v| *v < target);
    let denominator = (sorted.len() - 1) as f64;
    IndicatorRange::HUNDRED.clamp(100.0 * (1.0 - index as f64 / denominator))
}

/// Percentile indicator over one numeric attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileSpec {
    pub name: String,
    pub field: String,
    pub tiers: TierScheme,
}

impl PercentileSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, field: impl Into<String>, tiers: TierScheme) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            tiers,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.field.trim().is_empty() {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: "percentile needs a name and a field".to_string(),
            });
        }
        self.tiers.validate()
    }

    /// Percentile of `record` within `cohort`, or `None` when the record has
    /// no finite value for the field.
    #[must_use]
    pub fn evaluate(&self, record: &Record, cohort: &Cohort) -> Option<f64> {
        let target = record.number(&self.field).filter(|v| v.is_finite())?;
        Some(percentile(target, &cohort.numbers_of(&self.field)))
    }

    /// Like [`PercentileSpec::evaluate`], with the cohort column pre-sorted.
    #[must_use]
    pub fn evaluate_sorted(&self, record: &Record, sorted: &[f64]) -> Option<f64> {
        let target = record.number(&self.field).filter(|v| v.is_finite())?;
        Some(percentile_in_sorted(target, sorted))
    }
}
