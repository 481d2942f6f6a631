//! Declarative weighted formulas.
//!
//! Each panel describes its indicator as data: a clamp range, an intercept
//! and a list of weighted terms. A term extracts a sub-metric from the
//! record, normalizes it, and multiplies by a constant weight. The result
//! is always clamped, so malformed or extreme attributes cannot push the
//! indicator outside its declared range.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::Record;
use crate::value::Value;

use super::tiers::TierScheme;

/// Closed range an indicator is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRange {
    pub min: f64,
    pub max: f64,
}

impl IndicatorRange {
    /// The common 0..10 scale.
    pub const TEN: Self = Self { min: 0.0, max: 10.0 };

    /// The common 0..100 scale.
    pub const HUNDRED: Self = Self {
        min: 0.0,
        max: 100.0,
    };

    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ValidationError::InvalidFormula {
                name: name.to_string(),
                reason: format!("range [{}, {}] is empty or not finite", self.min, self.max),
            });
        }
        Ok(())
    }

    /// Clamp into the range. Non-finite input maps to `min`, except
    /// positive infinity which maps to `max`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Where a term reads its raw sub-metric from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSource {
    /// A numeric attribute.
    Attribute { field: String },
    /// `numerator / denominator`; undefined when the denominator is zero.
    Ratio {
        numerator: String,
        denominator: String,
    },
    /// Mean of a numeric list attribute.
    ListMean { field: String },
    /// Last element of a numeric list attribute.
    ListLast { field: String },
    /// Number of elements in a list attribute.
    ListLen { field: String },
    /// Fixed score per enum label; unknown labels are undefined.
    EnumScore {
        field: String,
        scores: BTreeMap<String, f64>,
    },
    /// 1 for a true flag, 0 otherwise.
    Flag { field: String },
}

impl MetricSource {
    #[must_use]
    pub fn attribute(field: impl Into<String>) -> Self {
        Self::Attribute {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn ratio(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        Self::Ratio {
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    /// Raw sub-metric, or `None` when it is missing or not finite.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn extract(&self, record: &Record) -> Option<f64> {
        let raw = match self {
            Self::Attribute { field } => record.number(field)?,
            Self::Ratio {
                numerator,
                denominator,
            } => {
                let d = record.number(denominator)?;
                if d == 0.0 {
                    return None;
                }
                record.number(numerator)? / d
            }
            Self::ListMean { field } => {
                let values = record.get(field)?.as_numbers()?;
                if values.is_empty() {
                    return None;
                }
                values.iter().sum::<f64>() / values.len() as f64
            }
            Self::ListLast { field } => *record.get(field)?.as_numbers()?.last()?,
            Self::ListLen { field } => record.get(field)?.as_list()?.len() as f64,
            Self::EnumScore { field, scores } => *scores.get(record.text(field)?)?,
            Self::Flag { field } => match record.get(field) {
                Some(Value::Bool(true)) => 1.0,
                _ => 0.0,
            },
        };
        raw.is_finite().then_some(raw)
    }
}

/// How a raw sub-metric is mapped before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Normalize {
    /// Use the raw value.
    Raw,
    /// Map `[lo, hi]` onto `[0, 1]`, clamping outside values.
    Scale { lo: f64, hi: f64 },
    /// `1 - Scale`: larger raw values contribute less.
    Inverse { lo: f64, hi: f64 },
}

impl Normalize {
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        match *self {
            Self::Raw => raw,
            Self::Scale { lo, hi } => scale_unit(raw, lo, hi),
            Self::Inverse { lo, hi } => 1.0 - scale_unit(raw, lo, hi),
        }
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        match *self {
            Self::Raw => Ok(()),
            Self::Scale { lo, hi } | Self::Inverse { lo, hi } => {
                if lo.is_finite() && hi.is_finite() && hi > lo {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidFormula {
                        name: name.to_string(),
                        reason: format!("normalization bounds [{lo}, {hi}] are invalid"),
                    })
                }
            }
        }
    }
}

fn scale_unit(raw: f64, lo: f64, hi: f64) -> f64 {
    ((raw - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// One weighted term of a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub metric: MetricSource,
    pub normalize: Normalize,
    pub weight: f64,
}

impl Term {
    #[must_use]
    pub const fn new(metric: MetricSource, normalize: Normalize, weight: f64) -> Self {
        Self {
            metric,
            normalize,
            weight,
        }
    }

    /// Weighted contribution; an undefined sub-metric contributes nothing.
    #[must_use]
    pub fn contribution(&self, record: &Record) -> f64 {
        self.metric
            .extract(record)
            .map_or(0.0, |raw| self.weight * self.normalize.apply(raw))
    }
}

/// A weighted indicator: `clamp(intercept + Σ weight * normalize(metric))`.
///
/// # Examples
///
/// ```
/// use clubcore::scoring::{FormulaDescriptor, IndicatorRange, MetricSource, Normalize, Term, TierScheme};
///
/// let formula = FormulaDescriptor::new("health", IndicatorRange::TEN, TierScheme::rag(4.0, 7.0))
///     .term(Term::new(
///         MetricSource::attribute("engagement"),
///         Normalize::Scale { lo: 0.0, hi: 100.0 },
///         10.0,
///     ));
/// assert!(formula.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaDescriptor {
    pub name: String,
    pub range: IndicatorRange,
    #[serde(default)]
    pub intercept: f64,
    pub terms: Vec<Term>,
    pub tiers: TierScheme,
}

impl FormulaDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, range: IndicatorRange, tiers: TierScheme) -> Self {
        Self {
            name: name.into(),
            range,
            intercept: 0.0,
            terms: Vec::new(),
            tiers,
        }
    }

    #[must_use]
    pub fn intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    #[must_use]
    pub fn term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: "indicator name cannot be empty".to_string(),
            });
        }
        self.range.validate(&self.name)?;
        self.tiers.validate()?;
        if !self.intercept.is_finite() {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: "intercept must be finite".to_string(),
            });
        }
        if self.terms.is_empty() {
            return Err(ValidationError::InvalidFormula {
                name: self.name.clone(),
                reason: "formula needs at least one term".to_string(),
            });
        }
        for term in &self.terms {
            if !term.weight.is_finite() {
                return Err(ValidationError::InvalidFormula {
                    name: self.name.clone(),
                    reason: "term weights must be finite".to_string(),
                });
            }
            term.normalize.validate(&self.name)?;
        }
        Ok(())
    }

    /// Clamped indicator value for `record`.
    #[must_use]
    pub fn evaluate(&self, record: &Record) -> f64 {
        let raw = self
            .terms
            .iter()
            .fold(self.intercept, |acc, term| acc + term.contribution(record));
        self.range.clamp(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordDraft, RecordId};

    fn record(draft: RecordDraft) -> Record {
        Record::from_attributes(RecordId::new(), draft.attributes)
    }

    fn health() -> FormulaDescriptor {
        FormulaDescriptor::new("health", IndicatorRange::TEN, TierScheme::rag(4.0, 7.0))
            .term(Term::new(
                MetricSource::attribute("engagement"),
                Normalize::Scale { lo: 0.0, hi: 100.0 },
                6.0,
            ))
            .term(Term::new(
                MetricSource::ratio("done", "total"),
                Normalize::Scale { lo: 0.0, hi: 1.0 },
                4.0,
            ))
    }

    #[test]
    fn weighted_sum_of_normalized_terms() {
        let r = record(
            RecordDraft::new()
                .with("engagement", 50.0)
                .with("done", 3)
                .with("total", 4),
        );
        let v = health().evaluate(&r);
        assert!((v - (3.0 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_denominator_contributes_nothing() {
        let r = record(
            RecordDraft::new()
                .with("engagement", 100.0)
                .with("done", 3)
                .with("total", 0),
        );
        assert!((health().evaluate(&r) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_clamped() {
        let boosted = health().intercept(50.0);
        let r = record(RecordDraft::new().with("engagement", 100.0));
        assert_eq!(boosted.evaluate(&r), 10.0);

        let sunk = health().intercept(-50.0);
        assert_eq!(sunk.evaluate(&r), 0.0);
    }

    #[test]
    fn missing_attributes_are_total() {
        let r = record(RecordDraft::new().with("engagement", "not a number"));
        assert_eq!(health().evaluate(&r), 0.0);
    }

    #[test]
    fn inverse_normalization() {
        let n = Normalize::Inverse { lo: 0.0, hi: 100.0 };
        assert!((n.apply(25.0) - 0.75).abs() < 1e-12);
        assert_eq!(n.apply(500.0), 0.0);
    }

    #[test]
    fn list_and_enum_sources() {
        let r = record(
            RecordDraft::new()
                .with("history", vec![2.0, 4.0, 9.0])
                .with("level", "degree"),
        );
        assert_eq!(
            MetricSource::ListMean { field: "history".into() }.extract(&r),
            Some(5.0)
        );
        assert_eq!(
            MetricSource::ListLast { field: "history".into() }.extract(&r),
            Some(9.0)
        );
        assert_eq!(
            MetricSource::ListLen { field: "history".into() }.extract(&r),
            Some(3.0)
        );
        let scores = BTreeMap::from([("degree".to_string(), 1.0)]);
        assert_eq!(
            MetricSource::EnumScore {
                field: "level".into(),
                scores
            }
            .extract(&r),
            Some(1.0)
        );
    }

    #[test]
    fn validate_rejects_bad_descriptors() {
        let no_terms = FormulaDescriptor::new("x", IndicatorRange::TEN, TierScheme::rag(4.0, 7.0));
        assert!(no_terms.validate().is_err());

        let bad_range = health();
        let bad_range = FormulaDescriptor {
            range: IndicatorRange::new(10.0, 0.0),
            ..bad_range
        };
        assert!(bad_range.validate().is_err());

        let bad_norm = FormulaDescriptor::new("x", IndicatorRange::TEN, TierScheme::rag(4.0, 7.0))
            .term(Term::new(
                MetricSource::attribute("a"),
                Normalize::Scale { lo: 5.0, hi: 5.0 },
                1.0,
            ));
        assert!(bad_norm.validate().is_err());
    }

    #[test]
    fn range_clamp_handles_non_finite() {
        let r = IndicatorRange::HUNDRED;
        assert_eq!(r.clamp(f64::NAN), 0.0);
        assert_eq!(r.clamp(f64::INFINITY), 100.0);
        assert_eq!(r.clamp(f64::NEG_INFINITY), 0.0);
    }
}
