//! Indicator scoring.
//!
//! Every indicator is a pure function of a record and, for cohort-relative
//! indicators, the cohort it belongs to. The engine holds no record state;
//! it only holds the descriptors it was configured with.
//!
//! # Examples
//!
//! ```
//! use clubcore::scoring::{
//!     FormulaDescriptor, IndicatorRange, IndicatorSpec, MetricSource, Normalize, ScoringEngine,
//!     Term, TierScheme,
//! };
//! use clubcore::{Cohort, Record, RecordDraft};
//!
//! let engine = ScoringEngine::new()
//!     .with_spec(IndicatorSpec::Weighted(
//!         FormulaDescriptor::new("health", IndicatorRange::TEN, TierScheme::rag(4.0, 7.0)).term(
//!             Term::new(
//!                 MetricSource::attribute("engagement"),
//!                 Normalize::Scale { lo: 0.0, hi: 100.0 },
//!                 10.0,
//!             ),
//!         ),
//!     ))
//!     .unwrap();
//!
//! let record = Record::new(RecordDraft::new().with("engagement", 80.0).attributes);
//! let cohort: Cohort = std::iter::once(record.clone()).collect();
//! let card = engine.score_of(&record, &cohort);
//! let health = card.value("health").unwrap();
//! assert!((health - 8.0).abs() < 1e-9);
//! ```

mod catalog;
mod formula;
mod percentile;
mod tiers;
mod volatility;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cohort::Cohort;
use crate::error::ValidationError;
use crate::record::{Record, RecordId};

use percentile::sorted_finite;

pub use catalog::PanelKind;
pub use formula::{FormulaDescriptor, IndicatorRange, MetricSource, Normalize, Term};
pub use percentile::{percentile, PercentileSpec};
pub use tiers::{Tier, TierLabels, TierScheme};
pub use volatility::{trend, volatility, Trend, VolatilitySpec, TREND_EPSILON};

/// Differences smaller than this are treated as "unchanged".
pub const SCORE_EPSILON: f64 = 1e-9;

/// Result of one indicator: a clamped score or the no-data sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndicatorValue {
    Score(f64),
    NoData,
}

impl IndicatorValue {
    #[must_use]
    pub const fn as_score(&self) -> Option<f64> {
        match self {
            Self::Score(v) => Some(*v),
            Self::NoData => None,
        }
    }

    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

impl From<Option<f64>> for IndicatorValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::NoData, Self::Score)
    }
}

/// One evaluated indicator with its tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub value: IndicatorValue,
    /// `None` exactly when `value` is `NoData`.
    pub tier: Option<Tier>,
    pub range: IndicatorRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

/// All indicator readings for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub record_id: RecordId,
    pub readings: BTreeMap<String, IndicatorReading>,
}

impl ScoreCard {
    #[must_use]
    pub fn reading(&self, name: &str) -> Option<&IndicatorReading> {
        self.readings.get(name)
    }

    /// Score of `name`, or `None` when the indicator is unknown or has no data.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        self.reading(name).and_then(|r| r.value.as_score())
    }

    #[must_use]
    pub fn tier(&self, name: &str) -> Option<Tier> {
        self.reading(name).and_then(|r| r.tier)
    }

    /// `projected - self` per indicator; `None` where either side has no data.
    #[must_use]
    pub fn diff(&self, projected: &Self) -> BTreeMap<String, Option<f64>> {
        self.readings
            .iter()
            .map(|(name, base)| {
                let delta = match (base.value.as_score(), projected.value(name)) {
                    (Some(b), Some(p)) => Some(p - b),
                    _ => None,
                };
                (name.clone(), delta)
            })
            .collect()
    }

    /// Returns true if any indicator differs from `other`, including a
    /// switch between a score and no data.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        if self.readings.len() != other.readings.len() {
            return true;
        }
        self.readings.iter().any(|(name, base)| {
            match (base.value, other.reading(name).map(|r| r.value)) {
                (IndicatorValue::Score(a), Some(IndicatorValue::Score(b))) => {
                    (a - b).abs() > SCORE_EPSILON
                }
                (IndicatorValue::NoData, Some(IndicatorValue::NoData)) => false,
                _ => true,
            }
        })
    }
}

/// Declarative indicator definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Weighted(FormulaDescriptor),
    Percentile(PercentileSpec),
    Volatility(VolatilitySpec),
}

impl IndicatorSpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Weighted(f) => &f.name,
            Self::Percentile(p) => &p.name,
            Self::Volatility(v) => &v.name,
        }
    }

    #[must_use]
    pub const fn range(&self) -> IndicatorRange {
        match self {
            Self::Weighted(f) => f.range,
            Self::Percentile(_) => IndicatorRange::HUNDRED,
            Self::Volatility(v) => v.range,
        }
    }

    #[must_use]
    pub const fn tiers(&self) -> &TierScheme {
        match self {
            Self::Weighted(f) => &f.tiers,
            Self::Percentile(p) => &p.tiers,
            Self::Volatility(v) => &v.tiers,
        }
    }

    /// Returns true if the indicator depends on other cohort members.
    #[must_use]
    pub const fn is_cohort_relative(&self) -> bool {
        matches!(self, Self::Percentile(_))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Weighted(f) => f.validate(),
            Self::Percentile(p) => p.validate(),
            Self::Volatility(v) => v.validate(),
        }
    }

    /// Evaluates the indicator. Total: never fails, always in range.
    #[must_use]
    pub fn evaluate(&self, record: &Record, cohort: &Cohort) -> IndicatorReading {
        self.evaluate_with(record, cohort, None)
    }

    /// `sorted` is the cohort column of a percentile indicator, already
    /// passed through `sorted_finite`.
    fn evaluate_with(
        &self,
        record: &Record,
        cohort: &Cohort,
        sorted: Option<&[f64]>,
    ) -> IndicatorReading {
        let (value, trend) = match self {
            Self::Weighted(f) => (IndicatorValue::Score(f.evaluate(record)), None),
            Self::Percentile(p) => match sorted {
                Some(sorted) => (p.evaluate_sorted(record, sorted).into(), None),
                None => (p.evaluate(record, cohort).into(), None),
            },
            Self::Volatility(v) => (v.evaluate(record).into(), v.trend_of(record)),
        };
        IndicatorReading {
            value,
            tier: value.as_score().map(|s| self.tiers().classify(s)),
            range: self.range(),
            trend,
        }
    }
}

/// Registry of indicator specs for one panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringEngine {
    specs: BTreeMap<String, IndicatorSpec>,
}

impl ScoringEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an indicator after validating it.
    pub fn register(&mut self, spec: IndicatorSpec) -> Result<(), ValidationError> {
        spec.validate()?;
        let name = spec.name().to_string();
        if self.specs.insert(name.clone(), spec).is_some() {
            debug!(indicator = %name, "indicator spec replaced");
        }
        Ok(())
    }

    /// Builder form of [`ScoringEngine::register`].
    pub fn with_spec(mut self, spec: IndicatorSpec) -> Result<Self, ValidationError> {
        self.register(spec)?;
        Ok(self)
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&IndicatorSpec> {
        self.specs.get(name)
    }

    /// Indicator names in sorted order; this is also the export column order.
    #[must_use]
    pub fn indicator_names(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Returns true if any registered indicator depends on the cohort.
    #[must_use]
    pub fn has_cohort_relative(&self) -> bool {
        self.specs.values().any(IndicatorSpec::is_cohort_relative)
    }

    /// Scores one record against its cohort.
    #[must_use]
    pub fn score_of(&self, record: &Record, cohort: &Cohort) -> ScoreCard {
        ScoreCard {
            record_id: record.id,
            readings: self
                .specs
                .iter()
                .map(|(name, spec)| (name.clone(), spec.evaluate(record, cohort)))
                .collect(),
        }
    }

    /// Scores every record of the cohort, keyed by id. Each percentile
    /// column is sorted once for the whole pass.
    #[must_use]
    pub fn score_cohort(&self, cohort: &Cohort) -> BTreeMap<RecordId, ScoreCard> {
        let columns: BTreeMap<&str, Vec<f64>> = self
            .specs
            .iter()
            .filter_map(|(name, spec)| match spec {
                IndicatorSpec::Percentile(p) => {
                    Some((name.as_str(), sorted_finite(&cohort.numbers_of(&p.field))))
                }
                _ => None,
            })
            .collect();

        cohort
            .iter()
            .map(|record| {
                let readings = self
                    .specs
                    .iter()
                    .map(|(name, spec)| {
                        let sorted = columns.get(name.as_str()).map(Vec::as_slice);
                        (name.clone(), spec.evaluate_with(record, cohort, sorted))
                    })
                    .collect();
                let card = ScoreCard {
                    record_id: record.id,
                    readings,
                };
                (record.id, card)
            })
            .collect()
    }
}
