//! Built-in panel definitions.
//!
//! Each panel keeps its own formula. Contract health, sponsorship health,
//! staff resilience and transition risk look alike but weigh different
//! sub-metrics and are kept as separate descriptors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schema::{FieldKind, FieldSpec, RecordSchema};

use super::formula::{FormulaDescriptor, IndicatorRange, MetricSource, Normalize, Term};
use super::percentile::PercentileSpec;
use super::tiers::TierScheme;
use super::volatility::VolatilitySpec;
use super::{IndicatorSpec, ScoringEngine};

/// The dashboard panels with a built-in schema and indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Contracts,
    Sponsorship,
    AthleteDevelopment,
    StaffHr,
    Transitions,
    StrategicPlanning,
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Contracts => "contracts",
            Self::Sponsorship => "sponsorship",
            Self::AthleteDevelopment => "athlete_development",
            Self::StaffHr => "staff_hr",
            Self::Transitions => "transitions",
            Self::StrategicPlanning => "strategic_planning",
        };
        f.write_str(name)
    }
}

fn scaled(field: &str, lo: f64, hi: f64, weight: f64) -> Term {
    Term::new(MetricSource::attribute(field), Normalize::Scale { lo, hi }, weight)
}

fn inverse(field: &str, lo: f64, hi: f64, weight: f64) -> Term {
    Term::new(MetricSource::attribute(field), Normalize::Inverse { lo, hi }, weight)
}

impl PanelKind {
    pub const ALL: [Self; 6] = [
        Self::Contracts,
        Self::Sponsorship,
        Self::AthleteDevelopment,
        Self::StaffHr,
        Self::Transitions,
        Self::StrategicPlanning,
    ];

    /// Record schema for this panel.
    pub fn schema(self) -> Result<RecordSchema, ValidationError> {
        let fields = match self {
            Self::Contracts => vec![
                FieldSpec::required("name", FieldKind::text()),
                FieldSpec::optional("position", FieldKind::text()),
                FieldSpec::required("performance", FieldKind::number(0.0, 10.0)),
                FieldSpec::required("months_remaining", FieldKind::number(0.0, 120.0)),
                FieldSpec::required("engagement", FieldKind::number(0.0, 10.0)),
                FieldSpec::optional("salary", FieldKind::number(0.0, 1.0e9)),
                FieldSpec::optional(
                    "status",
                    FieldKind::one_of(["active", "negotiating", "expiring", "expired"]),
                ),
                FieldSpec::optional("performance_history", FieldKind::number_list(0.0, 10.0)),
            ],
            Self::Sponsorship => vec![
                FieldSpec::required("sponsor", FieldKind::text()),
                FieldSpec::required(
                    "tier",
                    FieldKind::one_of(["bronze", "silver", "gold", "platinum"]),
                ),
                FieldSpec::required("committed_value", FieldKind::number(0.0, 1.0e7)),
                FieldSpec::optional("roi", FieldKind::number(0.0, 10.0)),
                FieldSpec::required("engagement", FieldKind::number(0.0, 100.0)),
                FieldSpec::required("months_remaining", FieldKind::number(0.0, 120.0)),
                FieldSpec::optional("activations_completed", FieldKind::number(0.0, 1000.0)),
                FieldSpec::optional("activations_total", FieldKind::number(0.0, 1000.0)),
            ],
            Self::AthleteDevelopment => vec![
                FieldSpec::required("name", FieldKind::text()),
                FieldSpec::optional("position", FieldKind::text()),
                FieldSpec::optional("age", FieldKind::number(10.0, 60.0)),
                FieldSpec::optional(
                    "stage",
                    FieldKind::one_of(["academy", "reserve", "first_team"]),
                ),
                FieldSpec::required("fitness", FieldKind::number(0.0, 100.0)),
                FieldSpec::required("skill", FieldKind::number(0.0, 100.0)),
                FieldSpec::optional("injury_risk", FieldKind::number(0.0, 100.0)),
                FieldSpec::optional("form", FieldKind::number_list(0.0, 10.0)),
            ],
            Self::StaffHr => vec![
                FieldSpec::required("name", FieldKind::text()),
                FieldSpec::optional("department", FieldKind::text()),
                FieldSpec::required("satisfaction", FieldKind::number(0.0, 10.0)),
                FieldSpec::required("weekly_hours", FieldKind::number(0.0, 100.0)),
                FieldSpec::optional("tenure_years", FieldKind::number(0.0, 50.0)),
                FieldSpec::optional(
                    "certifications",
                    FieldKind::List {
                        element: Box::new(FieldKind::text()),
                    },
                ),
                FieldSpec::optional("on_leave", FieldKind::Flag),
            ],
            Self::Transitions => vec![
                FieldSpec::required("name", FieldKind::text()),
                FieldSpec::required("readiness", FieldKind::number(0.0, 100.0)),
                FieldSpec::required("support", FieldKind::number(0.0, 100.0)),
                FieldSpec::optional("months_to_transition", FieldKind::number(0.0, 60.0)),
                FieldSpec::optional(
                    "qualification",
                    FieldKind::one_of(["none", "certificate", "diploma", "degree"]),
                ),
            ],
            Self::StrategicPlanning => vec![
                FieldSpec::required("objective", FieldKind::text()),
                FieldSpec::optional("owner", FieldKind::text()),
                FieldSpec::optional("priority", FieldKind::one_of(["low", "medium", "high"])),
                FieldSpec::required("progress", FieldKind::number(0.0, 100.0)),
                FieldSpec::optional("months_remaining", FieldKind::number(0.0, 60.0)),
                FieldSpec::optional("budget_spent", FieldKind::number(0.0, 1.0e9)),
                FieldSpec::optional("budget_total", FieldKind::number(0.0, 1.0e9)),
            ],
        };
        RecordSchema::new(fields)
    }

    /// Indicator definitions for this panel.
    #[must_use]
    pub fn indicators(self) -> Vec<IndicatorSpec> {
        match self {
            Self::Contracts => vec![
                IndicatorSpec::Weighted(
                    FormulaDescriptor::new(
                        "contract_health",
                        IndicatorRange::TEN,
                        TierScheme::rag(4.0, 7.0),
                    )
                    .term(scaled("performance", 0.0, 10.0, 4.0))
                    .term(scaled("months_remaining", 0.0, 36.0, 3.5))
                    .term(scaled("engagement", 0.0, 10.0, 2.5)),
                ),
                IndicatorSpec::Volatility(VolatilitySpec::new(
                    "contract_volatility",
                    "performance_history",
                    6,
                    IndicatorRange::TEN,
                    TierScheme::low_medium_high(1.0, 2.5),
                )),
            ],
            Self::Sponsorship => vec![
                IndicatorSpec::Weighted(
                    FormulaDescriptor::new(
                        "sponsorship_health",
                        IndicatorRange::HUNDRED,
                        TierScheme::rag(40.0, 70.0),
                    )
                    .term(scaled("engagement", 0.0, 100.0, 40.0))
                    .term(scaled("months_remaining", 0.0, 24.0, 30.0))
                    .term(Term::new(
                        MetricSource::ratio("activations_completed", "activations_total"),
                        Normalize::Scale { lo: 0.0, hi: 1.0 },
                        30.0,
                    )),
                ),
                IndicatorSpec::Weighted(
                    FormulaDescriptor::new(
                        "sponsorship_roi",
                        IndicatorRange::TEN,
                        TierScheme::rag(1.0, 2.0),
                    )
                    .term(Term::new(MetricSource::attribute("roi"), Normalize::Raw, 1.0)),
                ),
                IndicatorSpec::Percentile(PercentileSpec::new(
                    "committed_value_percentile",
                    "committed_value",
                    TierScheme::rag(25.0, 75.0),
                )),
            ],
            Self::AthleteDevelopment => vec![
                IndicatorSpec::Weighted(
                    FormulaDescriptor::new(
                        "athlete_readiness",
                        IndicatorRange::HUNDRED,
                        TierScheme::rag(50.0, 75.0),
                    )
                    .term(scaled("fitness", 0.0, 100.0, 45.0))
                    .term(scaled("skill", 0.0, 100.0, 35.0))
                    .term(inverse("injury_risk", 0.0, 100.0, 20.0)),
                ),
                IndicatorSpec::Percentile(PercentileSpec::new(
                    "skill_percentile",
                    "skill",
                    TierScheme::rag(25.0, 75.0),
                )),
                IndicatorSpec::Volatility(VolatilitySpec::new(
                    "form_volatility",
                    "form",
                    5,
                    IndicatorRange::TEN,
                    TierScheme::low_medium_high(1.0, 2.5),
                )),
            ],
            Self::StaffHr => vec![IndicatorSpec::Weighted(
                FormulaDescriptor::new(
                    "staff_resilience",
                    IndicatorRange::TEN,
                    TierScheme::rag(4.0, 7.0),
                )
                .term(scaled("satisfaction", 0.0, 10.0, 4.0))
                .term(inverse("weekly_hours", 35.0, 65.0, 3.0))
                .term(scaled("tenure_years", 0.0, 10.0, 2.0))
                .term(Term::new(
                    MetricSource::ListLen {
                        field: "certifications".to_string(),
                    },
                    Normalize::Scale { lo: 0.0, hi: 5.0 },
                    1.0,
                )),
            )],
            Self::Transitions => vec![IndicatorSpec::Weighted(
                FormulaDescriptor::new(
                    "transition_risk",
                    IndicatorRange::HUNDRED,
                    TierScheme::rag_inverted(35.0, 65.0),
                )
                .intercept(100.0)
                .term(scaled("readiness", 0.0, 100.0, -40.0))
                .term(scaled("support", 0.0, 100.0, -30.0))
                .term(Term::new(
                    MetricSource::EnumScore {
                        field: "qualification".to_string(),
                        scores: BTreeMap::from([
                            ("none".to_string(), 0.0),
                            ("certificate".to_string(), 1.0 / 3.0),
                            ("diploma".to_string(), 2.0 / 3.0),
                            ("degree".to_string(), 1.0),
                        ]),
                    },
                    Normalize::Raw,
                    -20.0,
                ))
                .term(scaled("months_to_transition", 0.0, 24.0, -10.0)),
            )],
            Self::StrategicPlanning => vec![IndicatorSpec::Weighted(
                FormulaDescriptor::new(
                    "objective_health",
                    IndicatorRange::HUNDRED,
                    TierScheme::rag(40.0, 70.0),
                )
                .term(scaled("progress", 0.0, 100.0, 60.0))
                .term(Term::new(
                    MetricSource::ratio("budget_spent", "budget_total"),
                    Normalize::Inverse { lo: 0.0, hi: 1.0 },
                    25.0,
                ))
                .term(scaled("months_remaining", 0.0, 12.0, 15.0)),
            )],
        }
    }

    /// Scoring engine holding this panel's indicators.
    pub fn engine(self) -> Result<ScoringEngine, ValidationError> {
        self.indicators()
            .into_iter()
            .try_fold(ScoringEngine::new(), ScoringEngine::with_spec)
    }
}
