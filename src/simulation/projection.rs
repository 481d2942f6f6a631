//! Baseline versus projected scoring for a scenario.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{event, Level};
use uuid::Uuid;

use crate::cohort::Snapshot;
use crate::error::CoreResult;
use crate::record::{Record, RecordId};
use crate::schema::RecordSchema;
use crate::scoring::{ScoreCard, ScoringEngine};

use super::constraints::SimulateConstraints;
use super::scenario::Scenario;

/// Stable identifier for one projection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectionId(Uuid);

impl ProjectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Effect of a scenario on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProjection {
    pub record_id: RecordId,
    /// True if a step selected this record; false for cohort ripple only.
    pub targeted: bool,
    pub baseline_record: Record,
    /// `None` when the scenario removed the record.
    pub projected_record: Option<Record>,
    pub baseline: ScoreCard,
    pub projected: Option<ScoreCard>,
    /// `projected - baseline` per indicator; `None` where either side has
    /// no data. Empty when the record was removed.
    pub diff: BTreeMap<String, Option<f64>>,
}

impl RecordProjection {
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.projected_record.is_none()
    }
}

/// Transient result of one projection. Never stored, never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDelta {
    pub id: ProjectionId,
    pub scenario: String,
    /// Version of the snapshot the projection was computed from.
    pub base_version: u64,
    /// Affected records in baseline cohort order.
    pub records: Vec<RecordProjection>,
}

impl ScenarioDelta {
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&RecordProjection> {
        self.records.iter().find(|p| p.record_id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Runs scenarios against snapshots.
///
/// The simulator only ever reads the snapshot it is given; it owns no
/// store handle, so it cannot reach live state or history.
#[derive(Debug, Clone, Copy)]
pub struct Simulator<'a> {
    engine: &'a ScoringEngine,
    schema: &'a RecordSchema,
    constraints: SimulateConstraints,
}

impl<'a> Simulator<'a> {
    /// Create a simulator. Constraints are validated here.
    pub fn new(
        engine: &'a ScoringEngine,
        schema: &'a RecordSchema,
        constraints: SimulateConstraints,
    ) -> CoreResult<Self> {
        constraints.validate()?;
        Ok(Self {
            engine,
            schema,
            constraints,
        })
    }

    #[must_use]
    pub const fn constraints(&self) -> SimulateConstraints {
        self.constraints
    }

    /// Applies `scenario` to a copy of `snapshot` and re-scores.
    ///
    /// The result lists every targeted record, plus every other record whose
    /// indicators moved because the cohort changed around it.
    pub fn project(&self, snapshot: &Snapshot, scenario: &Scenario) -> CoreResult<ScenarioDelta> {
        scenario.validate()?;
        self.constraints.check_steps(scenario.steps.len())?;

        let baseline_cohort = snapshot.cohort();
        let (projected_cohort, touched) = scenario.apply(baseline_cohort, self.schema)?;
        self.constraints.check_affected(touched.len())?;

        let baseline_cards = self.engine.score_cohort(baseline_cohort);
        let projected_cards = self.engine.score_cohort(&projected_cohort);

        let mut records = Vec::new();
        for record in baseline_cohort {
            let Some(baseline) = baseline_cards.get(&record.id) else {
                continue;
            };
            let projected = projected_cards.get(&record.id);
            let targeted = touched.contains(&record.id);
            let rippled = projected.is_some_and(|p| baseline.differs_from(p));
            if !targeted && !rippled && projected.is_some() {
                continue;
            }
            records.push(RecordProjection {
                record_id: record.id,
                targeted,
                baseline_record: record.clone(),
                projected_record: projected_cohort.get(record.id).cloned(),
                baseline: baseline.clone(),
                projected: projected.cloned(),
                diff: projected.map(|p| baseline.diff(p)).unwrap_or_default(),
            });
        }

        let delta = ScenarioDelta {
            id: ProjectionId::new(),
            scenario: scenario.name.clone(),
            base_version: snapshot.version(),
            records,
        };
        event!(
            Level::DEBUG,
            projection = %delta.id,
            scenario = %delta.scenario,
            base_version = delta.base_version,
            targeted = touched.len(),
            reported = delta.records.len(),
            "scenario projected"
        );
        Ok(delta)
    }
}
