//! Named scenarios and their transforms.
//!
//! A step selects records and rewrites them. Every step is a pure
//! `Cohort -> Cohort` function: it reads one cohort and returns a new one.
//! Overridden values pass through the schema's edit rules, so a scenario
//! can never produce a value a real update could not.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cohort::Cohort;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::query::FilterSet;
use crate::record::{Record, RecordId, RecordPatch};
use crate::schema::RecordSchema;
use crate::value::Value;

/// Which records a step applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// One record; missing ids fail with `RecordNotFound`.
    Record(RecordId),
    /// Several records; missing ids fail with `RecordNotFound`.
    Records(Vec<RecordId>),
    /// Every record matching the filter at the time the step runs.
    Matching(FilterSet),
    /// Every record.
    All,
}

/// What a step does to each selected record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Override one attribute. `Null` removes an optional attribute.
    Set { field: String, value: Value },
    /// Add `amount` to a numeric attribute.
    IncreaseBy { field: String, amount: f64 },
    /// Multiply a numeric attribute by `factor`.
    ScaleBy { field: String, factor: f64 },
    /// Move a numeric attribute to `target` and scale each `proportional`
    /// attribute by `target / old`.
    Retarget {
        field: String,
        target: f64,
        #[serde(default)]
        proportional: Vec<String>,
    },
    /// Move an enum attribute to the label `tier`.
    Promote { field: String, tier: String },
    /// Drop the record from the cohort.
    Remove,
}

impl Transform {
    #[must_use]
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn increase_by(field: impl Into<String>, amount: f64) -> Self {
        Self::IncreaseBy {
            field: field.into(),
            amount,
        }
    }

    #[must_use]
    pub fn retarget<I, S>(field: impl Into<String>, target: f64, proportional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Retarget {
            field: field.into(),
            target,
            proportional: proportional.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn promote(field: impl Into<String>, tier: impl Into<String>) -> Self {
        Self::Promote {
            field: field.into(),
            tier: tier.into(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let bad = |reason: String| -> Result<(), ValidationError> {
            Err(ValidationError::InvalidScenario { reason })
        };
        match self {
            Self::IncreaseBy { field, amount } if !amount.is_finite() => {
                bad(format!("increase of '{field}' must be finite"))
            }
            Self::ScaleBy { field, factor } if !factor.is_finite() => {
                bad(format!("scale factor for '{field}' must be finite"))
            }
            Self::Retarget { field, target, .. } if !target.is_finite() => {
                bad(format!("retarget value for '{field}' must be finite"))
            }
            _ => Ok(()),
        }
    }

    /// Attribute overrides for `record`. Returns an empty patch when the
    /// record lacks a numeric value the transform needs.
    fn patch_for(
        &self,
        record: &Record,
        schema: &RecordSchema,
    ) -> Result<RecordPatch, ValidationError> {
        let number = |field: &str| record.number(field).filter(|v| v.is_finite());
        let patch = match self {
            Self::Set { field, value } => RecordPatch::new().set(field.clone(), value.clone()),
            Self::IncreaseBy { field, amount } => number(field.as_str()).map_or_else(RecordPatch::new, |v| {
                RecordPatch::new().set(field.clone(), v + amount)
            }),
            Self::ScaleBy { field, factor } => number(field.as_str()).map_or_else(RecordPatch::new, |v| {
                RecordPatch::new().set(field.clone(), v * factor)
            }),
            Self::Retarget {
                field,
                target,
                proportional,
            } => {
                // Scale by the value the field actually lands on after clamping.
                let landed = schema.coerce(field, &Value::Float(*target))?;
                let reached = landed.as_float().unwrap_or(*target);
                let mut patch = RecordPatch::new().set(field.clone(), landed);
                if let Some(old) = number(field.as_str()).filter(|old| *old != 0.0) {
                    let ratio = reached / old;
                    for dependent in proportional {
                        if let Some(v) = number(dependent.as_str()) {
                            patch = patch.set(dependent.clone(), v * ratio);
                        }
                    }
                }
                patch
            }
            Self::Promote { field, tier } => RecordPatch::new().set(field.clone(), tier.as_str()),
            Self::Remove => RecordPatch::new(),
        };
        Ok(patch)
    }
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub target: Target,
    pub transform: Transform,
}

impl ScenarioStep {
    #[must_use]
    pub const fn new(target: Target, transform: Transform) -> Self {
        Self { target, transform }
    }

    /// Step over a single record.
    #[must_use]
    pub const fn on(id: RecordId, transform: Transform) -> Self {
        Self::new(Target::Record(id), transform)
    }

    fn select(&self, cohort: &Cohort) -> CoreResult<Vec<RecordId>> {
        let require = |id: RecordId| {
            if cohort.contains(id) {
                Ok(id)
            } else {
                Err(CoreError::not_found(id))
            }
        };
        match &self.target {
            Target::Record(id) => Ok(vec![require(*id)?]),
            Target::Records(ids) => ids.iter().copied().map(require).collect(),
            Target::Matching(filters) => {
                let compiled = filters.compile()?;
                Ok(cohort
                    .iter()
                    .filter(|r| compiled.matches(r))
                    .map(|r| r.id)
                    .collect())
            }
            Target::All => Ok(cohort.ids()),
        }
    }

    /// Applies the step, returning the new cohort. Ids of the touched
    /// records are added to `touched`.
    pub fn apply(
        &self,
        cohort: &Cohort,
        schema: &RecordSchema,
        touched: &mut BTreeSet<RecordId>,
    ) -> CoreResult<Cohort> {
        let selected: BTreeSet<RecordId> = self.select(cohort)?.into_iter().collect();
        touched.extend(selected.iter().copied());

        if matches!(self.transform, Transform::Remove) {
            return Ok(cohort
                .iter()
                .filter(|r| !selected.contains(&r.id))
                .cloned()
                .collect());
        }

        cohort
            .iter()
            .map(|record| -> CoreResult<Record> {
                if !selected.contains(&record.id) {
                    return Ok(record.clone());
                }
                let patch = self.transform.patch_for(record, schema)?;
                let mut next = record.clone();
                next.attributes = schema.merge_patch(&record.attributes, &patch)?;
                Ok(next)
            })
            .collect()
    }
}

/// A named, ordered list of steps.
///
/// # Examples
///
/// ```
/// use clubcore::simulation::{Scenario, ScenarioStep, Target, Transform};
///
/// let scenario = Scenario::new("raise committed value")
///     .step(ScenarioStep::new(
///         Target::All,
///         Transform::retarget("committed_value", 10_000.0, ["roi"]),
///     ));
/// assert!(scenario.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidScenario {
                reason: "scenario name cannot be empty".to_string(),
            });
        }
        if self.steps.is_empty() {
            return Err(ValidationError::InvalidScenario {
                reason: format!("scenario '{}' has no steps", self.name),
            });
        }
        self.steps.iter().try_for_each(|s| s.transform.validate())
    }

    /// Runs every step in order over `cohort`.
    pub fn apply(
        &self,
        cohort: &Cohort,
        schema: &RecordSchema,
    ) -> CoreResult<(Cohort, BTreeSet<RecordId>)> {
        let mut touched = BTreeSet::new();
        let mut current = cohort.clone();
        for step in &self.steps {
            current = step.apply(&current, schema, &mut touched)?;
        }
        Ok((current, touched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;
    use crate::record::RecordDraft;
    use crate::schema::{FieldKind, FieldSpec};

    fn schema() -> RecordSchema {
        RecordSchema::new(vec![
            FieldSpec::required("sponsor", FieldKind::text()),
            FieldSpec::required("committed_value", FieldKind::number(0.0, 1.0e7)),
            FieldSpec::optional("roi", FieldKind::number(0.0, 10.0)),
            FieldSpec::optional("tier", FieldKind::one_of(["bronze", "silver", "gold"])),
        ])
        .unwrap()
    }

    fn cohort() -> Cohort {
        [("Acme", 8000.0, 2.1), ("Bolt", 2000.0, 0.5)]
            .into_iter()
            .map(|(s, c, r)| {
                Record::new(
                    RecordDraft::new()
                        .with("sponsor", s)
                        .with("committed_value", c)
                        .with("roi", r)
                        .with("tier", "bronze")
                        .attributes,
                )
            })
            .collect()
    }

    #[test]
    fn retarget_scales_proportional_fields() {
        let c = cohort();
        let acme = c.records()[0].id;
        let step = ScenarioStep::on(acme, Transform::retarget("committed_value", 10_000.0, ["roi"]));
        let mut touched = BTreeSet::new();
        let next = step.apply(&c, &schema(), &mut touched).unwrap();

        let projected = next.get(acme).unwrap();
        assert_eq!(projected.number("committed_value"), Some(10_000.0));
        assert!((projected.number("roi").unwrap() - 2.625).abs() < 1e-9);
        // Input cohort untouched.
        assert_eq!(c.get(acme).unwrap().number("committed_value"), Some(8000.0));
        assert_eq!(touched.len(), 1);
    }

    #[test]
    fn retarget_past_domain_scales_by_clamped_value() {
        let c: Cohort = std::iter::once(Record::new(
            RecordDraft::new()
                .with("sponsor", "Acme")
                .with("committed_value", 5.0e6)
                .with("roi", 2.0)
                .attributes,
        ))
        .collect();
        let acme = c.records()[0].id;
        let step = ScenarioStep::on(acme, Transform::retarget("committed_value", 2.0e7, ["roi"]));
        let next = step.apply(&c, &schema(), &mut BTreeSet::new()).unwrap();

        let projected = next.get(acme).unwrap();
        assert_eq!(projected.number("committed_value"), Some(1.0e7));
        assert!((projected.number("roi").unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn overrides_follow_edit_rules() {
        let c = cohort();
        let scenario = Scenario::new("boost")
            .step(ScenarioStep::new(Target::All, Transform::increase_by("roi", 50.0)));
        let (next, touched) = scenario.apply(&c, &schema()).unwrap();
        assert!(next.iter().all(|r| r.number("roi") == Some(10.0)));
        assert_eq!(touched.len(), 2);
    }

    #[test]
    fn promote_and_remove_compose() {
        let c = cohort();
        let bolt = c.records()[1].id;
        let scenario = Scenario::new("reshuffle")
            .step(ScenarioStep::new(
                Target::Matching(
                    FilterSet::new().and("committed_value", Predicate::range(5000.0, 1.0e7)),
                ),
                Transform::promote("tier", "gold"),
            ))
            .step(ScenarioStep::on(bolt, Transform::Remove));
        let (next, _) = scenario.apply(&c, &schema()).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next.records()[0].text("tier"), Some("gold"));
    }

    #[test]
    fn promote_to_unknown_label_is_rejected() {
        let c = cohort();
        let step = ScenarioStep::new(Target::All, Transform::promote("tier", "diamond"));
        assert!(step.apply(&c, &schema(), &mut BTreeSet::new()).is_err());
    }

    #[test]
    fn missing_target_is_not_found() {
        let step = ScenarioStep::on(RecordId::new(), Transform::Remove);
        let err = step.apply(&cohort(), &schema(), &mut BTreeSet::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_or_non_finite_scenarios_rejected() {
        assert!(Scenario::new("x").validate().is_err());
        let s = Scenario::new("x").step(ScenarioStep::new(
            Target::All,
            Transform::ScaleBy {
                field: "roi".into(),
                factor: f64::NAN,
            },
        ));
        assert!(s.validate().is_err());
    }
}
