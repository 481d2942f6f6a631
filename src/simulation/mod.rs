//! What-if projections.
//!
//! Scenarios run against a [`Snapshot`](crate::cohort::Snapshot), never
//! against a store. The live store and the history stacks are out of reach
//! of this module, which is what makes projection safe to call repeatedly
//! or speculatively.

pub mod constraints;
pub mod projection;
pub mod scenario;

pub use constraints::SimulateConstraints;
pub use projection::{ProjectionId, RecordProjection, ScenarioDelta, Simulator};
pub use scenario::{Scenario, ScenarioStep, Target, Transform};
