//! # clubcore - analytics and mutation core for club management panels
//!
//! Every panel of a club dashboard (athlete development, contracts,
//! sponsorship, staff HR, transitions, strategic planning) keeps a mutable
//! set of records, derives bounded indicators from them, supports bounded
//! undo/redo and offers non-destructive what-if projections. This crate is
//! that shared core.
//!
//! ## Core Concepts
//!
//! - **Record**: one entity with a stable id and named attributes
//! - **Cohort**: all records of one store; the population for relative indicators
//! - **Snapshot**: an immutable, versioned capture of a cohort
//! - **ScoreCard**: derived indicators, recomputed on read and never stored
//! - **ScenarioDelta**: baseline versus projected indicators for a what-if
//!
//! ## Usage
//!
//! ```rust
//! use clubcore::scoring::PanelKind;
//! use clubcore::simulation::{Scenario, ScenarioStep, Transform};
//! use clubcore::{Command, CommandOutcome, Panel, PanelConfig, RecordDraft};
//!
//! let mut panel = Panel::new(PanelKind::Sponsorship, PanelConfig::default())?;
//! let outcome = panel.dispatch(Command::Create(
//!     RecordDraft::new()
//!         .with("sponsor", "Harbour Bank")
//!         .with("tier", "gold")
//!         .with("committed_value", 8000.0)
//!         .with("roi", 2.1)
//!         .with("engagement", 64.0)
//!         .with("months_remaining", 10.0),
//! ))?;
//! let CommandOutcome::Created(id) = outcome else { unreachable!() };
//!
//! let scenario = Scenario::new("raise committed value").step(ScenarioStep::on(
//!     id,
//!     Transform::retarget("committed_value", 10_000.0, ["roi"]),
//! ));
//! let delta = panel.project(&scenario)?;
//! let roi = delta.get(id).and_then(|p| p.projected.as_ref()).and_then(|c| c.value("sponsorship_roi"));
//! assert!((roi.unwrap() - 2.625).abs() < 1e-9);
//! # Ok::<(), clubcore::CoreError>(())
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

// Data model
pub mod cohort;
pub mod error;
pub mod record;
pub mod schema;
pub mod value;

// Store and history
pub mod history;
pub mod storage;

// Derived data
pub mod export;
pub mod query;
pub mod scoring;
pub mod simulation;

// Container
pub mod config;
pub mod panel;

pub use cohort::{cohort_fingerprint, Cohort, Snapshot};
pub use error::{CoreError, CoreResult, ExecutionError, ValidationError};
pub use record::{Attributes, Record, RecordDraft, RecordId, RecordPatch};
pub use schema::{FieldKind, FieldSpec, RecordSchema};
pub use value::Value;

pub use history::{HistoryManager, HistoryOutcome, HistoryState, DEFAULT_HISTORY_CAPACITY};
pub use storage::{InMemoryRecordStore, RecordStore};

pub use export::{ExportOptions, ExportTable};
pub use query::{filter, sort, FilterSet, Predicate, SortDirection, SortKey};
pub use scoring::{IndicatorSpec, IndicatorValue, PanelKind, ScoreCard, ScoringEngine, Tier};
pub use simulation::{Scenario, ScenarioDelta, SimulateConstraints, Simulator};

pub use config::PanelConfig;
pub use panel::{Command, CommandOutcome, Panel, PanelEvent, PanelSubscription, PanelView};
