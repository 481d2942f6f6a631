//! Explicit state container for one panel.
//!
//! The view layer reads with [`Panel::get`], listens with
//! [`Panel::subscribe`] and changes state only through
//! [`Panel::dispatch`]. Commands are plain data, so a view can build them
//! from form input without the core ever blocking for it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, event, warn, Level};
use uuid::Uuid;

use crate::cohort::{Cohort, Snapshot};
use crate::config::PanelConfig;
use crate::error::{CoreError, CoreResult, ExecutionError};
use crate::export::ExportTable;
use crate::history::{HistoryManager, HistoryOutcome, HistoryState};
use crate::query::{self, FilterSet, SortKey};
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use crate::scoring::{PanelKind, ScoreCard, ScoringEngine};
use crate::simulation::{Scenario, ScenarioDelta, Simulator};
use crate::storage::{InMemoryRecordStore, RecordStore};

/// A command from the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Command {
    Create(RecordDraft),
    Update { id: RecordId, patch: RecordPatch },
    Delete(RecordId),
    Undo,
    Redo,
    /// Filter, then sort. Read-only.
    Query {
        #[serde(default)]
        filters: FilterSet,
        #[serde(default)]
        sort: Vec<SortKey>,
    },
    /// Score one record against the current cohort.
    Score(RecordId),
    /// Run a what-if scenario. Never changes state or history.
    Project(Scenario),
    /// Flatten the current cohort with the configured export options.
    Export,
}

impl Command {
    /// Returns true if the command can change the store.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Update { .. } | Self::Delete(_) | Self::Undo | Self::Redo
        )
    }
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Created(RecordId),
    Updated(Record),
    /// `false` when the record was already absent.
    Deleted(bool),
    Undone(HistoryOutcome),
    Redone(HistoryOutcome),
    Records(Vec<Record>),
    Scored(ScoreCard),
    Projected(ScenarioDelta),
    Exported(ExportTable),
}

/// What changed in a [`PanelEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PanelChange {
    Created(RecordId),
    Updated(RecordId),
    Deleted(RecordId),
    Undone,
    Redone,
}

/// Notification sent to subscribers after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelEvent {
    /// Store version after the change.
    pub version: u64,
    pub change: PanelChange,
    pub history: HistoryState,
}

/// Read-only view of the panel state.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub snapshot: Snapshot,
    pub history: HistoryState,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

impl PanelView {
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.snapshot.version()
    }

    #[must_use]
    pub fn cohort(&self) -> &Cohort {
        self.snapshot.cohort()
    }
}

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of a panel subscription.
///
/// Events that do not fit in the bounded queue are dropped and counted,
/// never blocked on. Dropping the subscription unregisters it on the next
/// event.
#[derive(Debug)]
pub struct PanelSubscription {
    id: SubscriptionId,
    rx: Receiver<PanelEvent>,
    dropped: Arc<AtomicU64>,
}

impl PanelSubscription {
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next queued event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<PanelEvent> {
        self.rx.try_recv().ok()
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> CoreResult<PanelEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => CoreError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => CoreError::Execution(ExecutionError::Disconnected {
                path: "panel_subscription".to_string(),
            }),
        })
    }

    /// Every queued event, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<PanelEvent> {
        self.rx.try_iter().collect()
    }

    /// Events dropped because this subscriber's queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    tx: Sender<PanelEvent>,
    dropped: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Default)]
struct ScoreCache {
    /// Store version the cards were scored at; `None` before the first read.
    version: Option<u64>,
    cards: BTreeMap<RecordId, ScoreCard>,
}

/// State container: a history-wrapped store, its scoring engine and its
/// subscribers.
#[derive(Debug)]
pub struct Panel<S = InMemoryRecordStore> {
    history: HistoryManager<S>,
    engine: ScoringEngine,
    config: PanelConfig,
    subscribers: Vec<Subscriber>,
    dropped_events: u64,
    score_cache: ScoreCache,
}

impl Panel<InMemoryRecordStore> {
    /// Empty panel of a built-in kind.
    pub fn new(kind: PanelKind, config: PanelConfig) -> CoreResult<Self> {
        Self::with_seed(kind, config, Vec::new())
    }

    /// Built-in panel preloaded with `seed`. Each draft is validated like
    /// a create; the seed is not undoable.
    pub fn with_seed(
        kind: PanelKind,
        config: PanelConfig,
        seed: Vec<RecordDraft>,
    ) -> CoreResult<Self> {
        let store = InMemoryRecordStore::with_seed(kind.schema()?, seed)?;
        Self::from_parts(store, kind.engine()?, config)
    }
}

impl<S: RecordStore> Panel<S> {
    /// Panel over any store and engine.
    pub fn from_parts(store: S, engine: ScoringEngine, config: PanelConfig) -> CoreResult<Self> {
        config.validate()?;
        let history = HistoryManager::with_capacity(store, config.history_capacity)?;
        Ok(Self {
            history,
            engine,
            config,
            subscribers: Vec::new(),
            dropped_events: 0,
            score_cache: ScoreCache::default(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    #[must_use]
    pub const fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    #[must_use]
    pub const fn history(&self) -> &HistoryManager<S> {
        &self.history
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> PanelView {
        PanelView {
            snapshot: self.history.store().snapshot(),
            history: self.history.state(),
            undo_depth: self.history.undo_depth(),
            redo_depth: self.history.redo_depth(),
        }
    }

    /// Registers a listener for state changes.
    pub fn subscribe(&mut self) -> PanelSubscription {
        let (tx, rx) = bounded(self.config.subscriber_capacity);
        let id = SubscriptionId::new();
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.push(Subscriber {
            id,
            tx,
            dropped: Arc::clone(&dropped),
        });
        debug!(subscription = %id, "panel subscriber registered");
        PanelSubscription { id, rx, dropped }
    }

    /// Live subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Events dropped across all subscribers because a queue was full.
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Applies one command.
    pub fn dispatch(&mut self, command: Command) -> CoreResult<CommandOutcome> {
        match command {
            Command::Create(draft) => {
                let id = self.history.create(draft)?;
                self.publish(PanelChange::Created(id));
                Ok(CommandOutcome::Created(id))
            }
            Command::Update { id, patch } => {
                let before = self.history.store().version();
                let record = self.history.update(id, &patch)?;
                self.rescore_one(&record, before);
                self.publish(PanelChange::Updated(id));
                Ok(CommandOutcome::Updated(record))
            }
            Command::Delete(id) => {
                let removed = self.history.delete(id)?;
                if removed {
                    self.publish(PanelChange::Deleted(id));
                }
                Ok(CommandOutcome::Deleted(removed))
            }
            Command::Undo => {
                let outcome = self.history.undo();
                if !outcome.is_noop() {
                    self.publish(PanelChange::Undone);
                }
                Ok(CommandOutcome::Undone(outcome))
            }
            Command::Redo => {
                let outcome = self.history.redo();
                if !outcome.is_noop() {
                    self.publish(PanelChange::Redone);
                }
                Ok(CommandOutcome::Redone(outcome))
            }
            Command::Query { filters, sort } => {
                let filtered = query::filter(&self.history.store().all(), &filters)?;
                Ok(CommandOutcome::Records(query::sort(&filtered, &sort)))
            }
            Command::Score(id) => self.score(id).map(CommandOutcome::Scored),
            Command::Project(scenario) => self.project(&scenario).map(CommandOutcome::Projected),
            Command::Export => self.export().map(CommandOutcome::Exported),
        }
    }

    /// Score card for one record, served from the per-version cache.
    pub fn score(&mut self, id: RecordId) -> CoreResult<ScoreCard> {
        self.scores()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(id))
    }

    /// Score cards for every record at the current store version.
    pub fn scores(&mut self) -> &BTreeMap<RecordId, ScoreCard> {
        self.refresh_scores();
        &self.score_cache.cards
    }

    fn refresh_scores(&mut self) {
        let version = self.history.store().version();
        if self.score_cache.version == Some(version) {
            return;
        }
        let cards = self.engine.score_cohort(&self.history.store().all());
        debug!(version, records = cards.len(), "score cache rebuilt");
        self.score_cache = ScoreCache {
            version: Some(version),
            cards,
        };
    }

    /// Without cohort-relative indicators an edit only moves the edited
    /// record's card, so a cache that was current before the edit is
    /// patched instead of dropped.
    fn rescore_one(&mut self, record: &Record, before: u64) {
        if self.engine.has_cohort_relative() || self.score_cache.version != Some(before) {
            return;
        }
        let store = self.history.store();
        let card = self.engine.score_of(record, &store.all());
        self.score_cache.cards.insert(record.id, card);
        self.score_cache.version = Some(store.version());
        debug!(record = %record.id, version = store.version(), "score cache patched");
    }

    /// What-if projection over the current state.
    pub fn project(&self, scenario: &Scenario) -> CoreResult<ScenarioDelta> {
        let store = self.history.store();
        Simulator::new(&self.engine, store.schema(), self.config.simulate)?
            .project(&store.snapshot(), scenario)
    }

    /// Flat export of the current cohort, with indicator cells taken
    /// from the score cache.
    pub fn export(&mut self) -> CoreResult<ExportTable> {
        if self.config.export.include_indicators {
            self.refresh_scores();
        }
        let store = self.history.store();
        Ok(ExportTable::from_scored(
            &store.all(),
            store.schema(),
            &self.engine.indicator_names(),
            &self.score_cache.cards,
            &self.config.export,
        )?)
    }

    fn publish(&mut self, change: PanelChange) {
        let event = PanelEvent {
            version: self.history.store().version(),
            change,
            history: self.history.state(),
        };
        let mut dropped = 0;
        self.subscribers.retain(|sub| match sub.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                sub.dropped.fetch_add(1, Ordering::Relaxed);
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(subscription = %sub.id, "panel subscriber disconnected");
                false
            }
        });
        if dropped > 0 {
            self.dropped_events += dropped;
            warn!(dropped, version = event.version, "panel event dropped for slow subscribers");
        }
        event!(Level::DEBUG, version = event.version, change = ?event.change, "panel state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;
    use crate::simulation::{ScenarioStep, Transform};

    fn athlete(name: &str, skill: f64) -> RecordDraft {
        RecordDraft::new()
            .with("name", name)
            .with("fitness", 70.0)
            .with("skill", skill)
    }

    fn panel() -> Panel {
        Panel::with_seed(
            PanelKind::AthleteDevelopment,
            PanelConfig::default(),
            vec![athlete("Ada", 80.0), athlete("Ben", 40.0)],
        )
        .unwrap()
    }

    #[test]
    fn seed_is_not_undoable() {
        let mut p = panel();
        assert_eq!(p.get().cohort().len(), 2);
        assert_eq!(p.get().history, HistoryState::Clean);
        let outcome = p.dispatch(Command::Undo).unwrap();
        assert_eq!(outcome, CommandOutcome::Undone(HistoryOutcome::NoOp));
    }

    #[test]
    fn mutations_notify_subscribers() {
        let mut p = panel();
        let sub = p.subscribe();
        let CommandOutcome::Created(id) = p.dispatch(Command::Create(athlete("Cara", 60.0))).unwrap()
        else {
            panic!("expected Created");
        };
        p.dispatch(Command::Undo).unwrap();
        p.dispatch(Command::Undo).unwrap(); // no-op, no event

        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].change, PanelChange::Created(id));
        assert_eq!(events[1].change, PanelChange::Undone);
        assert_eq!(events[1].history, HistoryState::Redoable);
    }

    #[test]
    fn reads_do_not_notify() {
        let mut p = panel();
        let sub = p.subscribe();
        p.dispatch(Command::Query {
            filters: FilterSet::new(),
            sort: vec![],
        })
        .unwrap();
        p.dispatch(Command::Export).unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn slow_subscriber_drops_instead_of_blocking() {
        let config = PanelConfig {
            subscriber_capacity: 1,
            ..PanelConfig::default()
        };
        let mut p = Panel::new(PanelKind::AthleteDevelopment, config).unwrap();
        let sub = p.subscribe();
        for i in 0..3 {
            p.dispatch(Command::Create(athlete(&format!("a{i}"), 50.0))).unwrap();
        }
        assert_eq!(sub.drain().len(), 1);
        assert_eq!(sub.dropped(), 2);
        assert_eq!(p.dropped_events(), 2);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let mut p = panel();
        let sub = p.subscribe();
        drop(sub);
        p.dispatch(Command::Create(athlete("Cara", 60.0))).unwrap();
        assert_eq!(p.subscriber_count(), 0);
    }

    #[test]
    fn score_cache_follows_version() {
        let mut p = panel();
        let ben = p.get().cohort().records()[1].id;
        let before = p.score(ben).unwrap();
        assert_eq!(before.value("skill_percentile"), Some(100.0));

        p.dispatch(Command::Update {
            id: ben,
            patch: RecordPatch::new().set("skill", 95.0),
        })
        .unwrap();
        let CommandOutcome::Scored(after) = p.dispatch(Command::Score(ben)).unwrap() else {
            panic!("expected Scored");
        };
        assert_eq!(after.value("skill_percentile"), Some(0.0));
        assert!(p.score(RecordId::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn edit_patches_cache_when_no_indicator_ranks_the_cohort() {
        let staff = |name: &str, satisfaction: f64| {
            RecordDraft::new()
                .with("name", name)
                .with("satisfaction", satisfaction)
                .with("weekly_hours", 45.0)
        };
        let mut p = Panel::with_seed(
            PanelKind::StaffHr,
            PanelConfig::default(),
            vec![staff("Rui", 7.5), staff("Sam", 4.0)],
        )
        .unwrap();
        assert!(!p.engine().has_cohort_relative());
        let rui = p.get().cohort().records()[0].id;
        let before = p.scores().clone();

        p.dispatch(Command::Update {
            id: rui,
            patch: RecordPatch::new().set("satisfaction", 2.0),
        })
        .unwrap();
        assert_eq!(p.score_cache.version, Some(p.history.store().version()));

        let rescored = p.engine().score_cohort(p.get().cohort());
        assert_ne!(before[&rui], rescored[&rui]);
        assert_eq!(p.scores(), &rescored);
    }

    #[test]
    fn edit_drops_cache_when_scores_are_cohort_relative() {
        let mut p = panel();
        assert!(p.engine().has_cohort_relative());
        let ben = p.get().cohort().records()[1].id;
        p.scores();

        p.dispatch(Command::Update {
            id: ben,
            patch: RecordPatch::new().set("skill", 95.0),
        })
        .unwrap();
        assert_ne!(p.score_cache.version, Some(p.history.store().version()));
        let ada = p.get().cohort().records()[0].id;
        assert_eq!(p.score(ada).unwrap().value("skill_percentile"), Some(100.0));
    }

    #[test]
    fn export_reads_indicators_from_score_cache() {
        let mut p = panel();
        let cards = p.scores().clone();
        let table = p.export().unwrap();
        let idx = table.column_index("skill_percentile").unwrap();
        let cohort = p.get().cohort().clone();
        for (record, row) in cohort.iter().zip(&table.rows) {
            let expected = cards[&record.id].value("skill_percentile").unwrap();
            assert_eq!(row[idx], format!("{expected:.2}"));
        }
        assert_eq!(p.score_cache.version, Some(p.history.store().version()));
    }

    #[test]
    fn query_filters_and_sorts() {
        let mut p = panel();
        let outcome = p
            .dispatch(Command::Query {
                filters: FilterSet::new().and("skill", Predicate::range(0.0, 100.0)),
                sort: vec![SortKey::asc("skill")],
            })
            .unwrap();
        let CommandOutcome::Records(records) = outcome else {
            panic!("expected Records");
        };
        let names: Vec<_> = records.iter().filter_map(|r| r.text("name")).collect();
        assert_eq!(names, vec!["Ben", "Ada"]);
    }

    #[test]
    fn projection_leaves_state_alone() {
        let mut p = panel();
        let sub = p.subscribe();
        let before = p.get();
        let ada = before.cohort().records()[0].id;
        let scenario = Scenario::new("promote")
            .step(ScenarioStep::on(ada, Transform::promote("stage", "first_team")));
        p.dispatch(Command::Project(scenario)).unwrap();
        assert_eq!(p.get(), before);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn command_serde_shape() {
        let cmd = Command::Delete(RecordId::new());
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "delete");
        let back: Command = serde_json::from_value(json).unwrap();
        assert_eq!(back, cmd);
        assert!(back.is_mutation());
        assert!(!Command::Export.is_mutation());
    }
}
