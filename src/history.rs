//! Bounded undo/redo over a record store.
//!
//! The manager captures a snapshot of the store before each mutating call
//! and keeps two bounded stacks. Key invariants:
//! - A failed mutation pushes nothing.
//! - Any new mutation clears the redo stack (no branching timelines).
//! - The undo stack never exceeds its capacity; the oldest entry is evicted.
//! - `undo(); redo();` restores the exact cohort present before `undo()`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, event, Level};

use crate::cohort::Snapshot;
use crate::error::{CoreResult, ValidationError};
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use crate::storage::RecordStore;

/// Default depth of each history stack.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Observable state of the history stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    /// Nothing to undo or redo.
    Clean,
    /// At least one undo entry, no redo entry.
    Undoable,
    /// At least one redo entry (only reachable right after an undo).
    Redoable,
}

/// Result of an undo or redo request.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    /// The store was restored to this snapshot.
    Restored(Snapshot),
    /// The relevant stack was empty; nothing changed.
    NoOp,
}

impl HistoryOutcome {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

/// Undo/redo wrapper around a [`RecordStore`].
#[derive(Debug, Clone)]
pub struct HistoryManager<S> {
    store: S,
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    capacity: usize,
}

impl<S: RecordStore> HistoryManager<S> {
    /// Wrap `store` with the default capacity.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            undo: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            redo: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Wrap `store` with a custom stack capacity (must be > 0).
    pub fn with_capacity(store: S, capacity: usize) -> Result<Self, ValidationError> {
        if capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "history capacity must be > 0".to_string(),
            });
        }
        Ok(Self {
            store,
            undo: VecDeque::with_capacity(capacity),
            redo: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Read access to the wrapped store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    #[must_use]
    pub fn state(&self) -> HistoryState {
        if !self.redo.is_empty() {
            HistoryState::Redoable
        } else if !self.undo.is_empty() {
            HistoryState::Undoable
        } else {
            HistoryState::Clean
        }
    }

    /// Create a record, recording the prior state on success.
    pub fn create(&mut self, draft: RecordDraft) -> CoreResult<RecordId> {
        let before = self.store.snapshot();
        let id = self.store.create(draft)?;
        self.capture(before);
        Ok(id)
    }

    /// Update a record, recording the prior state on success.
    pub fn update(&mut self, id: RecordId, patch: &RecordPatch) -> CoreResult<Record> {
        let before = self.store.snapshot();
        let record = self.store.update(id, patch)?;
        self.capture(before);
        Ok(record)
    }

    /// Delete a record. Deleting an absent record records nothing.
    pub fn delete(&mut self, id: RecordId) -> CoreResult<bool> {
        let before = self.store.snapshot();
        let removed = self.store.delete(id)?;
        if removed {
            self.capture(before);
        }
        Ok(removed)
    }

    /// Restore the most recent captured state.
    pub fn undo(&mut self) -> HistoryOutcome {
        let Some(previous) = self.undo.pop_back() else {
            debug!("undo requested with empty history");
            return HistoryOutcome::NoOp;
        };
        let current = self.store.snapshot();
        push_bounded(&mut self.redo, current, self.capacity);
        self.store.restore(&previous);
        event!(
            Level::DEBUG,
            undo_depth = self.undo.len(),
            redo_depth = self.redo.len(),
            "undo applied"
        );
        HistoryOutcome::Restored(previous)
    }

    /// Re-apply the most recently undone state.
    pub fn redo(&mut self) -> HistoryOutcome {
        let Some(next) = self.redo.pop_back() else {
            debug!("redo requested with empty redo stack");
            return HistoryOutcome::NoOp;
        };
        let current = self.store.snapshot();
        push_bounded(&mut self.undo, current, self.capacity);
        self.store.restore(&next);
        event!(
            Level::DEBUG,
            undo_depth = self.undo.len(),
            redo_depth = self.redo.len(),
            "redo applied"
        );
        HistoryOutcome::Restored(next)
    }

    fn capture(&mut self, before: Snapshot) {
        push_bounded(&mut self.undo, before, self.capacity);
        if !self.redo.is_empty() {
            debug!(discarded = self.redo.len(), "redo stack invalidated by new mutation");
            self.redo.clear();
        }
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, capacity: usize) {
    stack.push_back(snapshot);
    while stack.len() > capacity {
        if let Some(evicted) = stack.pop_front() {
            debug!(version = evicted.version(), "oldest history entry evicted");
        }
    }
}
