//! In-memory record store.
//!
//! The cohort lives behind an `Arc`. Snapshots clone the `Arc`; mutations
//! go through `Arc::make_mut`, which copies the cohort only while a
//! snapshot still shares it. Captured snapshots therefore never change.

use std::sync::Arc;

use tracing::{debug, event, Level};

use crate::cohort::{Cohort, Snapshot};
use crate::error::{CoreError, CoreResult, ExecutionError};
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use crate::schema::RecordSchema;
use crate::storage::traits::RecordStore;

/// Session-scoped record store for one panel.
#[derive(Debug, Clone)]
pub struct InMemoryRecordStore {
    schema: RecordSchema,
    cohort: Arc<Cohort>,
    version: u64,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            schema,
            cohort: Arc::new(Cohort::new()),
            version: 0,
        }
    }

    /// Create a store pre-populated with `seed`.
    ///
    /// Every draft is validated like `create`; the first invalid draft
    /// aborts construction. Seeding does not bump the version, so a freshly
    /// seeded store starts at version 0.
    pub fn with_seed(schema: RecordSchema, seed: Vec<RecordDraft>) -> CoreResult<Self> {
        let mut cohort = Cohort::new();
        for draft in seed {
            schema.validate_draft(&draft)?;
            cohort.push(Record::from_attributes(RecordId::new(), draft.attributes));
        }
        debug!(records = cohort.len(), "record store seeded");
        Ok(Self {
            schema,
            cohort: Arc::new(cohort),
            version: 0,
        })
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

impl RecordStore for InMemoryRecordStore {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn create(&mut self, draft: RecordDraft) -> CoreResult<RecordId> {
        self.schema.validate_draft(&draft)?;

        let id = RecordId::new();
        Arc::make_mut(&mut self.cohort).push(Record::from_attributes(id, draft.attributes));
        let version = self.bump();
        event!(Level::DEBUG, %id, version, "record created");
        Ok(id)
    }

    fn update(&mut self, id: RecordId, patch: &RecordPatch) -> CoreResult<Record> {
        let current = self.cohort.get(id).ok_or(CoreError::not_found(id))?;

        if let Some(expected) = patch.expected_version {
            if expected != current.version {
                return Err(ExecutionError::VersionConflict {
                    id,
                    expected,
                    actual: current.version,
                }
                .into());
            }
        }

        // Build the new attribute map before touching the cohort so a
        // rejected patch leaves the store unchanged.
        let merged = self.schema.merge_patch(&current.attributes, patch)?;

        let cohort = Arc::make_mut(&mut self.cohort);
        let record = cohort
            .get_mut(id)
            .ok_or_else(|| CoreError::internal("record vanished during update"))?;
        record.attributes = merged;
        record.touch();
        let updated = record.clone();

        let version = self.bump();
        event!(Level::DEBUG, %id, version, record_version = updated.version, "record updated");
        Ok(updated)
    }

    fn delete(&mut self, id: RecordId) -> CoreResult<bool> {
        if !self.cohort.contains(id) {
            debug!(%id, "delete of absent record ignored");
            return Ok(false);
        }
        Arc::make_mut(&mut self.cohort).remove(id);
        let version = self.bump();
        event!(Level::DEBUG, %id, version, "record deleted");
        Ok(true)
    }

    fn get(&self, id: RecordId) -> CoreResult<Record> {
        self.cohort.get(id).cloned().ok_or(CoreError::not_found(id))
    }

    fn all(&self) -> Cohort {
        Cohort::clone(&self.cohort)
    }

    fn len(&self) -> usize {
        self.cohort.len()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.version, Arc::clone(&self.cohort))
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        self.cohort = snapshot.shared_cohort();
        let version = self.bump();
        event!(
            Level::DEBUG,
            version,
            captured_at = snapshot.version(),
            records = self.cohort.len(),
            "record store restored"
        );
    }
}
