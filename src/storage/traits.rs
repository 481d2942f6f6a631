//! Abstract storage contract for panel records.
//!
//! The history manager and the panel container only talk to this trait, so
//! an alternative backend (for instance one backed by a shared session
//! cache) can be dropped in without touching them.

use crate::cohort::{Cohort, Snapshot};
use crate::error::CoreResult;
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use crate::schema::RecordSchema;

/// Storage trait for one panel's records.
///
/// # Contract
/// - `create`/`update` validate before touching state: a failed call leaves
///   the store exactly as it was.
/// - Every successful `create`, `update`, effective `delete` and `restore`
///   bumps [`RecordStore::version`].
pub trait RecordStore {
    /// Schema the store validates against.
    fn schema(&self) -> &RecordSchema;

    /// Insert a new record and return its freshly assigned id.
    fn create(&mut self, draft: RecordDraft) -> CoreResult<RecordId>;

    /// Merge `patch` into an existing record. Returns `RecordNotFound` if absent.
    fn update(&mut self, id: RecordId, patch: &RecordPatch) -> CoreResult<Record>;

    /// Remove a record. Returns `Ok(false)` without changing anything if absent.
    fn delete(&mut self, id: RecordId) -> CoreResult<bool>;

    /// Get a record by id. Returns `RecordNotFound` if absent.
    fn get(&self, id: RecordId) -> CoreResult<Record>;

    /// Current cohort (copy).
    fn all(&self) -> Cohort;

    /// Number of records.
    fn len(&self) -> usize;

    /// Returns true when the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic mutation counter.
    fn version(&self) -> u64;

    /// Capture the current cohort without copying it.
    fn snapshot(&self) -> Snapshot;

    /// Replace the current cohort with `snapshot`'s.
    fn restore(&mut self, snapshot: &Snapshot);
}
