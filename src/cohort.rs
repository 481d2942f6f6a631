//! Cohorts and snapshots.
//!
//! A cohort is the full, insertion-ordered record set of one store. It is
//! the comparison population for relative indicators and the unit the
//! history manager captures. Snapshots share their cohort behind an `Arc`;
//! the store mutates through `Arc::make_mut`, so a captured snapshot is
//! never written after capture.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordId};

/// Insertion-ordered set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cohort {
    records: Vec<Record>,
}

impl Cohort {
    /// Creates an empty cohort.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.position(id).is_some()
    }

    /// Ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Finite numeric values of `field` across the cohort, in insertion order.
    #[must_use]
    pub fn numbers_of(&self, field: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.number(field))
            .filter(|v| v.is_finite())
            .collect()
    }

    pub(crate) fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn remove(&mut self, id: RecordId) -> Option<Record> {
        let idx = self.position(id)?;
        Some(self.records.remove(idx))
    }

    /// Returns a copy without the record `id`. Used by removal scenarios.
    #[must_use]
    pub fn without(&self, id: RecordId) -> Self {
        Self {
            records: self.records.iter().filter(|r| r.id != id).cloned().collect(),
        }
    }
}

impl FromIterator<Record> for Cohort {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Cohort {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Immutable capture of a store's cohort, tagged with the store version
/// at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: u64,
    cohort: Arc<Cohort>,
}

impl Snapshot {
    pub(crate) fn new(version: u64, cohort: Arc<Cohort>) -> Self {
        Self { version, cohort }
    }

    /// Builds a detached snapshot, e.g. for projecting over a filtered cohort.
    #[must_use]
    pub fn detached(version: u64, cohort: Cohort) -> Self {
        Self::new(version, Arc::new(cohort))
    }

    /// Store version at capture.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn cohort(&self) -> &Cohort {
        &self.cohort
    }

    pub(crate) fn shared_cohort(&self) -> Arc<Cohort> {
        Arc::clone(&self.cohort)
    }

    /// Stable digest of the captured records.
    ///
    /// Two snapshots with identical records (ids, attributes, versions and
    /// timestamps) have the same fingerprint regardless of store version.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        cohort_fingerprint(&self.cohort)
    }
}

/// blake3 digest over the canonical JSON form of a cohort.
#[must_use]
pub fn cohort_fingerprint(cohort: &Cohort) -> String {
    let mut hasher = blake3::Hasher::new();
    for record in cohort {
        // Attributes are a BTreeMap, so the JSON form is canonical.
        match serde_json::to_vec(record) {
            Ok(bytes) => {
                hasher.update(&bytes);
            }
            Err(_) => {
                hasher.update(record.id.as_uuid().as_bytes());
            }
        }
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Attributes, RecordDraft};

    fn record(name: &str, rating: f64) -> Record {
        Record::from_attributes(
            RecordId::new(),
            RecordDraft::new()
                .with("name", name)
                .with("rating", rating)
                .attributes,
        )
    }

    #[test]
    fn cohort_preserves_insertion_order() {
        let a = record("a", 1.0);
        let b = record("b", 2.0);
        let cohort: Cohort = vec![a.clone(), b.clone()].into_iter().collect();
        assert_eq!(cohort.ids(), vec![a.id, b.id]);
        assert_eq!(cohort.numbers_of("rating"), vec![1.0, 2.0]);
    }

    #[test]
    fn without_does_not_touch_source() {
        let a = record("a", 1.0);
        let b = record("b", 2.0);
        let cohort: Cohort = vec![a.clone(), b.clone()].into_iter().collect();

        let removed = cohort.without(a.id);
        assert_eq!(removed.len(), 1);
        assert_eq!(cohort.len(), 2);
        assert!(removed.contains(b.id));
        assert!(cohort.contains(a.id));
    }

    #[test]
    fn numbers_of_skips_non_numeric_and_non_finite() {
        let mut odd = Record::from_attributes(RecordId::new(), Attributes::new());
        odd.attributes.insert("rating".into(), f64::NAN.into());
        let cohort: Cohort = vec![record("a", 3.0), odd].into_iter().collect();
        assert_eq!(cohort.numbers_of("rating"), vec![3.0]);
    }

    #[test]
    fn fingerprint_tracks_content_not_version() {
        let cohort: Cohort = vec![record("a", 1.0)].into_iter().collect();
        let s1 = Snapshot::detached(1, cohort.clone());
        let s2 = Snapshot::detached(7, cohort);
        assert_eq!(s1.fingerprint(), s2.fingerprint());

        let other = Snapshot::detached(1, vec![record("a", 1.0)].into_iter().collect());
        assert_ne!(s1.fingerprint(), other.fingerprint());
    }
}
