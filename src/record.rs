//! Record types and identity.
//!
//! A record is one panel entity (athlete, contract, sponsor, staff member)
//! with a stable identifier and a map of named attributes. Derived
//! indicators are never stored here; the scoring engine recomputes them on
//! read.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Stable record identifier.
///
/// # Examples
///
/// ```
/// use clubcore::RecordId;
///
/// let id = RecordId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Attribute map keyed by field name. Ordered so serialization and
/// fingerprints are deterministic.
pub type Attributes = BTreeMap<String, Value>;

/// A stored panel record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    #[serde(default)]
    pub attributes: Attributes,

    /// Starts at 1 on create and increments on every update.
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Builds a detached record with a fresh id. Stores assign their own
    /// ids through `create`; this is for scoring records that live outside
    /// a store.
    #[must_use]
    pub fn new(attributes: Attributes) -> Self {
        Self::from_attributes(RecordId::new(), attributes)
    }

    pub(crate) fn from_attributes(id: RecordId, attributes: Attributes) -> Self {
        let now = Utc::now();
        Self {
            id,
            attributes,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the attribute value for `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Returns the attribute as a number, if present and numeric.
    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_float)
    }

    /// Returns the attribute as text, if present and a string.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_string)
    }

    /// Updates the `updated_at` timestamp and increments the version.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

/// Input for `create`: attributes without identity or bookkeeping.
///
/// # Examples
///
/// ```
/// use clubcore::RecordDraft;
///
/// let draft = RecordDraft::new()
///     .with("name", "J. Okafor")
///     .with("engagement", 72.0);
/// assert_eq!(draft.attributes.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(default)]
    pub attributes: Attributes,
}

impl RecordDraft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }
}

/// Input for `update`: the attributes to merge, plus an optional
/// expected record version for optimistic concurrency.
///
/// A `Value::Null` entry removes the attribute (only allowed for fields
/// the schema does not mark as required).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl RecordPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one attribute override.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Requires the stored record to be at `version`.
    #[must_use]
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_creation() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn record_id_display_is_uuid() {
        let display = format!("{}", RecordId::new());
        assert!(display.contains('-'));
    }

    #[test]
    fn record_accessors() {
        let draft = RecordDraft::new().with("name", "Ada").with("rating", 7);
        let record = Record::from_attributes(RecordId::new(), draft.attributes);
        assert_eq!(record.text("name"), Some("Ada"));
        assert_eq!(record.number("rating"), Some(7.0));
        assert_eq!(record.number("name"), None);
        assert_eq!(record.version, 1);
    }

    #[test]
    fn record_touch_increments_version() {
        let mut record = Record::from_attributes(RecordId::new(), Attributes::new());
        record.touch();
        record.touch();
        assert_eq!(record.version, 3);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn patch_builder() {
        let patch = RecordPatch::new().set("rating", 8.0).expecting_version(2);
        assert!(!patch.is_empty());
        assert_eq!(patch.expected_version, Some(2));
    }

    #[test]
    fn record_serialization() {
        let record = Record::from_attributes(
            RecordId::new(),
            RecordDraft::new().with("name", "Ada").attributes,
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
