//! Record schemas: declared fields, their domains and edit rules.
//!
//! Creation is strict: a draft that is missing a required field, names an
//! undeclared field, or carries a value outside its domain is rejected.
//! Edits are lenient for numbers: a malformed or out-of-range numeric
//! value is clamped to the nearest bound so the edit surface keeps
//! succeeding. Text, enum, flag and list type mismatches are still rejected.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::{Attributes, RecordDraft, RecordPatch};
use crate::value::Value;

/// Conservative upper bound for free-form text fields.
pub const MAX_TEXT_LEN: usize = 4 * 1024;

/// Domain of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Finite number in `[min, max]`.
    Number { min: f64, max: f64 },
    /// Free text up to `max_len` bytes.
    Text { max_len: usize },
    /// One label out of `allowed`.
    Enum { allowed: Vec<String> },
    /// Boolean flag.
    Flag,
    /// List whose elements share one domain.
    List { element: Box<FieldKind> },
}

impl FieldKind {
    /// Shorthand for a bounded number.
    #[must_use]
    pub const fn number(min: f64, max: f64) -> Self {
        Self::Number { min, max }
    }

    /// Shorthand for text with the default length limit.
    #[must_use]
    pub const fn text() -> Self {
        Self::Text {
            max_len: MAX_TEXT_LEN,
        }
    }

    /// Shorthand for an enumerated label.
    #[must_use]
    pub fn one_of<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for a list of bounded numbers (e.g. a rating history).
    #[must_use]
    pub fn number_list(min: f64, max: f64) -> Self {
        Self::List {
            element: Box::new(Self::Number { min, max }),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Number { min, max } => format!("number in [{min}, {max}]"),
            Self::Text { .. } => "text".to_string(),
            Self::Enum { .. } => "enum label".to_string(),
            Self::Flag => "bool".to_string(),
            Self::List { element } => format!("list of {}", element.describe()),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// An optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Ordered field declarations for one panel's records.
///
/// # Examples
///
/// ```
/// use clubcore::{FieldKind, FieldSpec, RecordDraft, RecordSchema};
///
/// let schema = RecordSchema::new(vec![
///     FieldSpec::required("name", FieldKind::text()),
///     FieldSpec::required("engagement", FieldKind::number(0.0, 100.0)),
/// ])
/// .unwrap();
///
/// let ok = RecordDraft::new().with("name", "Ada").with("engagement", 70.0);
/// assert!(schema.validate_draft(&ok).is_ok());
///
/// let bad = RecordDraft::new().with("name", "Ada").with("engagement", 140.0);
/// assert!(schema.validate_draft(&bad).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Builds a schema, rejecting duplicate names and empty numeric domains.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(ValidationError::InvalidSchema {
                    reason: "field name cannot be empty".to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ValidationError::InvalidSchema {
                    reason: format!("duplicate field '{}'", field.name),
                });
            }
            check_kind(&field.name, &field.kind)?;
        }
        Ok(Self { fields })
    }

    /// A schema with no declared fields. Every attribute is then rejected
    /// as unknown, so this is only useful as a placeholder.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declared order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Strict check used by `create` and by seed loading.
    pub fn validate_draft(&self, draft: &RecordDraft) -> Result<(), ValidationError> {
        for name in draft.attributes.keys() {
            if self.field(name).is_none() {
                return Err(ValidationError::UnknownField {
                    field: name.clone(),
                });
            }
        }
        for spec in &self.fields {
            match draft.attributes.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ValidationError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) => validate_value(&spec.name, &spec.kind, value)?,
            }
        }
        Ok(())
    }

    /// Merges `patch` into `current`, returning the new attribute map.
    ///
    /// Numeric values are coerced rather than rejected; `Null` removes an
    /// optional attribute. `current` is left untouched.
    pub fn merge_patch(
        &self,
        current: &Attributes,
        patch: &RecordPatch,
    ) -> Result<Attributes, ValidationError> {
        let mut merged = current.clone();
        for (name, value) in &patch.attributes {
            let spec = self.field(name).ok_or_else(|| ValidationError::UnknownField {
                field: name.clone(),
            })?;
            if value.is_null() {
                if spec.required {
                    return Err(ValidationError::MissingField {
                        field: name.clone(),
                    });
                }
                merged.remove(name);
                continue;
            }
            merged.insert(name.clone(), coerce_value(&spec.name, &spec.kind, value)?);
        }
        Ok(merged)
    }

    /// Coerces a single override the same way `merge_patch` does.
    pub fn coerce(&self, field: &str, value: &Value) -> Result<Value, ValidationError> {
        let spec = self.field(field).ok_or_else(|| ValidationError::UnknownField {
            field: field.to_string(),
        })?;
        coerce_value(&spec.name, &spec.kind, value)
    }
}

fn check_kind(name: &str, kind: &FieldKind) -> Result<(), ValidationError> {
    match kind {
        FieldKind::Number { min, max } => {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(ValidationError::InvalidSchema {
                    reason: format!("field '{name}' has an empty numeric domain [{min}, {max}]"),
                });
            }
        }
        FieldKind::Enum { allowed } if allowed.is_empty() => {
            return Err(ValidationError::InvalidSchema {
                reason: format!("enum field '{name}' allows no values"),
            });
        }
        FieldKind::List { element } => check_kind(name, element)?,
        _ => {}
    }
    Ok(())
}

fn mismatch(field: &str, kind: &FieldKind, value: &Value) -> ValidationError {
    ValidationError::TypeMismatch {
        field: field.to_string(),
        expected: kind.describe(),
        actual: value.type_name().to_string(),
    }
}

fn validate_value(field: &str, kind: &FieldKind, value: &Value) -> Result<(), ValidationError> {
    match (kind, value) {
        (FieldKind::Number { min, max }, v) if v.is_number() => {
            let n = v.as_float().unwrap_or(f64::NAN);
            if n.is_finite() && n >= *min && n <= *max {
                Ok(())
            } else {
                Err(ValidationError::OutOfDomain {
                    field: field.to_string(),
                    value: n,
                    min: *min,
                    max: *max,
                })
            }
        }
        (FieldKind::Text { max_len }, Value::String(s)) => {
            if s.len() > *max_len {
                Err(ValidationError::FieldTooLong {
                    field: field.to_string(),
                    max_length: *max_len,
                })
            } else {
                Ok(())
            }
        }
        (FieldKind::Enum { allowed }, Value::String(s)) => {
            if allowed.iter().any(|a| a == s) {
                Ok(())
            } else {
                Err(ValidationError::NotAllowed {
                    field: field.to_string(),
                    value: s.clone(),
                })
            }
        }
        (FieldKind::Flag, Value::Bool(_)) => Ok(()),
        (FieldKind::List { element }, Value::List(items)) => items
            .iter()
            .try_for_each(|item| validate_value(field, element, item)),
        _ => Err(mismatch(field, kind, value)),
    }
}

/// Clamp rule for edited numbers: NaN (including unparsable text) goes to
/// the lower bound, everything else to the nearest bound.
#[must_use]
pub fn clamp_to_domain(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

fn coerce_value(field: &str, kind: &FieldKind, value: &Value) -> Result<Value, ValidationError> {
    match (kind, value) {
        (FieldKind::Number { min, max }, v) => {
            let Some(n) = v.to_number_lenient() else {
                return Err(mismatch(field, kind, value));
            };
            let clamped = clamp_to_domain(n, *min, *max);
            // Keep integers as integers when nothing had to change.
            if matches!(v, Value::Int(_)) && (clamped - n).abs() < f64::EPSILON {
                Ok(v.clone())
            } else {
                Ok(Value::Float(clamped))
            }
        }
        (FieldKind::List { element }, Value::List(items)) => items
            .iter()
            .map(|item| coerce_value(field, element, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        _ => {
            validate_value(field, kind, value)?;
            Ok(value.clone())
        }
    }
}
