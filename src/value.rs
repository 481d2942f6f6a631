//! Attribute values a record can hold.
//!
//! Values cover the attribute shapes the panels use: numbers, free text,
//! enumerated labels (stored as strings and checked against the schema),
//! flags and nested lists such as a season-by-season rating history.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Possible values of a record attribute.
///
/// # Examples
///
/// ```
/// use clubcore::Value;
///
/// let rating = Value::Float(7.5);
/// let position = Value::String("midfield".to_string());
/// let history = Value::List(vec![Value::Float(6.0), Value::Float(7.5)]);
///
/// assert!(rating.is_number());
/// assert_eq!(position.as_string(), Some("midfield"));
/// assert_eq!(history.as_numbers(), Some(vec![6.0, 7.5]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Null,
}

impl Value {
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// True for both `Int` and `Float`.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric elements of a list, or `None` if this is not a list or any
    /// element is not a number.
    #[must_use]
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        self.as_list()?.iter().map(Self::as_float).collect()
    }

    /// Lenient numeric read used when coercing edits: numbers pass through,
    /// strings are parsed after trimming, booleans map to 0/1.
    ///
    /// Returns `Some(f64::NAN)` for text that does not parse, so the caller
    /// can apply its own boundary rule.
    #[must_use]
    pub fn to_number_lenient(&self) -> Option<f64> {
        match self {
            Self::Int(_) | Self::Float(_) => self.as_float(),
            Self::String(s) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::List(_) | Self::Null => None,
        }
    }

    /// Ordering used by multi-key sorts.
    ///
    /// Numbers compare numerically (Int and Float interleave), strings
    /// compare case-insensitively, then by exact bytes. Values of different
    /// kinds have no ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(
                a.to_lowercase()
                    .cmp(&b.to_lowercase())
                    .then_with(|| a.cmp(b)),
            ),
            (Self::List(a), Self::List(b)) => Some(a.len().cmp(&b.len())),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => {
                let (a, b) = (self.as_float()?, other.as_float()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Renders the value as a flat cell, joining list elements with
    /// `list_separator`.
    #[must_use]
    pub fn to_cell(&self, list_separator: &str) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::List(items) => items
                .iter()
                .map(|item| item.to_cell(list_separator))
                .collect::<Vec<_>>()
                .join(list_separator),
            Self::Null => String::new(),
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Null => "null",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::List(v) => write!(f, "list[{}]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::List(v.into_iter().map(Self::Float).collect())
    }
}
