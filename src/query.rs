//! Read-only filtering and sorting over a cohort.
//!
//! Clauses are combined with logical AND, so adding a clause can only keep
//! or shrink the result. A clause with an empty argument (empty text, empty
//! set, unbounded range, `Null`) matches every record.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cohort::Cohort;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::record::Record;
use crate::value::Value;

const REGEX_CACHE_MAX: usize = 256;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> CoreResult<Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| CoreError::internal("regex cache lock poisoned"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern).map_err(|e| ValidationError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut guard = cache
        .write()
        .map_err(|_| CoreError::internal("regex cache lock poisoned"))?;
    if guard.len() >= REGEX_CACHE_MAX {
        guard.clear();
    }
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

/// Field-level test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Predicate {
    /// Exact equality; numbers compare numerically.
    Equals(Value),
    /// Case-insensitive substring of a text value, or of any list element.
    Contains(String),
    /// Inclusive numeric bounds; a missing bound is open.
    Range { min: Option<f64>, max: Option<f64> },
    /// Equal to any member of the set.
    OneOf(Vec<Value>),
    /// Regular expression over a text value.
    Matches(String),
}

impl Predicate {
    #[must_use]
    pub fn range(min: f64, max: f64) -> Self {
        Self::Range {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Returns true if the predicate places no constraint on the field.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        match self {
            Self::Equals(v) => v.is_null() || v.as_string().is_some_and(str::is_empty),
            Self::Contains(s) | Self::Matches(s) => s.is_empty(),
            Self::Range { min, max } => min.is_none() && max.is_none(),
            Self::OneOf(set) => set.is_empty(),
        }
    }
}

/// One `field <predicate>` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub predicate: Predicate,
}

/// Conjunction of clauses.
///
/// # Examples
///
/// ```
/// use clubcore::query::{filter, FilterSet, Predicate};
/// use clubcore::{Cohort, Record, RecordDraft};
///
/// let cohort: Cohort = [("Ada", 81.0), ("Ben", 42.0)]
///     .into_iter()
///     .map(|(n, s)| Record::new(RecordDraft::new().with("name", n).with("skill", s).attributes))
///     .collect();
///
/// let strong = FilterSet::new().and("skill", Predicate::range(60.0, 100.0));
/// assert_eq!(filter(&cohort, &strong).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    clauses: Vec<Clause>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause.
    #[must_use]
    pub fn and(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            predicate,
        });
        self
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Compiles every clause. Fails only on an invalid regular expression.
    pub fn compile(&self) -> CoreResult<CompiledFilter> {
        let clauses = self
            .clauses
            .iter()
            .filter(|c| !c.predicate.is_unconstrained())
            .map(|c| {
                let regex = match &c.predicate {
                    Predicate::Matches(pattern) => Some(cached_regex(pattern)?),
                    _ => None,
                };
                Ok((c.clone(), regex))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(CompiledFilter { clauses })
    }
}

/// A filter with its regular expressions compiled.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    clauses: Vec<(Clause, Option<Regex>)>,
}

impl CompiledFilter {
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(clause, regex)| {
            record
                .get(&clause.field)
                .is_some_and(|value| clause_matches(&clause.predicate, regex.as_ref(), value))
        })
    }
}

// `Value::compare` orders lists by length only, so lists compare element-wise here.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(left), Value::List(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| values_equal(l, r))
        }
        (Value::List(_), _) | (_, Value::List(_)) => false,
        _ => a.compare(b) == Some(Ordering::Equal),
    }
}

fn text_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::List(items) => items.iter().any(|item| text_contains(item, needle)),
        Value::Null => false,
        other => other.to_string().to_lowercase().contains(needle),
    }
}

fn clause_matches(predicate: &Predicate, regex: Option<&Regex>, value: &Value) -> bool {
    match predicate {
        Predicate::Equals(expected) => values_equal(value, expected),
        Predicate::Contains(needle) => text_contains(value, &needle.to_lowercase()),
        Predicate::Range { min, max } => value.as_float().is_some_and(|n| {
            !n.is_nan() && min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
        }),
        Predicate::OneOf(set) => set.iter().any(|candidate| values_equal(value, candidate)),
        Predicate::Matches(_) => match (regex, value.as_string()) {
            (Some(re), Some(text)) => re.is_match(text),
            _ => false,
        },
    }
}

/// Records of `cohort` matching every clause, in cohort order.
pub fn filter(cohort: &Cohort, filters: &FilterSet) -> CoreResult<Cohort> {
    let compiled = filters.compile()?;
    Ok(cohort
        .iter()
        .filter(|record| compiled.matches(record))
        .cloned()
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One sort key. Earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Sort class: values of one kind compare with each other; absent values
/// (missing, `Null`, NaN) always sort after present ones.
fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Bool(_)) => 0,
        Some(Value::Int(_)) => 1,
        Some(Value::Float(f)) if !f.is_nan() => 1,
        Some(Value::String(_)) => 2,
        Some(Value::List(_)) => 3,
        Some(Value::Float(_) | Value::Null) | None => 4,
    }
}

fn compare_field(a: &Record, b: &Record, key: &SortKey) -> Ordering {
    let (va, vb) = (a.get(&key.field), b.get(&key.field));
    let (ra, rb) = (kind_rank(va), kind_rank(vb));
    if ra != rb || ra == 4 {
        // Kind order (and missing-last) ignores the direction.
        return ra.cmp(&rb);
    }
    let ord = match (va, vb) {
        (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    };
    match key.direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

/// Stable multi-key sort. Ties keep cohort (insertion) order.
#[must_use]
pub fn sort(cohort: &Cohort, keys: &[SortKey]) -> Vec<Record> {
    let mut records = cohort.records().to_vec();
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| compare_field(a, b, key))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    records
}
