//! Column-oriented flattening of a cohort for external writers.
//!
//! This module only decides which columns exist and what text each cell
//! holds. File formats belong to the caller. The delimiter is a
//! configuration value because panels have historically disagreed on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cohort::Cohort;
use crate::error::ValidationError;
use crate::record::RecordId;
use crate::schema::RecordSchema;
use crate::scoring::{ScoreCard, ScoringEngine};

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_list_separator() -> String {
    ";".to_string()
}

const fn default_include_indicators() -> bool {
    true
}

/// Flattening options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Joins list elements inside one cell.
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
    /// Adds one value column and one tier column per indicator.
    #[serde(default = "default_include_indicators")]
    pub include_indicators: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            list_separator: default_list_separator(),
            include_indicators: default_include_indicators(),
        }
    }
}

impl ExportOptions {
    /// Options with a custom delimiter.
    #[must_use]
    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delimiter.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "export delimiter cannot be empty".to_string(),
            });
        }
        if self.delimiter.contains(['"', '\n', '\r']) {
            return Err(ValidationError::InvalidConfig {
                reason: "export delimiter cannot contain quotes or line breaks".to_string(),
            });
        }
        Ok(())
    }
}

/// Flat table: a header row and one row per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(skip, default = "default_delimiter")]
    delimiter: String,
}

impl ExportTable {
    /// Flattens `cohort`: the id column, every schema field in declared
    /// order, then the current indicator values.
    pub fn from_cohort(
        cohort: &Cohort,
        schema: &RecordSchema,
        engine: &ScoringEngine,
        options: &ExportOptions,
    ) -> Result<Self, ValidationError> {
        let cards = if options.include_indicators && !engine.is_empty() {
            engine.score_cohort(cohort)
        } else {
            BTreeMap::new()
        };
        Self::from_scored(cohort, schema, &engine.indicator_names(), &cards, options)
    }

    /// Like [`ExportTable::from_cohort`], reading indicator cells from
    /// cards scored beforehand. A record without a card gets empty cells.
    pub fn from_scored(
        cohort: &Cohort,
        schema: &RecordSchema,
        indicator_names: &[&str],
        cards: &BTreeMap<RecordId, ScoreCard>,
        options: &ExportOptions,
    ) -> Result<Self, ValidationError> {
        options.validate()?;

        let fields = schema.field_names();
        let indicators: &[&str] = if options.include_indicators {
            indicator_names
        } else {
            &[]
        };

        let mut columns = Vec::with_capacity(1 + fields.len() + indicators.len() * 2);
        columns.push("id".to_string());
        columns.extend(fields.iter().map(|f| (*f).to_string()));
        for name in indicators {
            columns.push((*name).to_string());
            columns.push(format!("{name}_tier"));
        }

        let rows = cohort
            .iter()
            .map(|record| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(record.id.to_string());
                row.extend(fields.iter().map(|f| {
                    record
                        .get(f)
                        .map(|v| v.to_cell(&options.list_separator))
                        .unwrap_or_default()
                }));
                let card = cards.get(&record.id);
                for name in indicators {
                    let value = card.and_then(|c| c.value(name));
                    let tier = card.and_then(|c| c.tier(name));
                    row.push(value.map(|v| format!("{v:.2}")).unwrap_or_default());
                    row.push(tier.map(|t| t.to_string()).unwrap_or_default());
                }
                row
            })
            .collect();

        Ok(Self {
            columns,
            rows,
            delimiter: options.delimiter.clone(),
        })
    }

    /// Index of `name` in [`ExportTable::columns`].
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Delimited lines, header first. Cells holding the delimiter, a quote
    /// or a line break are wrapped in quotes with inner quotes doubled.
    #[must_use]
    pub fn to_lines(&self) -> Vec<String> {
        std::iter::once(&self.columns)
            .chain(self.rows.iter())
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| quote(cell, &self.delimiter))
                    .collect::<Vec<_>>()
                    .join(&self.delimiter)
            })
            .collect()
    }
}

fn quote(cell: &str, delimiter: &str) -> String {
    if cell.contains(delimiter) || cell.contains(['"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, RecordDraft};
    use crate::scoring::PanelKind;

    fn cohort() -> Cohort {
        let record = Record::new(
            RecordDraft::new()
                .with("name", "Okafor, J.")
                .with("performance", 8.0)
                .with("months_remaining", 18.0)
                .with("engagement", 6.0)
                .with("performance_history", vec![6.0, 7.0, 8.0])
                .attributes,
        );
        std::iter::once(record).collect()
    }

    fn table(options: &ExportOptions) -> ExportTable {
        let kind = PanelKind::Contracts;
        ExportTable::from_cohort(
            &cohort(),
            &kind.schema().unwrap(),
            &kind.engine().unwrap(),
            options,
        )
        .unwrap()
    }

    #[test]
    fn columns_follow_schema_then_indicators() {
        let t = table(&ExportOptions::default());
        assert_eq!(t.columns[0], "id");
        assert_eq!(t.columns[1], "name");
        assert!(t.column_index("contract_health") > t.column_index("performance_history"));
        assert_eq!(t.column("contract_health").unwrap(), vec!["6.45"]);
        assert_eq!(t.column("contract_health_tier").unwrap(), vec!["amber"]);
        assert_eq!(t.column("performance_history").unwrap(), vec!["6;7;8"]);
        assert_eq!(t.column("salary").unwrap(), vec![""]);
    }

    #[test]
    fn delimiter_is_configurable_and_quoted() {
        let comma = table(&ExportOptions::default()).to_lines();
        assert!(comma[1].contains("\"Okafor, J.\""));
        assert!(comma[0].starts_with("id,name,"));

        let semi = table(&ExportOptions::with_delimiter(";")).to_lines();
        assert!(semi[0].starts_with("id;name;"));
        assert!(semi[1].contains(";Okafor, J.;"));
        // The list separator collides with the delimiter, so the cell is quoted.
        assert!(semi[1].contains("\"6;7;8\""));
    }

    #[test]
    fn indicators_can_be_left_out() {
        let options = ExportOptions {
            include_indicators: false,
            ..ExportOptions::default()
        };
        let t = table(&options);
        assert!(t.column_index("contract_health").is_none());
        assert_eq!(t.columns.len(), 1 + PanelKind::Contracts.schema().unwrap().fields().len());
    }

    #[test]
    fn prescored_cards_fill_indicator_cells() {
        let kind = PanelKind::Contracts;
        let (schema, engine) = (kind.schema().unwrap(), kind.engine().unwrap());
        let options = ExportOptions::default();
        let cohort = cohort();

        let cards = engine.score_cohort(&cohort);
        let names = engine.indicator_names();
        let scored = ExportTable::from_scored(&cohort, &schema, &names, &cards, &options).unwrap();
        let direct = ExportTable::from_cohort(&cohort, &schema, &engine, &options).unwrap();
        assert_eq!(scored, direct);

        let unscored =
            ExportTable::from_scored(&cohort, &schema, &names, &BTreeMap::new(), &options).unwrap();
        assert_eq!(unscored.columns, scored.columns);
        assert_eq!(unscored.column("contract_health").unwrap(), vec![""]);
        assert_eq!(unscored.column("contract_health_tier").unwrap(), vec![""]);
    }

    #[test]
    fn invalid_delimiters_rejected() {
        assert!(ExportOptions::with_delimiter("").validate().is_err());
        assert!(ExportOptions::with_delimiter("\"").validate().is_err());
        assert!(ExportOptions::with_delimiter("\t").validate().is_ok());
    }

    #[test]
    fn quote_doubles_inner_quotes() {
        assert_eq!(quote("say \"hi\"", ","), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("plain", ","), "plain");
    }
}
