//! Fixed-shape result table.

use std::fmt;

use keymetrics_core::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::evaluator::MetricResult;

/// Output column names, in order.
pub const COLUMNS: [&str; 5] = ["Metric", "Value", "Period", "Unit", "Description"];

/// Period label for a metric that had no period available.
pub const UNAVAILABLE_PERIOD: &str = "Latest";

/// One row of the result table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Metric display name.
    #[serde(rename = "Metric")]
    pub metric: String,
    /// Value, NaN if unavailable.
    #[serde(rename = "Value")]
    pub value: f64,
    /// Period label (`2024`, `2024Q3` or `Latest`).
    #[serde(rename = "Period")]
    pub period: String,
    /// Unit label.
    #[serde(rename = "Unit")]
    pub unit: String,
    /// Description.
    #[serde(rename = "Description")]
    pub description: String,
}

impl From<&MetricResult> for MetricRow {
    fn from(result: &MetricResult) -> Self {
        Self {
            metric: result.name.clone(),
            value: result.value,
            period: result
                .period
                .map_or_else(|| UNAVAILABLE_PERIOD.to_string(), |p| p.to_string()),
            unit: result.unit.to_string(),
            description: result.description.clone(),
        }
    }
}

/// Result table with columns [`COLUMNS`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTable {
    rows: Vec<MetricRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl MetricTable {
    /// Returns the rows in metric order.
    #[must_use]
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row for a metric display name.
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|row| row.metric == metric)
    }

    /// Attaches the name of the provider the data came from.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the data source, if recorded.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Converts the table to a DataFrame with columns [`COLUMNS`].
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let text = |name: &str, values: Vec<&str>| Column::new(name.into(), values);
        let metrics = self.rows.iter().map(|r| r.metric.as_str()).collect();
        let values: Vec<f64> = self.rows.iter().map(|r| r.value).collect();
        let periods = self.rows.iter().map(|r| r.period.as_str()).collect();
        let units = self.rows.iter().map(|r| r.unit.as_str()).collect();
        let descriptions = self.rows.iter().map(|r| r.description.as_str()).collect();

        DataFrame::new(vec![
            text(COLUMNS[0], metrics),
            Column::new(COLUMNS[1].into(), values),
            text(COLUMNS[2], periods),
            text(COLUMNS[3], units),
            text(COLUMNS[4], descriptions),
        ])
        .map_err(|e| DataError::Other(e.to_string()))
    }
}

impl fmt::Display for MetricTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.rows.iter().map(|r| format!("{:.4}", r.value)).collect();
        let w_metric = column_width(COLUMNS[0], self.rows.iter().map(|r| r.metric.as_str()));
        let w_value = column_width(COLUMNS[1], values.iter().map(String::as_str));
        let w_period = column_width(COLUMNS[2], self.rows.iter().map(|r| r.period.as_str()));
        let w_unit = column_width(COLUMNS[3], self.rows.iter().map(|r| r.unit.as_str()));

        writeln!(
            f,
            "{:<w_metric$}  {:>w_value$}  {:<w_period$}  {:<w_unit$}  {}",
            COLUMNS[0], COLUMNS[1], COLUMNS[2], COLUMNS[3], COLUMNS[4]
        )?;
        for (row, value) in self.rows.iter().zip(&values) {
            writeln!(
                f,
                "{:<w_metric$}  {:>w_value$}  {:<w_period$}  {:<w_unit$}  {}",
                row.metric, value, row.period, row.unit, row.description
            )?;
        }
        if let Some(source) = &self.source {
            write!(f, "Data source: {source}")?;
        }
        Ok(())
    }
}

/// Widest cell in characters, matching how `{:<w$}` pads.
fn column_width<'a>(header: &str, cells: impl Iterator<Item = &'a str>) -> usize {
    cells.map(|c| c.chars().count()).fold(header.chars().count(), usize::max)
}

/// Builds the result table: one row per result, same order, NaN kept.
#[must_use]
pub fn format_results(results: &[MetricResult]) -> MetricTable {
    MetricTable {
        rows: results.iter().map(MetricRow::from).collect(),
        source: None,
    }
}
