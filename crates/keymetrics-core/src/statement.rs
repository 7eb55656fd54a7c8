//! Statement tables keyed by line item and reporting period.
//!
//! A [`StatementTable`] is the provider-neutral shape of one financial
//! statement: rows are line items (`"Revenue"`, `"Total Assets"`, ...), columns
//! are [`ReportingPeriod`]s and each cell is a [`Cell`]. Providers build a
//! table once and hand it over; consumers only read it.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{DataError, Result};
use crate::period::ReportingPeriod;

/// The two statements the metric evaluator reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Income statement (revenue, profit, net income, ...).
    Income,
    /// Balance sheet (assets, liabilities, equity, ...).
    Balance,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "income statement"),
            Self::Balance => write!(f, "balance sheet"),
        }
    }
}

/// A single statement value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// A reported number.
    Number(f64),
    /// A value the provider returned that is not a number.
    Text(String),
    /// The provider reported nothing for this line item and period.
    #[default]
    Missing,
}

impl Cell {
    /// Returns the numeric value, if this cell holds one.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Missing, Self::Number)
    }
}

/// A financial statement: line items by reporting period.
///
/// Row order follows insertion order of the first value for each line item,
/// so tables keep the provider's natural statement layout. Columns are kept
/// sorted; [`latest_period`](Self::latest_period) is their maximum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    line_items: Vec<String>,
    periods: BTreeSet<ReportingPeriod>,
    cells: BTreeMap<String, BTreeMap<ReportingPeriod, Cell>>,
}

impl StatementTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell, returning the table (builder style).
    #[must_use]
    pub fn with_cell(
        mut self,
        line_item: impl Into<String>,
        period: ReportingPeriod,
        cell: impl Into<Cell>,
    ) -> Self {
        self.insert(line_item, period, cell);
        self
    }

    /// Adds or replaces a cell.
    ///
    /// Used by providers while assembling a table; a later value for the same
    /// line item and period replaces the earlier one.
    pub fn insert(
        &mut self,
        line_item: impl Into<String>,
        period: ReportingPeriod,
        cell: impl Into<Cell>,
    ) {
        let line_item = line_item.into();
        self.periods.insert(period);
        let row = self.cells.entry(line_item.clone()).or_insert_with(|| {
            self.line_items.push(line_item);
            BTreeMap::new()
        });
        row.insert(period, cell.into());
    }

    /// Returns true if the table has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty() || self.periods.is_empty()
    }

    /// Returns `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.line_items.len(), self.periods.len())
    }

    /// Returns the line item names in statement order.
    #[must_use]
    pub fn line_items(&self) -> &[String] {
        &self.line_items
    }

    /// Returns the reporting periods in ascending order.
    pub fn periods(&self) -> impl DoubleEndedIterator<Item = &ReportingPeriod> + '_ {
        self.periods.iter()
    }

    /// Returns true if `period` is one of the table's columns.
    #[must_use]
    pub fn has_period(&self, period: &ReportingPeriod) -> bool {
        self.periods.contains(period)
    }

    /// Returns the latest reporting period, or `None` for an empty table.
    #[must_use]
    pub fn latest_period(&self) -> Option<ReportingPeriod> {
        self.periods.last().copied()
    }

    /// Returns the cell at `line_item` and `period`, if both exist.
    #[must_use]
    pub fn cell(&self, line_item: &str, period: &ReportingPeriod) -> Option<&Cell> {
        self.cells.get(line_item)?.get(period)
    }

    /// Returns every cell of a row, keyed by period.
    #[must_use]
    pub fn row(&self, line_item: &str) -> Option<&BTreeMap<ReportingPeriod, Cell>> {
        self.cells.get(line_item)
    }

    /// Converts the table to a DataFrame.
    ///
    /// Columns: `line_item`, then one `f64` column per period (named by the
    /// period's display form). Non-numeric and missing cells become null.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.periods.len() + 1);
        columns.push(Column::new(
            "line_item".into(),
            self.line_items.iter().map(String::as_str).collect::<Vec<_>>(),
        ));

        for period in &self.periods {
            let values: Vec<Option<f64>> = self
                .line_items
                .iter()
                .map(|item| self.cell(item, period).and_then(Cell::as_f64))
                .collect();
            columns.push(Column::new(period.to_string().into(), values));
        }

        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatementTable {
        StatementTable::new()
            .with_cell("Revenue", ReportingPeriod::annual(2023), 383_285_000_000.0)
            .with_cell("Revenue", ReportingPeriod::annual(2024), 391_035_000_000.0)
            .with_cell("Gross Profit", ReportingPeriod::annual(2024), 180_683_000_000.0)
            .with_cell("Filing", ReportingPeriod::annual(2024), Cell::Text("10-K".into()))
    }

    #[test]
    fn test_shape_and_order() {
        let table = sample();
        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.line_items(), ["Revenue", "Gross Profit", "Filing"]);
        assert_eq!(table.latest_period(), Some(ReportingPeriod::annual(2024)));
        assert!(!table.is_empty());
    }

    #[test]
    fn test_cell_lookup() {
        let table = sample();
        let latest = ReportingPeriod::annual(2024);
        assert_eq!(
            table.cell("Revenue", &latest).and_then(Cell::as_f64),
            Some(391_035_000_000.0)
        );
        assert!(table.cell("Gross Profit", &ReportingPeriod::annual(2023)).is_none());
        assert!(table.cell("revenue", &latest).is_none());
        assert_eq!(table.cell("Filing", &latest).and_then(Cell::as_f64), None);
    }

    #[test]
    fn test_empty_table() {
        let table = StatementTable::new();
        assert!(table.is_empty());
        assert_eq!(table.shape(), (0, 0));
        assert_eq!(table.latest_period(), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = StatementTable::new();
        let period = ReportingPeriod::annual(2024);
        table.insert("Revenue", period, Cell::Missing);
        table.insert("Revenue", period, 10.0);
        assert_eq!(table.shape(), (1, 1));
        assert_eq!(table.cell("Revenue", &period), Some(&Cell::Number(10.0)));
    }

    #[test]
    fn test_to_dataframe() {
        let df = sample().to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, ["line_item", "2023", "2024"]);
    }
}
