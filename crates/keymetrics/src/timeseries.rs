//! Per-period metric history.
//!
//! Unlike the snapshot table, time series values are kept as decimal ratios
//! (no percentage scaling) so they can be plotted or compared directly.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use keymetrics_core::{DataError, ReportingPeriod, Result, StatementTable, Symbol};
use polars::prelude::*;
use tracing::debug;

use crate::definition::{MetricDefinition, default_definitions};
use crate::evaluator::MetricEvaluator;
use crate::fetcher::StatementFetcher;

/// How many of the most recent periods to keep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodSelection {
    /// Every period.
    #[default]
    All,
    /// Only the most recent period.
    Latest,
    /// The `n` most recent periods.
    Last(usize),
}

impl PeriodSelection {
    /// Returns how many trailing rows to keep out of `len`.
    #[must_use]
    pub fn keep(&self, len: usize) -> usize {
        match *self {
            Self::All => len,
            Self::Latest => len.min(1),
            Self::Last(n) => len.min(n),
        }
    }
}

impl FromStr for PeriodSelection {
    type Err = DataError;

    /// Parses `all` (or empty), `latest` / `last` / `1`, or a positive count.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "latest" | "last" | "1" => Ok(Self::Latest),
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Self::Last(n)),
                _ => Err(DataError::InvalidParameter(format!(
                    "invalid period selection '{s}': expected all, latest or a positive count"
                ))),
            },
        }
    }
}

impl fmt::Display for PeriodSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Latest => write!(f, "latest"),
            Self::Last(n) => write!(f, "{n}"),
        }
    }
}

/// Options for [`get_key_metrics_timeseries`] and [`compare_companies`](crate::compare_companies).
#[derive(Clone, Debug)]
pub struct TimeSeriesOptions {
    /// Metrics to compute, in column order.
    pub definitions: Vec<MetricDefinition>,
    /// Trailing periods to keep.
    pub selection: PeriodSelection,
    /// Emit diagnostic tracing.
    pub inspect: bool,
}

impl Default for TimeSeriesOptions {
    fn default() -> Self {
        Self {
            definitions: default_definitions(),
            selection: PeriodSelection::All,
            inspect: false,
        }
    }
}

impl TimeSeriesOptions {
    /// Replace the metric set.
    #[must_use]
    pub fn with_definitions(mut self, definitions: Vec<MetricDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    /// Set the period selection.
    #[must_use]
    pub const fn with_selection(mut self, selection: PeriodSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Enable or disable diagnostic tracing.
    #[must_use]
    pub const fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }
}

/// Metric values by period, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    periods: Vec<ReportingPeriod>,
    columns: Vec<(String, Vec<f64>)>,
}

impl TimeSeries {
    /// Returns the periods, oldest first.
    #[must_use]
    pub fn periods(&self) -> &[ReportingPeriod] {
        &self.periods
    }

    /// Returns the column keys in definition order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Returns one metric's values, aligned with [`periods`](Self::periods).
    #[must_use]
    pub fn column(&self, key: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the value of one metric at one period.
    #[must_use]
    pub fn value(&self, key: &str, period: &ReportingPeriod) -> Option<f64> {
        let index = self.periods.iter().position(|p| p == period)?;
        self.column(key).map(|values| values[index])
    }

    /// Returns the number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Returns true if there are no periods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Converts to a DataFrame: a `year` column, then one `f64` column per metric.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Column::new(
            "year".into(),
            self.periods
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>(),
        ));
        for (name, values) in &self.columns {
            columns.push(Column::new(name.as_str().into(), values.clone()));
        }
        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}

/// Computes every definition at every period either statement reports.
///
/// Values are decimal ratios, NaN where not computable.
#[must_use]
pub fn compute_timeseries(
    income: &StatementTable,
    balance: &StatementTable,
    definitions: &[MetricDefinition],
    selection: PeriodSelection,
) -> TimeSeries {
    let all: BTreeSet<ReportingPeriod> = income.periods().chain(balance.periods()).copied().collect();
    let skip = all.len() - selection.keep(all.len());
    let periods: Vec<ReportingPeriod> = all.into_iter().skip(skip).collect();

    let evaluator = MetricEvaluator::new();
    let columns = definitions
        .iter()
        .map(|definition| {
            let values = periods
                .iter()
                .map(|period| evaluator.raw_value(definition, income, balance, period))
                .collect();
            (definition.series_key(), values)
        })
        .collect();

    TimeSeries { periods, columns }
}

/// Fetches a company's statements and computes its metric history.
///
/// Never fails: when no provider has data the series is empty.
pub async fn get_key_metrics_timeseries(
    symbol: impl Into<Symbol>,
    fetcher: &StatementFetcher,
    options: &TimeSeriesOptions,
) -> TimeSeries {
    let symbol = symbol.into();
    let inspect = options.inspect || fetcher.is_inspecting();
    let outcome = fetcher.fetch_traced(&symbol, inspect).await;

    let series = compute_timeseries(
        &outcome.income,
        &outcome.balance,
        &options.definitions,
        options.selection,
    );
    if inspect {
        debug!(
            symbol = %symbol,
            provider = outcome.provider_label(),
            periods = series.len(),
            "Computed time series"
        );
    }
    series
}
