//! Side-by-side metric history for several companies.

use std::collections::BTreeSet;

use keymetrics_core::{DataError, ReportingPeriod, Result, Symbol};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::fetcher::StatementFetcher;
use crate::timeseries::{TimeSeries, TimeSeriesOptions, get_key_metrics_timeseries};

/// One metric across companies: period rows by company columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComparisonTable {
    periods: Vec<ReportingPeriod>,
    companies: Vec<(Symbol, Vec<f64>)>,
}

impl ComparisonTable {
    /// Returns the periods, oldest first.
    #[must_use]
    pub fn periods(&self) -> &[ReportingPeriod] {
        &self.periods
    }

    /// Returns the companies in request order.
    pub fn companies(&self) -> impl Iterator<Item = &Symbol> {
        self.companies.iter().map(|(symbol, _)| symbol)
    }

    /// Returns one company's values, aligned with [`periods`](Self::periods).
    #[must_use]
    pub fn values(&self, symbol: &Symbol) -> Option<&[f64]> {
        self.companies
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, values)| values.as_slice())
    }

    /// Converts to a DataFrame: a `year` column, then one column per ticker.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.companies.len() + 1);
        columns.push(Column::new(
            "year".into(),
            self.periods
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>(),
        ));
        for (symbol, values) in &self.companies {
            columns.push(Column::new(symbol.as_str().into(), values.clone()));
        }
        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}

/// Per-metric comparison tables, in definition order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comparison {
    metrics: Vec<(String, ComparisonTable)>,
}

impl Comparison {
    /// Returns the metric keys (`gross_margin`, ...).
    pub fn metric_keys(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(key, _)| key.as_str())
    }

    /// Returns the table for one metric key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ComparisonTable> {
        self.metrics
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, table)| table)
    }

    /// Iterates `(metric key, table)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComparisonTable)> {
        self.metrics.iter().map(|(key, table)| (key.as_str(), table))
    }

    /// Returns the number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Returns true if there are no metrics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Aligns per-company series on period.
///
/// Companies with an empty series are left out.
#[must_use]
pub fn align_series(series: &[(Symbol, TimeSeries)]) -> Comparison {
    let present: Vec<&(Symbol, TimeSeries)> = series.iter().filter(|(_, s)| !s.is_empty()).collect();
    let Some((_, first)) = present.first() else {
        return Comparison::default();
    };

    let periods: Vec<ReportingPeriod> = present
        .iter()
        .flat_map(|(_, s)| s.periods().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let metrics = first
        .column_names()
        .map(|key| {
            let companies = present
                .iter()
                .map(|(symbol, s)| {
                    let values = periods
                        .iter()
                        .map(|period| s.value(key, period).unwrap_or(f64::NAN))
                        .collect();
                    (symbol.clone(), values)
                })
                .collect();
            (
                key.to_string(),
                ComparisonTable {
                    periods: periods.clone(),
                    companies,
                },
            )
        })
        .collect();

    Comparison { metrics }
}

/// Fetches several companies one after another and aligns their metric history.
///
/// # Errors
///
/// [`DataError::InvalidParameter`] for an empty symbol list and
/// [`DataError::DataNotAvailable`] when no company has any data.
pub async fn compare_companies(
    symbols: &[Symbol],
    fetcher: &StatementFetcher,
    options: &TimeSeriesOptions,
) -> Result<Comparison> {
    if symbols.is_empty() {
        return Err(DataError::InvalidParameter(
            "at least one symbol is required".into(),
        ));
    }

    let inspect = options.inspect || fetcher.is_inspecting();
    let mut series = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let s = get_key_metrics_timeseries(symbol.clone(), fetcher, options).await;
        if s.is_empty() {
            if inspect {
                warn!(symbol = %symbol, "No data, skipping company");
            }
            continue;
        }
        if inspect {
            debug!(symbol = %symbol, periods = s.len(), "Loaded company");
        }
        series.push((symbol.clone(), s));
    }

    if series.is_empty() {
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        return Err(DataError::DataNotAvailable {
            symbol: names.join(","),
            reason: "no valid data for any symbol".into(),
        });
    }

    Ok(align_series(&series))
}
