#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keymetrics/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Key financial ratios from statement providers with fallback.
//!
//! This crate re-exports the core types and provider implementations and
//! wires them into a three-step pipeline:
//!
//! 1. [`StatementFetcher`] tries providers in order until one returns data.
//! 2. [`MetricEvaluator`] computes each [`MetricDefinition`] at the latest period.
//! 3. [`format_results`] turns the results into a fixed-shape [`MetricTable`].
//!
//! # Features
//!
//! - `fmp` - Financial Modeling Prep provider
//! - `yahoo` - Yahoo Finance provider
//!
//! # Example
//!
//! ```rust,ignore
//! use keymetrics::{KeyMetricsOptions, StatementFetcher, get_key_metrics};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = StatementFetcher::default_chain(std::env::var("FMP_API_KEY").ok());
//!     let table = get_key_metrics("AAPL", &fetcher, &KeyMetricsOptions::default()).await;
//!     println!("{table}");
//! }
//! ```

// Core types and traits
pub use keymetrics_core::*;

// Providers
#[cfg(feature = "fmp")]
pub use keymetrics_fmp::FmpProvider;
#[cfg(feature = "yahoo")]
pub use keymetrics_yahoo::YahooProvider;

mod compare;
pub mod definition;
mod evaluator;
mod fetcher;
mod format;
pub mod policy;
mod timeseries;

pub use compare::{Comparison, ComparisonTable, align_series, compare_companies};
pub use definition::{
    FieldRef, Formula, MVP_KEYS, MetricCategory, MetricDefinition, PercentScaling, Unit,
    default_definitions, load_definitions, mvp_definitions, parse_definitions,
};
pub use evaluator::{MetricEvaluator, MetricResult, evaluate};
pub use fetcher::{FetchOutcome, NO_PROVIDER, ProviderAttempt, StatementFetcher};
pub use format::{COLUMNS, MetricRow, MetricTable, UNAVAILABLE_PERIOD, format_results};
pub use timeseries::{
    PeriodSelection, TimeSeries, TimeSeriesOptions, compute_timeseries,
    get_key_metrics_timeseries,
};

use tracing::debug;

/// Options for [`get_key_metrics`].
#[derive(Clone, Debug)]
pub struct KeyMetricsOptions {
    /// Metric definitions to evaluate (the default set unless replaced).
    pub definitions: Vec<MetricDefinition>,
    /// Restrict evaluation to [`MVP_KEYS`].
    pub mvp_only: bool,
    /// Emit diagnostic tracing from the fetcher and evaluator.
    pub inspect: bool,
    /// Read every metric at this period instead of the latest one.
    pub period: Option<ReportingPeriod>,
}

impl Default for KeyMetricsOptions {
    fn default() -> Self {
        Self {
            definitions: default_definitions(),
            mvp_only: true,
            inspect: false,
            period: None,
        }
    }
}

impl KeyMetricsOptions {
    /// Replace the metric set.
    #[must_use]
    pub fn with_definitions(mut self, definitions: Vec<MetricDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    /// Restrict (or not) to the minimal metric set.
    #[must_use]
    pub const fn with_mvp_only(mut self, mvp_only: bool) -> Self {
        self.mvp_only = mvp_only;
        self
    }

    /// Enable or disable diagnostic tracing.
    #[must_use]
    pub const fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    /// Evaluate at a fixed period.
    #[must_use]
    pub const fn with_period(mut self, period: ReportingPeriod) -> Self {
        self.period = Some(period);
        self
    }

    /// Returns the definitions that will be evaluated, in order.
    #[must_use]
    pub fn selected_definitions(&self) -> Vec<MetricDefinition> {
        self.definitions
            .iter()
            .filter(|d| !self.mvp_only || d.is_mvp())
            .cloned()
            .collect()
    }
}

/// Fetches a company's statements and returns its key metrics table.
///
/// The table always has one row per selected definition, in definition order.
/// Metrics that could not be computed carry NaN; if no provider had data every
/// value is NaN and the table's source is [`NO_PROVIDER`].
pub async fn get_key_metrics(
    symbol: impl Into<Symbol>,
    fetcher: &StatementFetcher,
    options: &KeyMetricsOptions,
) -> MetricTable {
    let symbol = symbol.into();
    let inspect = options.inspect || fetcher.is_inspecting();
    let outcome = fetcher.fetch_traced(&symbol, inspect).await;

    let definitions = options.selected_definitions();
    let results = MetricEvaluator::new().with_inspect(inspect).evaluate(
        &outcome.income,
        &outcome.balance,
        &definitions,
        options.period.as_ref(),
    );

    if inspect {
        let available = results.iter().filter(|r| r.is_available()).count();
        debug!(
            symbol = %symbol,
            provider = outcome.provider_label(),
            available,
            requested = results.len(),
            "Evaluated key metrics"
        );
    }

    format_results(&results).with_source(outcome.provider_label())
}
