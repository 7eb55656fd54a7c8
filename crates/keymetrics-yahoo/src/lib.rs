#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keymetrics/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance statement provider.
//!
//! This crate provides a Yahoo Finance provider that implements the
//! [`DataProvider`] and [`StatementProvider`] traits from `keymetrics-core`.
//!
//! # Features
//!
//! - Income statements and balance sheets from the fundamentals time series API
//! - No API key required
//! - Built-in rate limiting (1 request per second by default)
//!
//! # Example
//!
//! ```no_run
//! use keymetrics_yahoo::YahooProvider;
//! use keymetrics_core::{PeriodType, StatementProvider, Symbol};
//!
//! # async fn example() -> keymetrics_core::Result<()> {
//! let provider = YahooProvider::new();
//! let symbol = Symbol::new("AAPL");
//!
//! let balance = provider.balance_sheet(&symbol, PeriodType::Annual).await?;
//! println!("Fetched {:?} (rows, periods)", balance.shape());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use keymetrics_core::{
    Cell, DataError, DataProvider, PeriodType, ReportingPeriod, Result, StatementKind,
    StatementProvider, StatementTable, Symbol,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Yahoo Finance fundamentals time series API base URL.
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";

/// Earliest timestamp requested (mid 1985), covering every listed history.
const HISTORY_START_TS: i64 = 493_590_046;

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Income statement series, as `(Yahoo series, line item)`.
const INCOME_SERIES: &[(&str, &str)] = &[
    ("TotalRevenue", "Revenue"),
    ("CostOfRevenue", "Cost of Goods Sold"),
    ("GrossProfit", "Gross Profit"),
    ("OperatingExpense", "Operating Expenses"),
    ("OperatingIncome", "Operating Income"),
    ("InterestExpense", "Interest Expense"),
    ("EBITDA", "EBITDA"),
    ("PretaxIncome", "Income Before Tax"),
    ("TaxProvision", "Income Tax Expense"),
    ("NetIncome", "Net Income"),
    ("BasicEPS", "EPS"),
    ("DilutedEPS", "EPS Diluted"),
];

/// Balance sheet series, as `(Yahoo series, line item)`.
const BALANCE_SERIES: &[(&str, &str)] = &[
    ("CashAndCashEquivalents", "Cash and Cash Equivalents"),
    ("AccountsReceivable", "Accounts Receivable"),
    ("Inventory", "Inventory"),
    ("CurrentAssets", "Total Current Assets"),
    ("TotalAssets", "Total Assets"),
    ("AccountsPayable", "Accounts Payable"),
    ("CurrentLiabilities", "Total Current Liabilities"),
    ("LongTermDebt", "Long Term Debt"),
    ("TotalDebt", "Total Debt"),
    (
        "TotalLiabilitiesNetMinorityInterest",
        "Total Liabilities Net Minority Interest",
    ),
    ("StockholdersEquity", "Stockholders Equity"),
    ("TotalEquityGrossMinorityInterest", "Total Equity"),
];

/// Yahoo Finance statement provider.
///
/// Implements [`DataProvider`] and [`StatementProvider`].
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    /// Create a new Yahoo Finance provider with a custom HTTP client.
    ///
    /// Uses the provided client for all HTTP requests. Rate limiting
    /// is still applied.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Create a new Yahoo Finance provider with custom rate limiting.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            rate_limit_ms: rate_limit.as_millis() as u64,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        let now = unix_millis();
        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time.store(unix_millis(), Ordering::Relaxed);
    }

    /// Build the time series API URL for one statement.
    fn build_timeseries_url(
        &self,
        symbol: &Symbol,
        series: &[(&str, &str)],
        period_type: PeriodType,
        until_ts: i64,
    ) -> String {
        let prefix = series_prefix(period_type);
        let types = series
            .iter()
            .map(|(name, _)| format!("{prefix}{name}"))
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}/{}?symbol={}&type={}&period1={}&period2={}",
            TIMESERIES_URL,
            symbol.as_str(),
            symbol.as_str(),
            types,
            HISTORY_START_TS,
            until_ts
        )
    }

    /// Fetch and convert one statement.
    async fn fetch_statement(
        &self,
        kind: StatementKind,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        self.apply_rate_limit().await;

        let series = match kind {
            StatementKind::Income => INCOME_SERIES,
            StatementKind::Balance => BALANCE_SERIES,
        };
        let url = self.build_timeseries_url(symbol, series, period_type, Utc::now().timestamp());
        debug!("Fetching {}: {}", kind, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "Yahoo Finance".to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationFailed("Yahoo Finance".to_string()));
        }

        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {} for {}", status, symbol)));
        }

        let body: TimeseriesResponse = response
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        parse_timeseries(body, series, period_type)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn description(&self) -> &str {
        "Yahoo Finance fundamentals (free, may rate limit)"
    }

    fn supported_periods(&self) -> &[PeriodType] {
        &[PeriodType::Annual, PeriodType::Quarterly]
    }
}

#[async_trait]
impl StatementProvider for YahooProvider {
    async fn income_statement(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        self.fetch_statement(StatementKind::Income, symbol, period_type)
            .await
    }

    async fn balance_sheet(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        self.fetch_statement(StatementKind::Balance, symbol, period_type)
            .await
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

const fn series_prefix(period_type: PeriodType) -> &'static str {
    match period_type {
        PeriodType::Annual => "annual",
        PeriodType::Quarterly => "quarterly",
    }
}

/// Convert a time series response into a statement table.
///
/// Line items keep the order of `series`. Series Yahoo does not return are
/// simply absent from the table.
fn parse_timeseries(
    response: TimeseriesResponse,
    series: &[(&str, &str)],
    period_type: PeriodType,
) -> Result<StatementTable> {
    if let Some(error) = response.timeseries.error {
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let prefix = series_prefix(period_type);
    let mut by_type: HashMap<String, Vec<Option<SeriesPoint>>> = HashMap::new();

    for mut result in response.timeseries.result {
        let Some(series_type) = result.meta.series_type.into_iter().next() else {
            continue;
        };
        let Some(points) = result.values.remove(&series_type) else {
            continue;
        };
        match serde_json::from_value::<Vec<Option<SeriesPoint>>>(points) {
            Ok(points) => {
                by_type.insert(series_type, points);
            }
            Err(e) => warn!(series = %series_type, error = %e, "Skipping malformed series"),
        }
    }

    let mut table = StatementTable::new();
    for (name, line_item) in series {
        let Some(points) = by_type.get(&format!("{prefix}{name}")) else {
            continue;
        };

        for point in points.iter().flatten() {
            let Ok(date) = NaiveDate::parse_from_str(&point.as_of_date, "%Y-%m-%d") else {
                continue;
            };
            let period = ReportingPeriod::from_date(date, period_type);
            let cell = point
                .reported_value
                .as_ref()
                .and_then(|v| v.raw)
                .map_or(Cell::Missing, Cell::Number);
            table.insert(*line_item, period, cell);
        }
    }

    Ok(table)
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Fundamentals time series API response.
#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesResult,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResult {
    #[serde(default)]
    result: Vec<SeriesResult>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

/// One series; the values live under a key equal to the series type.
#[derive(Debug, Deserialize)]
struct SeriesResult {
    meta: SeriesMeta,
    #[serde(flatten)]
    values: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SeriesMeta {
    #[serde(rename = "type", default)]
    series_type: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesPoint {
    as_of_date: String,
    reported_value: Option<ReportedValue>,
}

#[derive(Debug, Deserialize)]
struct ReportedValue {
    raw: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "timeseries": {
            "result": [
                {
                    "meta": {"symbol": ["AAPL"], "type": ["annualTotalAssets"]},
                    "timestamp": [1696032000, 1727654400],
                    "annualTotalAssets": [
                        {"asOfDate": "2023-09-30", "periodType": "12M",
                         "reportedValue": {"raw": 352583000000, "fmt": "352.58B"}},
                        {"asOfDate": "2024-09-30", "periodType": "12M",
                         "reportedValue": {"raw": 364980000000, "fmt": "364.98B"}}
                    ]
                },
                {
                    "meta": {"symbol": ["AAPL"], "type": ["annualTotalLiabilitiesNetMinorityInterest"]},
                    "timestamp": [1727654400],
                    "annualTotalLiabilitiesNetMinorityInterest": [
                        null,
                        {"asOfDate": "2024-09-30", "periodType": "12M",
                         "reportedValue": {"raw": 308030000000, "fmt": "308.03B"}}
                    ]
                },
                {
                    "meta": {"symbol": ["AAPL"], "type": ["annualInventory"]}
                }
            ],
            "error": null
        }
    }"#;

    #[test]
    fn test_build_timeseries_url() {
        let provider = YahooProvider::new();
        let symbol = Symbol::new("AAPL");

        let url = provider.build_timeseries_url(
            &symbol,
            INCOME_SERIES,
            PeriodType::Annual,
            1_735_689_600,
        );

        assert!(url.contains("/AAPL?symbol=AAPL"));
        assert!(url.contains("annualTotalRevenue,annualCostOfRevenue"));
        assert!(url.ends_with("&period2=1735689600"));
    }

    #[test]
    fn test_quarterly_prefix() {
        let provider = YahooProvider::new();
        let url = provider.build_timeseries_url(
            &Symbol::new("MSFT"),
            BALANCE_SERIES,
            PeriodType::Quarterly,
            0,
        );
        assert!(url.contains("quarterlyTotalAssets"));
        assert!(!url.contains("annual"));
    }

    #[test]
    fn test_parse_timeseries() {
        let response: TimeseriesResponse = serde_json::from_str(SAMPLE).unwrap();
        let table = parse_timeseries(response, BALANCE_SERIES, PeriodType::Annual).unwrap();

        let latest = ReportingPeriod::annual(2024);
        assert_eq!(table.latest_period(), Some(latest));
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(
            table.line_items(),
            ["Total Assets", "Total Liabilities Net Minority Interest"]
        );
        assert_eq!(
            table.cell("Total Liabilities Net Minority Interest", &latest),
            Some(&Cell::Number(308_030_000_000.0))
        );
        assert!(
            table
                .cell(
                    "Total Liabilities Net Minority Interest",
                    &ReportingPeriod::annual(2023)
                )
                .is_none()
        );
    }

    #[test]
    fn test_parse_api_error() {
        let response: TimeseriesResponse = serde_json::from_str(
            r#"{"timeseries": {"result": [], "error": {"code": "Bad Request", "description": "Invalid symbol"}}}"#,
        )
        .unwrap();
        let result = parse_timeseries(response, INCOME_SERIES, PeriodType::Annual);
        assert!(matches!(result, Err(DataError::Other(_))));
    }

    #[test]
    fn test_provider_info() {
        let provider = YahooProvider::new();

        assert_eq!(provider.name(), "Yahoo Finance");
        assert!(provider.supported_periods().contains(&PeriodType::Annual));
    }

    #[test]
    fn test_default() {
        let provider = YahooProvider::default();
        assert_eq!(provider.name(), "Yahoo Finance");
    }
}
