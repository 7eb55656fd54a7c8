#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keymetrics/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial Modeling Prep (FMP) statement provider.
//!
//! This crate implements the keymetrics-core traits for the
//! [Financial Modeling Prep](https://financialmodelingprep.com/) API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use keymetrics_fmp::FmpProvider;
//! use keymetrics_core::{PeriodType, StatementProvider, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = FmpProvider::new("your_api_key");
//!     let symbol = Symbol::new("AAPL");
//!
//!     let income = provider.income_statement(&symbol, PeriodType::Annual).await?;
//!     println!("{:?}", income.shape());
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use keymetrics_core::{
    Cell, DataError, DataProvider, PeriodType, ReportingPeriod, Result, StatementKind,
    StatementProvider, StatementTable, Symbol,
};
use reqwest::Client;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Base URL for the FMP stable API.
const FMP_BASE_URL: &str = "https://financialmodelingprep.com/stable";

/// Per-request timeout; a stalled request fails like any network error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supported statement periods for FMP.
const SUPPORTED_PERIODS: &[PeriodType] = &[PeriodType::Annual, PeriodType::Quarterly];

/// Income statement fields, as `(FMP field, line item)`.
const INCOME_ITEMS: &[(&str, &str)] = &[
    ("revenue", "Revenue"),
    ("costOfRevenue", "Cost of Goods Sold"),
    ("grossProfit", "Gross Profit"),
    ("researchAndDevelopmentExpenses", "Research and Development Expenses"),
    ("sellingGeneralAndAdministrativeExpenses", "Selling, General and Administrative Expenses"),
    ("operatingExpenses", "Operating Expenses"),
    ("operatingIncome", "Operating Income"),
    ("interestExpense", "Interest Expense"),
    ("ebitda", "EBITDA"),
    ("incomeBeforeTax", "Income Before Tax"),
    ("incomeTaxExpense", "Income Tax Expense"),
    ("netIncome", "Net Income"),
    ("eps", "EPS"),
    ("epsDiluted", "EPS Diluted"),
    ("weightedAverageShsOut", "Weighted Average Shares"),
    ("weightedAverageShsOutDil", "Weighted Average Shares Diluted"),
];

/// Balance sheet fields, as `(FMP field, line item)`.
const BALANCE_ITEMS: &[(&str, &str)] = &[
    ("cashAndCashEquivalents", "Cash and Cash Equivalents"),
    ("shortTermInvestments", "Short Term Investments"),
    ("netReceivables", "Accounts Receivable"),
    ("inventory", "Inventory"),
    ("totalCurrentAssets", "Total Current Assets"),
    ("propertyPlantEquipmentNet", "Property, Plant and Equipment"),
    ("goodwill", "Goodwill"),
    ("totalNonCurrentAssets", "Total Non-Current Assets"),
    ("totalAssets", "Total Assets"),
    ("accountPayables", "Accounts Payable"),
    ("shortTermDebt", "Short Term Debt"),
    ("totalCurrentLiabilities", "Total Current Liabilities"),
    ("longTermDebt", "Long Term Debt"),
    ("totalNonCurrentLiabilities", "Total Non-Current Liabilities"),
    ("totalLiabilities", "Total Liabilities"),
    ("retainedEarnings", "Retained Earnings"),
    ("totalStockholdersEquity", "Total Stockholders Equity"),
    ("totalEquity", "Total Equity"),
    ("totalDebt", "Total Debt"),
    ("netDebt", "Net Debt"),
];

/// Financial Modeling Prep statement provider.
///
/// Provides annual and quarterly income statements and balance sheets.
/// The API key is optional at construction so the provider can sit in a
/// fallback chain unconditionally; without a key every request fails with
/// [`DataError::ProviderNotConfigured`].
#[derive(Clone)]
pub struct FmpProvider {
    client: Client,
    api_key: Option<String>,
}

impl fmt::Debug for FmpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmpProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl FmpProvider {
    /// Create a new FMP provider with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_optional_key(Some(api_key.into()))
    }

    /// Create a provider from a key that may be absent.
    ///
    /// Blank keys are treated as absent.
    #[must_use]
    pub fn with_optional_key(api_key: Option<String>) -> Self {
        Self {
            client: default_client(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Create a new FMP provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: Some(api_key.into()).filter(|k| !k.trim().is_empty()),
        }
    }

    /// Returns true if an API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build a URL with the API key appended.
    fn url(&self, endpoint: &str, api_key: &str) -> String {
        if endpoint.contains('?') {
            format!("{FMP_BASE_URL}/{endpoint}&apikey={api_key}")
        } else {
            format!("{FMP_BASE_URL}/{endpoint}?apikey={api_key}")
        }
    }

    /// Make a GET request and parse the JSON response.
    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::ProviderNotConfigured("FMP (no API key)".to_string()))?;
        let url = self.url(endpoint, api_key);
        debug!("FMP request: {}", endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "FMP".to_string(),
                retry_after: None,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationFailed("FMP".to_string()));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::Network(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        // FMP reports plan restrictions and bad keys in a 200 body
        if text.contains("\"Error Message\"") || text.contains("\"error\"") {
            return Err(DataError::Network(text));
        }

        serde_json::from_str(&text).map_err(|e| DataError::Parse(format!("{e}: {text}")))
    }

    /// Fetch raw statement records for one statement kind.
    async fn fetch_records(
        &self,
        kind: StatementKind,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<Vec<Map<String, Value>>> {
        let endpoint = statement_endpoint(kind, symbol, period_type);
        self.get(&endpoint).await
    }
}

impl DataProvider for FmpProvider {
    fn name(&self) -> &str {
        "FinancialModelingPrep"
    }

    fn description(&self) -> &str {
        "Financial Modeling Prep - Financial statements API (API key required)"
    }

    fn supported_periods(&self) -> &[PeriodType] {
        SUPPORTED_PERIODS
    }
}

#[async_trait]
impl StatementProvider for FmpProvider {
    async fn income_statement(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        let records = self
            .fetch_records(StatementKind::Income, symbol, period_type)
            .await?;
        Ok(statement_table(&records, INCOME_ITEMS, period_type))
    }

    async fn balance_sheet(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        let records = self
            .fetch_records(StatementKind::Balance, symbol, period_type)
            .await?;
        Ok(statement_table(&records, BALANCE_ITEMS, period_type))
    }
}

/// Build the HTTP client used when none is supplied.
fn default_client() -> Client {
    http_client(REQUEST_TIMEOUT)
}

/// Build an HTTP client whose requests fail after `timeout`.
fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        })
}

/// Build the endpoint path for a statement request.
fn statement_endpoint(kind: StatementKind, symbol: &Symbol, period_type: PeriodType) -> String {
    let statement = match kind {
        StatementKind::Income => "income-statement",
        StatementKind::Balance => "balance-sheet-statement",
    };
    let period = match period_type {
        PeriodType::Annual => "annual",
        PeriodType::Quarterly => "quarter",
    };
    format!("{statement}?symbol={}&period={period}", symbol.as_str())
}

// ============================================================================
// FMP Response Conversion
// ============================================================================

/// Convert FMP statement records into a statement table.
///
/// Records whose period cannot be determined are skipped.
fn statement_table(
    records: &[Map<String, Value>],
    items: &[(&str, &str)],
    period_type: PeriodType,
) -> StatementTable {
    let mut table = StatementTable::new();

    for record in records {
        let Some(period) = record_period(record, period_type) else {
            debug!("Skipping FMP record without a usable period");
            continue;
        };

        for (field, line_item) in items {
            table.insert(*line_item, period, json_cell(record.get(*field)));
        }
    }

    table
}

/// Determine the reporting period of an FMP record.
///
/// Prefers `fiscalYear` (stable API) or `calendarYear` (legacy API), with the
/// `period` field (`Q1`..`Q4`) for quarterly data, and falls back to the
/// statement `date`.
fn record_period(record: &Map<String, Value>, period_type: PeriodType) -> Option<ReportingPeriod> {
    let year = ["fiscalYear", "calendarYear"]
        .iter()
        .find_map(|key| match record.get(*key)? {
            Value::String(s) => s.trim().parse::<i32>().ok(),
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        });

    let date = record
        .get("date")
        .and_then(Value::as_str)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    match period_type {
        PeriodType::Annual => year
            .map(ReportingPeriod::annual)
            .or_else(|| date.map(|d| ReportingPeriod::from_date(d, period_type))),
        PeriodType::Quarterly => {
            let quarter = record
                .get("period")
                .and_then(Value::as_str)
                .and_then(|p| p.trim().strip_prefix('Q'))
                .and_then(|q| q.parse::<u8>().ok());
            match (year, quarter) {
                (Some(y), Some(q)) => ReportingPeriod::quarterly(y, q),
                _ => date.map(|d| ReportingPeriod::from_date(d, period_type)),
            }
        }
    }
}

/// Convert a JSON value into a statement cell.
fn json_cell(value: Option<&Value>) -> Cell {
    match value {
        Some(Value::Number(n)) => n.as_f64().map_or(Cell::Missing, Cell::Number),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_or_else(|_| Cell::Text(s.clone()), Cell::Number),
        Some(Value::Null) | None => Cell::Missing,
        Some(other) => Cell::Text(other.to_string()),
    }
}
