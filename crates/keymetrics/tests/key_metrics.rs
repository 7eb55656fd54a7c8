//! Integration tests for the fetch, evaluate and format pipeline

use std::sync::Arc;

use approx::assert_relative_eq;
use async_trait::async_trait;
use keymetrics::{
    DataError, DataProvider, KeyMetricsOptions, MetricDefinition, PeriodSelection, PeriodType,
    ReportingPeriod, Result, StatementFetcher, StatementProvider, StatementTable, Symbol,
    TimeSeriesOptions, UNAVAILABLE_PERIOD, Unit, compare_companies, default_definitions, evaluate,
    format_results, get_key_metrics, get_key_metrics_timeseries, mvp_definitions,
};

/// Provider serving fixed statements, or failing every request.
#[derive(Debug)]
struct FixedProvider {
    name: &'static str,
    statements: Option<(StatementTable, StatementTable)>,
}

impl FixedProvider {
    fn serving(name: &'static str, income: StatementTable, balance: StatementTable) -> Arc<Self> {
        Arc::new(Self {
            name,
            statements: Some((income, balance)),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            statements: None,
        })
    }
}

impl DataProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "fixed statements for tests"
    }

    fn supported_periods(&self) -> &[PeriodType] {
        &[PeriodType::Annual]
    }
}

#[async_trait]
impl StatementProvider for FixedProvider {
    async fn income_statement(&self, _: &Symbol, _: PeriodType) -> Result<StatementTable> {
        self.statements
            .as_ref()
            .map(|(income, _)| income.clone())
            .ok_or_else(|| DataError::AuthenticationFailed(self.name.to_string()))
    }

    async fn balance_sheet(&self, _: &Symbol, _: PeriodType) -> Result<StatementTable> {
        self.statements
            .as_ref()
            .map(|(_, balance)| balance.clone())
            .ok_or_else(|| DataError::AuthenticationFailed(self.name.to_string()))
    }
}

fn fy(year: i32) -> ReportingPeriod {
    ReportingPeriod::annual(year)
}

fn income() -> StatementTable {
    StatementTable::new()
        .with_cell("Revenue", fy(2023), 170_000_000_000.0)
        .with_cell("Revenue", fy(2024), 184_992_000_000.0)
        .with_cell("Gross Profit", fy(2023), 14_000_000_000.0)
        .with_cell("Gross Profit", fy(2024), 15_506_000_000.0)
        .with_cell("Operating Income", fy(2024), 5_000_000_000.0)
        .with_cell("Net Income", fy(2024), 4_000_000_000.0)
}

fn balance() -> StatementTable {
    StatementTable::new()
        .with_cell("Total Liabilities", fy(2024), 240_338_000_000.0)
        .with_cell("Total Assets", fy(2024), 285_196_000_000.0)
        .with_cell("Total Stockholders Equity", fy(2024), 44_858_000_000.0)
}

#[test]
fn test_one_result_per_definition_in_order() {
    let definitions: Vec<MetricDefinition> = default_definitions().into_iter().rev().collect();
    for (income, balance) in [
        (income(), balance()),
        (StatementTable::new(), balance()),
        (StatementTable::new(), StatementTable::new()),
    ] {
        let results = evaluate(&income, &balance, &definitions, None);
        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        let expected: Vec<&str> = definitions.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, expected);
    }
}

#[test]
fn test_field_absent_from_both_tables_is_nan() {
    let results = evaluate(&income(), &balance(), &default_definitions(), None);
    let current = results.iter().find(|r| r.key == "CurrentRatio").unwrap();
    assert!(current.value.is_nan());
}

#[test]
fn test_zero_divisor_with_nonzero_numerator_is_nan() {
    let balance = StatementTable::new()
        .with_cell("Total Liabilities", fy(2024), 10.0)
        .with_cell("Total Assets", fy(2024), 0.0);
    let results = evaluate(&StatementTable::new(), &balance, &mvp_definitions(), None);
    assert!(results[1].value.is_nan());
}

#[test]
fn test_gross_margin_scenario() {
    let income = StatementTable::new()
        .with_cell("Revenue", fy(2024), 184_992_000_000.0)
        .with_cell("Gross Profit", fy(2024), 15_506_000_000.0);
    let results = evaluate(&income, &StatementTable::new(), &mvp_definitions(), None);

    let gm = &results[0];
    assert_relative_eq!(gm.value, 8.381984085798305, max_relative = 1e-12);
    assert_eq!(gm.period.map(|p| p.to_string()).as_deref(), Some("2024"));
    assert_eq!(gm.unit, Unit::Percent);
}

#[test]
fn test_debt_ratio_scenario() {
    let balance = StatementTable::new()
        .with_cell("Total Liabilities", fy(2024), 240_338_000_000.0)
        .with_cell("Total Assets", fy(2024), 285_196_000_000.0);
    let results = evaluate(&StatementTable::new(), &balance, &mvp_definitions(), None);

    let dr = &results[1];
    assert_eq!(dr.key, "DebtRatio");
    assert_relative_eq!(dr.value, 84.271167898568, max_relative = 1e-12);
    assert_eq!(dr.period, Some(fy(2024)));
    assert_eq!(dr.unit.to_string(), "%");
}

#[test]
fn test_evaluate_is_idempotent() {
    let (income, balance) = (income(), balance());
    let definitions = default_definitions();
    let first = evaluate(&income, &balance, &definitions, None);
    let second = evaluate(&income, &balance, &definitions, None);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.value.to_bits(), b.value.to_bits());
        assert_eq!(a.period, b.period);
        assert_eq!(a.key, b.key);
    }
}

#[test]
fn test_formatter_is_total() {
    let results = evaluate(
        &StatementTable::new(),
        &StatementTable::new(),
        &default_definitions(),
        None,
    );
    let table = format_results(&results);
    assert_eq!(table.len(), results.len());
    assert!(table.rows().iter().all(|row| row.period == UNAVAILABLE_PERIOD));
    assert_eq!(table.to_dataframe().unwrap().shape(), (6, 5));
}

#[tokio::test]
async fn test_fallback_to_second_provider() {
    let fetcher = StatementFetcher::new()
        .with_provider(FixedProvider::serving(
            "A",
            StatementTable::new(),
            StatementTable::new(),
        ))
        .with_provider(FixedProvider::serving("B", income(), balance()));

    let outcome = fetcher.fetch(&Symbol::new("aapl")).await;
    assert_eq!(outcome.provider.as_deref(), Some("B"));
    assert_eq!(outcome.income, income());
    assert_eq!(outcome.balance, balance());
}

#[tokio::test]
async fn test_get_key_metrics_end_to_end() {
    let fetcher = StatementFetcher::new()
        .with_provider(FixedProvider::failing("A"))
        .with_provider(FixedProvider::serving("B", income(), balance()));

    let table = get_key_metrics("AAPL", &fetcher, &KeyMetricsOptions::default()).await;

    assert_eq!(table.source(), Some("B"));
    assert_eq!(table.len(), 2);
    let gm = table.get("Gross Margin").unwrap();
    assert_relative_eq!(gm.value, 8.381984085798305, max_relative = 1e-12);
    assert_eq!(gm.period, "2024");
    let dr = table.get("Debt Ratio").unwrap();
    assert_relative_eq!(dr.value, 84.271167898568, max_relative = 1e-12);
}

#[tokio::test]
async fn test_get_key_metrics_all_providers_fail() {
    let fetcher = StatementFetcher::new()
        .with_provider(FixedProvider::failing("A"))
        .with_provider(FixedProvider::failing("B"))
        .with_inspect(true);

    let options = KeyMetricsOptions::default().with_mvp_only(false);
    let table = get_key_metrics("AAPL", &fetcher, &options).await;

    assert_eq!(table.len(), default_definitions().len());
    assert!(table.rows().iter().all(|row| row.value.is_nan()));
    assert_eq!(table.source(), Some("none"));
}

#[tokio::test]
async fn test_timeseries_and_comparison() {
    let fetcher = StatementFetcher::new().with_provider(FixedProvider::serving(
        "B",
        income(),
        balance(),
    ));
    let options = TimeSeriesOptions::default().with_selection(PeriodSelection::Last(2));

    let series = get_key_metrics_timeseries("AAPL", &fetcher, &options).await;
    assert_eq!(series.periods(), [fy(2023), fy(2024)]);
    assert_relative_eq!(
        series.value("gross_margin", &fy(2024)).unwrap(),
        15_506_000_000.0 / 184_992_000_000.0
    );

    let comparison = compare_companies(
        &[Symbol::new("AAPL"), Symbol::new("MSFT")],
        &fetcher,
        &options,
    )
    .await
    .unwrap();
    assert_eq!(comparison.len(), default_definitions().len());
    let roe = comparison.get("roe").unwrap();
    assert_eq!(roe.companies().count(), 2);
}
