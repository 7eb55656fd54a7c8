//! Statement fetcher that walks an ordered provider list with fallback.

use std::sync::Arc;

use keymetrics_core::{DataError, PeriodType, StatementProvider, StatementTable, Symbol};
use tracing::{debug, warn};

/// Label used for [`FetchOutcome::provider_label`] when no provider succeeded.
pub const NO_PROVIDER: &str = "none";

/// Number of period columns shown in inspect output.
const INSPECT_PERIODS: usize = 30;

/// Number of line items shown in inspect output.
const INSPECT_LINE_ITEMS: usize = 60;

/// What happened when one provider was tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    /// Provider name.
    pub provider: String,
    /// `(rows, periods)` of the income statement (zero on failure).
    pub income_shape: (usize, usize),
    /// `(rows, periods)` of the balance sheet (zero on failure).
    pub balance_shape: (usize, usize),
    /// Retrieval errors, one per failed statement.
    pub failures: Vec<String>,
}

impl ProviderAttempt {
    /// Returns true if at least one of the two statements had data.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.income_shape.0 > 0 && self.income_shape.1 > 0
            || self.balance_shape.0 > 0 && self.balance_shape.1 > 0
    }
}

/// Result of a fetch: the two statements plus where they came from.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Income statement (empty if no provider had data).
    pub income: StatementTable,
    /// Balance sheet (empty if no provider had data).
    pub balance: StatementTable,
    /// Name of the provider that supplied the tables, `None` if all failed.
    pub provider: Option<String>,
    /// Every provider tried, in order.
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchOutcome {
    /// Returns the provider name, or [`NO_PROVIDER`].
    #[must_use]
    pub fn provider_label(&self) -> &str {
        self.provider.as_deref().unwrap_or(NO_PROVIDER)
    }

    /// Returns true if both statements are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.income.is_empty() && self.balance.is_empty()
    }
}

/// Fetches income statements and balance sheets with automatic fallback.
///
/// Providers are tried strictly in registration order. A provider counts as
/// usable when at least one of its two statements is non-empty; a retrieval
/// error counts as an empty statement, and a provider that does not serve the
/// configured [`PeriodType`] is skipped. Fetching never fails: when every
/// provider is exhausted the outcome holds two empty tables and no provider.
///
/// Diagnostic tracing is only emitted when inspect mode is enabled.
///
/// # Example
///
/// ```rust,ignore
/// use keymetrics::{StatementFetcher, Symbol};
///
/// let fetcher = StatementFetcher::new()
///     .with_fmp(std::env::var("FMP_API_KEY").ok())
///     .with_yahoo();
///
/// let outcome = fetcher.fetch(&Symbol::new("AAPL")).await;
/// println!("data source: {}", outcome.provider_label());
/// ```
#[derive(Clone, Default)]
pub struct StatementFetcher {
    providers: Vec<Arc<dyn StatementProvider>>,
    period_type: PeriodType,
    inspect: bool,
}

impl std::fmt::Debug for StatementFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementFetcher")
            .field("providers", &self.provider_names())
            .field("period_type", &self.period_type)
            .field("inspect", &self.inspect)
            .finish()
    }
}

impl StatementFetcher {
    /// Create a new fetcher with no providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher from an ordered provider list.
    #[must_use]
    pub fn with_providers(providers: Vec<Arc<dyn StatementProvider>>) -> Self {
        Self {
            providers,
            ..Default::default()
        }
    }

    /// Register a provider after the existing ones.
    pub fn register(&mut self, provider: Arc<dyn StatementProvider>) {
        debug!(provider = provider.name(), "Registering statement provider");
        self.providers.push(provider);
    }

    /// Append a provider (builder style).
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn StatementProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Set the statement period type (annual by default).
    #[must_use]
    pub const fn with_period_type(mut self, period_type: PeriodType) -> Self {
        self.period_type = period_type;
        self
    }

    /// Enable or disable diagnostic tracing.
    #[must_use]
    pub const fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    /// Returns true if diagnostic tracing is enabled.
    #[must_use]
    pub const fn is_inspecting(&self) -> bool {
        self.inspect
    }

    /// Returns the configured period type.
    #[must_use]
    pub const fn period_type(&self) -> PeriodType {
        self.period_type
    }

    /// Returns the provider names in priority order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch both statements, trying providers in order until one has data.
    pub async fn fetch(&self, symbol: &Symbol) -> FetchOutcome {
        self.fetch_traced(symbol, self.inspect).await
    }

    /// Fetch with inspect mode overridden for this call.
    pub(crate) async fn fetch_traced(&self, symbol: &Symbol, inspect: bool) -> FetchOutcome {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            if inspect {
                debug!(
                    provider = provider.name(),
                    symbol = %symbol,
                    period_type = ?self.period_type,
                    "Attempting provider"
                );
            }

            if !provider.supported_periods().contains(&self.period_type) {
                let failure =
                    DataError::NotSupported(format!("{:?} statements", self.period_type))
                        .to_string();
                if inspect {
                    warn!(provider = provider.name(), error = %failure, "Skipping provider");
                }
                attempts.push(ProviderAttempt {
                    provider: provider.name().to_string(),
                    income_shape: (0, 0),
                    balance_shape: (0, 0),
                    failures: vec![failure],
                });
                continue;
            }

            let mut failures = Vec::new();
            let income = match provider.income_statement(symbol, self.period_type).await {
                Ok(table) => table,
                Err(e) => {
                    failures.push(format!("income statement: {e}"));
                    StatementTable::new()
                }
            };
            let balance = match provider.balance_sheet(symbol, self.period_type).await {
                Ok(table) => table,
                Err(e) => {
                    failures.push(format!("balance sheet: {e}"));
                    StatementTable::new()
                }
            };

            let attempt = ProviderAttempt {
                provider: provider.name().to_string(),
                income_shape: income.shape(),
                balance_shape: balance.shape(),
                failures,
            };

            if inspect {
                for failure in &attempt.failures {
                    warn!(provider = provider.name(), error = %failure, "Provider request failed");
                }
                debug!(
                    provider = provider.name(),
                    income_shape = ?attempt.income_shape,
                    balance_shape = ?attempt.balance_shape,
                    "Provider returned"
                );
            }

            let usable = !income.is_empty() || !balance.is_empty();
            attempts.push(attempt);

            if usable {
                if inspect {
                    debug!(provider = provider.name(), symbol = %symbol, "Using provider");
                    trace_tables(&income, &balance);
                }
                return FetchOutcome {
                    income,
                    balance,
                    provider: Some(provider.name().to_string()),
                    attempts,
                };
            }

            if inspect {
                warn!(
                    provider = provider.name(),
                    symbol = %symbol,
                    "Provider returned no usable data, trying next"
                );
            }
        }

        if inspect {
            warn!(symbol = %symbol, "No provider returned usable data");
        }

        FetchOutcome {
            attempts,
            ..Default::default()
        }
    }

    // Builder methods for easy setup with specific providers

    /// Add the Financial Modeling Prep provider.
    ///
    /// A missing or blank key still registers the provider; it then fails
    /// every request, which makes the fetcher fall through to the next one.
    #[cfg(feature = "fmp")]
    #[must_use]
    pub fn with_fmp(self, api_key: Option<String>) -> Self {
        self.with_provider(Arc::new(keymetrics_fmp::FmpProvider::with_optional_key(
            api_key,
        )))
    }

    /// Add the Yahoo Finance provider.
    #[cfg(feature = "yahoo")]
    #[must_use]
    pub fn with_yahoo(self) -> Self {
        self.with_provider(Arc::new(keymetrics_yahoo::YahooProvider::new()))
    }

    /// The standard chain: Financial Modeling Prep, then Yahoo Finance.
    #[cfg(all(feature = "fmp", feature = "yahoo"))]
    #[must_use]
    pub fn default_chain(fmp_api_key: Option<String>) -> Self {
        Self::new().with_fmp(fmp_api_key).with_yahoo()
    }
}

/// Dump the winning tables' layout (inspect mode only).
fn trace_tables(income: &StatementTable, balance: &StatementTable) {
    for (label, table) in [("income", income), ("balance", balance)] {
        let periods: Vec<String> = table
            .periods()
            .take(INSPECT_PERIODS)
            .map(ToString::to_string)
            .collect();
        let line_items: Vec<&str> = table
            .line_items()
            .iter()
            .take(INSPECT_LINE_ITEMS)
            .map(String::as_str)
            .collect();
        debug!(
            statement = label,
            shape = ?table.shape(),
            periods = ?periods,
            line_items = ?line_items,
            "Statement layout"
        );
        if table.is_empty() {
            warn!(statement = label, "Statement is empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keymetrics_core::{DataProvider, ReportingPeriod, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;

    /// Layer counting every event it sees.
    struct CountingLayer(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for CountingLayer {
        fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Run a fetch under a counting subscriber and return the event count.
    fn count_events(fetcher: &StatementFetcher) -> usize {
        let counter = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountingLayer(counter.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(fetcher.fetch(&Symbol::new("AAPL")))
        });
        counter.load(Ordering::SeqCst)
    }

    /// Provider returning canned tables or errors, counting calls.
    #[derive(Debug, Default)]
    struct MockProvider {
        name: &'static str,
        income: Option<StatementTable>,
        balance: Option<StatementTable>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                ..Default::default()
            }
        }

        fn with_income(mut self, table: StatementTable) -> Self {
            self.income = Some(table);
            self
        }

        fn with_balance(mut self, table: StatementTable) -> Self {
            self.balance = Some(table);
            self
        }
    }

    impl DataProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "mock"
        }

        fn supported_periods(&self) -> &[PeriodType] {
            &[PeriodType::Annual]
        }
    }

    #[async_trait]
    impl StatementProvider for MockProvider {
        async fn income_statement(&self, _: &Symbol, _: PeriodType) -> Result<StatementTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.income
                .clone()
                .ok_or_else(|| DataError::Network("connection refused".into()))
        }

        async fn balance_sheet(&self, _: &Symbol, _: PeriodType) -> Result<StatementTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.balance
                .clone()
                .ok_or_else(|| DataError::Network("connection refused".into()))
        }
    }

    fn income_2024() -> StatementTable {
        StatementTable::new().with_cell("Revenue", ReportingPeriod::annual(2024), 100.0)
    }

    fn balance_2024() -> StatementTable {
        StatementTable::new().with_cell("Total Assets", ReportingPeriod::annual(2024), 500.0)
    }

    #[tokio::test]
    async fn test_falls_back_past_empty_provider() {
        let first = Arc::new(
            MockProvider::new("A")
                .with_income(StatementTable::new())
                .with_balance(StatementTable::new()),
        );
        let second = Arc::new(
            MockProvider::new("B")
                .with_income(income_2024())
                .with_balance(balance_2024()),
        );
        let fetcher = StatementFetcher::new()
            .with_provider(first.clone())
            .with_provider(second);

        let outcome = fetcher.fetch(&Symbol::new("AAPL")).await;

        assert_eq!(outcome.provider.as_deref(), Some("B"));
        assert_eq!(outcome.income, income_2024());
        assert_eq!(outcome.balance, balance_2024());
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].is_usable());
        assert!(outcome.attempts[1].is_usable());
        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_treated_as_empty() {
        let failing: Arc<dyn StatementProvider> = Arc::new(MockProvider::new("A"));
        let working: Arc<dyn StatementProvider> =
            Arc::new(MockProvider::new("B").with_income(income_2024()));
        let fetcher = StatementFetcher::with_providers(vec![failing, working]).with_inspect(true);

        let outcome = fetcher.fetch(&Symbol::new("AAPL")).await;

        assert_eq!(outcome.provider_label(), "B");
        assert_eq!(outcome.attempts[0].failures.len(), 2);
        // B's balance sheet failed but its income statement makes it usable
        assert!(outcome.balance.is_empty());
        assert!(!outcome.income.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_usable_provider() {
        let first = Arc::new(MockProvider::new("A").with_balance(balance_2024()));
        let second = Arc::new(MockProvider::new("B").with_income(income_2024()));
        let fetcher = StatementFetcher::new()
            .with_provider(first)
            .with_provider(second.clone());

        let outcome = fetcher.fetch(&Symbol::new("AAPL")).await;

        assert_eq!(outcome.provider_label(), "A");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_tables() {
        let fetcher = StatementFetcher::new()
            .with_provider(Arc::new(MockProvider::new("A")))
            .with_provider(Arc::new(MockProvider::new("B")));

        let outcome = fetcher.fetch(&Symbol::new("NOPE")).await;

        assert!(outcome.is_empty());
        assert_eq!(outcome.provider, None);
        assert_eq!(outcome.provider_label(), NO_PROVIDER);
        assert_eq!(outcome.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let outcome = StatementFetcher::new().fetch(&Symbol::new("AAPL")).await;
        assert!(outcome.is_empty());
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_skips_provider_without_period_type() {
        let annual_only = Arc::new(MockProvider::new("A").with_income(income_2024()));
        let fetcher = StatementFetcher::new()
            .with_provider(annual_only.clone())
            .with_period_type(PeriodType::Quarterly);

        let outcome = fetcher.fetch(&Symbol::new("AAPL")).await;

        assert!(outcome.is_empty());
        assert_eq!(annual_only.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].failures[0].contains("not supported"));
    }

    #[test]
    fn test_quiet_without_inspect() {
        let failing: Arc<dyn StatementProvider> = Arc::new(MockProvider::new("A"));
        let empty: Arc<dyn StatementProvider> = Arc::new(
            MockProvider::new("B")
                .with_income(StatementTable::new())
                .with_balance(StatementTable::new()),
        );
        let fetcher = StatementFetcher::with_providers(vec![failing, empty]);

        assert_eq!(count_events(&fetcher), 0);
        assert!(count_events(&fetcher.with_inspect(true)) > 0);
    }

    #[test]
    fn test_debug_lists_providers() {
        let fetcher = StatementFetcher::new().with_provider(Arc::new(MockProvider::new("A")));
        let debug_str = format!("{fetcher:?}");
        assert!(debug_str.contains("\"A\""));
        assert_eq!(fetcher.provider_names(), ["A"]);
    }

    #[cfg(all(feature = "fmp", feature = "yahoo"))]
    #[test]
    fn test_default_chain_order() {
        let fetcher = StatementFetcher::default_chain(None);
        assert_eq!(
            fetcher.provider_names(),
            ["FinancialModelingPrep", "Yahoo Finance"]
        );
    }
}
