//! Provider traits for fetching financial statements.
//!
//! This module defines the core provider traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`StatementProvider`] - Income statements and balance sheets

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::Result, period::PeriodType, statement::StatementTable, types::Symbol};

/// Base trait for all data providers.
///
/// All data providers must implement this trait to provide basic metadata
/// about the provider and its capabilities.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;

    /// Returns the statement period types supported by this provider.
    ///
    /// The fetcher skips a provider that does not list the requested type.
    fn supported_periods(&self) -> &[PeriodType];
}

/// Provider for income statements and balance sheets.
///
/// Both methods may fail for any transport, authentication or plan reason.
/// An empty [`StatementTable`] is a valid answer and means the provider has no
/// data for the symbol.
#[async_trait]
pub trait StatementProvider: DataProvider {
    /// Fetches the income statement for a symbol.
    async fn income_statement(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable>;

    /// Fetches the balance sheet for a symbol.
    async fn balance_sheet(&self, symbol: &Symbol, period_type: PeriodType)
    -> Result<StatementTable>;
}
