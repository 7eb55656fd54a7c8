#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keymetrics/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for financial statement providers.
//!
//! This crate provides the foundational abstractions shared by every provider
//! and by the metric evaluator:
//!
//! - [`DataProvider`](provider::DataProvider) - Base trait for all providers
//! - [`StatementProvider`](provider::StatementProvider) - Income statements and balance sheets
//! - [`StatementTable`](statement::StatementTable) - Line items by reporting period
//! - [`ReportingPeriod`](period::ReportingPeriod) - Ordered fiscal period token

/// Error types for data operations.
pub mod error;
/// Reporting period and period type definitions.
pub mod period;
/// Provider traits for fetching financial statements.
pub mod provider;
/// Statement tables keyed by line item and reporting period.
pub mod statement;
/// Core identifier types.
pub mod types;

// Re-export commonly used items at crate root
pub use error::{DataError, Result};
pub use period::{PeriodType, ReportingPeriod};
pub use provider::{DataProvider, StatementProvider};
pub use statement::{Cell, StatementKind, StatementTable};
pub use types::Symbol;
