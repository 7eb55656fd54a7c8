//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers every error a provider can
//! report while fetching or parsing financial statements. The fetcher in the
//! `keymetrics` crate absorbs all of them; they only surface to callers that
//! talk to a provider directly.

use thiserror::Error;

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// No statement data is available for the requested symbol.
    #[error("Data not available for {symbol}: {reason}")]
    DataNotAvailable {
        /// The symbol that was requested.
        symbol: String,
        /// What was missing.
        reason: String,
    },

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Authentication failed for a provider (including a missing API key).
    #[error("Authentication failed for provider {0}")]
    AuthenticationFailed(String),

    /// The requested feature is not supported.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_display() {
        assert_eq!(
            DataError::ProviderNotConfigured("FMP (no API key)".into()).to_string(),
            "Provider not configured: FMP (no API key)"
        );
        assert_eq!(
            DataError::NotSupported("quarterly statements".into()).to_string(),
            "Feature not supported: quarterly statements"
        );
    }

    #[test]
    fn test_error_display() {
        let err = DataError::DataNotAvailable {
            symbol: "AAPL".into(),
            reason: "empty income statement".into(),
        };
        assert_eq!(
            err.to_string(),
            "Data not available for AAPL: empty income statement"
        );
    }
}
