//! Reporting period and period type definitions.
//!
//! This module defines [`PeriodType`] for choosing between annual and quarterly
//! statements and [`ReportingPeriod`], the ordered token used as the column key
//! of a [`StatementTable`](crate::statement::StatementTable).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Period type for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

/// A fiscal year, or a quarter within one.
///
/// Periods are totally ordered: by fiscal year first, and within a year the
/// annual period sorts before its quarters. The latest period of a table is
/// therefore simply its maximum.
///
/// Displays as `2024` or `2024Q3`, and parses from those forms as well as from
/// ISO dates (`2024-09-28` becomes fiscal year 2024).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportingPeriod {
    fiscal_year: i32,
    quarter: Option<u8>,
}

impl ReportingPeriod {
    /// Creates an annual period.
    #[must_use]
    pub const fn annual(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            quarter: None,
        }
    }

    /// Creates a quarterly period. Returns `None` unless `quarter` is in `1..=4`.
    #[must_use]
    pub const fn quarterly(fiscal_year: i32, quarter: u8) -> Option<Self> {
        if quarter >= 1 && quarter <= 4 {
            Some(Self {
                fiscal_year,
                quarter: Some(quarter),
            })
        } else {
            None
        }
    }

    /// Derives the period a statement dated `date` belongs to.
    #[must_use]
    pub fn from_date(date: NaiveDate, period_type: PeriodType) -> Self {
        match period_type {
            PeriodType::Annual => Self::annual(date.year()),
            PeriodType::Quarterly => Self {
                fiscal_year: date.year(),
                quarter: Some((date.month0() / 3 + 1) as u8),
            },
        }
    }

    /// Returns the fiscal year.
    #[must_use]
    pub const fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }

    /// Returns the quarter (1-4), or `None` for an annual period.
    #[must_use]
    pub const fn quarter(&self) -> Option<u8> {
        self.quarter
    }

    /// Returns the period type of this period.
    #[must_use]
    pub const fn period_type(&self) -> PeriodType {
        match self.quarter {
            Some(_) => PeriodType::Quarterly,
            None => PeriodType::Annual,
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "{}Q{q}", self.fiscal_year),
            None => write!(f, "{}", self.fiscal_year),
        }
    }
}

impl FromStr for ReportingPeriod {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DataError::Parse(format!("invalid reporting period: {s:?}"));

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::annual(date.year()));
        }

        let upper = s.to_ascii_uppercase();
        match upper.split_once('Q') {
            Some((year, quarter)) => {
                let year: i32 = year.trim_end_matches('-').parse().map_err(|_| invalid())?;
                let quarter: u8 = quarter.parse().map_err(|_| invalid())?;
                Self::quarterly(year, quarter).ok_or_else(invalid)
            }
            None => upper.parse().map(Self::annual).map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for ReportingPeriod {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportingPeriod> for String {
    fn from(period: ReportingPeriod) -> Self {
        period.to_string()
    }
}
