//! Heuristic rules applied to raw statement values and computed ratios.
//!
//! These are policy decisions, not accounting rules, and each one has known
//! failure cases:
//!
//! - [`is_placeholder_zero`] treats an exact `0` as "not reported" when the
//!   same line item is non-zero in another period. A line item that genuinely
//!   dropped to zero in one year is misread as missing.
//! - [`looks_like_fraction`] assumes a magnitude of at most
//!   [`PERCENT_HEURISTIC_THRESHOLD`] is a decimal ratio and anything larger is
//!   already a percentage. A real ratio above 150% (leveraged ROE, for example)
//!   is left unscaled. Metrics with such a range should use
//!   [`PercentScaling::Always`].

use std::collections::BTreeMap;

use keymetrics_core::{Cell, ReportingPeriod};

use crate::definition::PercentScaling;

/// Largest magnitude still treated as a decimal ratio by the percentage heuristic.
pub const PERCENT_HEURISTIC_THRESHOLD: f64 = 1.5;

/// Returns true if `value` looks like a decimal ratio rather than a percentage.
///
/// Heuristic: `|value| <= 1.5`. Unreliable for ratios above 150%.
#[must_use]
pub fn looks_like_fraction(value: f64) -> bool {
    value.abs() <= PERCENT_HEURISTIC_THRESHOLD
}

/// Converts a computed ratio to its percentage display value.
///
/// NaN passes through unchanged.
#[must_use]
pub fn scale_percent(value: f64, scaling: PercentScaling) -> f64 {
    if value.is_nan() {
        return value;
    }
    match scaling {
        PercentScaling::Always => value * 100.0,
        PercentScaling::Heuristic if looks_like_fraction(value) => value * 100.0,
        PercentScaling::Heuristic => value,
    }
}

/// Returns true if `value` is an exact zero that probably stands for "not reported".
///
/// Heuristic: a zero counts as a placeholder only when `row` (the same line
/// item across all periods) holds at least one non-zero number. A row that is
/// zero everywhere is taken at face value.
#[must_use]
pub fn is_placeholder_zero(value: f64, row: &BTreeMap<ReportingPeriod, Cell>) -> bool {
    value == 0.0
        && row
            .values()
            .filter_map(Cell::as_f64)
            .any(|v| v != 0.0 && !v.is_nan())
}

/// Divides `numerator` by `denominator`, returning NaN for an undefined result.
///
/// A zero or NaN divisor gives NaN regardless of the numerator, as does any
/// NaN operand or a non-finite quotient.
#[must_use]
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if numerator.is_nan() || denominator.is_nan() || denominator == 0.0 {
        return f64::NAN;
    }
    let quotient = numerator / denominator;
    if quotient.is_finite() { quotient } else { f64::NAN }
}
