//! Metric evaluation over fetched statements.
//!
//! Evaluation is total: every definition yields exactly one [`MetricResult`],
//! in input order, and every failure (missing row, missing column,
//! non-numeric cell, zero divisor) degrades that one value to NaN.

use keymetrics_core::{Cell, ReportingPeriod, StatementKind, StatementTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::definition::{FieldRef, MetricDefinition, PercentScaling, Unit};
use crate::policy::{is_placeholder_zero, looks_like_fraction, scale_percent};

/// One evaluated metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Definition key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Display value (percentages already scaled), NaN if unavailable.
    pub value: f64,
    /// Period the value was read from, `None` if no period was available.
    pub period: Option<ReportingPeriod>,
    /// Display unit.
    pub unit: Unit,
    /// Free-text description.
    pub description: String,
}

impl MetricResult {
    /// Returns true if the value was computed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.value.is_nan()
    }
}

/// Evaluates metric definitions against an income statement and balance sheet.
///
/// The evaluator holds no state besides its inspect flag, so repeated calls
/// on the same input produce identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricEvaluator {
    inspect: bool,
}

impl MetricEvaluator {
    /// Create an evaluator with diagnostics off.
    #[must_use]
    pub const fn new() -> Self {
        Self { inspect: false }
    }

    /// Enable or disable diagnostic tracing.
    #[must_use]
    pub const fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    /// Evaluates every definition, preserving order.
    ///
    /// With `period` set, every metric is read at that period. Otherwise each
    /// metric uses the latest period present in all tables it draws from.
    #[must_use]
    pub fn evaluate(
        &self,
        income: &StatementTable,
        balance: &StatementTable,
        definitions: &[MetricDefinition],
        period: Option<&ReportingPeriod>,
    ) -> Vec<MetricResult> {
        definitions
            .iter()
            .map(|definition| self.evaluate_one(definition, income, balance, period))
            .collect()
    }

    /// Evaluates a single definition.
    #[must_use]
    pub fn evaluate_one(
        &self,
        definition: &MetricDefinition,
        income: &StatementTable,
        balance: &StatementTable,
        period: Option<&ReportingPeriod>,
    ) -> MetricResult {
        let period = period
            .copied()
            .or_else(|| latest_common_period(definition, income, balance));

        let value = match period {
            Some(period) => {
                let raw = self.raw_value(definition, income, balance, &period);
                self.display_value(definition, raw)
            }
            None => {
                if self.inspect {
                    warn!(metric = %definition.key, "No reporting period available");
                }
                f64::NAN
            }
        };

        MetricResult {
            key: definition.key.clone(),
            name: definition.display_name.clone(),
            value,
            period,
            unit: definition.unit,
            description: definition.description.clone(),
        }
    }

    /// Computes the metric's undecorated value (a decimal ratio) at `period`.
    ///
    /// No percentage scaling is applied.
    #[must_use]
    pub fn raw_value(
        &self,
        definition: &MetricDefinition,
        income: &StatementTable,
        balance: &StatementTable,
        period: &ReportingPeriod,
    ) -> f64 {
        let inputs: Vec<f64> = definition
            .fields
            .iter()
            .map(|field| {
                let table = match field.statement {
                    StatementKind::Income => income,
                    StatementKind::Balance => balance,
                };
                let value = field_value(table, field, period);
                if self.inspect && value.is_nan() {
                    debug!(
                        metric = %definition.key,
                        field = %field.name,
                        statement = %field.statement,
                        period = %period,
                        "Field unavailable"
                    );
                }
                value
            })
            .collect();

        definition.formula.apply(&inputs)
    }

    fn display_value(&self, definition: &MetricDefinition, raw: f64) -> f64 {
        match definition.unit {
            Unit::Percent => {
                if self.inspect
                    && definition.scaling == PercentScaling::Heuristic
                    && !raw.is_nan()
                    && !looks_like_fraction(raw)
                {
                    warn!(
                        metric = %definition.key,
                        value = raw,
                        "Value above percentage threshold left unscaled"
                    );
                }
                scale_percent(raw, definition.scaling)
            }
            Unit::Ratio => raw,
        }
    }
}

/// Evaluates definitions with diagnostics off.
#[must_use]
pub fn evaluate(
    income: &StatementTable,
    balance: &StatementTable,
    definitions: &[MetricDefinition],
    period: Option<&ReportingPeriod>,
) -> Vec<MetricResult> {
    MetricEvaluator::new().evaluate(income, balance, definitions, period)
}

/// Latest period present in every table the definition reads from.
fn latest_common_period(
    definition: &MetricDefinition,
    income: &StatementTable,
    balance: &StatementTable,
) -> Option<ReportingPeriod> {
    let tables: Vec<&StatementTable> = definition
        .statements()
        .into_iter()
        .map(|kind| match kind {
            StatementKind::Income => income,
            StatementKind::Balance => balance,
        })
        .collect();

    let (first, rest) = tables.split_first()?;
    first
        .periods()
        .rev()
        .find(|period| rest.iter().all(|table| table.has_period(period)))
        .copied()
}

/// Reads one field at `period`, trying aliases in order. NaN if none resolves.
fn field_value(table: &StatementTable, field: &FieldRef, period: &ReportingPeriod) -> f64 {
    field
        .candidates()
        .filter_map(|name| {
            let row = table.row(name)?;
            let value = row.get(period).and_then(Cell::as_f64)?;
            if value.is_nan() || is_placeholder_zero(value, row) {
                None
            } else {
                Some(value)
            }
        })
        .next()
        .unwrap_or(f64::NAN)
}
