//! Declarative metric definitions.
//!
//! A [`MetricDefinition`] names the statement fields a metric reads and the
//! [`Formula`] that combines them. Definitions are plain configuration: the
//! default set is built by [`default_definitions`], custom sets can be loaded
//! from JSON with [`load_definitions`].

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use keymetrics_core::{DataError, Result, StatementKind};
use serde::{Deserialize, Serialize};

use crate::policy::safe_divide;

/// Keys of the minimal metric set used when `mvp_only` is on.
pub const MVP_KEYS: [&str; 2] = ["GrossMargin", "DebtRatio"];

/// A statement line item a metric reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Statement holding the line item.
    pub statement: StatementKind,
    /// Exact line item name.
    pub name: String,
    /// Alternative exact names, tried in order after `name`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl FieldRef {
    /// A line item of the income statement.
    #[must_use]
    pub fn income(name: impl Into<String>) -> Self {
        Self {
            statement: StatementKind::Income,
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    /// A line item of the balance sheet.
    #[must_use]
    pub fn balance(name: impl Into<String>) -> Self {
        Self {
            statement: StatementKind::Balance,
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    /// Adds an alternative line item name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Returns the primary name followed by the aliases.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Display unit of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Percentage (`%`).
    #[serde(rename = "%")]
    Percent,
    /// Plain ratio.
    #[serde(rename = "ratio")]
    Ratio,
}

impl Unit {
    /// Returns the unit label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percent => "%",
            Self::Ratio => "ratio",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    /// Margins and returns.
    Profitability,
    /// Leverage.
    Solvency,
    /// Short-term coverage.
    Liquidity,
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profitability => write!(f, "Profitability"),
            Self::Solvency => write!(f, "Solvency"),
            Self::Liquidity => write!(f, "Liquidity"),
        }
    }
}

/// The closed set of metric formulas.
///
/// Inputs are the metric's fields in definition order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// `a / b`
    Ratio,
    /// `(a - b) / c`
    DifferenceRatio,
}

impl Formula {
    /// Number of fields the formula takes.
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            Self::Ratio => 2,
            Self::DifferenceRatio => 3,
        }
    }

    /// Applies the formula.
    ///
    /// Returns NaN if the input count does not match [`arity`](Self::arity),
    /// if any input is NaN, or if the divisor is zero.
    #[must_use]
    pub fn apply(&self, inputs: &[f64]) -> f64 {
        if inputs.len() != self.arity() || inputs.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        match *self {
            Self::Ratio => safe_divide(inputs[0], inputs[1]),
            Self::DifferenceRatio => safe_divide(inputs[0] - inputs[1], inputs[2]),
        }
    }
}

/// How a `%` metric's decimal ratio is turned into a percentage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentScaling {
    /// Multiply by 100 only when the magnitude is at most 1.5.
    #[default]
    Heuristic,
    /// Always multiply by 100.
    Always,
}

/// A derived financial ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique key (`GrossMargin`).
    pub key: String,
    /// Human-readable name (`Gross Margin`).
    pub display_name: String,
    /// Grouping.
    pub category: MetricCategory,
    /// Display unit.
    pub unit: Unit,
    /// Input fields in formula order.
    pub fields: Vec<FieldRef>,
    /// How the fields are combined.
    pub formula: Formula,
    /// Percentage conversion for `%` metrics.
    #[serde(default)]
    pub scaling: PercentScaling,
    /// Free-text description.
    pub description: String,
}

impl MetricDefinition {
    /// Returns the snake-case column key used in time series (`gross_margin`).
    #[must_use]
    pub fn series_key(&self) -> String {
        let chars: Vec<char> = self.key.chars().collect();
        let mut out = String::with_capacity(self.key.len() + 4);
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
                {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        }
        out
    }

    /// Returns the distinct statements the fields draw from, in field order.
    #[must_use]
    pub fn statements(&self) -> Vec<StatementKind> {
        let mut kinds = Vec::with_capacity(2);
        for field in &self.fields {
            if !kinds.contains(&field.statement) {
                kinds.push(field.statement);
            }
        }
        kinds
    }

    /// Returns true if this metric belongs to the minimal set.
    #[must_use]
    pub fn is_mvp(&self) -> bool {
        MVP_KEYS.contains(&self.key.as_str())
    }

    /// Checks that the definition is usable.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(DataError::InvalidParameter("metric key is empty".into()));
        }
        if self.fields.len() != self.formula.arity() {
            return Err(DataError::InvalidParameter(format!(
                "metric {} has {} fields but {:?} takes {}",
                self.key,
                self.fields.len(),
                self.formula,
                self.formula.arity()
            )));
        }
        if let Some(field) = self.fields.iter().find(|f| f.name.trim().is_empty()) {
            return Err(DataError::InvalidParameter(format!(
                "metric {} has an unnamed {} field",
                self.key, field.statement
            )));
        }
        Ok(())
    }
}

/// Returns the built-in metric set.
#[must_use]
pub fn default_definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition {
            key: "GrossMargin".into(),
            display_name: "Gross Margin".into(),
            category: MetricCategory::Profitability,
            unit: Unit::Percent,
            fields: vec![FieldRef::income("Gross Profit"), FieldRef::income("Revenue")],
            formula: Formula::Ratio,
            scaling: PercentScaling::Heuristic,
            description: "Gross Profit / Revenue.".into(),
        },
        MetricDefinition {
            key: "OperatingMargin".into(),
            display_name: "Operating Margin".into(),
            category: MetricCategory::Profitability,
            unit: Unit::Percent,
            fields: vec![
                FieldRef::income("Operating Income"),
                FieldRef::income("Revenue"),
            ],
            formula: Formula::Ratio,
            scaling: PercentScaling::Heuristic,
            description: "Operating Income / Revenue.".into(),
        },
        MetricDefinition {
            key: "ROE".into(),
            display_name: "ROE".into(),
            category: MetricCategory::Profitability,
            unit: Unit::Percent,
            fields: vec![
                FieldRef::income("Net Income"),
                FieldRef::balance("Total Stockholders Equity")
                    .with_alias("Stockholders Equity")
                    .with_alias("Total Equity"),
            ],
            formula: Formula::Ratio,
            scaling: PercentScaling::Always,
            description: "Return on Equity: Net Income / Shareholders' Equity.".into(),
        },
        MetricDefinition {
            key: "DebtRatio".into(),
            display_name: "Debt Ratio".into(),
            category: MetricCategory::Solvency,
            unit: Unit::Percent,
            fields: vec![
                FieldRef::balance("Total Liabilities")
                    .with_alias("Total Liabilities Net Minority Interest"),
                FieldRef::balance("Total Assets"),
            ],
            formula: Formula::Ratio,
            scaling: PercentScaling::Heuristic,
            description: "Total Liabilities / Total Assets.".into(),
        },
        MetricDefinition {
            key: "CurrentRatio".into(),
            display_name: "Current Ratio".into(),
            category: MetricCategory::Liquidity,
            unit: Unit::Ratio,
            fields: vec![
                FieldRef::balance("Total Current Assets"),
                FieldRef::balance("Total Current Liabilities"),
            ],
            formula: Formula::Ratio,
            scaling: PercentScaling::Heuristic,
            description: "Total Current Assets / Total Current Liabilities.".into(),
        },
        MetricDefinition {
            key: "QuickRatio".into(),
            display_name: "Quick Ratio".into(),
            category: MetricCategory::Liquidity,
            unit: Unit::Ratio,
            fields: vec![
                FieldRef::balance("Total Current Assets"),
                FieldRef::balance("Inventory"),
                FieldRef::balance("Total Current Liabilities"),
            ],
            formula: Formula::DifferenceRatio,
            scaling: PercentScaling::Heuristic,
            description: "(Total Current Assets - Inventory) / Total Current Liabilities.".into(),
        },
    ]
}

/// Returns the minimal set: Gross Margin and Debt Ratio, in that order.
#[must_use]
pub fn mvp_definitions() -> Vec<MetricDefinition> {
    let defaults = default_definitions();
    MVP_KEYS
        .iter()
        .filter_map(|key| defaults.iter().find(|d| d.key == *key).cloned())
        .collect()
}

/// Parses and validates a JSON array of definitions.
pub fn parse_definitions(json: &str) -> Result<Vec<MetricDefinition>> {
    let definitions: Vec<MetricDefinition> =
        serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))?;

    let mut seen = HashSet::with_capacity(definitions.len());
    for definition in &definitions {
        definition.validate()?;
        if !seen.insert(definition.key.as_str()) {
            return Err(DataError::InvalidParameter(format!(
                "duplicate metric key {}",
                definition.key
            )));
        }
    }
    Ok(definitions)
}

/// Loads definitions from a JSON file.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<MetricDefinition>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        DataError::InvalidParameter(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_definitions(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let defaults = default_definitions();
        assert_eq!(defaults.len(), 6);
        for definition in &defaults {
            definition.validate().unwrap();
        }
    }

    #[test]
    fn test_mvp_set() {
        let keys: Vec<String> = mvp_definitions().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, ["GrossMargin", "DebtRatio"]);
    }

    #[test]
    fn test_series_key() {
        let keys: Vec<String> = default_definitions()
            .iter()
            .map(MetricDefinition::series_key)
            .collect();
        assert_eq!(
            keys,
            [
                "gross_margin",
                "operating_margin",
                "roe",
                "debt_ratio",
                "current_ratio",
                "quick_ratio"
            ]
        );
    }

    #[test]
    fn test_formula_apply() {
        assert_eq!(Formula::Ratio.apply(&[1.0, 4.0]), 0.25);
        assert_eq!(Formula::DifferenceRatio.apply(&[10.0, 4.0, 2.0]), 3.0);
        assert!(Formula::Ratio.apply(&[1.0, 0.0]).is_nan());
        assert!(Formula::Ratio.apply(&[f64::NAN, 2.0]).is_nan());
        assert!(Formula::Ratio.apply(&[1.0]).is_nan());
        assert!(Formula::DifferenceRatio.apply(&[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_statements() {
        let defaults = default_definitions();
        let roe = defaults.iter().find(|d| d.key == "ROE").unwrap();
        assert_eq!(
            roe.statements(),
            [StatementKind::Income, StatementKind::Balance]
        );
        let candidates: Vec<&str> = roe.fields[1].candidates().collect();
        assert_eq!(
            candidates,
            ["Total Stockholders Equity", "Stockholders Equity", "Total Equity"]
        );
    }

    #[test]
    fn test_parse_definitions() {
        let json = r#"[{
            "key": "NetMargin",
            "display_name": "Net Margin",
            "category": "profitability",
            "unit": "%",
            "fields": [
                {"statement": "income", "name": "Net Income"},
                {"statement": "income", "name": "Revenue"}
            ],
            "formula": "ratio",
            "description": "Net Income / Revenue."
        }]"#;
        let definitions = parse_definitions(json).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].scaling, PercentScaling::Heuristic);
        assert_eq!(definitions[0].series_key(), "net_margin");
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        let json = r#"[{
            "key": "Broken",
            "display_name": "Broken",
            "category": "liquidity",
            "unit": "ratio",
            "fields": [{"statement": "balance", "name": "Total Assets"}],
            "formula": "ratio",
            "description": ""
        }]"#;
        assert!(matches!(
            parse_definitions(json),
            Err(DataError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parse_rejects_duplicates_and_garbage() {
        let one = serde_json::to_string(&mvp_definitions()[0]).unwrap();
        let json = format!("[{one},{one}]");
        assert!(matches!(
            parse_definitions(&json),
            Err(DataError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_definitions("not json"),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_definitions_serialize_round_trip() {
        let json = serde_json::to_string(&default_definitions()).unwrap();
        assert_eq!(parse_definitions(&json).unwrap(), default_definitions());
    }
}
