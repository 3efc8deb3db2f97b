//! Rule schema: JSON-declared conditions and tagged action variants

use chrono::{DateTime, Utc};
use fx_core::Objective;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    ProviderSelection,
    MarginAdjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionOp {
    Equals,
    NotEquals,
    In,
    NotIn,
    Gt,
    Ge,
    Lt,
    Le,
    Between,
    Contains,
    StartsWith,
    EndsWith,
    OutsideHours,
}

/// One condition against a context field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: CriterionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSet {
    pub operator: BoolOp,
    pub criteria: Vec<Criterion>,
}

/// Heterogeneously-shaped actions, resolved to a tagged variant at load.
/// An unknown tag fails deserialization and the document is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    ProviderSelection {
        #[serde(default)]
        preferred_providers: Vec<String>,
        #[serde(default)]
        excluded_providers: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        routing_objective_override: Option<Objective>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force_provider: Option<String>,
    },
    MarginAdjustment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_margin_override: Option<i64>,
        #[serde(default)]
        additional_margin_bps: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tier_adjustment_multiplier: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_margin_bps: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_margin_bps: Option<i64>,
    },
}

impl RuleAction {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleAction::ProviderSelection { .. } => RuleType::ProviderSelection,
            RuleAction::MarginAdjustment { .. } => RuleType::MarginAdjustment,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub priority: i32,
    pub enabled: bool,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub conditions: ConditionSet,
    pub actions: RuleAction,
    #[serde(default)]
    pub metadata: RuleMetadata,
}

impl Rule {
    /// Enabled and inside the validity window
    pub fn is_applicable(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && now >= self.valid_from
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

/// Flat request context the conditions evaluate against
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    fields: HashMap<String, Value>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn with_amount(self, field: impl Into<String>, amount: Decimal) -> Self {
        // Decimal context values carry through as strings so no precision
        // is lost; the evaluator compares them numerically.
        self.with(field, amount.to_string())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Folded outcome of the matching PROVIDER_SELECTION rules
#[derive(Debug, Clone, Default)]
pub struct ProviderRuleDecision {
    /// One entry per rule listing, repeats intact: the router grants a
    /// score bonus per listing
    pub preferred: Vec<String>,
    pub excluded: Vec<String>,
    pub objective_override: Option<Objective>,
    pub force_provider: Option<String>,
    pub matched_rules: Vec<String>,
}

/// Folded outcome of the matching MARGIN_ADJUSTMENT rules
#[derive(Debug, Clone, Default)]
pub struct MarginRuleDecision {
    pub base_override: Option<i64>,
    pub additional_bps: i64,
    pub tier_multiplier: Option<Decimal>,
    pub min_override: Option<i64>,
    pub max_override: Option<i64>,
    pub matched_rules: Vec<String>,
}
