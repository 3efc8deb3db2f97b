//! Rule loading and evaluation
//!
//! One JSON document per rule type. A load parses and validates the whole
//! document, then swaps the in-memory set atomically; readers observe
//! either the old or the new set, never a mix. Evaluation is read-only and
//! deterministic for a given set snapshot; a malformed rule is skipped with
//! a warning and never fails the request.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::*;

/// Immutable rule-set snapshot
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub provider_selection: Vec<Rule>,
    pub margin_adjustment: Vec<Rule>,
}

impl RuleSet {
    fn of_type(&self, rule_type: RuleType) -> &[Rule] {
        match rule_type {
            RuleType::ProviderSelection => &self.provider_selection,
            RuleType::MarginAdjustment => &self.margin_adjustment,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Rule> {
        self.provider_selection
            .iter()
            .chain(self.margin_adjustment.iter())
    }
}

/// Rules engine with single-writer atomic swap
pub struct RulesEngine {
    set: RwLock<Arc<RuleSet>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self {
            set: RwLock::new(Arc::new(RuleSet::default())),
        }
    }

    /// Current set snapshot; hold it for the whole request
    pub fn rule_set(&self) -> Arc<RuleSet> {
        self.set.read().clone()
    }

    pub fn list_rules(&self) -> Vec<Rule> {
        self.rule_set().all().cloned().collect()
    }

    /// Replace one rule type's list from a JSON document
    pub fn load_from_file(&self, rule_type: RuleType, path: impl AsRef<Path>) -> Result<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.load_from_json(rule_type, &content)
    }

    /// Replace one rule type's list from JSON text
    pub fn load_from_json(&self, rule_type: RuleType, json: &str) -> Result<usize> {
        let rules: Vec<Rule> = serde_json::from_str(json)
            .map_err(|e| Error::Load(format!("rules document rejected: {}", e)))?;

        for rule in &rules {
            validate_rule(rule)?;
            if rule.rule_type != rule_type {
                return Err(Error::Load(format!(
                    "rule {} has type {:?}, expected {:?}",
                    rule.rule_id, rule.rule_type, rule_type
                )));
            }
        }

        let count = rules.len();
        self.replace(rule_type, rules);
        info!("Loaded {} {:?} rules", count, rule_type);
        Ok(count)
    }

    /// Add a single rule; duplicate ids conflict
    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        validate_rule(&rule)?;

        let mut guard = self.set.write();
        if guard.all().any(|r| r.rule_id == rule.rule_id) {
            return Err(Error::Conflict(format!(
                "rule {} already exists",
                rule.rule_id
            )));
        }

        let mut next = (**guard).clone();
        match rule.rule_type {
            RuleType::ProviderSelection => next.provider_selection.push(rule),
            RuleType::MarginAdjustment => next.margin_adjustment.push(rule),
        }
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn remove_rule(&self, rule_id: &str) -> Result<()> {
        let mut guard = self.set.write();
        if !guard.all().any(|r| r.rule_id == rule_id) {
            return Err(Error::NotFound(rule_id.to_string()));
        }

        let mut next = (**guard).clone();
        next.provider_selection.retain(|r| r.rule_id != rule_id);
        next.margin_adjustment.retain(|r| r.rule_id != rule_id);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Flip a rule's enabled flag; returns the new state
    pub fn toggle_rule(&self, rule_id: &str) -> Result<bool> {
        let mut guard = self.set.write();
        let mut next = (**guard).clone();

        let rule = next
            .provider_selection
            .iter_mut()
            .chain(next.margin_adjustment.iter_mut())
            .find(|r| r.rule_id == rule_id)
            .ok_or_else(|| Error::NotFound(rule_id.to_string()))?;

        rule.enabled = !rule.enabled;
        let enabled = rule.enabled;
        *guard = Arc::new(next);
        Ok(enabled)
    }

    fn replace(&self, rule_type: RuleType, rules: Vec<Rule>) {
        let mut guard = self.set.write();
        let mut next = (**guard).clone();
        match rule_type {
            RuleType::ProviderSelection => next.provider_selection = rules,
            RuleType::MarginAdjustment => next.margin_adjustment = rules,
        }
        *guard = Arc::new(next);
    }

    /// Applicable rules of a type matching the context, priority descending.
    /// A rule whose conditions cannot be evaluated is skipped.
    pub fn matching_rules(
        &self,
        set: &RuleSet,
        rule_type: RuleType,
        ctx: &RuleContext,
        now: DateTime<Utc>,
    ) -> Vec<Rule> {
        let mut matched: Vec<Rule> = set
            .of_type(rule_type)
            .iter()
            .filter(|rule| rule.is_applicable(now))
            .filter(|rule| match eval_conditions(&rule.conditions, ctx) {
                Ok(hit) => hit,
                Err(reason) => {
                    warn!(
                        "Skipping malformed rule {} ({}): {}",
                        rule.rule_id, rule.rule_name, reason
                    );
                    false
                }
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        matched
    }

    /// Fold matching PROVIDER_SELECTION rules into one decision
    pub fn provider_decision(&self, ctx: &RuleContext, now: DateTime<Utc>) -> ProviderRuleDecision {
        let set = self.rule_set();
        let mut decision = ProviderRuleDecision::default();

        for rule in self.matching_rules(&set, RuleType::ProviderSelection, ctx, now) {
            if let RuleAction::ProviderSelection {
                preferred_providers,
                excluded_providers,
                routing_objective_override,
                force_provider,
            } = &rule.actions
            {
                decision.preferred.extend(preferred_providers.iter().cloned());
                decision.excluded.extend(excluded_providers.iter().cloned());
                // Later (lower-priority) rules may overwrite earlier ones
                if routing_objective_override.is_some() {
                    decision.objective_override = *routing_objective_override;
                }
                if force_provider.is_some() {
                    decision.force_provider = force_provider.clone();
                }
                decision.matched_rules.push(rule.rule_id.clone());
            }
        }

        decision
    }

    /// Fold matching MARGIN_ADJUSTMENT rules into one decision
    pub fn margin_decision(&self, ctx: &RuleContext, now: DateTime<Utc>) -> MarginRuleDecision {
        let set = self.rule_set();
        let mut decision = MarginRuleDecision::default();

        for rule in self.matching_rules(&set, RuleType::MarginAdjustment, ctx, now) {
            if let RuleAction::MarginAdjustment {
                base_margin_override,
                additional_margin_bps,
                tier_adjustment_multiplier,
                min_margin_bps,
                max_margin_bps,
            } = &rule.actions
            {
                if base_margin_override.is_some() {
                    decision.base_override = *base_margin_override;
                }
                decision.additional_bps += additional_margin_bps;
                if let Some(multiplier) = tier_adjustment_multiplier {
                    decision.tier_multiplier =
                        Some(decision.tier_multiplier.unwrap_or(Decimal::ONE) * multiplier);
                }
                if min_margin_bps.is_some() {
                    decision.min_override = *min_margin_bps;
                }
                if max_margin_bps.is_some() {
                    decision.max_override = *max_margin_bps;
                }
                decision.matched_rules.push(rule.rule_id.clone());
            }
        }

        decision
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_rule(rule: &Rule) -> Result<()> {
    if rule.rule_id.is_empty() {
        return Err(Error::Load("rule_id must not be empty".to_string()));
    }
    if let Some(until) = rule.valid_until {
        if rule.valid_from >= until {
            return Err(Error::Load(format!(
                "rule {} validity window is empty",
                rule.rule_id
            )));
        }
    }
    if rule.actions.rule_type() != rule.rule_type {
        return Err(Error::Load(format!(
            "rule {} action does not match rule_type {:?}",
            rule.rule_id, rule.rule_type
        )));
    }
    Ok(())
}

// ==================== Condition evaluation ====================

fn eval_conditions(conditions: &ConditionSet, ctx: &RuleContext) -> std::result::Result<bool, String> {
    if conditions.criteria.is_empty() {
        // A rule with no criteria matches everything
        return Ok(true);
    }

    let mut results = conditions
        .criteria
        .iter()
        .map(|criterion| eval_criterion(criterion, ctx));

    match conditions.operator {
        BoolOp::And => results.try_fold(true, |acc, r| r.map(|hit| acc && hit)),
        BoolOp::Or => results.try_fold(false, |acc, r| r.map(|hit| acc || hit)),
    }
}

fn eval_criterion(criterion: &Criterion, ctx: &RuleContext) -> std::result::Result<bool, String> {
    use CriterionOp::*;

    let field = match ctx.get(&criterion.field) {
        Some(value) => value,
        // Missing field: false for every operator except the negative
        // ones, which vacuously hold
        None => return Ok(matches!(criterion.operator, NotEquals | NotIn)),
    };

    let expect_value = || {
        criterion
            .value
            .as_ref()
            .ok_or_else(|| format!("{:?} requires `value`", criterion.operator))
    };
    let expect_values = || {
        criterion
            .values
            .as_ref()
            .ok_or_else(|| format!("{:?} requires `values`", criterion.operator))
    };

    match criterion.operator {
        Equals => Ok(loose_eq(field, expect_value()?)),
        NotEquals => Ok(!loose_eq(field, expect_value()?)),
        In => Ok(expect_values()?.iter().any(|v| loose_eq(field, v))),
        NotIn => Ok(!expect_values()?.iter().any(|v| loose_eq(field, v))),
        Gt | Ge | Lt | Le => {
            let lhs = as_decimal(field).ok_or_else(|| {
                format!("field {} is not numeric", criterion.field)
            })?;
            let rhs = as_decimal(expect_value()?)
                .ok_or_else(|| "comparison value is not numeric".to_string())?;
            Ok(match criterion.operator {
                Gt => lhs > rhs,
                Ge => lhs >= rhs,
                Lt => lhs < rhs,
                Le => lhs <= rhs,
                _ => unreachable!(),
            })
        }
        Between => {
            let bounds = expect_values()?;
            if bounds.len() != 2 {
                return Err("BETWEEN requires values: [lo, hi]".to_string());
            }
            let x = as_decimal(field)
                .ok_or_else(|| format!("field {} is not numeric", criterion.field))?;
            let lo = as_decimal(&bounds[0]).ok_or_else(|| "lo is not numeric".to_string())?;
            let hi = as_decimal(&bounds[1]).ok_or_else(|| "hi is not numeric".to_string())?;
            Ok(lo <= x && x <= hi)
        }
        Contains => Ok(as_string(field).contains(&as_string(expect_value()?))),
        StartsWith => Ok(as_string(field).starts_with(&as_string(expect_value()?))),
        EndsWith => Ok(as_string(field).ends_with(&as_string(expect_value()?))),
        OutsideHours => {
            let bounds = expect_values()?;
            if bounds.len() != 2 {
                return Err("OUTSIDE_HOURS requires values: [hh:mm, hh:mm]".to_string());
            }
            let t = parse_hhmm(&as_string(field))
                .ok_or_else(|| format!("field {} is not hh:mm", criterion.field))?;
            let open = parse_hhmm(&as_string(&bounds[0]))
                .ok_or_else(|| "window start is not hh:mm".to_string())?;
            let close = parse_hhmm(&as_string(&bounds[1]))
                .ok_or_else(|| "window end is not hh:mm".to_string())?;
            Ok(!inside_half_open(t, open, close))
        }
    }
}

/// Numeric comparison when both sides parse as decimals, else string equality
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_decimal(a), as_decimal(b)) {
        (Some(x), Some(y)) => x == y,
        _ => as_string(a) == as_string(b),
    }
}

fn as_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn inside_half_open(t: NaiveTime, open: NaiveTime, close: NaiveTime) -> bool {
    if open == close {
        true
    } else if open < close {
        t >= open && t < close
    } else {
        t >= open || t < close
    }
}
