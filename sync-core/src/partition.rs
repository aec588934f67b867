//! Id-space partitioning between source environments.
//!
//! Several source environments may feed one destination. Each of them owns
//! the ids described by its [`IdRule`]s; a destination only admits a record
//! from environment `E` if one of the record's ids is owned by `E`.

use std::collections::HashMap;
use sync_types::{IdRule, ResType};
use thiserror::Error;

/// Invalid id rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The first owned id must be positive.
    #[error("rule for {env}/{res}: start_id must be >= 1, got {start_id}")]
    InvalidStart {
        /// Environment the rule belongs to.
        env: String,
        /// Resource the rule belongs to.
        res: ResType,
        /// The rejected start id.
        start_id: i64,
    },

    /// The step must be positive.
    #[error("rule for {env}/{res}: step must be >= 1, got {step}")]
    InvalidStep {
        /// Environment the rule belongs to.
        env: String,
        /// Resource the rule belongs to.
        res: ResType,
        /// The rejected step.
        step: i64,
    },

    /// A bounded rule must not end before it starts.
    #[error("rule for {env}/{res}: end_id {end_id} is lower than start_id {start_id}")]
    EndBeforeStart {
        /// Environment the rule belongs to.
        env: String,
        /// Resource the rule belongs to.
        res: ResType,
        /// Configured start id.
        start_id: i64,
        /// Configured end id.
        end_id: i64,
    },
}

/// Check whether a single rule owns `id`.
///
/// Rules with a non-positive step own nothing.
pub fn rule_owns(rule: &IdRule, id: i64) -> bool {
    if rule.step <= 0 || id < rule.start_id {
        return false;
    }
    if rule.end_id.is_some_and(|end| id > end) {
        return false;
    }
    (id - rule.start_id) % rule.step == 0
}

/// Check whether any of `ids` is owned by any of `rules`.
pub fn match_id_rule(rules: &[IdRule], ids: &[i64]) -> bool {
    ids.iter().any(|&id| rules.iter().any(|rule| rule_owns(rule, id)))
}

/// Validate one rule as configured for `env` and `res`.
pub fn validate_rule(env: &str, res: ResType, rule: &IdRule) -> Result<(), RuleError> {
    if rule.start_id < 1 {
        return Err(RuleError::InvalidStart {
            env: env.to_string(),
            res,
            start_id: rule.start_id,
        });
    }
    if rule.step < 1 {
        return Err(RuleError::InvalidStep {
            env: env.to_string(),
            res,
            step: rule.step,
        });
    }
    if let Some(end_id) = rule.end_id {
        if end_id < rule.start_id {
            return Err(RuleError::EndBeforeStart {
                env: env.to_string(),
                res,
                start_id: rule.start_id,
                end_id,
            });
        }
    }
    Ok(())
}

/// All id rules, grouped by source environment and resource kind.
#[derive(Debug, Clone, Default)]
pub struct IdRuleSet {
    rules: HashMap<String, HashMap<ResType, Vec<IdRule>>>,
}

impl IdRuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a rule.
    pub fn add(&mut self, env: &str, res: ResType, rule: IdRule) -> Result<(), RuleError> {
        validate_rule(env, res, &rule)?;
        self.rules
            .entry(env.to_string())
            .or_default()
            .entry(res)
            .or_default()
            .push(rule);
        Ok(())
    }

    /// Rules of one environment for one resource kind.
    pub fn rules_for(&self, env: &str, res: ResType) -> &[IdRule] {
        self.rules
            .get(env)
            .and_then(|by_res| by_res.get(&res))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check whether environment `env` owns any of `ids` for `res`.
    pub fn matches(&self, env: &str, res: ResType, ids: &[i64]) -> bool {
        match_id_rule(self.rules_for(env, res), ids)
    }

    /// Names of all environments that have at least one rule.
    pub fn envs(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Whether environment `env` has any rule at all.
    pub fn has_env(&self, env: &str) -> bool {
        self.rules.get(env).is_some_and(|by_res| !by_res.is_empty())
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
