//! Policy storage trait and write validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Action, ActionType, Policy, Rule};

/// Error type for policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy not found: {0}")]
    NotFound(String),

    #[error("Invalid policy: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Fields supplied when creating or replacing a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i64,
    pub rule: Rule,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

impl PolicyInput {
    pub fn new(name: impl Into<String>, priority: i64, rule: Rule, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            priority,
            rule,
            actions,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the input before it is written.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::Validation("name is required".to_string()));
        }
        validate_rule(&self.rule)?;
        for (idx, action) in self.actions.iter().enumerate() {
            validate_action(idx, action)?;
        }
        Ok(())
    }
}

fn validate_rule(rule: &Rule) -> Result<(), PolicyError> {
    match rule {
        Rule::Compare { left, op, right } => {
            if left.trim().is_empty() || right.trim().is_empty() {
                return Err(PolicyError::Validation(format!(
                    "comparison '{}' needs both operands",
                    op
                )));
            }
            Ok(())
        }
        Rule::And { rules } | Rule::Or { rules } => {
            if rules.is_empty() {
                return Err(PolicyError::Validation(
                    "logical operator needs at least one sub-rule".to_string(),
                ));
            }
            rules.iter().try_for_each(validate_rule)
        }
        Rule::Not { rule } => validate_rule(rule),
    }
}

fn validate_action(idx: usize, action: &Action) -> Result<(), PolicyError> {
    let has_value = action
        .value
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());
    if action.action_type != ActionType::StopProcessing && !has_value {
        return Err(PolicyError::Validation(format!(
            "action {} ({:?}) requires a value",
            idx, action.action_type
        )));
    }
    Ok(())
}

/// Trait for policy storage backends.
pub trait PolicyStore: Send + Sync {
    /// All policies, in evaluation order.
    fn list(&self) -> Result<Vec<Policy>, PolicyError>;

    /// Enabled policies ordered by priority, then `created_at`, then id.
    fn list_enabled(&self) -> Result<Vec<Policy>, PolicyError>;

    fn get(&self, id: &str) -> Result<Option<Policy>, PolicyError>;

    fn create(&self, input: PolicyInput) -> Result<Policy, PolicyError>;

    /// Replace every editable field of a policy.
    fn update(&self, id: &str, input: PolicyInput) -> Result<Policy, PolicyError>;

    /// Delete a policy, returning it.
    fn delete(&self, id: &str) -> Result<Policy, PolicyError>;
}
