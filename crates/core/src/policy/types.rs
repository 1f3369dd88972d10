//! Policy data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Rules
// ============================================================================

/// Comparison operator of a leaf rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Contains => "contains",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean rule tree. Leaves compare two operands; an operand is either a
/// context field path (`candidate.seeders`) or a literal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    Compare {
        left: String,
        op: CompareOp,
        right: String,
    },
    And {
        rules: Vec<Rule>,
    },
    Or {
        rules: Vec<Rule>,
    },
    Not {
        rule: Box<Rule>,
    },
}

impl Rule {
    pub fn compare(left: impl Into<String>, op: CompareOp, right: impl Into<String>) -> Self {
        Rule::Compare {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    pub fn and(rules: Vec<Rule>) -> Self {
        Rule::And { rules }
    }

    pub fn or(rules: Vec<Rule>) -> Self {
        Rule::Or { rules }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(rule: Rule) -> Self {
        Rule::Not {
            rule: Box::new(rule),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Rule::And { rules } | Rule::Or { rules } => {
                let joiner = if matches!(self, Rule::And { .. }) {
                    " and "
                } else {
                    " or "
                };
                let parts: Vec<String> = rules.iter().map(|r| format!("({})", r)).collect();
                f.write_str(&parts.join(joiner))
            }
            Rule::Not { rule } => write!(f, "not ({})", rule),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// What a matching policy does to the plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SetDownloader,
    SetLibrary,
    SetNameTemplate,
    StopProcessing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Action {
    pub fn set_downloader(id: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::SetDownloader,
            value: Some(id.into()),
        }
    }

    pub fn set_library(id: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::SetLibrary,
            value: Some(id.into()),
        }
    }

    pub fn set_name_template(id: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::SetNameTemplate,
            value: Some(id.into()),
        }
    }

    pub fn stop_processing() -> Self {
        Self {
            action_type: ActionType::StopProcessing,
            value: None,
        }
    }
}

// ============================================================================
// Policies
// ============================================================================

/// A stored policy: one rule and its ordered actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    /// Lower runs first.
    pub priority: i64,
    pub rule: Rule,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Plans and traces
// ============================================================================

/// A plan field a policy can set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanField {
    Downloader,
    Library,
    NameTemplate,
}

impl PlanField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanField::Downloader => "downloader",
            PlanField::Library => "library",
            PlanField::NameTemplate => "name_template",
        }
    }
}

impl fmt::Display for PlanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where, how and under what name to acquire a candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub downloader_id: Option<String>,
    pub library_id: Option<String>,
    pub name_template_id: Option<String>,
}

impl Plan {
    pub fn slot(&mut self, field: PlanField) -> &mut Option<String> {
        match field {
            PlanField::Downloader => &mut self.downloader_id,
            PlanField::Library => &mut self.library_id,
            PlanField::NameTemplate => &mut self.name_template_id,
        }
    }

    /// Fields still unset.
    pub fn missing(&self) -> Vec<PlanField> {
        let mut missing = Vec::new();
        if self.downloader_id.is_none() {
            missing.push(PlanField::Downloader);
        }
        if self.library_id.is_none() {
            missing.push(PlanField::Library);
        }
        if self.name_template_id.is_none() {
            missing.push(PlanField::NameTemplate);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// An action as it played out during one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionOutcome {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// False when an earlier policy had already set the field.
    pub applied: bool,
}

/// Trace entry for one policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyEvaluation {
    pub policy_id: String,
    pub policy_name: String,
    pub priority: i64,
    pub rule: String,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_error: Option<String>,
    pub actions_applied: Vec<ActionOutcome>,
    pub stopped_processing: bool,
}

/// Result of evaluating every enabled policy against one context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationTrace {
    pub policies: Vec<PolicyEvaluation>,
    pub final_plan: Plan,
    /// Plan fields filled from configured defaults after the pass.
    #[serde(default)]
    pub defaulted: Vec<PlanField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_json_shape() {
        let rule = Rule::and(vec![
            Rule::compare("candidate.seeders", CompareOp::Gte, "10"),
            Rule::not(Rule::compare("quality.source", CompareOp::In, "HDTV, SDTV")),
        ]);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "and");
        assert_eq!(json["rules"][0]["op"], ">=");
        assert_eq!(json["rules"][1]["rule"]["op"], "in");

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_not_in_operator_name() {
        let rule: Rule = serde_json::from_str(
            r#"{"type":"compare","left":"candidate.indexer","op":"not in","right":"a,b"}"#,
        )
        .unwrap();
        assert!(matches!(rule, Rule::Compare { op: CompareOp::NotIn, .. }));
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::or(vec![
            Rule::compare("a.b", CompareOp::Eq, "1"),
            Rule::compare("a.c", CompareOp::Contains, "x"),
        ]);
        assert_eq!(rule.to_string(), "(a.b == 1) or (a.c contains x)");
    }

    #[test]
    fn test_plan_missing() {
        let mut plan = Plan::default();
        assert_eq!(plan.missing().len(), 3);
        *plan.slot(PlanField::Library) = Some("lib".to_string());
        assert_eq!(plan.missing(), vec![PlanField::Downloader, PlanField::NameTemplate]);
        assert!(!plan.is_complete());
    }
}
