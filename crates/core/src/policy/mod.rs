//! Acquisition policies: stored rules that decide how a candidate is fetched and filed.

mod engine;
mod rule;
mod sqlite_store;
mod store;
mod types;

pub use engine::{evaluate_policies, PlanDefaults, PolicyEngine};
pub use rule::{evaluate_rule, is_field_path, RuleError};
pub use sqlite_store::SqlitePolicyStore;
pub use store::{PolicyError, PolicyInput, PolicyStore};
pub use types::{
    Action, ActionOutcome, ActionType, CompareOp, EvaluationTrace, Plan, PlanField, Policy,
    PolicyEvaluation, Rule,
};
