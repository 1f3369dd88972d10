//! Policy evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::rule::evaluate_rule;
use super::{
    ActionOutcome, ActionType, EvaluationTrace, PlanField, Policy, PolicyError,
    PolicyEvaluation, PolicyStore,
};
use crate::candidate::{EvaluationContext, MediaType, Protocol};

/// Configured fallbacks for plan fields no policy set.
#[derive(Debug, Clone, Default)]
pub struct PlanDefaults {
    pub downloaders: HashMap<Protocol, String>,
    pub libraries: HashMap<MediaType, String>,
    pub name_templates: HashMap<MediaType, String>,
}

impl PlanDefaults {
    fn lookup(&self, field: PlanField, ctx: &EvaluationContext) -> Option<&String> {
        let media_type = ctx.media.as_ref().map(|m| m.media_type);
        match field {
            PlanField::Downloader => self.downloaders.get(&ctx.candidate.protocol),
            PlanField::Library => media_type.and_then(|t| self.libraries.get(&t)),
            PlanField::NameTemplate => media_type.and_then(|t| self.name_templates.get(&t)),
        }
    }
}

/// Evaluates stored policies against candidate contexts.
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    defaults: PlanDefaults,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            defaults: PlanDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: PlanDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Run every enabled policy against `ctx`. Rule errors never abort the pass.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<EvaluationTrace, PolicyError> {
        let policies = self.store.list_enabled()?;
        let trace = evaluate_policies(&policies, ctx, &self.defaults);
        debug!(
            candidate = %ctx.candidate.title,
            policies = trace.policies.len(),
            plan = ?trace.final_plan,
            "Evaluated policies"
        );
        Ok(trace)
    }
}

/// Evaluate `policies` in the given order. Each plan field is set by the first
/// matching action that targets it; later actions are recorded with `applied = false`.
pub fn evaluate_policies(
    policies: &[Policy],
    ctx: &EvaluationContext,
    defaults: &PlanDefaults,
) -> EvaluationTrace {
    let mut trace = EvaluationTrace::default();

    for policy in policies {
        let mut entry = PolicyEvaluation {
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            priority: policy.priority,
            rule: policy.rule.to_string(),
            matched: false,
            rule_error: None,
            actions_applied: Vec::new(),
            stopped_processing: false,
        };

        match evaluate_rule(&policy.rule, ctx) {
            Ok(matched) => entry.matched = matched,
            Err(e) => {
                warn!(policy = %policy.name, error = %e, "Policy rule could not be evaluated");
                entry.rule_error = Some(e.to_string());
            }
        }

        if entry.matched {
            for action in &policy.actions {
                let applied = match action.action_type {
                    ActionType::SetDownloader => {
                        fill(&mut trace, PlanField::Downloader, &action.value)
                    }
                    ActionType::SetLibrary => fill(&mut trace, PlanField::Library, &action.value),
                    ActionType::SetNameTemplate => {
                        fill(&mut trace, PlanField::NameTemplate, &action.value)
                    }
                    ActionType::StopProcessing => {
                        entry.stopped_processing = true;
                        true
                    }
                };
                entry.actions_applied.push(ActionOutcome {
                    action_type: action.action_type,
                    value: action.value.clone(),
                    applied,
                });
            }
        }

        let stop = entry.stopped_processing;
        trace.policies.push(entry);
        if stop {
            break;
        }
    }

    for field in trace.final_plan.missing() {
        if let Some(value) = defaults.lookup(field, ctx) {
            *trace.final_plan.slot(field) = Some(value.clone());
            trace.defaulted.push(field);
        }
    }

    trace
}

/// First-set-wins: only an unset slot is filled.
fn fill(trace: &mut EvaluationTrace, field: PlanField, value: &Option<String>) -> bool {
    let slot = trace.final_plan.slot(field);
    match (slot.is_none(), value) {
        (true, Some(v)) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}
