//! Search candidates: cache, evaluation context and the enqueue flow.

mod cache;
mod context;
mod service;
mod types;

use thiserror::Error;

use crate::job::JobError;
use crate::policy::{PlanField, PolicyError};
use crate::settings::SettingsError;

pub use cache::{CandidateCache, DEFAULT_CANDIDATE_TTL};
pub use context::{
    context_fields, field_info, EvaluationContext, FieldInfo, FieldKind, FieldValue, ValueType,
};
pub use service::{CandidateService, EnqueueOutcome};
pub use types::{
    CandidateKey, CandidateView, DownloadCandidate, MediaRef, MediaType, Protocol, SearchResult,
};

/// Errors from candidate lookup, context resolution and enqueueing.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Candidate not found: {0}")]
    NotFound(String),

    /// The candidate aged out of the cache; search again.
    #[error("Candidate expired: {0}")]
    Expired(String),

    #[error("Invalid field path: {0}")]
    InvalidFieldPath(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Candidate cache lock poisoned")]
    CachePoisoned,

    #[error("Plan incomplete, missing: {}", join_fields(.0))]
    PlanIncomplete(Vec<PlanField>),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

fn join_fields(fields: &[PlanField]) -> String {
    fields
        .iter()
        .map(PlanField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
