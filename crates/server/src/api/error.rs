//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use snaggle_core::import::ImportError;
use snaggle_core::job::JobError;
use snaggle_core::policy::PolicyError;
use snaggle_core::settings::SettingsError;
use snaggle_core::CandidateError;
use tracing::error;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error returned from a handler, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = match &e {
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::Conflict { .. } | JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
            JobError::Database(_) | JobError::Serialization(_) => {
                return Self::internal(e.to_string())
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        let status = match &e {
            ImportError::NotFound(_) => StatusCode::NOT_FOUND,
            ImportError::Conflict { .. }
            | ImportError::InvalidTransition { .. }
            | ImportError::CannotReimport { .. } => StatusCode::CONFLICT,
            ImportError::Database(_) | ImportError::Serialization(_) => {
                return Self::internal(e.to_string())
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        let status = match &e {
            PolicyError::NotFound(_) => StatusCode::NOT_FOUND,
            PolicyError::Validation(_) => StatusCode::BAD_REQUEST,
            PolicyError::Database(_) | PolicyError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        let status = match &e {
            SettingsError::UnknownKey(_) => StatusCode::NOT_FOUND,
            SettingsError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            SettingsError::Database(_) | SettingsError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<CandidateError> for ApiError {
    fn from(e: CandidateError) -> Self {
        match e {
            CandidateError::Policy(e) => e.into(),
            CandidateError::Job(e) => e.into(),
            CandidateError::Settings(e) => e.into(),
            CandidateError::NotFound(_) => Self::not_found(e.to_string()),
            CandidateError::Expired(_) => Self::new(StatusCode::GONE, e.to_string()),
            CandidateError::InvalidFieldPath(_) | CandidateError::UnknownField(_) => {
                Self::bad_request(e.to_string())
            }
            CandidateError::PlanIncomplete(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            CandidateError::CachePoisoned => Self::internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snaggle_core::job::JobStatus;
    use snaggle_core::policy::PlanField;

    #[test]
    fn test_candidate_errors_map_to_status() {
        let cases = [
            (CandidateError::NotFound("1:a".into()), StatusCode::NOT_FOUND),
            (CandidateError::Expired("1:a".into()), StatusCode::GONE),
            (
                CandidateError::UnknownField("candidate.nope".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CandidateError::PlanIncomplete(vec![PlanField::Library]),
                StatusCode::CONFLICT,
            ),
            (
                CandidateError::Policy(PolicyError::Database("locked".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_job_conflict_is_409() {
        let err = JobError::InvalidTransition {
            from: JobStatus::Imported,
            to: JobStatus::Cancelled,
        };
        assert_eq!(ApiError::from(err).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_settings_errors() {
        assert_eq!(
            ApiError::from(SettingsError::UnknownKey("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        let invalid = SettingsError::InvalidValue {
            key: "jobs.max_attempts".into(),
            reason: "expected int".into(),
        };
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);
    }
}
