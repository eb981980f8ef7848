use thiserror::Error;

use crate::entity::{ParticipantId, RequestId};

#[derive(Error, Debug)]
pub enum CountersignError {
    #[error("Not in a countersign project. Run 'countersign init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .countersign/ to reinitialize.")]
    AlreadyInitialized,

    #[error("No evaluators configured for '{request_path}' (department {department}, job class {job_class})")]
    NoEvaluatorsConfigured {
        request_path: String,
        department: String,
        job_class: String,
    },

    #[error("{evaluator} is not an assigned evaluator of request {request_id}")]
    NotAnAssignedEvaluator {
        request_id: RequestId,
        evaluator: ParticipantId,
    },

    #[error("Comment {comment_id} not found in request {request_id}")]
    CommentNotFound {
        request_id: RequestId,
        comment_id: u64,
    },

    #[error("Request {request_id} was modified concurrently ({attempts} attempts); retry with a fresh read")]
    ConcurrentModification { request_id: RequestId, attempts: u32 },

    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Request {0} is archived and can no longer change")]
    RequestArchived(RequestId),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Incident not found: {0}")]
    IncidentNotFound(i64),

    #[error("Cannot resolve '{role}' for applicant {applicant}")]
    UnresolvableRole {
        role: String,
        applicant: ParticipantId,
    },

    #[error("Invalid evaluation record: {0}")]
    InvalidRecord(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CountersignError {
    /// Errors a caller may resolve by re-reading and retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, CountersignError::ConcurrentModification { .. })
    }

    /// Rejected client actions, as opposed to system faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CountersignError::NotAnAssignedEvaluator { .. }
                | CountersignError::CommentNotFound { .. }
                | CountersignError::RequestNotFound(_)
                | CountersignError::RequestArchived(_)
                | CountersignError::ParticipantNotFound(_)
                | CountersignError::IncidentNotFound(_)
                | CountersignError::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CountersignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = CountersignError::ConcurrentModification {
            request_id: 4,
            attempts: 5,
        };
        assert!(err.is_transient());
        assert!(!err.is_client_error());

        let err = CountersignError::NotAnAssignedEvaluator {
            request_id: 4,
            evaluator: ParticipantId::from("E-9"),
        };
        assert!(err.is_client_error());
        assert!(!err.is_transient());

        assert!(CountersignError::RequestArchived(4).is_client_error());

        let err = CountersignError::Persistence("disk full".to_string());
        assert!(!err.is_client_error());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = CountersignError::NoEvaluatorsConfigured {
            request_path: "leave".to_string(),
            department: "nursing".to_string(),
            job_class: "staff".to_string(),
        };
        assert!(err.to_string().contains("'leave'"));

        let err = CountersignError::CommentNotFound {
            request_id: 2,
            comment_id: 17,
        };
        assert_eq!(err.to_string(), "Comment 17 not found in request 2");
    }
}
