//! MCP-specific error types and mapping to JSON-RPC error codes.

use crate::error::CountersignError;
use rmcp::model::ErrorCode;
use rmcp::ErrorData as RmcpError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Custom MCP error codes (in the -32000 to -32099 range for server errors)
pub mod error_codes {
    pub const REQUEST_NOT_FOUND: i32 = -32001;
    pub const PARTICIPANT_NOT_FOUND: i32 = -32002;
    pub const VALIDATION_FAILED: i32 = -32003;
    pub const INCIDENT_NOT_FOUND: i32 = -32004;
    pub const RESOURCE_NOT_FOUND: i32 = -32005;
    pub const INVALID_RESOURCE_URI: i32 = -32006;
    pub const STORAGE_ERROR: i32 = -32010;
    pub const INTERNAL_ERROR: i32 = -32011;
    pub const NOT_AN_ASSIGNED_EVALUATOR: i32 = -32020;
    pub const COMMENT_NOT_FOUND: i32 = -32021;
    pub const NO_EVALUATORS_CONFIGURED: i32 = -32022;
    pub const REQUEST_ARCHIVED: i32 = -32023;
    pub const CONCURRENT_MODIFICATION: i32 = -32030;
}

/// MCP-specific error types with detailed context.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum McpError {
    #[error("Request not found: {id}")]
    RequestNotFound { id: i64 },

    #[error("Request {id} is archived")]
    RequestArchived { id: i64 },

    #[error("Participant not found: {id}")]
    ParticipantNotFound { id: String },

    #[error("Incident not found: {id}")]
    IncidentNotFound { id: i64 },

    #[error("Validation failed for field '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("{evaluator} is not an assigned evaluator of request {request_id}")]
    NotAnAssignedEvaluator { request_id: i64, evaluator: String },

    #[error("Comment {comment_id} not found in request {request_id}")]
    CommentNotFound { request_id: i64, comment_id: u64 },

    #[error("No evaluators configured: {message}")]
    NoEvaluatorsConfigured { request_path: String, message: String },

    #[error("Request {request_id} was modified concurrently; retry")]
    ConcurrentModification { request_id: i64, attempts: u32 },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Invalid resource URI: {uri}")]
    InvalidResourceUri { uri: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl McpError {
    /// Get the JSON-RPC error code for this error type.
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::RequestNotFound { .. } => error_codes::REQUEST_NOT_FOUND,
            McpError::RequestArchived { .. } => error_codes::REQUEST_ARCHIVED,
            McpError::ParticipantNotFound { .. } => error_codes::PARTICIPANT_NOT_FOUND,
            McpError::IncidentNotFound { .. } => error_codes::INCIDENT_NOT_FOUND,
            McpError::ValidationFailed { .. } => error_codes::VALIDATION_FAILED,
            McpError::NotAnAssignedEvaluator { .. } => error_codes::NOT_AN_ASSIGNED_EVALUATOR,
            McpError::CommentNotFound { .. } => error_codes::COMMENT_NOT_FOUND,
            McpError::NoEvaluatorsConfigured { .. } => error_codes::NO_EVALUATORS_CONFIGURED,
            McpError::ConcurrentModification { .. } => error_codes::CONCURRENT_MODIFICATION,
            McpError::ResourceNotFound { .. } => error_codes::RESOURCE_NOT_FOUND,
            McpError::InvalidResourceUri { .. } => error_codes::INVALID_RESOURCE_URI,
            McpError::StorageError { .. } => error_codes::STORAGE_ERROR,
            McpError::InternalError { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Get the error type name for the data payload.
    pub fn error_type(&self) -> &'static str {
        match self {
            McpError::RequestNotFound { .. } => "RequestNotFound",
            McpError::RequestArchived { .. } => "RequestArchived",
            McpError::ParticipantNotFound { .. } => "ParticipantNotFound",
            McpError::IncidentNotFound { .. } => "IncidentNotFound",
            McpError::ValidationFailed { .. } => "ValidationFailed",
            McpError::NotAnAssignedEvaluator { .. } => "NotAnAssignedEvaluator",
            McpError::CommentNotFound { .. } => "CommentNotFound",
            McpError::NoEvaluatorsConfigured { .. } => "NoEvaluatorsConfigured",
            McpError::ConcurrentModification { .. } => "ConcurrentModification",
            McpError::ResourceNotFound { .. } => "ResourceNotFound",
            McpError::InvalidResourceUri { .. } => "InvalidResourceUri",
            McpError::StorageError { .. } => "StorageError",
            McpError::InternalError { .. } => "InternalError",
        }
    }

    /// Convert to rmcp ErrorData for JSON-RPC response.
    pub fn to_rmcp_error(&self) -> RmcpError {
        RmcpError {
            code: ErrorCode(self.error_code()),
            message: self.to_string().into(),
            data: Some(json!({
                "error_type": self.error_type(),
                "details": self.clone()
            })),
        }
    }
}

impl From<McpError> for RmcpError {
    fn from(err: McpError) -> Self {
        err.to_rmcp_error()
    }
}

impl From<CountersignError> for McpError {
    fn from(err: CountersignError) -> Self {
        match err {
            CountersignError::RequestNotFound(id) => McpError::RequestNotFound { id },
            CountersignError::RequestArchived(id) => McpError::RequestArchived { id },
            CountersignError::ParticipantNotFound(id) => McpError::ParticipantNotFound {
                id: id.to_string(),
            },
            CountersignError::IncidentNotFound(id) => McpError::IncidentNotFound { id },
            CountersignError::NotAnAssignedEvaluator {
                request_id,
                evaluator,
            } => McpError::NotAnAssignedEvaluator {
                request_id,
                evaluator: evaluator.to_string(),
            },
            CountersignError::CommentNotFound {
                request_id,
                comment_id,
            } => McpError::CommentNotFound {
                request_id,
                comment_id,
            },
            CountersignError::NoEvaluatorsConfigured {
                request_path,
                department,
                job_class,
            } => McpError::NoEvaluatorsConfigured {
                message: format!(
                    "'{}' has no chain for department {}, job class {}",
                    request_path, department, job_class
                ),
                request_path,
            },
            CountersignError::UnresolvableRole { .. } => McpError::NoEvaluatorsConfigured {
                request_path: String::new(),
                message: err.to_string(),
            },
            CountersignError::ConcurrentModification {
                request_id,
                attempts,
            } => McpError::ConcurrentModification {
                request_id,
                attempts,
            },
            CountersignError::NotInitialized
            | CountersignError::AlreadyInitialized
            | CountersignError::Persistence(_)
            | CountersignError::InvalidRecord(_)
            | CountersignError::Io(_) => McpError::StorageError {
                message: err.to_string(),
            },
            CountersignError::InvalidInput(message) => McpError::ValidationFailed {
                field: "input".to_string(),
                message,
            },
            CountersignError::Config(_)
            | CountersignError::Server(_)
            | CountersignError::Json(_)
            | CountersignError::Yaml(_) => McpError::InternalError {
                message: err.to_string(),
            },
        }
    }
}

/// Validation constants.
pub mod validation {
    pub const MAX_ID_LENGTH: usize = 128;
    pub const MAX_PATH_LENGTH: usize = 128;
    pub const MAX_MESSAGE_SIZE: usize = 10_000;
    pub const MAX_REMARKS_SIZE: usize = 2_000;
    pub const MAX_DESCRIPTION_SIZE: usize = 10_000;
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ParticipantId;

    #[test]
    fn test_error_code_mapping() {
        let err = McpError::RequestNotFound { id: 3 };
        assert_eq!(err.error_code(), error_codes::REQUEST_NOT_FOUND);

        let err = McpError::ValidationFailed {
            field: "message".to_string(),
            message: "too long".to_string(),
        };
        assert_eq!(err.error_code(), error_codes::VALIDATION_FAILED);
    }

    #[test]
    fn test_from_engine_error() {
        let err: McpError = CountersignError::NotAnAssignedEvaluator {
            request_id: 9,
            evaluator: ParticipantId::from("E-7"),
        }
        .into();
        assert!(matches!(
            &err,
            McpError::NotAnAssignedEvaluator { request_id: 9, evaluator } if evaluator == "E-7"
        ));

        let err: McpError = CountersignError::NoEvaluatorsConfigured {
            request_path: "overtime".to_string(),
            department: "finance".to_string(),
            job_class: "staff".to_string(),
        }
        .into();
        assert!(matches!(
            &err,
            McpError::NoEvaluatorsConfigured { request_path, .. } if request_path == "overtime"
        ));

        let err: McpError = CountersignError::RequestArchived(5).into();
        assert_eq!(err.error_code(), error_codes::REQUEST_ARCHIVED);

        let err: McpError = CountersignError::Persistence("locked".to_string()).into();
        assert_eq!(err.error_code(), error_codes::STORAGE_ERROR);
    }

    #[test]
    fn test_to_rmcp_error() {
        let err = McpError::ConcurrentModification {
            request_id: 1,
            attempts: 5,
        };
        let rmcp_err = err.to_rmcp_error();
        assert_eq!(rmcp_err.code, ErrorCode(error_codes::CONCURRENT_MODIFICATION));
        assert!(rmcp_err.message.contains("modified concurrently"));
        assert_eq!(rmcp_err.data.unwrap()["error_type"], "ConcurrentModification");
    }
}
