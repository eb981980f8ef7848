//! MCP tool types and helpers for Countersign.
//!
//! This module contains parameter types, response types, and validation
//! helpers for MCP tools. The actual tool implementations are in mod.rs
//! within the #[tool_router] impl block.

use crate::entity::{FiledRequest, ParticipantId, RequestFilter, RequestStatus};
use crate::mcp::error::{validation, McpError};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Parameter and Result Types
// ============================================================================

/// Parameters for request_file tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestFileParams {
    /// Request type path, e.g. "leave", "overtime", "incident-action"
    pub request_path: String,
    /// Employee id of the applicant
    pub applicant_id: String,
    /// Start out approved (the evaluator chain is still recorded)
    pub auto_approve: Option<bool>,
    /// Incident this request acts upon
    pub incident_id: Option<i64>,
}

/// Parameters for request_decide tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestDecideParams {
    pub request_id: i64,
    /// Employee id of the deciding evaluator
    pub evaluator_id: String,
    /// true to approve, false to reject
    pub approve: bool,
    /// Optional remarks (max 2000 bytes)
    pub remarks: Option<String>,
}

/// Parameters for request_comment tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestCommentParams {
    pub request_id: i64,
    /// Employee id of the author
    pub author_id: String,
    /// Comment text (max 10000 bytes)
    pub message: String,
    /// Comment id to reply to
    pub reply_to: Option<u64>,
}

/// Parameters for request_status and request_get tools
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestIdParams {
    pub request_id: i64,
}

/// Parameters for request_list tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RequestListParams {
    /// Filter by status: pending, approved, rejected
    pub status: Option<String>,
    /// Filter by request type path
    pub request_path: Option<String>,
    /// Filter by applicant employee id
    pub applicant_id: Option<String>,
    /// Only requests still awaiting this evaluator
    pub awaiting: Option<String>,
    /// Maximum results (default 50, max 200)
    pub limit: Option<u32>,
}

/// Compact view of a request for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: i64,
    pub request_path: String,
    pub applicant_id: String,
    pub status: RequestStatus,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<i64>,
    pub evaluators: usize,
    pub decided: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_evaluator: Option<String>,
    pub comments: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of request_status tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub request_id: i64,
    pub status: RequestStatus,
}

// ============================================================================
// Conversion Helpers
// ============================================================================

pub fn request_to_summary(request: &FiledRequest) -> RequestSummary {
    let record = &request.record;
    RequestSummary {
        id: request.id,
        request_path: request.request_path.clone(),
        applicant_id: request.applicant_id.to_string(),
        status: request.status,
        version: request.version,
        incident_id: request.incident_id,
        evaluators: record.evaluators.len(),
        decided: record
            .evaluators
            .iter()
            .filter(|s| !s.decision.is_undecided())
            .count(),
        next_evaluator: record
            .first_pending_evaluator()
            .map(|s| s.evaluated_by.to_string()),
        comments: record.comment_count(),
        created_at: request.created_at,
        updated_at: request.updated_at,
    }
}

/// Build a store filter from validated list parameters.
pub fn list_params_to_filter(params: &RequestListParams) -> Result<RequestFilter, McpError> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse::<RequestStatus>()
                .map_err(|message| McpError::ValidationFailed {
                    field: "status".to_string(),
                    message,
                })
        })
        .transpose()?;

    let optional_id = |field: &str, value: &Option<String>| -> Result<Option<ParticipantId>, McpError> {
        value
            .as_deref()
            .map(|v| validate_id(field, v))
            .transpose()
    };

    let limit = params
        .limit
        .map(|l| l as usize)
        .unwrap_or(validation::DEFAULT_LIMIT)
        .min(validation::MAX_LIMIT);

    Ok(RequestFilter {
        status,
        request_path: params
            .request_path
            .as_deref()
            .map(validate_request_path)
            .transpose()?,
        applicant: optional_id("applicant_id", &params.applicant_id)?,
        awaiting: optional_id("awaiting", &params.awaiting)?,
        limit: Some(limit),
    })
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate an employee id and return it trimmed.
pub fn validate_id(field: &str, value: &str) -> Result<ParticipantId, McpError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(McpError::ValidationFailed {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if trimmed.len() > validation::MAX_ID_LENGTH {
        return Err(McpError::ValidationFailed {
            field: field.to_string(),
            message: format!("exceeds maximum length of {}", validation::MAX_ID_LENGTH),
        });
    }
    Ok(ParticipantId::from(trimmed))
}

pub fn validate_request_path(path: &str) -> Result<String, McpError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(McpError::ValidationFailed {
            field: "request_path".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if trimmed.len() > validation::MAX_PATH_LENGTH {
        return Err(McpError::ValidationFailed {
            field: "request_path".to_string(),
            message: format!("exceeds maximum length of {}", validation::MAX_PATH_LENGTH),
        });
    }
    Ok(trimmed.to_string())
}

pub fn validate_message(message: &str) -> Result<(), McpError> {
    if message.trim().is_empty() {
        return Err(McpError::ValidationFailed {
            field: "message".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if message.len() > validation::MAX_MESSAGE_SIZE {
        return Err(McpError::ValidationFailed {
            field: "message".to_string(),
            message: format!(
                "{} bytes exceeds maximum of {}",
                message.len(),
                validation::MAX_MESSAGE_SIZE
            ),
        });
    }
    Ok(())
}

pub fn validate_remarks(remarks: &Option<String>) -> Result<(), McpError> {
    if let Some(remarks) = remarks {
        if remarks.len() > validation::MAX_REMARKS_SIZE {
            return Err(McpError::ValidationFailed {
                field: "remarks".to_string(),
                message: format!(
                    "{} bytes exceeds maximum of {}",
                    remarks.len(),
                    validation::MAX_REMARKS_SIZE
                ),
            });
        }
    }
    Ok(())
}

pub fn validate_request_id(request_id: i64) -> Result<(), McpError> {
    if request_id <= 0 {
        return Err(McpError::ValidationFailed {
            field: "request_id".to_string(),
            message: "must be a positive integer".to_string(),
        });
    }
    Ok(())
}
