//! MCP resource implementations for Countersign.
//!
//! Static resources cover project-wide views (stats, the pending queue);
//! templates address a single request or one evaluator's queue.

use crate::entity::{ParticipantId, RequestFilter, RequestStatus};
use crate::mcp::error::McpError;
use crate::mcp::tools::request_to_summary;
use crate::mcp::SharedService;
use rmcp::model::{RawResource, RawResourceTemplate, ReadResourceResult, ResourceContents};
use serde::Serialize;

/// The countersign:// URI scheme prefix.
pub const COUNTERSIGN_SCHEME: &str = "countersign://";

/// MIME type for all resource responses.
pub const RESOURCE_MIME_TYPE: &str = "application/json";

/// Static resource URIs (directly readable without parameters).
pub mod static_resources {
    pub const STATS: &str = "countersign://stats";
    pub const PENDING: &str = "countersign://requests/pending";
}

/// Resource template URI patterns (require parameter substitution).
pub mod resource_templates {
    pub const REQUEST_BY_ID: &str = "countersign://request/{id}";
    pub const AWAITING_EVALUATOR: &str = "countersign://awaiting/{evaluator}";
}

fn raw_resource(uri: &str, name: &str, description: &str) -> RawResource {
    RawResource {
        uri: uri.to_string(),
        name: name.to_string(),
        title: Some(name.to_string()),
        description: Some(description.to_string()),
        mime_type: Some(RESOURCE_MIME_TYPE.to_string()),
        size: None,
        icons: None,
        meta: None,
    }
}

fn raw_template(uri_template: &str, name: &str, description: &str) -> RawResourceTemplate {
    RawResourceTemplate {
        uri_template: uri_template.to_string(),
        name: name.to_string(),
        title: Some(name.to_string()),
        description: Some(description.to_string()),
        mime_type: Some(RESOURCE_MIME_TYPE.to_string()),
        icons: None,
    }
}

/// Build the list of static resources.
pub fn build_static_resources() -> Vec<RawResource> {
    vec![
        raw_resource(
            static_resources::STATS,
            "Stats",
            "Request counts by status",
        ),
        raw_resource(
            static_resources::PENDING,
            "Pending Requests",
            "Every request still awaiting a decision",
        ),
    ]
}

/// Build the list of resource templates.
pub fn build_resource_templates() -> Vec<RawResourceTemplate> {
    vec![
        raw_template(
            resource_templates::REQUEST_BY_ID,
            "Request by ID",
            "A filed request with its full evaluation record",
        ),
        raw_template(
            resource_templates::AWAITING_EVALUATOR,
            "Evaluator Queue",
            "Requests on which the given evaluator has not decided yet",
        ),
    ]
}

/// Read a resource by URI.
pub async fn read_resource(uri: &str, service: &SharedService) -> Result<ReadResourceResult, McpError> {
    let Some(path) = uri.strip_prefix(COUNTERSIGN_SCHEME) else {
        return Err(McpError::InvalidResourceUri {
            uri: uri.to_string(),
        });
    };

    let service = service.lock().await;

    match path {
        "stats" => {
            let requests = service.list(&RequestFilter::default())?;
            let count = |status: RequestStatus| requests.iter().filter(|r| r.status == status).count();
            json_contents(
                uri,
                &serde_json::json!({
                    "total": requests.len(),
                    "pending": count(RequestStatus::Pending),
                    "approved": count(RequestStatus::Approved),
                    "rejected": count(RequestStatus::Rejected),
                    "countersign_version": env!("CARGO_PKG_VERSION"),
                }),
            )
        }
        "requests/pending" => {
            let requests = service.list(&RequestFilter {
                status: Some(RequestStatus::Pending),
                ..Default::default()
            })?;
            let summaries: Vec<_> = requests.iter().map(request_to_summary).collect();
            json_contents(uri, &summaries)
        }
        _ => {
            if let Some(id) = path.strip_prefix("request/") {
                let id: i64 = id.parse().map_err(|_| McpError::InvalidResourceUri {
                    uri: uri.to_string(),
                })?;
                let request = service.get(id)?;
                return json_contents(uri, &request);
            }
            if let Some(evaluator) = path.strip_prefix("awaiting/") {
                if evaluator.is_empty() {
                    return Err(McpError::InvalidResourceUri {
                        uri: uri.to_string(),
                    });
                }
                let requests = service.list(&RequestFilter {
                    awaiting: Some(ParticipantId::from(evaluator)),
                    ..Default::default()
                })?;
                let summaries: Vec<_> = requests.iter().map(request_to_summary).collect();
                return json_contents(uri, &summaries);
            }

            Err(McpError::ResourceNotFound {
                uri: uri.to_string(),
            })
        }
    }
}

fn json_contents<T: Serialize>(uri: &str, value: &T) -> Result<ReadResourceResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| McpError::InternalError {
        message: format!("Failed to serialize resource: {}", e),
    })?;

    Ok(ReadResourceResult {
        contents: vec![ResourceContents::TextResourceContents {
            uri: uri.to_string(),
            mime_type: Some(RESOURCE_MIME_TYPE.to_string()),
            text,
            meta: None,
        }],
    })
}
