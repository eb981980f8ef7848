//! MCP (Model Context Protocol) server implementation for Countersign.
//!
//! This module exposes the approval operations (filing, deciding, commenting,
//! status and listing) as MCP tools, plus read-only resources for request
//! queues, over stdio or streamable HTTP.

pub mod error;
pub mod resources;
pub mod tools;

use crate::directory::StaticDirectory;
use crate::service::ApprovalService;
use crate::storage::SqliteStore;
use error::McpError;
use rmcp::{
    handler::server::wrapper::Parameters,
    model::*,
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router, ErrorData as McpErrorData, ServerHandler,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tools::*;
use tracing::info;

/// The approval service as shared between MCP sessions.
pub type SharedService = Arc<Mutex<ApprovalService<SqliteStore, StaticDirectory>>>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main MCP server for Countersign.
#[derive(Clone)]
pub struct CountersignServer {
    /// The approval service; every tool call takes the lock for its duration.
    pub service: SharedService,
    /// Tool router for MCP tool handling.
    pub tool_router: rmcp::handler::server::tool::ToolRouter<Self>,
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpErrorData> {
    let json = serde_json::to_string_pretty(value).map_err(|e| McpError::InternalError {
        message: format!("Failed to serialize response: {}", e),
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// All tool implementations in the tool_router impl block
#[tool_router]
impl CountersignServer {
    /// Create a new CountersignServer instance.
    pub fn new(service: ApprovalService<SqliteStore, StaticDirectory>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            tool_router: Self::tool_router(),
        }
    }

    /// Run over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<(), BoxError> {
        use rmcp::service::ServiceExt;
        let running = ServiceExt::serve(self, rmcp::transport::stdio())
            .await
            .map_err(|e| -> BoxError { Box::new(e) })?;
        running
            .waiting()
            .await
            .map_err(|e| -> BoxError { Box::new(e) })?;
        Ok(())
    }

    /// Run the streamable HTTP transport on `addr` under `/mcp` until `shutdown`
    /// is cancelled.
    pub async fn serve_http(self, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), BoxError> {
        use rmcp::transport::streamable_http_server::{
            session::local::LocalSessionManager, StreamableHttpService,
        };

        let server = self;
        let service = StreamableHttpService::new(
            move || Ok(server.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );
        let router = axum::Router::new().nest_service("/mcp", service);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "MCP server listening on http://{}/mcp", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        info!("MCP server stopped");
        Ok(())
    }

    /// Ping tool for health checks.
    #[tool(description = "Check if the server is running")]
    async fn ping(&self) -> Result<CallToolResult, McpErrorData> {
        Ok(CallToolResult::success(vec![Content::text("pong")]))
    }

    // ========================================================================
    // request_file
    // ========================================================================

    /// File a new request and resolve its evaluator chain.
    #[tool(
        description = "File a request (leave, overtime, incident-action, ...) for an applicant; resolves the evaluator chain from the organization directory"
    )]
    pub async fn request_file(
        &self,
        Parameters(params): Parameters<RequestFileParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        let request_path = validate_request_path(&params.request_path)?;
        let applicant = validate_id("applicant_id", &params.applicant_id)?;
        if let Some(incident_id) = params.incident_id {
            if incident_id <= 0 {
                return Err(McpError::ValidationFailed {
                    field: "incident_id".to_string(),
                    message: "must be a positive integer".to_string(),
                }
                .into());
            }
        }

        let service = self.service.lock().await;
        let filed = service
            .create_with_approval(
                &request_path,
                &applicant,
                params.auto_approve.unwrap_or(false),
                params.incident_id,
            )
            .map_err(McpError::from)?;

        json_result(&filed)
    }

    // ========================================================================
    // request_decide
    // ========================================================================

    /// Record an evaluator's decision on their own slot.
    #[tool(
        description = "Approve or reject a request as one of its assigned evaluators. Resubmitting the same decision is a no-op; changing it recomputes the status."
    )]
    pub async fn request_decide(
        &self,
        Parameters(params): Parameters<RequestDecideParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        validate_request_id(params.request_id)?;
        let evaluator = validate_id("evaluator_id", &params.evaluator_id)?;
        validate_remarks(&params.remarks)?;
        let remarks = params
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let service = self.service.lock().await;
        let receipt = service
            .decide(params.request_id, &evaluator, params.approve, remarks)
            .map_err(McpError::from)?;

        json_result(&serde_json::json!({
            "request": receipt.request,
            "applied": receipt.outcome.is_applied(),
            "status_changed": receipt.outcome.status_changed(),
        }))
    }

    // ========================================================================
    // request_comment
    // ========================================================================

    /// Append a comment or a reply.
    #[tool(description = "Add a comment to a request, or a reply to an existing comment")]
    pub async fn request_comment(
        &self,
        Parameters(params): Parameters<RequestCommentParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        validate_request_id(params.request_id)?;
        let author = validate_id("author_id", &params.author_id)?;
        validate_message(&params.message)?;

        let service = self.service.lock().await;
        let receipt = service
            .comment(params.request_id, &author, &params.message, params.reply_to)
            .map_err(McpError::from)?;

        json_result(&serde_json::json!({
            "comment_id": receipt.comment_id,
            "request": request_to_summary(&receipt.request),
        }))
    }

    // ========================================================================
    // request_status / request_get / request_list
    // ========================================================================

    #[tool(description = "Get the derived status of a request: pending, approved, or rejected")]
    pub async fn request_status(
        &self,
        Parameters(params): Parameters<RequestIdParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        validate_request_id(params.request_id)?;
        let service = self.service.lock().await;
        let status = service.status(params.request_id).map_err(McpError::from)?;

        json_result(&StatusResponse {
            request_id: params.request_id,
            status,
        })
    }

    #[tool(description = "Get a request with its full evaluation record (users, evaluators, comments)")]
    pub async fn request_get(
        &self,
        Parameters(params): Parameters<RequestIdParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        validate_request_id(params.request_id)?;
        let service = self.service.lock().await;
        let request = service.get(params.request_id).map_err(McpError::from)?;

        json_result(&request)
    }

    #[tool(
        description = "List requests filtered by status, request path, applicant, or an evaluator who has not decided yet"
    )]
    pub async fn request_list(
        &self,
        Parameters(params): Parameters<RequestListParams>,
    ) -> Result<CallToolResult, McpErrorData> {
        let filter = list_params_to_filter(&params)?;
        let service = self.service.lock().await;
        let requests = service.list(&filter).map_err(McpError::from)?;

        let summaries: Vec<RequestSummary> = requests.iter().map(request_to_summary).collect();
        json_result(&serde_json::json!({
            "requests": summaries,
            "count": summaries.len(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for CountersignServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Countersign tracks HR approval requests. File requests with \
                 request_file, record evaluator decisions with request_decide, \
                 discuss with request_comment, and query with request_status, \
                 request_get and request_list."
                    .to_string(),
            ),
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, rmcp::ErrorData>> + Send + '_
    {
        use rmcp::model::AnnotateAble;
        async move {
            Ok(ListResourcesResult {
                resources: resources::build_static_resources()
                    .into_iter()
                    .map(|r| r.no_annotation())
                    .collect(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourceTemplatesResult, rmcp::ErrorData>>
           + Send
           + '_ {
        use rmcp::model::AnnotateAble;
        async move {
            Ok(ListResourceTemplatesResult {
                resource_templates: resources::build_resource_templates()
                    .into_iter()
                    .map(|t| t.no_annotation())
                    .collect(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, rmcp::ErrorData>> + Send + '_
    {
        async move {
            resources::read_resource(&request.uri, &self.service)
                .await
                .map_err(McpErrorData::from)
        }
    }
}
