use std::env;
use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::Project;
use crate::directory::StaticDirectory;
use crate::entity::{CommentNode, FiledRequest, Incident, ParticipantId, RequestFilter, RequestStatus};
use crate::error::{CountersignError, Result};
use crate::mcp::CountersignServer;
use crate::notify::OutboxNotifier;
use crate::service::ApprovalService;
use crate::storage::SqliteStore;

fn open_service() -> Result<ApprovalService<SqliteStore, StaticDirectory>> {
    let project = Project::from_current_dir()?;
    ApprovalService::open(&project)
}

fn participant_id(value: &str) -> Result<ParticipantId> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CountersignError::InvalidInput(
            "employee id must not be empty".to_string(),
        ));
    }
    Ok(ParticipantId::from(trimmed))
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;
    let project = Project::init(&root)?;

    println!("Initialized countersign project in {}", root.display());
    println!(
        "  Edit {} to configure employees and approval chains.",
        project.directory_path().display()
    );
    Ok(())
}

pub fn handle_file(
    request_path: String,
    applicant: String,
    auto_approve: bool,
    incident: Option<i64>,
    json: bool,
) -> Result<()> {
    let service = open_service()?;
    let applicant = participant_id(&applicant)?;
    let filed = service.create_with_approval(request_path.trim(), &applicant, auto_approve, incident)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&filed)?);
    } else {
        println!(
            "Filed {} request #{} for {} [{}]",
            filed.request_path, filed.id, filed.applicant_id, filed.status
        );
        for slot in filed.record.evaluators_in_order() {
            println!("  {}. {}", slot.order, participant_label(&filed, &slot.evaluated_by));
        }
    }
    Ok(())
}

pub fn handle_decide(
    id: i64,
    evaluator: String,
    approve: bool,
    reject: bool,
    remarks: Option<String>,
    json: bool,
) -> Result<()> {
    if approve == reject {
        return Err(CountersignError::InvalidInput(
            "pass exactly one of --approve or --reject".to_string(),
        ));
    }
    let service = open_service()?;
    let evaluator = participant_id(&evaluator)?;
    let remarks = remarks.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let receipt = service.decide(id, &evaluator, approve, remarks)?;

    if json {
        let body = serde_json::json!({
            "request": receipt.request,
            "applied": receipt.outcome.is_applied(),
            "status_changed": receipt.outcome.status_changed(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if receipt.outcome.is_applied() {
        println!(
            "Recorded {} by {} on request #{} (now {})",
            if approve { "approval" } else { "rejection" },
            evaluator,
            id,
            receipt.request.status
        );
    } else {
        println!("No change to request #{} ({})", id, receipt.request.status);
    }
    Ok(())
}

pub fn handle_comment(
    id: i64,
    message: String,
    author: String,
    reply_to: Option<u64>,
    json: bool,
) -> Result<()> {
    if message.trim().is_empty() {
        return Err(CountersignError::InvalidInput(
            "comment must not be empty".to_string(),
        ));
    }
    let service = open_service()?;
    let author = participant_id(&author)?;
    let receipt = service.comment(id, &author, &message, reply_to)?;

    if json {
        let comment = receipt.request.record.find_comment(receipt.comment_id);
        println!("{}", serde_json::to_string_pretty(&comment)?);
    } else {
        match reply_to {
            Some(parent) => println!(
                "Added reply {} to comment {} on request #{}",
                receipt.comment_id, parent, id
            ),
            None => println!("Added comment {} to request #{}", receipt.comment_id, id),
        }
    }
    Ok(())
}

pub fn handle_status(id: i64, json: bool) -> Result<()> {
    let service = open_service()?;
    let status = service.status(id)?;

    if json {
        let body = serde_json::json!({ "request_id": id, "status": status });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", status);
    }
    Ok(())
}

pub fn handle_show(id: i64, json: bool) -> Result<()> {
    let service = open_service()?;
    let request = service.get(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    println!(
        "Request #{} ({}) [{}]{}",
        request.id,
        request.request_path,
        request.status,
        if request.archived { " archived" } else { "" }
    );
    println!("  Applicant: {}", participant_label(&request, &request.applicant_id));
    println!("  Filed:     {}", request.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(incident) = request.incident_id {
        println!("  Incident:  #{}", incident);
    }
    if request.record.auto_approved {
        println!("  Auto-approved");
    }

    println!("\nEvaluators:");
    for slot in request.record.evaluators_in_order() {
        let mut line = format!(
            "  {}. {} [{}]",
            slot.order,
            participant_label(&request, &slot.evaluated_by),
            slot.decision
        );
        if let Some(at) = slot.decision.decided_at() {
            line.push_str(&format!(" {}", at.format("%Y-%m-%d %H:%M")));
        }
        if let Some(remarks) = slot.decision.remarks() {
            line.push_str(&format!(" \"{}\"", remarks));
        }
        println!("{}", line);
    }

    if !request.record.comments.is_empty() {
        println!("\nComments:");
        for comment in &request.record.comments {
            print_comment(&request, comment, 1);
        }
    }
    Ok(())
}

fn print_comment(request: &FiledRequest, comment: &CommentNode, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{}[{}] {} ({}): {}",
        indent,
        comment.id,
        participant_label(request, &comment.author),
        comment.timestamp.format("%Y-%m-%d %H:%M"),
        comment.message
    );
    for reply in &comment.replies {
        print_comment(request, reply, depth + 1);
    }
}

fn participant_label(request: &FiledRequest, id: &ParticipantId) -> String {
    match request.record.participant(id) {
        Some(p) => format!("{} ({})", p.name, p.id),
        None => id.to_string(),
    }
}

pub fn handle_list(
    status: Option<String>,
    path: Option<String>,
    applicant: Option<String>,
    awaiting: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let status = status
        .as_deref()
        .map(str::parse::<RequestStatus>)
        .transpose()
        .map_err(CountersignError::InvalidInput)?;
    let filter = RequestFilter {
        status,
        request_path: path,
        applicant: applicant.as_deref().map(participant_id).transpose()?,
        awaiting: awaiting.as_deref().map(participant_id).transpose()?,
        limit,
    };

    let service = open_service()?;
    let requests = service.list(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
    } else if requests.is_empty() {
        println!("No requests found.");
    } else {
        println!("Requests:\n");
        for r in &requests {
            let next = r
                .record
                .first_pending_evaluator()
                .filter(|_| r.status == RequestStatus::Pending)
                .map(|s| format!(" next:{}", s.evaluated_by))
                .unwrap_or_default();
            println!(
                "  #{:<4} [{}] {} by {}{}",
                r.id, r.status, r.request_path, r.applicant_id, next
            );
        }
    }
    Ok(())
}

pub fn handle_archive(id: i64) -> Result<()> {
    let service = open_service()?;
    if service.archive(id)? {
        println!("Archived request #{}", id);
    } else {
        println!("Request #{} was already archived", id);
    }
    Ok(())
}

pub fn handle_incident_report(employee: String, description: String, json: bool) -> Result<()> {
    if description.trim().is_empty() {
        return Err(CountersignError::InvalidInput(
            "incident description must not be empty".to_string(),
        ));
    }
    let service = open_service()?;
    let incident = service.report_incident(&participant_id(&employee)?, description.trim())?;
    print_incident(&incident, json, "Reported")
}

pub fn handle_incident_show(id: i64, json: bool) -> Result<()> {
    let service = open_service()?;
    let incident = service.incident(id)?;
    print_incident(&incident, json, "Incident")
}

fn print_incident(incident: &Incident, json: bool, verb: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(incident)?);
    } else {
        println!(
            "{} #{} for {}{}",
            verb,
            incident.id,
            incident.employee_id,
            if incident.acted_upon { " [acted upon]" } else { "" }
        );
        println!("  {}", incident.description);
    }
    Ok(())
}

pub fn handle_outbox(limit: Option<usize>, ack: Vec<String>, json: bool) -> Result<()> {
    let project = Project::from_current_dir()?;
    let outbox = OutboxNotifier::open(
        &project.database_path(),
        project.config().concurrency.busy_timeout(),
    )?;

    for id in &ack {
        let uuid = Uuid::parse_str(id.trim())
            .map_err(|e| CountersignError::InvalidInput(format!("message id '{}': {}", id, e)))?;
        if !outbox.acknowledge(uuid)? {
            eprintln!("Warning: message {} was not queued", uuid);
        }
    }
    if !ack.is_empty() && !json {
        println!("Acknowledged {} message(s)", ack.len());
    }

    let messages = outbox.messages(limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else if messages.is_empty() {
        println!("Outbox is empty.");
    } else {
        for m in &messages {
            println!("  {} -> {} <{}>: {}", m.id, m.recipient_id, m.recipient_email, m.subject);
        }
    }
    Ok(())
}

pub fn handle_serve(http: Option<String>) -> Result<()> {
    let service = open_service()?;
    let server = CountersignServer::new(service);
    let runtime = tokio::runtime::Runtime::new()?;

    let result = runtime.block_on(async move {
        match http {
            None => {
                info!("MCP server running on stdio");
                server.serve_stdio().await
            }
            Some(addr) => {
                let addr: SocketAddr = addr.parse().map_err(|e| {
                    CountersignError::InvalidInput(format!("--http address '{}': {}", addr, e))
                })?;
                let shutdown = CancellationToken::new();
                let trigger = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Ctrl-C received, shutting down");
                        trigger.cancel();
                    }
                });
                server.serve_http(addr, shutdown).await
            }
        }
    });

    result.map_err(|e| match e.downcast::<CountersignError>() {
        Ok(err) => *err,
        Err(other) => CountersignError::Server(other.to_string()),
    })
}
