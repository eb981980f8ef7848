use clap::Parser;
use countersign::cli::{
    handle_archive, handle_comment, handle_decide, handle_file, handle_incident_report,
    handle_incident_show, handle_init, handle_list, handle_outbox, handle_serve, handle_show,
    handle_status, Cli, Commands, IncidentAction,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    // stdout carries command output and the stdio MCP transport
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("countersign=info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::File {
            request_path,
            applicant,
            auto_approve,
            incident,
            json,
        } => handle_file(request_path, applicant, auto_approve, incident, json),
        Commands::Decide {
            id,
            evaluator,
            approve,
            reject,
            remarks,
            json,
        } => handle_decide(id, evaluator, approve, reject, remarks, json),
        Commands::Comment {
            id,
            message,
            author,
            reply_to,
            json,
        } => handle_comment(id, message, author, reply_to, json),
        Commands::Status { id, json } => handle_status(id, json),
        Commands::Show { id, json } => handle_show(id, json),
        Commands::List {
            status,
            path,
            applicant,
            awaiting,
            limit,
            json,
        } => handle_list(status, path, applicant, awaiting, limit, json),
        Commands::Archive { id } => handle_archive(id),
        Commands::Incident(incident_cmd) => match incident_cmd.action {
            IncidentAction::Report {
                employee,
                description,
                json,
            } => handle_incident_report(employee, description, json),
            IncidentAction::Show { id, json } => handle_incident_show(id, json),
        },
        Commands::Outbox { limit, ack, json } => handle_outbox(limit, ack, json),
        Commands::Serve { http } => handle_serve(http),
    };

    if let Err(e) = result {
        if !e.is_client_error() {
            tracing::error!(error = %e, "command failed");
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
