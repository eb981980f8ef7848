use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "countersign")]
#[command(version, about = "Approval workflow engine for HR requests")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new countersign project in the current directory
    Init,

    /// File a request and resolve its evaluator chain
    File {
        /// Request type path (leave, overtime, incident-action, ...)
        request_path: String,

        /// Employee id of the applicant
        #[arg(long, short = 'a')]
        applicant: String,

        /// Start out approved; the evaluator chain is still recorded
        #[arg(long)]
        auto_approve: bool,

        /// Incident this request acts upon
        #[arg(long)]
        incident: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Approve or reject a request as one of its evaluators
    Decide {
        /// Request id
        id: i64,

        /// Employee id of the deciding evaluator
        #[arg(long, short = 'e')]
        evaluator: String,

        /// Approve the request
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        /// Reject the request
        #[arg(long, conflicts_with = "approve")]
        reject: bool,

        /// Remarks recorded with the decision
        #[arg(long, short = 'm')]
        remarks: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Comment on a request, or reply to a comment
    Comment {
        /// Request id
        id: i64,

        /// Comment text
        message: String,

        /// Employee id of the author
        #[arg(long, short = 'a')]
        author: String,

        /// Comment id to reply to
        #[arg(long)]
        reply_to: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the derived status of a request
    Status {
        /// Request id
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a request with its evaluators and comment thread
    Show {
        /// Request id
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List requests
    List {
        /// Filter by status (pending, approved, rejected)
        #[arg(long, short = 's')]
        status: Option<String>,

        /// Filter by request type path
        #[arg(long)]
        path: Option<String>,

        /// Filter by applicant employee id
        #[arg(long)]
        applicant: Option<String>,

        /// Only requests still awaiting this evaluator
        #[arg(long)]
        awaiting: Option<String>,

        /// Maximum number of requests
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Archive a request (hidden from list, still readable by id)
    Archive {
        /// Request id
        id: i64,
    },

    /// Report or show incidents
    Incident(IncidentCommand),

    /// Show queued notifications
    Outbox {
        /// Maximum number of messages
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Remove a delivered message by id (can be specified multiple times)
        #[arg(long)]
        ack: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the MCP server
    Serve {
        /// Serve streamable HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct IncidentCommand {
    #[command(subcommand)]
    pub action: IncidentAction,
}

#[derive(Subcommand, Debug)]
pub enum IncidentAction {
    /// Report an incident involving an employee
    Report {
        /// Employee id
        #[arg(long, short = 'e')]
        employee: String,

        /// What happened
        description: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an incident
    Show {
        /// Incident id
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_decide_requires_a_verdict() {
        assert!(Cli::try_parse_from(["countersign", "decide", "1", "-e", "E-1"]).is_err());
        assert!(
            Cli::try_parse_from(["countersign", "decide", "1", "-e", "E-1", "--approve", "--reject"])
                .is_err()
        );

        let cli = Cli::try_parse_from(["countersign", "decide", "1", "-e", "E-1", "--reject"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Decide {
                reject: true,
                approve: false,
                ..
            }
        ));
    }

    #[test]
    fn test_incident_report_parses() {
        let cli = Cli::try_parse_from([
            "countersign",
            "incident",
            "report",
            "-e",
            "E-100",
            "Left post without relief",
        ])
        .unwrap();
        match cli.command {
            Commands::Incident(IncidentCommand {
                action: IncidentAction::Report { employee, .. },
            }) => assert_eq!(employee, "E-100"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
