mod commands;
mod handlers;

pub use commands::{Cli, Commands, IncidentAction, IncidentCommand};
pub use handlers::{
    handle_archive, handle_comment, handle_decide, handle_file, handle_incident_report,
    handle_incident_show, handle_init, handle_list, handle_outbox, handle_serve, handle_show,
    handle_status,
};
