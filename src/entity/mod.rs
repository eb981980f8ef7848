mod comment;
mod decision;
mod evaluation;
mod participant;
mod request;
mod status;

pub use comment::{find_comment, next_comment_id, CommentId, CommentNode};
pub use decision::{Decision, Verdict, AUTO_APPROVAL_REMARKS};
pub use evaluation::{
    DecisionOutcome, EvaluationRecord, EvaluatorSlot, RECORD_SCHEMA_VERSION,
};
pub use participant::{Participant, ParticipantId};
pub use request::{FiledRequest, Incident, RequestFilter};
pub use status::{derive_status, RequestStatus};

/// Integer id of the parent request row an evaluation record is embedded in.
pub type RequestId = i64;
