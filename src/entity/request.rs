use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EvaluationRecord, ParticipantId, RequestId, RequestStatus};

/// A request row together with its embedded evaluation record.
///
/// `status` is a denormalized copy of `record.status()` kept for filtering;
/// `version` increments on every committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiledRequest {
    pub id: RequestId,
    /// Request type path, e.g. `leave` or `incident-action`
    pub request_path: String,
    pub applicant_id: ParticipantId,
    pub status: RequestStatus,
    pub version: i64,
    pub incident_id: Option<i64>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub record: EvaluationRecord,
}

/// An incident report that disciplinary action requests originate from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub employee_id: ParticipantId,
    pub description: String,
    pub acted_upon: bool,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing requests. Archived requests are never listed.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_path: Option<String>,
    pub applicant: Option<ParticipantId>,
    /// Only requests where this evaluator's slot is still undecided
    pub awaiting: Option<ParticipantId>,
    pub limit: Option<usize>,
}

impl RequestFilter {
    /// Checks that need the parsed record; column filters are applied by the store.
    pub fn matches_record(&self, record: &EvaluationRecord) -> bool {
        match &self.awaiting {
            Some(evaluator) => record
                .slot(evaluator)
                .map(|s| s.decision.is_undecided())
                .unwrap_or(false),
            None => true,
        }
    }
}
