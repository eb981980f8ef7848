use serde::{Deserialize, Serialize};

use super::{Decision, EvaluationRecord};

/// Overall status of a request, derived from its evaluator decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Aggregate every evaluator decision into one status.
///
/// A single rejection wins over any number of approvals. An empty evaluator
/// list only counts as approved when the record was auto-approved.
pub fn derive_status(record: &EvaluationRecord) -> RequestStatus {
    let mut all_approved = true;
    for slot in &record.evaluators {
        match slot.decision {
            Decision::Rejected { .. } => return RequestStatus::Rejected,
            Decision::Approved { .. } => {}
            Decision::Undecided => all_approved = false,
        }
    }

    if record.evaluators.is_empty() {
        return if record.auto_approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Pending
        };
    }

    if all_approved {
        RequestStatus::Approved
    } else {
        RequestStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EvaluatorSlot, Participant, ParticipantId, Verdict};
    use chrono::Utc;

    fn slot(id: &str, order: u32, decision: Decision) -> EvaluatorSlot {
        EvaluatorSlot {
            evaluated_by: ParticipantId::from(id),
            order,
            decision,
        }
    }

    fn record(decisions: Vec<Decision>) -> EvaluationRecord {
        let applicant = Participant::new("E-0", "Applicant", "applicant@example.org");
        let evaluators: Vec<Participant> = (1..=decisions.len())
            .map(|i| Participant::new(format!("E-{}", i), format!("Evaluator {}", i), "e@example.org"))
            .collect();
        let mut record = EvaluationRecord::pending_approval(applicant, evaluators);
        for (slot, decision) in record.evaluators.iter_mut().zip(decisions) {
            slot.decision = decision;
        }
        record
    }

    fn approved() -> Decision {
        Decision::new(Verdict::Approve, Utc::now(), None)
    }

    fn rejected() -> Decision {
        Decision::new(Verdict::Reject, Utc::now(), None)
    }

    #[test]
    fn test_one_rejection_with_rest_undecided_is_rejected() {
        let r = record(vec![Decision::Undecided, rejected(), Decision::Undecided]);
        assert_eq!(derive_status(&r), RequestStatus::Rejected);
    }

    #[test]
    fn test_rejection_beats_approvals() {
        let r = record(vec![approved(), approved(), rejected()]);
        assert_eq!(derive_status(&r), RequestStatus::Rejected);
    }

    #[test]
    fn test_partial_approval_is_pending() {
        let r = record(vec![approved(), approved(), Decision::Undecided]);
        assert_eq!(derive_status(&r), RequestStatus::Pending);
    }

    #[test]
    fn test_all_approved_is_approved() {
        let r = record(vec![approved(), approved(), approved()]);
        assert_eq!(derive_status(&r), RequestStatus::Approved);
    }

    #[test]
    fn test_empty_list_needs_auto_approval() {
        let mut r = record(vec![]);
        assert_eq!(derive_status(&r), RequestStatus::Pending);
        r.auto_approved = true;
        assert_eq!(derive_status(&r), RequestStatus::Approved);
    }

    #[test]
    fn test_status_is_order_independent() {
        let cases = vec![
            vec![approved(), Decision::Undecided, rejected()],
            vec![approved(), approved(), Decision::Undecided],
            vec![approved(), approved(), approved()],
        ];

        for decisions in cases {
            let base = record(decisions.clone());
            let expected = derive_status(&base);

            // Every rotation and the reversal of the slot list
            let n = base.evaluators.len();
            for shift in 0..n {
                let mut permuted = base.clone();
                permuted.evaluators.rotate_left(shift);
                assert_eq!(derive_status(&permuted), expected);
                permuted.evaluators.reverse();
                assert_eq!(derive_status(&permuted), expected);
            }
        }
    }

    #[test]
    fn test_explicit_slots() {
        let mut r = record(vec![]);
        r.evaluators = vec![slot("E-5", 2, approved()), slot("E-6", 1, Decision::Undecided)];
        assert_eq!(derive_status(&r), RequestStatus::Pending);
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in [RequestStatus::Pending, RequestStatus::Approved, RequestStatus::Rejected] {
            assert_eq!(status.to_string().parse::<RequestStatus>().unwrap(), status);
        }
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }
}
