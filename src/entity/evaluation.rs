//! The evaluation record embedded in every request that needs approval.
//!
//! The record is persisted as one JSON document whose shape is consumed
//! directly by the listing and detail views:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "users": [{"id": "E-7", "name": "...", "email": "...", "picture": null}],
//!   "evaluators": [{"evaluated_by": "E-7", "order_number": 1, "decision": {"is_decided": null}}],
//!   "comments": [{"id": 1, "author": "E-7", "timestamp": "...", "message": "...", "replies": []}]
//! }
//! ```
//!
//! Records are parsed and validated at the storage boundary; everything past
//! that point works with the typed structure.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comment::{count_comments, find_comment_mut, flatten};
use super::{
    derive_status, find_comment, next_comment_id, CommentId, CommentNode, Decision, Participant,
    ParticipantId, RequestStatus, Verdict, AUTO_APPROVAL_REMARKS,
};
use crate::error::{CountersignError, Result};

/// Current wire schema version. Blobs written before versioning parse as 1.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorSlot {
    pub evaluated_by: ParticipantId,
    /// Display order and tie-break only; slots may be decided in any sequence.
    #[serde(rename = "order_number")]
    pub order: u32,
    #[serde(default)]
    pub decision: Decision,
}

/// What happened when a decision was applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The slot now holds the new decision.
    Applied {
        previous: RequestStatus,
        current: RequestStatus,
    },
    /// The slot already held the same verdict and remarks.
    Unchanged,
    /// The slot holds a decision stamped later than the submitted one.
    Superseded,
}

impl DecisionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DecisionOutcome::Applied { .. })
    }

    pub fn status_changed(&self) -> bool {
        matches!(self, DecisionOutcome::Applied { previous, current } if previous != current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(rename = "users", default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub evaluators: Vec<EvaluatorSlot>,
    #[serde(default)]
    pub comments: Vec<CommentNode>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_approved: bool,
}

impl EvaluationRecord {
    /// A record awaiting every evaluator, in the given order.
    pub fn pending_approval(applicant: Participant, evaluators: Vec<Participant>) -> Self {
        Self::build(applicant, evaluators, false, |_| Decision::Undecided)
    }

    /// A record that starts out approved. The evaluator chain is kept for
    /// audit and display, with every slot stamped as a system approval.
    pub fn auto_approved(
        applicant: Participant,
        evaluators: Vec<Participant>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(applicant, evaluators, true, |_| Decision::Approved {
            at,
            remarks: Some(AUTO_APPROVAL_REMARKS.to_string()),
        })
    }

    fn build(
        applicant: Participant,
        evaluators: Vec<Participant>,
        auto_approved: bool,
        decision: impl Fn(&Participant) -> Decision,
    ) -> Self {
        let mut record = Self {
            schema_version: RECORD_SCHEMA_VERSION,
            participants: Vec::with_capacity(evaluators.len() + 1),
            evaluators: Vec::with_capacity(evaluators.len()),
            comments: Vec::new(),
            auto_approved,
        };
        record.ensure_participant(applicant);

        let mut seen = HashSet::new();
        for evaluator in evaluators {
            if !seen.insert(evaluator.id.clone()) {
                continue;
            }
            record.evaluators.push(EvaluatorSlot {
                evaluated_by: evaluator.id.clone(),
                order: record.evaluators.len() as u32 + 1,
                decision: decision(&evaluator),
            });
            record.ensure_participant(evaluator);
        }
        record
    }

    pub fn status(&self) -> RequestStatus {
        derive_status(self)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn slot(&self, evaluator: &ParticipantId) -> Option<&EvaluatorSlot> {
        self.evaluators.iter().find(|s| &s.evaluated_by == evaluator)
    }

    pub fn is_evaluator(&self, id: &ParticipantId) -> bool {
        self.slot(id).is_some()
    }

    /// Undecided slot with the lowest order number.
    pub fn first_pending_evaluator(&self) -> Option<&EvaluatorSlot> {
        self.evaluators
            .iter()
            .filter(|s| s.decision.is_undecided())
            .min_by_key(|s| s.order)
    }

    /// Evaluators in display order.
    pub fn evaluators_in_order(&self) -> Vec<&EvaluatorSlot> {
        let mut slots: Vec<_> = self.evaluators.iter().collect();
        slots.sort_by_key(|s| s.order);
        slots
    }

    /// Add a participant snapshot unless one with the same id is present.
    /// Existing snapshots are never refreshed.
    pub fn ensure_participant(&mut self, participant: Participant) -> bool {
        if self.participant(&participant.id).is_some() {
            return false;
        }
        self.participants.push(participant);
        true
    }

    /// Record `verdict` on the evaluator's slot.
    ///
    /// Returns `None` when `evaluator` holds no slot. A submission stamped
    /// earlier than the slot's current decision is discarded.
    pub fn apply_decision(
        &mut self,
        evaluator: &ParticipantId,
        verdict: Verdict,
        at: DateTime<Utc>,
        remarks: Option<String>,
    ) -> Option<DecisionOutcome> {
        let previous = self.status();
        let slot = self
            .evaluators
            .iter_mut()
            .find(|s| &s.evaluated_by == evaluator)?;

        if slot.decision.same_outcome(verdict, remarks.as_deref()) {
            return Some(DecisionOutcome::Unchanged);
        }
        if let Some(current_at) = slot.decision.decided_at() {
            if current_at > at {
                return Some(DecisionOutcome::Superseded);
            }
        }

        slot.decision = Decision::new(verdict, at, remarks);
        Some(DecisionOutcome::Applied {
            previous,
            current: self.status(),
        })
    }

    /// Append a top-level comment, or a reply when `reply_to` is given.
    ///
    /// Returns the new comment id, or `None` when `reply_to` names no comment
    /// in this record (the record is left untouched).
    pub fn append_comment(
        &mut self,
        author: ParticipantId,
        message: String,
        at: DateTime<Utc>,
        reply_to: Option<CommentId>,
    ) -> Option<CommentId> {
        let id = next_comment_id(&self.comments);
        let node = CommentNode::new(id, author, message, at);
        match reply_to {
            Some(parent_id) => {
                let parent = find_comment_mut(&mut self.comments, parent_id)?;
                parent.replies.push(node);
            }
            None => self.comments.push(node),
        }
        Some(id)
    }

    pub fn find_comment(&self, id: CommentId) -> Option<&CommentNode> {
        find_comment(&self.comments, id)
    }

    pub fn comment_count(&self) -> usize {
        count_comments(&self.comments)
    }

    /// Structural checks applied whenever a record crosses the storage
    /// boundary.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version == 0 || self.schema_version > RECORD_SCHEMA_VERSION {
            return Err(CountersignError::InvalidRecord(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }

        let mut users = HashSet::new();
        for participant in &self.participants {
            if !users.insert(&participant.id) {
                return Err(CountersignError::InvalidRecord(format!(
                    "duplicate user {}",
                    participant.id
                )));
            }
        }

        let mut evaluators = HashSet::new();
        for slot in &self.evaluators {
            if !users.contains(&slot.evaluated_by) {
                return Err(CountersignError::InvalidRecord(format!(
                    "evaluator {} is not listed in users",
                    slot.evaluated_by
                )));
            }
            if !evaluators.insert(&slot.evaluated_by) {
                return Err(CountersignError::InvalidRecord(format!(
                    "evaluator {} holds more than one slot",
                    slot.evaluated_by
                )));
            }
        }

        let mut comment_ids = HashSet::new();
        for comment in flatten(&self.comments) {
            if !users.contains(&comment.author) {
                return Err(CountersignError::InvalidRecord(format!(
                    "comment {} author {} is not listed in users",
                    comment.id, comment.author
                )));
            }
            if !comment_ids.insert(comment.id) {
                return Err(CountersignError::InvalidRecord(format!(
                    "duplicate comment id {}",
                    comment.id
                )));
            }
        }

        Ok(())
    }

    /// Serialize to the persisted JSON shape.
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate the persisted JSON shape.
    pub fn from_wire(json: &str) -> Result<Self> {
        let record: EvaluationRecord = serde_json::from_str(json)
            .map_err(|e| CountersignError::InvalidRecord(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}
