//! Signatory resolution: which people must sign off on a request.
//!
//! The chain for a request type is looked up by the applicant's department
//! and job class, each role in it is resolved to a concrete person, and the
//! resulting list seeds a new evaluation record. Nothing here persists.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::directory::OrgDirectory;
use crate::entity::{EvaluationRecord, Participant, ParticipantId};
use crate::error::{CountersignError, Result};

/// Evaluators resolved for one applicant, in configured order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChain {
    pub request_path: String,
    pub applicant: Participant,
    pub evaluators: Vec<Participant>,
}

impl ResolvedChain {
    pub fn into_pending_record(self) -> EvaluationRecord {
        EvaluationRecord::pending_approval(self.applicant, self.evaluators)
    }

    pub fn into_auto_approved_record(self, at: DateTime<Utc>) -> EvaluationRecord {
        EvaluationRecord::auto_approved(self.applicant, self.evaluators, at)
    }
}

/// Resolve the evaluator chain for `applicant_id` filing `request_path`.
///
/// Fails with `NoEvaluatorsConfigured` when no chain applies, or the chain
/// that applies is empty. A person who holds several roles in the chain
/// appears once, at their first position.
pub fn resolve_chain<D: OrgDirectory + ?Sized>(
    directory: &D,
    request_path: &str,
    applicant_id: &ParticipantId,
) -> Result<ResolvedChain> {
    let applicant = directory
        .participant(applicant_id)?
        .ok_or_else(|| CountersignError::ParticipantNotFound(applicant_id.clone()))?;
    let placement = directory
        .placement(applicant_id)?
        .ok_or_else(|| CountersignError::ParticipantNotFound(applicant_id.clone()))?;

    let no_evaluators = || CountersignError::NoEvaluatorsConfigured {
        request_path: request_path.to_string(),
        department: placement.department_id.clone(),
        job_class: placement.job_class_id.clone(),
    };

    let roles = directory
        .lookup_evaluator_chain(request_path, &placement.department_id, &placement.job_class_id)?
        .ok_or_else(no_evaluators)?;
    if roles.is_empty() {
        return Err(no_evaluators());
    }

    let mut seen = HashSet::new();
    let mut evaluators = Vec::with_capacity(roles.len());
    for role in &roles {
        let id = directory.resolve_role_to_participant(role, applicant_id)?;
        if !seen.insert(id.clone()) {
            debug!(%role, evaluator = %id, "skipping duplicate evaluator");
            continue;
        }
        let evaluator = directory
            .participant(&id)?
            .ok_or(CountersignError::ParticipantNotFound(id))?;
        evaluators.push(evaluator);
    }

    debug!(
        request_path,
        applicant = %applicant_id,
        evaluators = evaluators.len(),
        "resolved evaluator chain"
    );

    Ok(ResolvedChain {
        request_path: request_path.to_string(),
        applicant,
        evaluators,
    })
}

/// Build the initial evaluation record for a new request.
///
/// With `auto_approve_hint` the chain is still resolved, for audit and
/// display, but every slot starts out approved.
pub fn resolve<D: OrgDirectory + ?Sized>(
    directory: &D,
    request_path: &str,
    applicant_id: &ParticipantId,
    auto_approve_hint: bool,
) -> Result<EvaluationRecord> {
    let chain = resolve_chain(directory, request_path, applicant_id)?;
    Ok(if auto_approve_hint {
        chain.into_auto_approved_record(Utc::now())
    } else {
        chain.into_pending_record()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{sample_directory, StaticDirectory};
    use crate::entity::{RequestStatus, AUTO_APPROVAL_REMARKS};

    fn ids(record: &EvaluationRecord) -> Vec<String> {
        record
            .evaluators
            .iter()
            .map(|s| s.evaluated_by.to_string())
            .collect()
    }

    #[test]
    fn test_resolve_pending_record() {
        let directory = sample_directory();
        let record = resolve(&directory, "overtime", &ParticipantId::from("E-100"), false).unwrap();

        assert_eq!(ids(&record), vec!["E-050", "E-020", "E-001"]);
        assert_eq!(record.participants[0].id, ParticipantId::from("E-100"));
        assert_eq!(record.status(), RequestStatus::Pending);
    }

    #[test]
    fn test_resolve_uses_most_specific_chain() {
        let directory = sample_directory();
        let record = resolve(&directory, "leave", &ParticipantId::from("E-101"), false).unwrap();
        assert_eq!(ids(&record), vec!["E-050", "E-030", "E-001"]);
    }

    #[test]
    fn test_resolve_auto_approved_record() {
        let directory = sample_directory();
        let record = resolve(&directory, "leave", &ParticipantId::from("E-100"), true).unwrap();

        assert_eq!(record.status(), RequestStatus::Approved);
        assert_eq!(record.evaluators.len(), 2);
        for slot in &record.evaluators {
            assert!(slot.decision.decided_at().is_some());
            assert_eq!(slot.decision.remarks(), Some(AUTO_APPROVAL_REMARKS));
        }
    }

    #[test]
    fn test_missing_configuration_fails() {
        let directory = sample_directory();
        let err = resolve(&directory, "overtime", &ParticipantId::from("E-200"), true).unwrap_err();
        assert!(matches!(err, CountersignError::NoEvaluatorsConfigured { .. }));
    }

    #[test]
    fn test_empty_chain_is_not_an_approval() {
        let yaml = r#"
employees:
  - id: E-1
    name: A
    email: a@example.org
    department: ops
    job_class: staff
chains:
  - path: leave
    evaluators: []
"#;
        let directory = StaticDirectory::from_yaml_str(yaml).unwrap();
        let err = resolve(&directory, "leave", &ParticipantId::from("E-1"), false).unwrap_err();
        assert!(matches!(err, CountersignError::NoEvaluatorsConfigured { .. }));
    }

    #[test]
    fn test_one_person_holding_two_roles_appears_once() {
        // The department head of hr is also the hr manager
        let yaml = r#"
employees:
  - id: E-1
    name: Applicant
    email: a@example.org
    department: hr
    job_class: staff
    superior: E-2
  - id: E-2
    name: Supervisor
    email: s@example.org
    department: hr
    job_class: supervisor
  - id: E-3
    name: Manager
    email: m@example.org
    department: hr
    job_class: manager
departments:
  - id: hr
    head: E-3
roles:
  - role: hr_manager
    holder: E-3
chains:
  - path: leave
    evaluators: [department_head, immediate_superior, "role:hr_manager"]
"#;
        let directory = StaticDirectory::from_yaml_str(yaml).unwrap();
        let record = resolve(&directory, "leave", &ParticipantId::from("E-1"), false).unwrap();
        assert_eq!(ids(&record), vec!["E-3", "E-2"]);
        assert_eq!(record.evaluators[1].order, 2);
    }

    #[test]
    fn test_unknown_applicant() {
        let directory = sample_directory();
        let err = resolve_chain(&directory, "leave", &ParticipantId::from("E-404")).unwrap_err();
        assert!(matches!(err, CountersignError::ParticipantNotFound(_)));
    }

    #[test]
    fn test_unresolvable_role_propagates() {
        let directory = sample_directory();
        // E-020 heads nursing and has no superior
        let err = resolve(&directory, "overtime", &ParticipantId::from("E-020"), false).unwrap_err();
        assert!(matches!(err, CountersignError::UnresolvableRole { .. }));
    }
}
