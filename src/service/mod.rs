//! Approval mutation service and the public operation surface.
//!
//! Every mutation is a read-modify-write against the request's version
//! token: load, change a copy of the record, write it back only if nobody
//! else wrote in between. A lost race is retried from a fresh read a bounded
//! number of times. Notifications go out after the commit and cannot fail
//! the mutation.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::{ConcurrencyConfig, Project, SinkKind};
use crate::directory::{OrgDirectory, StaticDirectory};
use crate::entity::{
    CommentId, DecisionOutcome, EvaluationRecord, FiledRequest, Incident, ParticipantId,
    RequestFilter, RequestId, RequestStatus, Verdict,
};
use crate::error::{CountersignError, Result};
use crate::notify::{Dispatcher, LogNotifier, NullNotifier, Notifier, OutboxNotifier};
use crate::resolver;
use crate::storage::{NewRequest, RecordStore, SqliteStore};

/// Bounded retry for versioned writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&ConcurrencyConfig::default())
    }
}

impl From<&ConcurrencyConfig> for RetryPolicy {
    fn from(config: &ConcurrencyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// Result of a decision submission.
#[derive(Debug, Clone)]
pub struct DecisionReceipt {
    pub request: FiledRequest,
    pub outcome: DecisionOutcome,
}

/// Result of a comment submission.
#[derive(Debug, Clone)]
pub struct CommentReceipt {
    pub request: FiledRequest,
    pub comment_id: CommentId,
}

/// What a single attempt decided to do with the loaded record.
enum Step<T> {
    Write(EvaluationRecord, T),
    Done(T),
}

pub struct ApprovalService<S, D> {
    store: S,
    directory: D,
    dispatcher: Dispatcher,
    retry: RetryPolicy,
}

impl ApprovalService<SqliteStore, StaticDirectory> {
    /// Wire the service up from an initialized project.
    pub fn open(project: &Project) -> Result<Self> {
        let config = project.config();
        let busy_timeout = config.concurrency.busy_timeout();
        let store = SqliteStore::open(&project.database_path(), busy_timeout)?;
        let directory = StaticDirectory::load(&project.directory_path())?;

        let sink: Box<dyn Notifier> = match config.notifications.sink {
            SinkKind::Log => Box::new(LogNotifier),
            SinkKind::Outbox => Box::new(OutboxNotifier::open(&project.database_path(), busy_timeout)?),
            SinkKind::None => Box::new(NullNotifier),
        };
        let dispatcher = Dispatcher::new(sink, config.notifications.sender.clone());

        debug!(
            database = %project.database_path().display(),
            employees = directory.employee_count(),
            sink = %config.notifications.sink,
            "approval service ready"
        );

        Ok(Self::new(store, directory, dispatcher).with_retry(RetryPolicy::from(&config.concurrency)))
    }
}

impl<S: RecordStore, D: OrgDirectory> ApprovalService<S, D> {
    pub fn new(store: S, directory: D, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// File a request of type `request_path` for `applicant`.
    ///
    /// The evaluator chain is resolved first; the request row, its record
    /// and the linked incident's acted-upon flag are then written in one
    /// transaction.
    #[instrument(skip(self, applicant), fields(applicant = %applicant))]
    pub fn create_with_approval(
        &self,
        request_path: &str,
        applicant: &ParticipantId,
        auto_approve: bool,
        incident_id: Option<i64>,
    ) -> Result<FiledRequest> {
        if let Some(id) = incident_id {
            if self.store.load_incident(id)?.is_none() {
                return Err(CountersignError::IncidentNotFound(id));
            }
        }

        let record = resolver::resolve(&self.directory, request_path, applicant, auto_approve)?;
        let filed = self.store.insert_request(&NewRequest {
            request_path: request_path.to_string(),
            applicant_id: applicant.clone(),
            incident_id,
            record,
        })?;

        info!(
            request_id = filed.id,
            status = %filed.status,
            evaluators = filed.record.evaluators.len(),
            "request filed"
        );
        self.dispatcher.request_filed(&filed);
        Ok(filed)
    }

    /// Record a decision stamped now.
    pub fn decide(
        &self,
        request_id: RequestId,
        evaluator: &ParticipantId,
        approve: bool,
        remarks: Option<String>,
    ) -> Result<DecisionReceipt> {
        self.submit_decision(request_id, evaluator, Verdict::from_approve(approve), Utc::now(), remarks)
    }

    /// Record `verdict` on the evaluator's own slot.
    ///
    /// Resubmitting the same verdict and remarks writes nothing. A decision
    /// stamped earlier than the one already on the slot is discarded.
    #[instrument(skip(self, evaluator, verdict, at, remarks), fields(evaluator = %evaluator, %verdict))]
    pub fn submit_decision(
        &self,
        request_id: RequestId,
        evaluator: &ParticipantId,
        verdict: Verdict,
        at: DateTime<Utc>,
        remarks: Option<String>,
    ) -> Result<DecisionReceipt> {
        let (request, outcome) = self.mutate(request_id, |mut record| {
            let outcome = record
                .apply_decision(evaluator, verdict, at, remarks.clone())
                .ok_or_else(|| CountersignError::NotAnAssignedEvaluator {
                    request_id,
                    evaluator: evaluator.clone(),
                })?;
            Ok(if outcome.is_applied() {
                Step::Write(record, outcome)
            } else {
                Step::Done(outcome)
            })
        })?;

        match &outcome {
            DecisionOutcome::Applied { previous, current } => {
                info!(request_id, from = %previous, to = %current, "decision recorded");
                if outcome.status_changed() {
                    self.dispatcher.status_changed(&request, evaluator);
                }
            }
            DecisionOutcome::Unchanged => debug!(request_id, "decision unchanged"),
            DecisionOutcome::Superseded => debug!(request_id, "decision superseded by a later one"),
        }

        Ok(DecisionReceipt { request, outcome })
    }

    /// Append a comment stamped now.
    pub fn comment(
        &self,
        request_id: RequestId,
        author: &ParticipantId,
        message: &str,
        reply_to: Option<CommentId>,
    ) -> Result<CommentReceipt> {
        self.append_comment(request_id, author, message, Utc::now(), reply_to)
    }

    /// Append a top-level comment, or a reply to `reply_to`.
    ///
    /// An author not yet in the record is snapshotted from the directory.
    #[instrument(skip(self, author, message, at), fields(author = %author))]
    pub fn append_comment(
        &self,
        request_id: RequestId,
        author: &ParticipantId,
        message: &str,
        at: DateTime<Utc>,
        reply_to: Option<CommentId>,
    ) -> Result<CommentReceipt> {
        let (request, comment_id) = self.mutate(request_id, |mut record| {
            if record.participant(author).is_none() {
                let snapshot = self
                    .directory
                    .participant(author)?
                    .ok_or_else(|| CountersignError::ParticipantNotFound(author.clone()))?;
                record.ensure_participant(snapshot);
            }

            let id = record
                .append_comment(author.clone(), message.to_string(), at, reply_to)
                .ok_or(CountersignError::CommentNotFound {
                    request_id,
                    comment_id: reply_to.unwrap_or_default(),
                })?;
            Ok(Step::Write(record, id))
        })?;

        info!(request_id, comment_id, reply_to = ?reply_to, "comment added");
        self.dispatcher.comment_added(&request, author, comment_id);
        Ok(CommentReceipt { request, comment_id })
    }

    /// Derived status, recomputed from the record rather than the cached
    /// column.
    pub fn status(&self, request_id: RequestId) -> Result<RequestStatus> {
        Ok(self.get(request_id)?.record.status())
    }

    pub fn get(&self, request_id: RequestId) -> Result<FiledRequest> {
        self.store
            .load_request(request_id)?
            .ok_or(CountersignError::RequestNotFound(request_id))
    }

    pub fn list(&self, filter: &RequestFilter) -> Result<Vec<FiledRequest>> {
        self.store.list_requests(filter)
    }

    #[instrument(skip(self))]
    pub fn archive(&self, request_id: RequestId) -> Result<bool> {
        let archived = self.store.archive_request(request_id)?;
        if archived {
            info!(request_id, "request archived");
        }
        Ok(archived)
    }

    #[instrument(skip(self, employee, description), fields(employee = %employee))]
    pub fn report_incident(&self, employee: &ParticipantId, description: &str) -> Result<Incident> {
        if self.directory.participant(employee)?.is_none() {
            return Err(CountersignError::ParticipantNotFound(employee.clone()));
        }
        let incident = self.store.insert_incident(employee, description)?;
        info!(incident_id = incident.id, "incident reported");
        Ok(incident)
    }

    pub fn incident(&self, id: i64) -> Result<Incident> {
        self.store
            .load_incident(id)?
            .ok_or(CountersignError::IncidentNotFound(id))
    }

    /// Versioned read-modify-write with bounded retry.
    ///
    /// `change` sees a fresh copy of the record on every attempt. Errors it
    /// returns abort without writing. Archived requests are refused.
    fn mutate<T>(
        &self,
        request_id: RequestId,
        mut change: impl FnMut(EvaluationRecord) -> Result<Step<T>>,
    ) -> Result<(FiledRequest, T)> {
        for attempt in 1..=self.retry.max_attempts {
            let mut request = self.get(request_id)?;
            if request.archived {
                return Err(CountersignError::RequestArchived(request_id));
            }

            let (record, value) = match change(request.record.clone())? {
                Step::Done(value) => return Ok((request, value)),
                Step::Write(record, value) => (record, value),
            };

            match self.store.update_record(request_id, request.version, &record)? {
                Some(version) => {
                    request.version = version;
                    request.status = record.status();
                    request.updated_at = Utc::now();
                    request.record = record;
                    return Ok((request, value));
                }
                None => {
                    debug!(request_id, attempt, "lost write race, retrying");
                    if attempt < self.retry.max_attempts {
                        // In-process writers are serialized by the MCP server's
                        // mutex; this waits out writers in other processes.
                        thread::sleep(self.retry.backoff * attempt);
                    }
                }
            }
        }

        warn!(request_id, attempts = self.retry.max_attempts, "giving up after repeated conflicts");
        Err(CountersignError::ConcurrentModification {
            request_id,
            attempts: self.retry.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    use tempfile::TempDir;

    use crate::directory::sample_directory;
    use crate::notify::tests::{FailingNotifier, RecordingNotifier};

    fn service(tmp: &TempDir) -> (ApprovalService<SqliteStore, StaticDirectory>, RecordingNotifier) {
        let sink = RecordingNotifier::default();
        let store = SqliteStore::open(&tmp.path().join("countersign.db"), Duration::from_secs(5)).unwrap();
        let service = ApprovalService::new(
            store,
            sample_directory(),
            Dispatcher::new(Box::new(sink.clone()), "HR"),
        );
        (service, sink)
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn test_full_approval_flow() {
        let tmp = TempDir::new().unwrap();
        let (service, sink) = service(&tmp);

        // E-100 overtime: E-050, E-020, E-001
        let filed = service.create_with_approval("overtime", &id("E-100"), false, None).unwrap();
        assert_eq!(filed.status, RequestStatus::Pending);
        assert_eq!(sink.recipients(), vec!["E-050", "E-020", "E-001"]);

        service.decide(filed.id, &id("E-050"), true, None).unwrap();
        service.decide(filed.id, &id("E-001"), true, Some("ok".into())).unwrap();
        assert_eq!(service.status(filed.id).unwrap(), RequestStatus::Pending);

        let receipt = service.decide(filed.id, &id("E-020"), true, None).unwrap();
        assert!(receipt.outcome.status_changed());
        assert_eq!(receipt.request.status, RequestStatus::Approved);
        assert_eq!(receipt.request.version, 4);
        assert_eq!(service.status(filed.id).unwrap(), RequestStatus::Approved);

        // Only the final decision moved the status
        assert_eq!(sink.recipients().last().map(String::as_str), Some("E-100"));
        assert_eq!(sink.recipients().len(), 4);
    }

    #[test]
    fn test_rejection_is_terminal_for_status() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("overtime", &id("E-100"), false, None).unwrap();

        service.decide(filed.id, &id("E-020"), false, Some("budget".into())).unwrap();
        service.decide(filed.id, &id("E-050"), true, None).unwrap();
        service.decide(filed.id, &id("E-001"), true, None).unwrap();

        let request = service.get(filed.id).unwrap();
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.record.status(), RequestStatus::Rejected);
    }

    #[test]
    fn test_unassigned_evaluator_leaves_record_unchanged() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();

        let err = service.decide(filed.id, &id("E-200"), true, None).unwrap_err();
        assert!(matches!(err, CountersignError::NotAnAssignedEvaluator { .. }));

        let after = service.get(filed.id).unwrap();
        assert_eq!(after.version, filed.version);
        assert_eq!(after.record, filed.record);
    }

    #[test]
    fn test_resubmission_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();

        let first = service.decide(filed.id, &id("E-050"), true, Some("fine".into())).unwrap();
        let second = service.decide(filed.id, &id("E-050"), true, Some("fine".into())).unwrap();
        assert_eq!(second.outcome, DecisionOutcome::Unchanged);
        assert_eq!(second.request.version, first.request.version);

        // Changing one's mind is allowed and recomputes status
        let third = service.decide(filed.id, &id("E-050"), false, None).unwrap();
        assert!(third.outcome.status_changed());
        assert_eq!(third.request.status, RequestStatus::Rejected);
    }

    #[test]
    fn test_earlier_stamp_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();

        let now = Utc::now();
        service
            .submit_decision(filed.id, &id("E-050"), Verdict::Approve, now, None)
            .unwrap();
        let stale = service
            .submit_decision(
                filed.id,
                &id("E-050"),
                Verdict::Reject,
                now - chrono::Duration::seconds(5),
                None,
            )
            .unwrap();
        assert_eq!(stale.outcome, DecisionOutcome::Superseded);

        let slot = service.get(filed.id).unwrap().record.slot(&id("E-050")).cloned().unwrap();
        assert!(slot.decision.is_approved());
    }

    #[test]
    fn test_auto_approval() {
        let tmp = TempDir::new().unwrap();
        let (service, sink) = service(&tmp);

        let filed = service.create_with_approval("leave", &id("E-100"), true, None).unwrap();
        assert_eq!(filed.status, RequestStatus::Approved);
        assert!(filed.record.auto_approved);
        assert!(filed
            .record
            .evaluators
            .iter()
            .all(|s| s.decision.decided_at().is_some()));
        assert_eq!(sink.recipients(), vec!["E-100"]);
    }

    #[test]
    fn test_missing_chain_files_nothing() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);

        let err = service.create_with_approval("overtime", &id("E-200"), true, None).unwrap_err();
        assert!(matches!(err, CountersignError::NoEvaluatorsConfigured { .. }));
        assert!(service.list(&RequestFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_comment_thread() {
        let tmp = TempDir::new().unwrap();
        let (service, sink) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        sink.sent.lock().unwrap().clear();

        let first = service.comment(filed.id, &id("E-100"), "Family emergency", None).unwrap();
        assert_eq!(first.comment_id, 1);
        assert_eq!(sink.recipients(), vec!["E-050", "E-001"]);

        let sibling = service.comment(filed.id, &id("E-050"), "Noted", None).unwrap();
        let reply = service
            .comment(filed.id, &id("E-001"), "Approved on my side", Some(first.comment_id))
            .unwrap();
        assert_eq!(reply.comment_id, 3);

        let record = service.get(filed.id).unwrap().record;
        assert_eq!(record.comments.len(), 2);
        assert_eq!(record.comments[0].replies.len(), 1);
        assert_eq!(record.comments[0].replies[0].message, "Approved on my side");
        assert!(record.find_comment(sibling.comment_id).unwrap().replies.is_empty());
    }

    #[test]
    fn test_comment_reply_to_missing() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();

        let err = service.comment(filed.id, &id("E-100"), "hello?", Some(99)).unwrap_err();
        assert!(matches!(
            err,
            CountersignError::CommentNotFound { comment_id: 99, .. }
        ));
        assert_eq!(service.get(filed.id).unwrap().version, filed.version);
    }

    #[test]
    fn test_outside_commenter_is_snapshotted() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();

        service.comment(filed.id, &id("E-030"), "Dean here", None).unwrap();
        let record = service.get(filed.id).unwrap().record;
        assert_eq!(record.participant(&id("E-030")).unwrap().name, "Fe Go");
        assert!(!record.is_evaluator(&id("E-030")));

        let err = service.comment(filed.id, &id("E-404"), "who am I", None).unwrap_err();
        assert!(matches!(err, CountersignError::ParticipantNotFound(_)));
    }

    #[test]
    fn test_incident_action() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);

        let incident = service.report_incident(&id("E-100"), "Late for shift").unwrap();
        assert!(!service.incident(incident.id).unwrap().acted_upon);

        let filed = service
            .create_with_approval("incident-action", &id("E-100"), false, Some(incident.id))
            .unwrap();
        assert_eq!(filed.incident_id, Some(incident.id));
        assert!(service.incident(incident.id).unwrap().acted_upon);

        assert!(matches!(
            service.create_with_approval("incident-action", &id("E-100"), false, Some(404)),
            Err(CountersignError::IncidentNotFound(404))
        ));
        assert!(matches!(
            service.report_incident(&id("E-404"), "x"),
            Err(CountersignError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn test_list_and_archive() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp);
        let leave = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        service.create_with_approval("overtime", &id("E-100"), false, None).unwrap();

        let awaiting_hr = service
            .list(&RequestFilter {
                awaiting: Some(id("E-001")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(awaiting_hr.len(), 2);

        assert!(service.archive(leave.id).unwrap());
        assert_eq!(service.list(&RequestFilter::default()).unwrap().len(), 1);
        assert!(service.get(leave.id).unwrap().archived);
    }

    #[test]
    fn test_archived_request_refuses_changes() {
        let tmp = TempDir::new().unwrap();
        let (service, sink) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        service.archive(filed.id).unwrap();
        sink.sent.lock().unwrap().clear();

        let err = service.decide(filed.id, &id("E-050"), false, None).unwrap_err();
        assert!(matches!(err, CountersignError::RequestArchived(_)));
        let err = service.comment(filed.id, &id("E-100"), "Still there?", None).unwrap_err();
        assert!(matches!(err, CountersignError::RequestArchived(_)));

        let request = service.get(filed.id).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.record.comments.is_empty());
        assert!(sink.recipients().is_empty());
    }

    #[test]
    fn test_failing_sink_does_not_undo_writes() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("countersign.db"), Duration::from_secs(5)).unwrap();
        let service = ApprovalService::new(
            store,
            sample_directory(),
            Dispatcher::new(Box::new(FailingNotifier), "HR"),
        );

        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        assert_eq!(filed.version, 1);

        let comment = service.comment(filed.id, &id("E-100"), "Family emergency", None).unwrap();
        assert_eq!(comment.request.version, 2);

        service.decide(filed.id, &id("E-050"), true, None).unwrap();
        let receipt = service.decide(filed.id, &id("E-001"), true, None).unwrap();
        assert!(receipt.outcome.status_changed());

        let stored = service.get(filed.id).unwrap();
        assert_eq!(stored.version, 4);
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.record.comments[0].message, "Family emergency");
    }

    /// Store whose versioned writes always lose.
    struct AlwaysConflicting(SqliteStore);

    impl RecordStore for AlwaysConflicting {
        fn insert_request(&self, request: &NewRequest) -> Result<FiledRequest> {
            self.0.insert_request(request)
        }
        fn load_request(&self, id: RequestId) -> Result<Option<FiledRequest>> {
            self.0.load_request(id)
        }
        fn update_record(&self, _: RequestId, _: i64, _: &EvaluationRecord) -> Result<Option<i64>> {
            Ok(None)
        }
        fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<FiledRequest>> {
            self.0.list_requests(filter)
        }
        fn archive_request(&self, id: RequestId) -> Result<bool> {
            self.0.archive_request(id)
        }
        fn insert_incident(&self, employee_id: &ParticipantId, description: &str) -> Result<Incident> {
            self.0.insert_incident(employee_id, description)
        }
        fn load_incident(&self, id: i64) -> Result<Option<Incident>> {
            self.0.load_incident(id)
        }
    }

    #[test]
    fn test_retry_exhaustion_is_concurrent_modification() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("countersign.db"), Duration::from_secs(5)).unwrap();
        let service = ApprovalService::new(AlwaysConflicting(store), sample_directory(), Dispatcher::disabled())
            .with_retry(RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            });

        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        let err = service.decide(filed.id, &id("E-050"), true, None).unwrap_err();
        assert!(matches!(
            err,
            CountersignError::ConcurrentModification { attempts: 3, .. }
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_concurrent_decisions_on_distinct_slots_both_persist() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("countersign.db");
        let (service, _) = service(&tmp);
        let filed = service.create_with_approval("leave", &id("E-100"), false, None).unwrap();
        drop(service);

        let retry = RetryPolicy {
            max_attempts: 50,
            backoff: Duration::from_millis(2),
        };
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [("E-050", true), ("E-001", false)]
            .into_iter()
            .map(|(evaluator, approve)| {
                let db = db.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let store = SqliteStore::open(&db, Duration::from_secs(5)).unwrap();
                    let service = ApprovalService::new(store, sample_directory(), Dispatcher::disabled())
                        .with_retry(retry);
                    barrier.wait();
                    service.decide(filed.id, &id(evaluator), approve, None).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = SqliteStore::open(&db, Duration::from_secs(5)).unwrap();
        let request = store.load_request(filed.id).unwrap().unwrap();
        assert!(request.record.slot(&id("E-050")).unwrap().decision.is_approved());
        assert!(request.record.slot(&id("E-001")).unwrap().decision.is_rejected());
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.version, 3);
    }
}
