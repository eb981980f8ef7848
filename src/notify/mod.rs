//! Notification boundary.
//!
//! The service only talks to a [`Dispatcher`], which composes the message
//! for each workflow event and hands it to a [`Notifier`] sink. Delivery is
//! best-effort: the dispatcher runs after the store commit and never
//! propagates a sink failure.

mod outbox;

pub use outbox::{OutboxMessage, OutboxNotifier};

use thiserror::Error;
use tracing::{info, warn};

use crate::entity::{CommentId, FiledRequest, Participant, ParticipantId, RequestStatus};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Recipient {0} has no email address")]
    NoAddress(ParticipantId),

    #[error("Outbox error: {0}")]
    Outbox(#[from] rusqlite::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub trait Notifier: Send {
    fn notify(&self, recipient: &Participant, subject: &str, body: &str)
        -> Result<(), NotifyError>;
}

/// Emits each notification as a tracing event.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        recipient: &Participant,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        if recipient.email.is_empty() {
            return Err(NotifyError::NoAddress(recipient.id.clone()));
        }
        info!(to = %recipient.email, subject, body, "notification");
        Ok(())
    }
}

/// Drops every notification.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _: &Participant, _: &str, _: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Composes workflow notifications and delivers them through a sink.
pub struct Dispatcher {
    sink: Box<dyn Notifier>,
    sender: String,
}

impl Dispatcher {
    pub fn new(sink: Box<dyn Notifier>, sender: impl Into<String>) -> Self {
        Self {
            sink,
            sender: sender.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NullNotifier), "")
    }

    /// A new request: evaluators are asked to act, or the applicant learns
    /// it was approved outright.
    pub fn request_filed(&self, request: &FiledRequest) {
        let record = &request.record;
        if request.status == RequestStatus::Approved {
            let subject = self.subject(request, "approved");
            let body = format!(
                "Your {} request #{} was approved automatically.",
                request.request_path, request.id
            );
            self.send_to(request, &request.applicant_id, &subject, &body);
            return;
        }

        let applicant = self.display_name(request, &request.applicant_id);
        let subject = self.subject(request, "awaiting your evaluation");
        let body = format!(
            "{} filed {} request #{}. Your decision is requested.",
            applicant, request.request_path, request.id
        );
        for slot in record.evaluators_in_order() {
            if slot.decision.is_undecided() {
                self.send_to(request, &slot.evaluated_by, &subject, &body);
            }
        }
    }

    /// Called only when a decision moved the derived status.
    pub fn status_changed(&self, request: &FiledRequest, decided_by: &ParticipantId) {
        let subject = self.subject(request, &request.status.to_string());
        let body = format!(
            "Your {} request #{} is now {} following the decision of {}.",
            request.request_path,
            request.id,
            request.status,
            self.display_name(request, decided_by)
        );
        self.send_to(request, &request.applicant_id, &subject, &body);
    }

    /// Applicant comments go to every evaluator; anyone else's comment goes
    /// to the applicant. Authors are never told about their own comment.
    pub fn comment_added(&self, request: &FiledRequest, author: &ParticipantId, comment_id: CommentId) {
        let message = request
            .record
            .find_comment(comment_id)
            .map(|c| c.message.as_str())
            .unwrap_or_default();
        let subject = self.subject(request, "new comment");
        let body = format!(
            "{} commented on {} request #{}:\n\n{}",
            self.display_name(request, author),
            request.request_path,
            request.id,
            message
        );

        let recipients: Vec<&ParticipantId> = if author == &request.applicant_id {
            request
                .record
                .evaluators_in_order()
                .into_iter()
                .map(|s| &s.evaluated_by)
                .collect()
        } else {
            vec![&request.applicant_id]
        };

        for recipient in recipients.into_iter().filter(|r| *r != author) {
            self.send_to(request, recipient, &subject, &body);
        }
    }

    fn subject(&self, request: &FiledRequest, what: &str) -> String {
        if self.sender.is_empty() {
            format!("{} request #{}: {}", request.request_path, request.id, what)
        } else {
            format!(
                "[{}] {} request #{}: {}",
                self.sender, request.request_path, request.id, what
            )
        }
    }

    fn display_name(&self, request: &FiledRequest, id: &ParticipantId) -> String {
        request
            .record
            .participant(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn send_to(&self, request: &FiledRequest, recipient: &ParticipantId, subject: &str, body: &str) {
        let Some(participant) = request.record.participant(recipient) else {
            warn!(request_id = request.id, %recipient, "no participant snapshot, notification skipped");
            return;
        };
        if let Err(e) = self.sink.notify(participant, subject, body) {
            warn!(request_id = request.id, %recipient, error = %e, "notification failed");
        }
    }
}
